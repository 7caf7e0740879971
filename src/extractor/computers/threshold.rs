//! Threshold region computer
//!
//! Measures how much of a patch passes a threshold on one band and how large
//! the biggest connected region is. Flood and change detection masks are
//! the typical inputs.

use log::debug;

use crate::errors::FexResult;
use crate::extractor::feature_computer::{ComputeContext, FeatureComputer, PatchVerdict, SizePolicy, SkipReason};
use crate::extractor::region_grower::{Comparison, Connectivity, RegionGrower};
use crate::model::{Feature, FeatureType, FeatureValue, Patch, ValueType};
use crate::output::quicklook;

/// Minimum window area relative to the nominal patch area
pub const DEFAULT_MIN_AREA_RATIO: f64 = 0.6;

/// Region-growing features on a single band
pub struct ThresholdRegionsComputer {
    band: String,
    threshold: f64,
    comparison: Comparison,
    connectivity: Connectivity,
    prefix: String,
    quicklooks: bool,
    size_policy: SizePolicy,
}

impl ThresholdRegionsComputer {
    pub const NAME: &'static str = "threshold-regions";

    /// Create a computer with `>` comparison, 8-connectivity and the band
    /// name as feature prefix
    pub fn new(band: &str, threshold: f64) -> Self {
        ThresholdRegionsComputer {
            band: band.to_string(),
            threshold,
            comparison: Comparison::default(),
            connectivity: Connectivity::default(),
            prefix: band.to_string(),
            quicklooks: true,
            size_policy: SizePolicy::MinAreaRatio(DEFAULT_MIN_AREA_RATIO),
        }
    }

    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_quicklooks(mut self, quicklooks: bool) -> Self {
        self.quicklooks = quicklooks;
        self
    }

    pub fn with_size_policy(mut self, policy: SizePolicy) -> Self {
        self.size_policy = policy;
        self
    }
}

impl FeatureComputer for ThresholdRegionsComputer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn feature_types(&self) -> Vec<FeatureType> {
        let p = &self.prefix;
        let mut types = vec![
            FeatureType::new(&format!("{}.pctOverThreshold", p),
                             "Fraction of patch pixels passing the threshold", ValueType::Number),
            FeatureType::new(&format!("{}.largestConnectedBlob", p),
                             "Largest connected region as a fraction of the patch", ValueType::Number),
            FeatureType::statistics(&format!("{}.stx", p),
                                    &format!("Statistics of band '{}'", self.band)),
        ];
        if self.quicklooks {
            types.push(FeatureType::new(&format!("{}_mask", p), "Threshold mask", ValueType::Image));
            types.push(FeatureType::new(&format!("{}_ql", p),
                                        &format!("Quicklook of band '{}'", self.band), ValueType::Image));
        }
        types
    }

    fn required_bands(&self) -> Vec<String> {
        vec![self.band.clone()]
    }

    fn size_policy(&self) -> SizePolicy {
        self.size_policy
    }

    fn compute_features(&self, patch: &Patch, ctx: &ComputeContext<'_>) -> FexResult<PatchVerdict> {
        let tile = ctx.source.read_tile(&self.band, patch.region())?;
        let patch_size = tile.data.len() as f64;
        if patch_size == 0.0 {
            return Ok(PatchVerdict::Skip(SkipReason::TooSmall));
        }

        let mut samples = Vec::new();
        let growth = RegionGrower::new(&tile)
            .with_comparison(self.comparison)
            .with_connectivity(self.connectivity)
            .run(self.threshold, &mut samples);

        let pct_over_threshold = growth.samples_over_threshold as f64 / patch_size;
        if pct_over_threshold < ctx.config.min_valid_pixels {
            debug!("Patch {}: {:.3} over threshold, below {}",
                   patch.patch_name(), pct_over_threshold, ctx.config.min_valid_pixels);
            return Ok(PatchVerdict::Skip(SkipReason::BelowThreshold));
        }

        let types = self.feature_types();
        let mut features = vec![
            Feature::new(types[0].clone(), FeatureValue::Number(pct_over_threshold))?,
            Feature::new(types[1].clone(), FeatureValue::Number(growth.max_cluster_size as f64 / patch_size))?,
            Feature::from_statistics(types[2].clone(), &tile.statistics())?,
        ];
        if self.quicklooks {
            let mask = quicklook::render_mask(&tile, self.threshold, self.comparison);
            features.push(Feature::new(types[3].clone(), FeatureValue::Image(mask))?);
            features.push(Feature::new(types[4].clone(), FeatureValue::Image(quicklook::render_grey(&tile)))?);
        }

        Ok(PatchVerdict::Keep(features))
    }
}
