//! Per-band statistics computer

use log::debug;

use crate::errors::FexResult;
use crate::extractor::feature_computer::{ComputeContext, FeatureComputer, PatchVerdict, SizePolicy, SkipReason};
use crate::model::{Feature, FeatureType, FeatureValue, Patch, ValueType};
use crate::output::quicklook;

/// Computes a statistics group and a grey quicklook for every band
pub struct BandStatsComputer {
    bands: Vec<String>,
    quicklooks: bool,
    size_policy: SizePolicy,
}

impl BandStatsComputer {
    pub const NAME: &'static str = "band-stats";

    /// Create the computer
    ///
    /// # Arguments
    /// * `bands` - Bands to summarize
    /// * `quicklooks` - Whether to render a quicklook per band
    /// * `size_policy` - Optional size rule; every window is processed by default
    pub fn new(bands: Vec<String>, quicklooks: bool, size_policy: Option<SizePolicy>) -> Self {
        BandStatsComputer {
            bands,
            quicklooks,
            size_policy: size_policy.unwrap_or(SizePolicy::Any),
        }
    }

    fn quicklook_name(band: &str) -> String {
        format!("{}_ql", band)
    }
}

impl FeatureComputer for BandStatsComputer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn feature_types(&self) -> Vec<FeatureType> {
        let mut types: Vec<FeatureType> = self.bands.iter()
            .map(|b| FeatureType::statistics(b, &format!("Statistics of band '{}'", b)))
            .collect();
        if self.quicklooks {
            types.extend(self.bands.iter().map(|b| FeatureType::new(
                &Self::quicklook_name(b), &format!("Quicklook of band '{}'", b), ValueType::Image)));
        }
        types
    }

    fn required_bands(&self) -> Vec<String> {
        self.bands.clone()
    }

    fn size_policy(&self) -> SizePolicy {
        self.size_policy
    }

    fn compute_features(&self, patch: &Patch, ctx: &ComputeContext<'_>) -> FexResult<PatchVerdict> {
        let types = self.feature_types();
        let mut features = Vec::with_capacity(types.len());
        let mut images = Vec::new();
        let mut any_valid = false;

        for (i, band) in self.bands.iter().enumerate() {
            let tile = ctx.source.read_tile(band, patch.region())?;
            let stx = tile.statistics();
            any_valid |= stx.count > 0;
            features.push(Feature::from_statistics(types[i].clone(), &stx)?);

            if self.quicklooks {
                let ql_type = types[self.bands.len() + i].clone();
                images.push(Feature::new(ql_type, FeatureValue::Image(quicklook::render_grey(&tile)))?);
            }
        }

        if !any_valid {
            debug!("Patch {} has no valid pixels in any band", patch.patch_name());
            return Ok(PatchVerdict::Skip(SkipReason::TooFewValidPixels));
        }

        features.extend(images);
        Ok(PatchVerdict::Keep(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{InMemoryRaster, PipelineConfig, Region};

    fn source() -> InMemoryRaster {
        let mut raster = InMemoryRaster::new("src", 4, 2);
        raster.add_band_with_no_data("b1", vec![1.0, 2.0, -1.0, -1.0, 3.0, 4.0, -1.0, -1.0], Some(-1.0)).unwrap();
        raster
    }

    #[test]
    fn statistics_and_quicklooks_per_band() {
        let raster = source();
        let config = PipelineConfig::new(2, 2);
        let ctx = ComputeContext { source: &raster, config: &config };
        let computer = BandStatsComputer::new(vec!["b1".to_string()], true, None);

        let patch = Patch::new("src", 0, 0, Region::new(0, 0, 2, 2));
        match computer.compute_features(&patch, &ctx).unwrap() {
            PatchVerdict::Keep(features) => {
                assert_eq!(features.len(), 2);
                assert_eq!(features[0].record_entries()[0], ("b1.mean".to_string(), "2.5".to_string()));
                assert_eq!(features[1].name(), "b1_ql");
                assert!(features[1].image().is_some());
            }
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    fn fully_masked_patch_is_skipped() {
        let raster = source();
        let config = PipelineConfig::new(2, 2);
        let ctx = ComputeContext { source: &raster, config: &config };
        let computer = BandStatsComputer::new(vec!["b1".to_string()], false, None);

        let patch = Patch::new("src", 1, 0, Region::new(2, 0, 2, 2));
        assert!(matches!(computer.compute_features(&patch, &ctx).unwrap(),
                         PatchVerdict::Skip(SkipReason::TooFewValidPixels)));
    }
}
