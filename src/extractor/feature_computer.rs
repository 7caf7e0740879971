//! Feature computer strategies
//!
//! A feature computer turns one patch into a list of features, or decides
//! the patch is not worth keeping. Concrete computers are selected by name
//! through [`ComputerFactory`].

use std::fmt;
use std::str::FromStr;

use log::{debug, error, info};
use serde::Deserialize;

use super::computers::{BandStatsComputer, ThresholdRegionsComputer};
use super::pipeline::PipelineConfig;
use super::raster::RasterSource;
use super::region_grower::{Comparison, Connectivity};
use crate::errors::{FexError, FexResult};
use crate::model::{Feature, FeatureType, Patch};

/// Why a patch was not kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The window is smaller than the size policy allows
    TooSmall,
    /// Not enough valid (non-masked) pixels
    TooFewValidPixels,
    /// The measured quantity stays below the configured threshold
    BelowThreshold,
    /// Feature, quicklook and product output are all disabled
    AllOutputSkipped,
    /// The run was cancelled before the patch was processed
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::TooSmall => "too small",
            SkipReason::TooFewValidPixels => "too few valid pixels",
            SkipReason::BelowThreshold => "below threshold",
            SkipReason::AllOutputSkipped => "all output skipped",
            SkipReason::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// Outcome of computing features for one patch
#[derive(Debug, Clone)]
pub enum PatchVerdict {
    Keep(Vec<Feature>),
    Skip(SkipReason),
}

/// Rule deciding whether a window is large enough to process
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizePolicy {
    /// Every window is processed, ragged border windows included
    Any,
    /// Reject when window area / nominal patch area is below the ratio
    MinAreaRatio(f64),
    /// Reject when the fraction of valid pixels in the first required band
    /// is below the given fraction
    MinValidFraction(f64),
}

impl FromStr for SizePolicy {
    type Err = FexError;

    /// Parses `any`, `area:<ratio>` or `valid:<fraction>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "any" {
            return Ok(SizePolicy::Any);
        }
        let parse = |v: &str| v.trim().parse::<f64>()
            .map_err(|_| FexError::Configuration(format!("Invalid size policy '{}'", s)));
        match s.split_once(':') {
            Some(("area", v)) => Ok(SizePolicy::MinAreaRatio(parse(v)?)),
            Some(("valid", v)) => Ok(SizePolicy::MinValidFraction(parse(v)?)),
            _ => Err(FexError::Configuration(format!("Invalid size policy '{}'", s))),
        }
    }
}

/// What a computer may read while processing one patch
pub struct ComputeContext<'a> {
    /// Full source product
    pub source: &'a dyn RasterSource,
    /// Pipeline configuration
    pub config: &'a PipelineConfig,
}

impl ComputeContext<'_> {
    /// Nominal patch area in pixels
    pub fn nominal_area(&self) -> f64 {
        self.config.patch_width as f64 * self.config.patch_height as f64
    }
}

/// Pluggable per-patch feature computation
pub trait FeatureComputer: Send + Sync {
    /// Name the computer is registered under
    fn name(&self) -> &str;

    /// Feature types this computer may produce, in output order
    fn feature_types(&self) -> Vec<FeatureType>;

    /// Bands the source product must provide
    fn required_bands(&self) -> Vec<String>;

    /// Size rule applied before the computer runs
    fn size_policy(&self) -> SizePolicy {
        SizePolicy::Any
    }

    /// Compute the features of one patch
    ///
    /// # Arguments
    /// * `patch` - Patch with its pixel window set
    /// * `ctx` - Source product and pipeline configuration
    ///
    /// # Returns
    /// The features to keep, or the reason to skip the patch
    fn compute_features(&self, patch: &Patch, ctx: &ComputeContext<'_>) -> FexResult<PatchVerdict>;
}

/// Parameters for building a computer by name
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ComputerParams {
    /// Bands to process; empty means all bands of the source
    pub bands: Vec<String>,
    /// Threshold for region growing
    pub threshold: f64,
    /// Threshold comparison, one of `>`, `>=`, `<`, `<=`
    pub comparison: String,
    /// Neighbourhood for region growing, 4 or 8
    pub connectivity: u8,
    /// Prefix of the produced feature names
    pub prefix: Option<String>,
    /// Size policy override, see [`SizePolicy`]
    pub size_policy: Option<String>,
    /// Whether to produce quicklook images
    pub quicklooks: bool,
}

impl Default for ComputerParams {
    fn default() -> Self {
        ComputerParams {
            bands: Vec::new(),
            threshold: 1.0,
            comparison: ">".to_string(),
            connectivity: 8,
            prefix: None,
            size_policy: None,
            quicklooks: true,
        }
    }
}

impl ComputerParams {
    /// Parsed threshold comparison
    pub fn comparison(&self) -> FexResult<Comparison> {
        Comparison::parse(&self.comparison).ok_or_else(|| FexError::Configuration(
            format!("Unknown threshold comparison '{}'", self.comparison)))
    }

    /// Parsed connectivity
    pub fn connectivity(&self) -> FexResult<Connectivity> {
        match self.connectivity {
            4 => Ok(Connectivity::Four),
            8 => Ok(Connectivity::Eight),
            other => Err(FexError::Configuration(format!("Connectivity must be 4 or 8, got {}", other))),
        }
    }

    /// Parsed size policy override
    pub fn size_policy(&self) -> FexResult<Option<SizePolicy>> {
        self.size_policy.as_deref().map(str::parse::<SizePolicy>).transpose()
    }
}

/// Creates feature computers by name
pub struct ComputerFactory;

impl ComputerFactory {
    /// Names of all registered computers
    pub fn available() -> &'static [&'static str] {
        &[BandStatsComputer::NAME, ThresholdRegionsComputer::NAME]
    }

    /// Create a computer
    ///
    /// # Arguments
    /// * `name` - Registered computer name
    /// * `params` - Computer parameters
    /// * `source_bands` - Bands of the source product, used when no bands are configured
    ///
    /// # Returns
    /// The computer, or a configuration error for an unknown name or bad parameters
    pub fn create(name: &str, params: &ComputerParams, source_bands: &[String]) -> FexResult<Box<dyn FeatureComputer>> {
        debug!("Creating feature computer '{}'", name);
        let bands = if params.bands.is_empty() {
            source_bands.to_vec()
        } else {
            params.bands.clone()
        };

        match name {
            BandStatsComputer::NAME => {
                info!("Using band statistics computer for {} band(s)", bands.len());
                Ok(Box::new(BandStatsComputer::new(bands, params.quicklooks, params.size_policy()?)))
            }
            ThresholdRegionsComputer::NAME => {
                let band = bands.first().cloned().ok_or_else(|| FexError::Configuration(
                    "Threshold regions computer needs a band".to_string()))?;
                info!("Using threshold regions computer on band '{}'", band);
                let mut computer = ThresholdRegionsComputer::new(&band, params.threshold)
                    .with_comparison(params.comparison()?)
                    .with_connectivity(params.connectivity()?)
                    .with_quicklooks(params.quicklooks);
                if let Some(prefix) = &params.prefix {
                    computer = computer.with_prefix(prefix);
                }
                if let Some(policy) = params.size_policy()? {
                    computer = computer.with_size_policy(policy);
                }
                Ok(Box::new(computer))
            }
            _ => {
                error!("Unknown feature computer: {}", name);
                Err(FexError::Configuration(format!(
                    "Unknown feature computer '{}' (available: {})",
                    name, Self::available().join(", "))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_policy_parses() {
        assert_eq!("any".parse::<SizePolicy>().unwrap(), SizePolicy::Any);
        assert_eq!("area:0.6".parse::<SizePolicy>().unwrap(), SizePolicy::MinAreaRatio(0.6));
        assert_eq!(" valid: 0.1 ".parse::<SizePolicy>().unwrap(), SizePolicy::MinValidFraction(0.1));
        assert!("area".parse::<SizePolicy>().is_err());
        assert!("pixels:3".parse::<SizePolicy>().is_err());
    }

    #[test]
    fn factory_rejects_unknown_names() {
        let err = ComputerFactory::create("nope", &ComputerParams::default(), &[]).err().unwrap();
        assert!(matches!(err, FexError::Configuration(_)));
        assert!(err.to_string().contains("band-stats"));
    }

    #[test]
    fn factory_falls_back_to_source_bands() {
        let bands = vec!["b1".to_string(), "b2".to_string()];
        let computer = ComputerFactory::create("band-stats", &ComputerParams::default(), &bands).unwrap();
        assert_eq!(computer.required_bands(), bands);

        let computer = ComputerFactory::create("threshold-regions", &ComputerParams::default(), &bands).unwrap();
        assert_eq!(computer.required_bands(), vec!["b1".to_string()]);
        assert_eq!(computer.size_policy(), SizePolicy::MinAreaRatio(0.6));
    }

    #[test]
    fn bad_parameters_are_configuration_errors() {
        let params = ComputerParams { connectivity: 6, ..ComputerParams::default() };
        assert!(ComputerFactory::create("threshold-regions", &params, &["b".to_string()]).is_err());
        assert!(ComputerFactory::create("threshold-regions", &ComputerParams::default(), &[]).is_err());
    }
}
