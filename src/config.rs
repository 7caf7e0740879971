//! Application configuration
//!
//! One TOML file describes an application profile: its feature schema, the
//! patch grid, extraction settings and where its archives live. The config is
//! loaded once at startup and passed to the pipeline, resolver and query
//! backends by reference.
//!
//! ```toml
//! [application]
//! name = "AlgalBloom"
//! descriptor = "ds-descriptor.xml"
//! default_features = ["chl.mean", "flh.mean"]
//!
//! [grid]
//! resolution_deg = 0.01
//! patch_size_px = 200
//!
//! [extraction]
//! patch_width = 200
//! patch_height = 200
//! computer = "threshold-regions"
//!
//! [extraction.params]
//! bands = ["flood"]
//! threshold = 1.0
//!
//! [archive]
//! root = "/data/fex"
//! data_access_pattern = "/data/${yyyy}/${MM}/${dd}/${name}"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::coordinate::GridIndexer;
use crate::errors::{FexError, FexResult};
use crate::extractor::{ComputerParams, PipelineConfig};

/// Application profile settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApplicationSection {
    pub name: String,
    /// Dataset descriptor file
    pub descriptor: Option<PathBuf>,
    /// Effective feature names used by default; empty means all
    pub default_features: Vec<String>,
    /// Quicklook shown by default
    pub default_quicklook: Option<String>,
    /// Query expression selecting every patch
    pub all_query: Option<String>,
}

/// Global patch grid
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridSection {
    /// Degrees per pixel
    pub resolution_deg: f64,
    /// Patch size in pixels
    pub patch_size_px: u32,
}

impl Default for GridSection {
    fn default() -> Self {
        GridSection {
            resolution_deg: 0.01,
            patch_size_px: 200,
        }
    }
}

/// Extraction settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    pub patch_width: u32,
    pub patch_height: u32,
    pub overwrite: bool,
    pub skip_feature_output: bool,
    pub skip_product_output: bool,
    pub skip_quicklook_output: bool,
    pub min_valid_pixels: f64,
    pub zip_output: bool,
    /// Free-form writer properties as `key = value` lines
    pub writer_extra: String,
    /// Registered feature computer name
    pub computer: String,
    pub params: ComputerParams,
}

impl Default for ExtractionSection {
    fn default() -> Self {
        ExtractionSection {
            patch_width: 200,
            patch_height: 200,
            overwrite: false,
            skip_feature_output: false,
            skip_product_output: false,
            skip_quicklook_output: false,
            min_valid_pixels: 0.1,
            zip_output: false,
            writer_extra: String::new(),
            computer: "band-stats".to_string(),
            params: ComputerParams::default(),
        }
    }
}

/// Archive location settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArchiveSection {
    /// Directory holding `<product>.fex` directories and zips
    pub root: Option<PathBuf>,
    /// Templated fallback location, see [`crate::archive::DateTokenResolver`]
    pub data_access_pattern: Option<String>,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub application: ApplicationSection,
    pub grid: GridSection,
    pub extraction: ExtractionSection,
    pub archive: ArchiveSection,
}

impl ApplicationConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> FexResult<Self> {
        toml::from_str(text).map_err(|e| FexError::Configuration(format!("Invalid configuration: {}", e)))
    }

    /// Load a configuration file
    ///
    /// A relative descriptor path is taken relative to the file's directory.
    pub fn load(path: &Path) -> FexResult<Self> {
        debug!("Loading configuration {}", path.display());
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)
            .map_err(|e| FexError::Configuration(format!("{}: {}", path.display(), e)))?;

        if let (Some(descriptor), Some(dir)) = (&config.application.descriptor, path.parent()) {
            if descriptor.is_relative() {
                config.application.descriptor = Some(dir.join(descriptor));
            }
        }
        Ok(config)
    }

    /// Grid indexer for the configured grid; fails for a non-positive cell size
    pub fn grid_indexer(&self) -> FexResult<GridIndexer> {
        GridIndexer::new(self.grid.resolution_deg, self.grid.patch_size_px as f64)
    }

    /// Pipeline settings writing into a target directory
    pub fn pipeline_config(&self, target_path: &Path) -> PipelineConfig {
        let e = &self.extraction;
        let mut config = PipelineConfig::new(e.patch_width, e.patch_height);
        config.overwrite_mode = e.overwrite;
        config.skip_feature_output = e.skip_feature_output;
        config.skip_product_output = e.skip_product_output;
        config.skip_quicklook_output = e.skip_quicklook_output;
        config.min_valid_pixels = e.min_valid_pixels;
        config.zip_all_output = e.zip_output;
        config.writer_extra = e.writer_extra.clone();
        config.target_path = target_path.to_path_buf();
        config
    }

    /// Default feature set, or `None` when every feature is used
    pub fn default_feature_set(&self) -> Option<HashSet<String>> {
        if self.application.default_features.is_empty() {
            None
        } else {
            Some(self.application.default_features.iter().cloned().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ApplicationConfig::from_toml("").unwrap();
        assert_eq!(config, ApplicationConfig::default());
        assert_eq!(config.extraction.computer, "band-stats");
        assert_eq!(config.grid_indexer().unwrap().cell_size(), 2.0);
        assert!(config.default_feature_set().is_none());
    }

    #[test]
    fn sections_are_read() {
        let config = ApplicationConfig::from_toml(r#"
            [application]
            name = "Flood"
            default_features = ["flood.pctOverThreshold"]

            [grid]
            resolution_deg = 0.5
            patch_size_px = 2

            [extraction]
            patch_width = 100
            patch_height = 50
            zip_output = true
            computer = "threshold-regions"

            [extraction.params]
            bands = ["flood"]
            comparison = ">="
            connectivity = 4

            [archive]
            data_access_pattern = "/d/${yyyy}/${name}"
        "#).unwrap();

        assert_eq!(config.application.name, "Flood");
        assert_eq!(config.grid_indexer().unwrap().cell_size(), 1.0);
        assert_eq!(config.extraction.params.bands, vec!["flood"]);
        assert_eq!(config.extraction.params.threshold, 1.0);
        assert_eq!(config.archive.data_access_pattern.as_deref(), Some("/d/${yyyy}/${name}"));

        let pipeline = config.pipeline_config(Path::new("/out"));
        assert_eq!((pipeline.patch_width, pipeline.patch_height), (100, 50));
        assert!(pipeline.zip_all_output);
        assert!(config.default_feature_set().unwrap().contains("flood.pctOverThreshold"));
    }

    #[test]
    fn degenerate_grid_fails() {
        let config = ApplicationConfig::from_toml("[grid]\nresolution_deg = 0.0\n").unwrap();
        assert!(matches!(config.grid_indexer(), Err(FexError::Configuration(_))));
        assert!(ApplicationConfig::from_toml("[grid]\nresolution_deg = \"x\"\n").is_err());
    }
}
