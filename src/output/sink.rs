//! Patch sink and writer contracts
//!
//! The pipeline hands every kept patch to a [`PatchSink`]. A [`PatchWriter`]
//! is a sink with a lifecycle: `initialize` once before any patch,
//! `write_patch` zero or more times, then `close` once.

use std::path::PathBuf;

use crate::errors::FexResult;
use crate::extractor::RasterSource;
use crate::model::{Feature, FeatureType, Patch};
use crate::utils::string_utils::{parse_properties, property};

/// Receives the features of kept patches
pub trait PatchSink: Send {
    /// Persist one patch
    ///
    /// # Arguments
    /// * `patch` - The patch, with its sub-product attached when product output is on
    /// * `features` - Features to persist, already filtered by the skip flags
    fn write_patch(&mut self, patch: &Patch, features: &[Feature]) -> FexResult<()>;
}

/// A sink with an explicit lifecycle
pub trait PatchWriter: PatchSink {
    /// Prepare output for one source product
    fn initialize(&mut self, config: &WriterConfig, source: &dyn RasterSource,
                  feature_types: &[FeatureType]) -> FexResult<()>;

    /// Flush and release all output; safe to call more than once
    fn close(&mut self) -> FexResult<()>;
}

/// Creates the writer for one source product
pub trait PatchWriterFactory: Send + Sync {
    fn create_writer(&self, config: &WriterConfig, product_name: &str) -> FexResult<Box<dyn PatchWriter>>;
}

/// Output settings shared by all writers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriterConfig {
    /// Directory receiving the product containers
    pub target_path: PathBuf,
    /// Allow writing into an existing, non-empty target and create a missing one
    pub overwrite_mode: bool,
    pub skip_feature_output: bool,
    pub skip_product_output: bool,
    pub skip_quicklook_output: bool,
    /// Write one `<product>.fex.zip` instead of a `<product>.fex` directory
    pub zip_all_output: bool,
    /// Free-form writer properties
    pub extra: Vec<(String, String)>,
}

impl WriterConfig {
    /// Create a config writing to a target directory
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        WriterConfig {
            target_path: target_path.into(),
            ..WriterConfig::default()
        }
    }

    /// Parse extra writer properties from `key = value` text
    pub fn with_extra_text(mut self, text: &str) -> Self {
        self.extra = parse_properties(text);
        self
    }

    /// Extra property by key
    pub fn extra(&self, key: &str) -> Option<&str> {
        property(&self.extra, key)
    }
}
