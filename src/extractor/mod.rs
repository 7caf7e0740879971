//! Patch feature extraction
//!
//! This module provides the extraction side of the system: raster access,
//! patch windowing, region growing, the feature computer strategies and the
//! pipeline driving them.

mod region;
mod raster;
mod statistics;
mod region_grower;
mod feature_computer;
mod computers;
mod pipeline;

// Public exports
pub use region::Region;
pub use raster::{Band, InMemoryRaster, RasterSource, Tile};
pub use statistics::{Statistics, STATISTICS_ATTRIBUTES};
pub use region_grower::{Comparison, Connectivity, GrowthResult, RegionGrower};
pub use feature_computer::{
    ComputeContext, ComputerFactory, ComputerParams, FeatureComputer, PatchVerdict, SizePolicy, SkipReason,
};
pub use computers::{BandStatsComputer, ThresholdRegionsComputer, DEFAULT_MIN_AREA_RATIO};
pub use pipeline::{
    ExtractionPipeline, ExtractionResult, PatchResult, PipelineConfig, SkippedPatch, PATCH_PRODUCT_FEATURE,
};
