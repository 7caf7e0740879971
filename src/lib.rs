pub mod errors;
pub mod coordinate;
pub mod model;
pub mod extractor;
pub mod output;
pub mod archive;
pub mod query;
pub mod config;
pub mod utils;
pub mod commands;
pub mod api;

pub use crate::api::PatchFex;

pub use errors::{FexError, FexResult};
pub use coordinate::{GeoTransform, GridCell, GridIndexer};
pub use extractor::{ExtractionPipeline, InMemoryRaster, PipelineConfig, RasterSource, Region, RegionGrower};
pub use model::{DatasetDescriptor, Feature, FeatureType, Patch, PatchId};
pub use output::{DefaultPatchWriterFactory, PatchWriter, WriterConfig};
pub use archive::{ArchiveLocation, ArchiveResolver};
pub use query::{IndexedQuery, QueryInterface, ScanQuery};
pub use config::ApplicationConfig;
