//! Patch output
//!
//! Sink contracts, the directory/zip output container, the default writer
//! and its part writers, quicklook rendering and KML overviews.

mod sink;
mod container;
mod default_writer;
mod properties_writer;
mod csv_writer;
mod product_writer;
mod kml_writer;
pub mod quicklook;

// Public exports
pub use sink::{PatchSink, PatchWriter, PatchWriterFactory, WriterConfig};
pub use container::OutputContainer;
pub use default_writer::{
    prepare_target_dir, product_container_path, DefaultPatchWriter, DefaultPatchWriterFactory, PartWriter,
    QuicklookPartWriter, ARCHIVE_DIR_SUFFIX, ARCHIVE_ZIP_SUFFIX,
};
pub use properties_writer::{feature_types_text, PropertiesPatchWriter, FEATURES_FILE_NAME, METADATA_FILE_NAME};
pub use csv_writer::{CsvPatchWriter, CSV_FILE_NAME};
pub use product_writer::{encode_band, product_header, ProductPartWriter, PRODUCT_DATA_DIR, PRODUCT_FILE_NAME};
pub use kml_writer::{overview_file_name, KmlPartWriter};
