//! Default patch writer
//!
//! Writes one product's patches into `<target>/<product>.fex/` or, with zip
//! output enabled, into `<target>/<product>.fex.zip`. The actual files are
//! produced by a list of part writers sharing the same output container.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use super::container::OutputContainer;
use super::csv_writer::CsvPatchWriter;
use super::kml_writer::KmlPartWriter;
use super::product_writer::ProductPartWriter;
use super::properties_writer::PropertiesPatchWriter;
use super::quicklook::encode_png;
use super::sink::{PatchSink, PatchWriter, PatchWriterFactory, WriterConfig};
use crate::errors::{FexError, FexResult};
use crate::extractor::RasterSource;
use crate::model::{Feature, FeatureType, FeatureValue, Patch};

/// Suffix of a patch archive directory
pub const ARCHIVE_DIR_SUFFIX: &str = ".fex";
/// Suffix of a zipped patch archive
pub const ARCHIVE_ZIP_SUFFIX: &str = ".fex.zip";

/// One kind of file written for every patch
pub trait PartWriter: Send {
    /// Write per-product files before the first patch
    fn initialize(&mut self, container: &mut OutputContainer, source: &dyn RasterSource,
                  feature_types: &[FeatureType]) -> FexResult<()>;

    /// Write the files of one patch; its directory already exists
    fn write_patch(&mut self, container: &mut OutputContainer, patch: &Patch, features: &[Feature]) -> FexResult<()>;

    /// Write anything buffered until the end of the product
    fn close(&mut self, _container: &mut OutputContainer) -> FexResult<()> {
        Ok(())
    }
}

/// Writes image features as `<feature>.png`
#[derive(Debug, Default)]
pub struct QuicklookPartWriter;

impl PartWriter for QuicklookPartWriter {
    fn initialize(&mut self, _container: &mut OutputContainer, _source: &dyn RasterSource,
                  _feature_types: &[FeatureType]) -> FexResult<()> {
        Ok(())
    }

    fn write_patch(&mut self, container: &mut OutputContainer, patch: &Patch, features: &[Feature]) -> FexResult<()> {
        for feature in features {
            if let FeatureValue::Image(image) = feature.value() {
                let path = format!("{}/{}.png", patch.patch_name(), feature.name());
                container.write_file(&path, &encode_png(image)?)?;
            }
        }
        Ok(())
    }
}

/// Check the target directory, creating it when overwriting is allowed
///
/// Without overwrite mode the target must already exist and be empty.
pub fn prepare_target_dir(target: &Path, overwrite: bool) -> FexResult<()> {
    if target.exists() {
        if !target.is_dir() {
            return Err(FexError::Configuration(format!("Not a directory: '{}'.", target.display())));
        }
        if !overwrite && fs::read_dir(target)?.next().is_some() {
            return Err(FexError::Configuration(format!("Directory is not empty: '{}'.", target.display())));
        }
        Ok(())
    } else if overwrite {
        fs::create_dir_all(target)?;
        Ok(())
    } else {
        Err(FexError::Configuration(format!("Directory does not exist: '{}'.", target.display())))
    }
}

/// Container location of a product below a target directory
pub fn product_container_path(target: &Path, product_name: &str, zip: bool) -> PathBuf {
    let suffix = if zip { ARCHIVE_ZIP_SUFFIX } else { ARCHIVE_DIR_SUFFIX };
    target.join(format!("{}{}", product_name, suffix))
}

/// Directory or zip writer for one source product
pub struct DefaultPatchWriter {
    product_name: String,
    container: Option<OutputContainer>,
    parts: Vec<Box<dyn PartWriter>>,
    written: usize,
    closed: bool,
}

impl DefaultPatchWriter {
    /// Create a writer for the named product
    pub fn new(product_name: &str) -> Self {
        DefaultPatchWriter {
            product_name: product_name.to_string(),
            container: None,
            parts: Vec::new(),
            written: 0,
            closed: false,
        }
    }

    /// Location of the output container once initialized
    pub fn location(&self) -> Option<&Path> {
        self.container.as_ref().map(|c| c.location())
    }

    fn part_writers(config: &WriterConfig) -> Vec<Box<dyn PartWriter>> {
        let mut parts: Vec<Box<dyn PartWriter>> = vec![Box::new(PropertiesPatchWriter::new(config.extra.clone()))];
        if !config.skip_feature_output {
            parts.push(Box::new(CsvPatchWriter::new()));
        }
        if !config.skip_quicklook_output {
            parts.push(Box::new(QuicklookPartWriter));
            parts.push(Box::new(KmlPartWriter::new()));
        }
        if !config.skip_product_output {
            parts.push(Box::new(ProductPartWriter::new()));
        }
        parts
    }
}

impl PatchSink for DefaultPatchWriter {
    fn write_patch(&mut self, patch: &Patch, features: &[Feature]) -> FexResult<()> {
        if self.closed {
            return Err(FexError::GenericError(format!(
                "Patch writer for '{}' is already closed", self.product_name)));
        }
        let container = self.container.as_mut().ok_or_else(|| FexError::Configuration(format!(
            "Patch writer for '{}' is not initialized", self.product_name)))?;

        container.create_dir(&patch.patch_name())?;
        for part in &mut self.parts {
            part.write_patch(container, patch, features)?;
        }
        self.written += 1;
        Ok(())
    }
}

impl PatchWriter for DefaultPatchWriter {
    fn initialize(&mut self, config: &WriterConfig, source: &dyn RasterSource,
                  feature_types: &[FeatureType]) -> FexResult<()> {
        if self.container.is_some() {
            return Err(FexError::Configuration(format!(
                "Patch writer for '{}' is already initialized", self.product_name)));
        }
        prepare_target_dir(&config.target_path, config.overwrite_mode)?;

        let path = product_container_path(&config.target_path, &self.product_name, config.zip_all_output);
        let mut container = if config.zip_all_output {
            OutputContainer::zip(&path)?
        } else {
            OutputContainer::directory(&path)?
        };

        let mut parts = Self::part_writers(config);
        for part in &mut parts {
            part.initialize(&mut container, source, feature_types)?;
        }

        info!("Writing patches of '{}' to {}", self.product_name, path.display());
        self.container = Some(container);
        self.parts = parts;
        Ok(())
    }

    fn close(&mut self) -> FexResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut container = match self.container.take() {
            Some(container) => container,
            None => return Ok(()),
        };

        let mut first_error = None;
        for part in &mut self.parts {
            if let Err(e) = part.close(&mut container) {
                error!("Failed to close part writer of '{}': {}", self.product_name, e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = container.finish() {
            error!("Failed to finish {}: {}", container.location().display(), e);
            first_error.get_or_insert(e);
        }
        self.parts.clear();

        debug!("Closed patch writer of '{}' after {} patch(es)", self.product_name, self.written);
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Creates a [`DefaultPatchWriter`] per product
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPatchWriterFactory;

impl PatchWriterFactory for DefaultPatchWriterFactory {
    fn create_writer(&self, _config: &WriterConfig, product_name: &str) -> FexResult<Box<dyn PatchWriter>> {
        Ok(Box::new(DefaultPatchWriter::new(product_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{InMemoryRaster, Region};
    use crate::model::ValueType;
    use image::{DynamicImage, GrayImage};
    use std::io::Read;
    use std::sync::Arc;

    fn source() -> InMemoryRaster {
        let mut raster = InMemoryRaster::new("MER_20080713", 4, 4);
        raster.add_band("b1", (0..16).map(f64::from).collect()).unwrap();
        raster
    }

    fn features(source: &InMemoryRaster) -> (Patch, Vec<Feature>, Vec<FeatureType>) {
        let region = Region::new(0, 0, 2, 2);
        let product = Arc::new(source.subset(region).unwrap().with_name("x000y000"));
        let types = vec![
            FeatureType::new("patch", "Patch product", ValueType::SubProduct),
            FeatureType::new("mean", "Mean", ValueType::Number),
            FeatureType::new("rgb", "Quicklook", ValueType::Image),
        ];
        let features = vec![
            Feature::new(types[0].clone(), FeatureValue::SubProduct(product)).unwrap(),
            Feature::new(types[1].clone(), FeatureValue::Number(2.5)).unwrap(),
            Feature::new(types[2].clone(), FeatureValue::Image(DynamicImage::ImageLuma8(GrayImage::new(2, 2)))).unwrap(),
        ];
        (Patch::new(source.name(), 0, 0, region), features, types)
    }

    #[test]
    fn writes_directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        let source = source();
        let (patch, features, types) = features(&source);

        let mut writer = DefaultPatchWriter::new(source.name());
        writer.initialize(&WriterConfig::new(dir.path()), &source, &types).unwrap();
        writer.write_patch(&patch, &features).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();

        let root = dir.path().join("MER_20080713.fex");
        assert!(root.join("fex-metadata.txt").is_file());
        assert_eq!(fs::read_to_string(root.join("x000y000/features.txt")).unwrap(), "mean = 2.5\n");
        assert!(root.join("x000y000/rgb.png").is_file());
        assert!(root.join("x000y000/patch.dim").is_file());
        assert_eq!(fs::metadata(root.join("x000y000/patch.data/b1.img")).unwrap().len(), 16);
        assert_eq!(fs::read_to_string(root.join("features.csv")).unwrap(), "patch,mean\nx000y000,2.5\n");
    }

    #[test]
    fn writes_zip_without_skipped_parts() {
        let dir = tempfile::tempdir().unwrap();
        let source = source();
        let (patch, features, types) = features(&source);
        let mut config = WriterConfig::new(dir.path());
        config.zip_all_output = true;
        config.skip_product_output = true;

        let mut writer = DefaultPatchWriter::new(source.name());
        writer.initialize(&config, &source, &types).unwrap();
        writer.write_patch(&patch, &features).unwrap();
        writer.close().unwrap();

        let file = fs::File::open(dir.path().join("MER_20080713.fex.zip")).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut text = String::new();
        archive.by_name("x000y000/features.txt").unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "mean = 2.5\n");
        assert!(archive.by_name("x000y000/rgb.png").is_ok());
        assert!(archive.by_name("x000y000/patch.dim").is_err());
    }

    #[test]
    fn target_directory_rules() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = prepare_target_dir(&missing, false).unwrap_err();
        assert!(err.to_string().contains("Directory does not exist"));
        prepare_target_dir(&missing, true).unwrap();
        assert!(missing.is_dir());

        fs::write(missing.join("old.txt"), "x").unwrap();
        let err = prepare_target_dir(&missing, false).unwrap_err();
        assert!(err.to_string().contains("Directory is not empty"));
        prepare_target_dir(&missing, true).unwrap();
    }

    #[test]
    fn write_requires_initialize() {
        let source = source();
        let (patch, features, _) = features(&source);
        let mut writer = DefaultPatchWriter::new(source.name());
        assert!(writer.write_patch(&patch, &features).is_err());
        writer.close().unwrap();
    }
}
