use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::archive::ArchiveResolver;
use crate::config::ApplicationConfig;
use crate::errors::{FexError, FexResult};
use crate::extractor::{ComputerFactory, ExtractionPipeline, ExtractionResult, InMemoryRaster, RasterSource};
use crate::model::{DatasetDescriptor, FeatureType};
use crate::output::DefaultPatchWriterFactory;
use crate::query::{IndexBuilder, IndexedQuery, ScanQuery};

/// Main interface to the patchfex library
///
/// Wraps one application configuration and its dataset descriptor, and
/// wires the pipeline, archive resolver and query backends from them.
pub struct PatchFex {
    config: ApplicationConfig,
    descriptor: Option<DatasetDescriptor>,
}

impl PatchFex {
    /// Create an instance from a loaded configuration
    ///
    /// The dataset descriptor is read when the configuration names one.
    pub fn new(config: ApplicationConfig) -> FexResult<Self> {
        let descriptor = match &config.application.descriptor {
            Some(path) => Some(DatasetDescriptor::read(path)?),
            None => None,
        };
        Ok(PatchFex { config, descriptor })
    }

    /// Create an instance from a configuration file
    pub fn from_config_file(path: &Path) -> FexResult<Self> {
        Self::new(ApplicationConfig::load(path)?)
    }

    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    pub fn descriptor(&self) -> Option<&DatasetDescriptor> {
        self.descriptor.as_ref()
    }

    /// Use a descriptor instead of the configured one
    pub fn set_descriptor(&mut self, descriptor: DatasetDescriptor) {
        self.descriptor = Some(descriptor);
    }

    fn feature_types(&self) -> Vec<FeatureType> {
        self.descriptor.as_ref().map(|d| d.feature_types().to_vec()).unwrap_or_default()
    }

    /// Extract patches of a source product into a target directory
    ///
    /// # Arguments
    /// * `source` - The source product
    /// * `target` - Directory receiving the product's patch archive
    /// * `parallel` - Process patch windows on the rayon thread pool
    ///
    /// # Returns
    /// The extraction result, after the writer has been closed
    pub fn extract(&self, source: Arc<dyn RasterSource>, target: &Path, parallel: bool) -> FexResult<ExtractionResult> {
        let extraction = &self.config.extraction;
        let computer = ComputerFactory::create(&extraction.computer, &extraction.params, &source.band_names())?;

        let mut pipeline = ExtractionPipeline::new(self.config.pipeline_config(target));
        pipeline.set_source(source)?;
        pipeline.set_sink(Arc::new(DefaultPatchWriterFactory))?;
        pipeline.set_computer(computer)?;
        pipeline.set_grid(self.config.grid_indexer()?);

        let result = if parallel { pipeline.run_parallel() } else { pipeline.run() };
        let disposed = pipeline.dispose();
        let result = result?;
        disposed?;
        Ok(result)
    }

    /// Extract patches of an image file
    pub fn extract_image(&self, input: &Path, target: &Path, parallel: bool) -> FexResult<ExtractionResult> {
        let source = InMemoryRaster::from_image_file(input)?;
        self.extract(Arc::new(source), target, parallel)
    }

    fn archive_root(&self, root: Option<&Path>) -> FexResult<PathBuf> {
        root.map(Path::to_path_buf)
            .or_else(|| self.config.archive.root.clone())
            .ok_or_else(|| FexError::Configuration("No archive root given or configured".to_string()))
    }

    /// Resolver over an archive root, the configured one when `root` is `None`
    pub fn resolver(&self, root: Option<&Path>) -> FexResult<ArchiveResolver> {
        let mut resolver = ArchiveResolver::new(self.archive_root(root)?)
            .with_feature_types(self.feature_types());
        if let Some(pattern) = &self.config.archive.data_access_pattern {
            resolver = resolver.with_pattern(pattern);
        }
        if self.descriptor.is_none() {
            warn!("No dataset descriptor configured, patches are read without features");
        }
        Ok(resolver)
    }

    /// Load a whole archive into the scan backend
    pub fn scan_query(&self, root: Option<&Path>) -> FexResult<ScanQuery> {
        let allowed = self.config.default_feature_set();
        ScanQuery::from_archive(&self.resolver(root)?, allowed.as_ref())
    }

    /// Build a binary index of an archive
    ///
    /// # Returns
    /// The number of indexed patches
    pub fn build_index(&self, root: Option<&Path>, out: &Path) -> FexResult<usize> {
        let descriptor = self.descriptor.as_ref()
            .ok_or_else(|| FexError::Configuration("Building an index needs a dataset descriptor".to_string()))?;
        let allowed = self.config.default_feature_set();

        let mut builder = IndexBuilder::new(descriptor, allowed.as_ref())?;
        let count = builder.add_archive(&self.resolver(root)?)?;
        builder.write(out)?;
        info!("Indexed {} patch(es) into {}", count, out.display());
        Ok(count)
    }

    /// Open a binary index
    pub fn open_index(&self, dir: &Path) -> FexResult<IndexedQuery> {
        IndexedQuery::open(dir)
    }
}
