//! Extraction pipeline
//!
//! Cuts a source product into patch windows, runs a feature computer on each
//! window and routes kept patches to a patch writer. The writer is the only
//! shared mutable state; it sits behind a mutex so windows can be processed
//! in parallel.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use rayon::prelude::*;

use super::feature_computer::{ComputeContext, FeatureComputer, PatchVerdict, SizePolicy, SkipReason};
use super::raster::RasterSource;
use super::region::Region;
use crate::coordinate::GridIndexer;
use crate::errors::{FexError, FexResult};
use crate::model::{Feature, FeatureType, FeatureValue, Patch, ValueType};
use crate::output::{PatchWriter, PatchWriterFactory, WriterConfig};
use crate::utils::progress::ProgressTracker;
use crate::utils::string_utils::parse_properties;

/// Name of the sub-product feature added when product output is enabled
pub const PATCH_PRODUCT_FEATURE: &str = "patch";

/// Extraction settings
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Nominal patch width in pixels
    pub patch_width: u32,
    /// Nominal patch height in pixels
    pub patch_height: u32,
    pub overwrite_mode: bool,
    pub skip_feature_output: bool,
    pub skip_product_output: bool,
    pub skip_quicklook_output: bool,
    /// Minimum fraction of relevant pixels a computer may require
    pub min_valid_pixels: f64,
    /// Directory receiving the product containers
    pub target_path: PathBuf,
    pub zip_all_output: bool,
    /// Free-form writer properties as `key = value` text
    pub writer_extra: String,
    pub show_progress: bool,
}

impl PipelineConfig {
    /// Default settings for the given patch size
    pub fn new(patch_width: u32, patch_height: u32) -> Self {
        PipelineConfig {
            patch_width,
            patch_height,
            overwrite_mode: false,
            skip_feature_output: false,
            skip_product_output: false,
            skip_quicklook_output: false,
            min_valid_pixels: 0.1,
            target_path: PathBuf::from("."),
            zip_all_output: false,
            writer_extra: String::new(),
            show_progress: false,
        }
    }

    /// Whether every kind of output is disabled
    pub fn all_output_skipped(&self) -> bool {
        self.skip_feature_output && self.skip_product_output && self.skip_quicklook_output
    }

    /// Writer settings derived from this config
    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            target_path: self.target_path.clone(),
            overwrite_mode: self.overwrite_mode,
            skip_feature_output: self.skip_feature_output,
            skip_product_output: self.skip_product_output,
            skip_quicklook_output: self.skip_quicklook_output,
            zip_all_output: self.zip_all_output,
            extra: parse_properties(&self.writer_extra),
        }
    }

    fn validate(&self) -> FexResult<()> {
        if self.patch_width == 0 || self.patch_height == 0 {
            return Err(FexError::Configuration(format!(
                "Patch size must be positive, got {}x{}", self.patch_width, self.patch_height)));
        }
        if !(0.0..=1.0).contains(&self.min_valid_pixels) {
            return Err(FexError::Configuration(format!(
                "Minimum valid pixel fraction must be within [0, 1], got {}", self.min_valid_pixels)));
        }
        Ok(())
    }
}

/// Features record of one written patch
#[derive(Debug, Clone, PartialEq)]
pub struct PatchResult {
    pub x: u32,
    pub y: u32,
    /// The patch's `features.txt` record
    pub features_text: String,
}

/// A window that produced no output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkippedPatch {
    pub x: u32,
    pub y: u32,
    pub reason: SkipReason,
}

/// Outcome of an extraction run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub product_name: String,
    /// Number of windows the product was cut into
    pub window_count: usize,
    /// Written patches in window order
    pub patch_results: Vec<PatchResult>,
    /// Skipped windows in window order
    pub skipped: Vec<SkippedPatch>,
}

enum WindowOutcome {
    Written(PatchResult),
    Skipped(SkippedPatch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Initialized,
    Disposed,
}

/// Drives feature computation over a whole source product
pub struct ExtractionPipeline {
    config: PipelineConfig,
    source: Option<Arc<dyn RasterSource>>,
    writer_factory: Option<Arc<dyn PatchWriterFactory>>,
    computer: Option<Box<dyn FeatureComputer>>,
    grid: Option<GridIndexer>,
    feature_types: Vec<FeatureType>,
    writer: Option<Mutex<Box<dyn PatchWriter>>>,
    state: State,
    cancelled: Arc<AtomicBool>,
}

impl ExtractionPipeline {
    /// Create a pipeline with the given settings
    pub fn new(config: PipelineConfig) -> Self {
        ExtractionPipeline {
            config,
            source: None,
            writer_factory: None,
            computer: None,
            grid: None,
            feature_types: Vec::new(),
            writer: None,
            state: State::Created,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the settings; only allowed before initialization
    pub fn configure(&mut self, config: PipelineConfig) -> FexResult<()> {
        self.ensure_created("configure")?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Set the source product
    pub fn set_source(&mut self, source: Arc<dyn RasterSource>) -> FexResult<()> {
        self.ensure_created("set the source of")?;
        self.source = Some(source);
        Ok(())
    }

    /// Set the factory creating the product's writer
    pub fn set_sink(&mut self, factory: Arc<dyn PatchWriterFactory>) -> FexResult<()> {
        self.ensure_created("set the sink of")?;
        self.writer_factory = Some(factory);
        Ok(())
    }

    /// Set the feature computer
    pub fn set_computer(&mut self, computer: Box<dyn FeatureComputer>) -> FexResult<()> {
        self.ensure_created("set the computer of")?;
        self.computer = Some(computer);
        Ok(())
    }

    /// Assign global grid cells to patches of georeferenced products
    pub fn set_grid(&mut self, grid: GridIndexer) {
        self.grid = Some(grid);
    }

    /// Shared flag that stops the run before the next patch
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Feature types handed to the writer
    pub fn feature_types(&self) -> &[FeatureType] {
        &self.feature_types
    }

    fn ensure_created(&self, action: &str) -> FexResult<()> {
        if self.state != State::Created {
            return Err(FexError::Configuration(format!(
                "Cannot {} a pipeline after initialization", action)));
        }
        Ok(())
    }

    /// Validate the setup and open the writer
    ///
    /// Fails with a configuration error when the settings are invalid, a
    /// collaborator is missing or the source lacks a band the computer needs.
    pub fn initialize(&mut self) -> FexResult<()> {
        match self.state {
            State::Initialized => return Ok(()),
            State::Disposed => return Err(FexError::Configuration(
                "Pipeline has already been disposed".to_string())),
            State::Created => {}
        }

        self.config.validate()?;
        let source = self.source.clone()
            .ok_or_else(|| FexError::Configuration("No source product set".to_string()))?;
        let factory = self.writer_factory.clone()
            .ok_or_else(|| FexError::Configuration("No patch sink set".to_string()))?;
        let computer = self.computer.as_ref()
            .ok_or_else(|| FexError::Configuration("No feature computer set".to_string()))?;

        for band in computer.required_bands() {
            if !source.has_band(&band) {
                return Err(FexError::Configuration(format!(
                    "Band '{}' required by '{}' not found in product '{}'",
                    band, computer.name(), source.name())));
            }
        }

        if self.config.overwrite_mode {
            warn!("Overwrite mode is on: existing output in {} may be replaced",
                  self.config.target_path.display());
        }
        if self.config.skip_feature_output {
            warn!("Feature output skipped");
        }
        if self.config.skip_product_output {
            warn!("Product output skipped");
        }
        if self.config.skip_quicklook_output {
            warn!("Quicklook output skipped");
        }

        let mut feature_types = Vec::new();
        if !self.config.skip_product_output {
            feature_types.push(FeatureType::new(PATCH_PRODUCT_FEATURE, "Patch product", ValueType::SubProduct));
        }
        feature_types.extend(computer.feature_types());

        let writer_config = self.config.writer_config();
        let mut writer = factory.create_writer(&writer_config, source.name())?;
        writer.initialize(&writer_config, source.as_ref(), &feature_types)?;

        self.feature_types = feature_types;
        self.writer = Some(Mutex::new(writer));
        self.state = State::Initialized;
        debug!("Pipeline initialized for '{}'", source.name());
        Ok(())
    }

    /// Process every patch window sequentially
    pub fn run(&mut self) -> FexResult<ExtractionResult> {
        self.run_with(false)
    }

    /// Process patch windows on the rayon thread pool
    ///
    /// Writes are serialized through the writer's mutex; results are
    /// reported in window order.
    pub fn run_parallel(&mut self) -> FexResult<ExtractionResult> {
        self.run_with(true)
    }

    fn run_with(&mut self, parallel: bool) -> FexResult<ExtractionResult> {
        self.initialize()?;
        let source = self.source.clone()
            .ok_or_else(|| FexError::Configuration("No source product set".to_string()))?;

        let windows = Region::tile(source.width(), source.height(),
                                   self.config.patch_width, self.config.patch_height);
        info!("Extracting patches from '{}' ({}x{}), patch size {}x{}, {} window(s)",
              source.name(), source.width(), source.height(),
              self.config.patch_width, self.config.patch_height, windows.len());

        let progress = if self.config.show_progress {
            ProgressTracker::new(windows.len() as u64, source.name())
        } else {
            ProgressTracker::hidden()
        };

        let this = &*self;
        let process = |((x, y), region): &((u32, u32), Region)| {
            let outcome = this.process_window(source.as_ref(), *x, *y, *region);
            progress.increment(1);
            outcome
        };

        let outcomes: Vec<FexResult<WindowOutcome>> = if parallel {
            windows.par_iter().map(process).collect()
        } else {
            let mut outcomes = Vec::with_capacity(windows.len());
            for window in &windows {
                let outcome = process(window);
                let failed = outcome.is_err();
                outcomes.push(outcome);
                if failed {
                    break;
                }
            }
            outcomes
        };

        let mut result = ExtractionResult {
            product_name: source.name().to_string(),
            window_count: windows.len(),
            ..ExtractionResult::default()
        };
        for outcome in outcomes {
            match outcome? {
                WindowOutcome::Written(r) => result.patch_results.push(r),
                WindowOutcome::Skipped(s) => result.skipped.push(s),
            }
        }

        progress.finish(result.patch_results.len());
        info!("Wrote {} patch(es) of '{}', skipped {}",
              result.patch_results.len(), result.product_name, result.skipped.len());
        Ok(result)
    }

    fn process_window(&self, source: &dyn RasterSource, x: u32, y: u32, region: Region) -> FexResult<WindowOutcome> {
        let skip = |reason: SkipReason| {
            debug!("Skipping patch x{:03}y{:03}: {}", x, y, reason);
            Ok(WindowOutcome::Skipped(SkippedPatch { x, y, reason }))
        };

        if self.cancelled.load(Ordering::Relaxed) {
            return skip(SkipReason::Cancelled);
        }
        if self.config.all_output_skipped() {
            return skip(SkipReason::AllOutputSkipped);
        }

        let computer = self.computer.as_ref()
            .ok_or_else(|| FexError::Configuration("No feature computer set".to_string()))?;

        let mut patch = Patch::new(source.name(), x, y, region);
        if let (Some(grid), Some(transform)) = (&self.grid, source.geo_transform()) {
            patch.grid_cell = Some(grid.cell_for_region(&region, &transform));
        }

        if let Some(reason) = self.check_size(computer.as_ref(), source, &patch)? {
            return skip(reason);
        }

        let ctx = ComputeContext { source, config: &self.config };
        let computed = match computer.compute_features(&patch, &ctx)? {
            PatchVerdict::Keep(features) => features,
            PatchVerdict::Skip(reason) => return skip(reason),
        };

        let mut features = Vec::with_capacity(computed.len() + 1);
        if !self.config.skip_product_output {
            let product = Arc::new(source.subset(region)?.with_name(&patch.patch_name()));
            patch.set_product(Arc::clone(&product));
            let product_type = self.feature_types.iter()
                .find(|t| t.name == PATCH_PRODUCT_FEATURE)
                .cloned()
                .unwrap_or_else(|| FeatureType::new(PATCH_PRODUCT_FEATURE, "Patch product", ValueType::SubProduct));
            features.push(Feature::new(product_type, FeatureValue::SubProduct(product))?);
        }
        features.extend(computed.into_iter().filter(|f| self.wants(f)));

        if features.is_empty() {
            return skip(SkipReason::AllOutputSkipped);
        }

        patch.set_features(features);
        let features_text = patch.features_as_text();
        {
            let writer = self.writer.as_ref()
                .ok_or_else(|| FexError::Configuration("Pipeline is not initialized".to_string()))?;
            let mut writer = writer.lock()
                .map_err(|_| FexError::GenericError("Patch writer lock poisoned".to_string()))?;
            writer.write_patch(&patch, patch.features())?;
        }
        patch.dispose_product();

        Ok(WindowOutcome::Written(PatchResult { x, y, features_text }))
    }

    fn wants(&self, feature: &Feature) -> bool {
        match feature.feature_type().value_type {
            ValueType::Image => !self.config.skip_quicklook_output,
            ValueType::SubProduct => !self.config.skip_product_output,
            ValueType::Text | ValueType::Number | ValueType::StatisticsGroup => !self.config.skip_feature_output,
        }
    }

    fn check_size(&self, computer: &dyn FeatureComputer, source: &dyn RasterSource,
                  patch: &Patch) -> FexResult<Option<SkipReason>> {
        let region = patch.region();
        match computer.size_policy() {
            SizePolicy::Any => Ok(None),
            SizePolicy::MinAreaRatio(min_ratio) => {
                let nominal = self.config.patch_width as f64 * self.config.patch_height as f64;
                let ratio = region.area() as f64 / nominal;
                if ratio < min_ratio {
                    warn!("Patch {} too small: {}x{} is {:.2} of the nominal {}x{}",
                          patch.patch_name(), region.width, region.height, ratio,
                          self.config.patch_width, self.config.patch_height);
                    return Ok(Some(SkipReason::TooSmall));
                }
                Ok(None)
            }
            SizePolicy::MinValidFraction(min_fraction) => {
                let band = match computer.required_bands().into_iter().next() {
                    Some(band) => band,
                    None => return Ok(None),
                };
                let tile = source.read_tile(&band, region)?;
                let fraction = tile.valid_count() as f64 / region.area().max(1) as f64;
                if fraction < min_fraction {
                    return Ok(Some(SkipReason::TooFewValidPixels));
                }
                Ok(None)
            }
        }
    }

    /// Close the writer and release the pipeline
    ///
    /// The writer is closed exactly once, whether or not any patch was
    /// written. Further calls do nothing.
    pub fn dispose(&mut self) -> FexResult<()> {
        if self.state == State::Disposed {
            return Ok(());
        }
        self.state = State::Disposed;

        match self.writer.take() {
            Some(writer) => {
                let mut writer = writer.into_inner()
                    .map_err(|_| FexError::GenericError("Patch writer lock poisoned".to_string()))?;
                writer.close().map_err(|e| {
                    error!("Failed to close patch writer: {}", e);
                    e
                })
            }
            None => Ok(()),
        }
    }
}

impl Drop for ExtractionPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            error!("Error while disposing extraction pipeline: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{BandStatsComputer, InMemoryRaster, ThresholdRegionsComputer};
    use crate::model::FeatureType;
    use crate::output::PatchSink;

    #[derive(Default)]
    struct Calls {
        initialized: usize,
        written: Vec<(u32, u32, u32, u32, usize)>,
        closed: usize,
    }

    struct RecordingWriter {
        calls: Arc<Mutex<Calls>>,
    }

    impl PatchSink for RecordingWriter {
        fn write_patch(&mut self, patch: &Patch, features: &[Feature]) -> FexResult<()> {
            let calls = &mut *self.calls.lock().unwrap();
            assert_eq!(calls.initialized, 1);
            assert_eq!(calls.closed, 0);
            let r = patch.region();
            calls.written.push((patch.patch_x(), patch.patch_y(), r.width, r.height, features.len()));
            Ok(())
        }
    }

    impl PatchWriter for RecordingWriter {
        fn initialize(&mut self, _: &WriterConfig, _: &dyn RasterSource, _: &[FeatureType]) -> FexResult<()> {
            self.calls.lock().unwrap().initialized += 1;
            Ok(())
        }

        fn close(&mut self) -> FexResult<()> {
            let calls = &mut *self.calls.lock().unwrap();
            assert_eq!(calls.initialized, 1);
            calls.closed += 1;
            Ok(())
        }
    }

    struct RecordingFactory {
        calls: Arc<Mutex<Calls>>,
    }

    impl PatchWriterFactory for RecordingFactory {
        fn create_writer(&self, _: &WriterConfig, _: &str) -> FexResult<Box<dyn PatchWriter>> {
            Ok(Box::new(RecordingWriter { calls: Arc::clone(&self.calls) }))
        }
    }

    fn raster(width: u32, height: u32) -> Arc<InMemoryRaster> {
        let mut raster = InMemoryRaster::new("product", width, height);
        let data = (0..width * height).map(|v| (v % 7) as f64).collect();
        raster.add_band("b1", data).unwrap();
        Arc::new(raster)
    }

    fn pipeline(source: Arc<InMemoryRaster>, config: PipelineConfig,
                computer: Box<dyn FeatureComputer>) -> (ExtractionPipeline, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut pipeline = ExtractionPipeline::new(config);
        pipeline.set_source(source).unwrap();
        pipeline.set_sink(Arc::new(RecordingFactory { calls: Arc::clone(&calls) })).unwrap();
        pipeline.set_computer(computer).unwrap();
        (pipeline, calls)
    }

    fn stats() -> Box<dyn FeatureComputer> {
        Box::new(BandStatsComputer::new(vec!["b1".to_string()], false, None))
    }

    #[test]
    fn ragged_windows_are_kept() {
        let (mut p, calls) = pipeline(raster(256, 260), PipelineConfig::new(100, 100), stats());
        let result = p.run().unwrap();
        p.dispose().unwrap();

        assert_eq!(result.window_count, 9);
        assert_eq!(result.patch_results.len(), 9);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.written[0], (0, 0, 100, 100, 2));
        assert_eq!(calls.written[2], (2, 0, 56, 100, 2));
        assert_eq!(calls.written[6], (0, 2, 100, 60, 2));
        assert_eq!(calls.written[8], (2, 2, 56, 60, 2));
        assert_eq!(calls.closed, 1);
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let (mut seq, _) = pipeline(raster(256, 260), PipelineConfig::new(100, 100), stats());
        let (mut par, calls) = pipeline(raster(256, 260), PipelineConfig::new(100, 100), stats());
        let a = seq.run().unwrap();
        let b = par.run_parallel().unwrap();
        assert_eq!(a.patch_results, b.patch_results);
        drop(par);
        assert_eq!(calls.lock().unwrap().closed, 1);
    }

    #[test]
    fn close_happens_once_with_zero_patches() {
        let mut config = PipelineConfig::new(10, 10);
        config.skip_feature_output = true;
        config.skip_product_output = true;
        config.skip_quicklook_output = true;
        let (mut p, calls) = pipeline(raster(20, 20), config, stats());
        let result = p.run().unwrap();
        assert!(result.patch_results.is_empty());
        assert!(result.skipped.iter().all(|s| s.reason == SkipReason::AllOutputSkipped));

        p.dispose().unwrap();
        p.dispose().unwrap();
        drop(p);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.initialized, 1);
        assert_eq!(calls.closed, 1);
    }

    #[test]
    fn dispose_without_initialize_never_closes() {
        let (mut p, calls) = pipeline(raster(20, 20), PipelineConfig::new(10, 10), stats());
        p.dispose().unwrap();
        assert_eq!(calls.lock().unwrap().closed, 0);
        assert!(p.run().is_err());
    }

    #[test]
    fn missing_band_is_fatal() {
        let computer = Box::new(ThresholdRegionsComputer::new("flood", 1.0));
        let (mut p, calls) = pipeline(raster(20, 20), PipelineConfig::new(10, 10), computer);
        let err = p.run().unwrap_err();
        assert!(matches!(err, FexError::Configuration(_)));
        assert!(err.to_string().contains("flood"));
        assert_eq!(calls.lock().unwrap().initialized, 0);
    }

    #[test]
    fn small_border_patches_follow_size_policy() {
        let computer = Box::new(BandStatsComputer::new(
            vec!["b1".to_string()], false, Some(SizePolicy::MinAreaRatio(0.6))));
        let (mut p, _) = pipeline(raster(150, 100), PipelineConfig::new(100, 100), computer);
        let result = p.run().unwrap();
        assert_eq!(result.patch_results.len(), 1);
        assert_eq!(result.skipped, vec![SkippedPatch { x: 1, y: 0, reason: SkipReason::TooSmall }]);
    }

    #[test]
    fn skip_flags_filter_features() {
        let mut config = PipelineConfig::new(10, 10);
        config.skip_product_output = true;
        config.skip_feature_output = true;
        let computer = Box::new(BandStatsComputer::new(vec!["b1".to_string()], true, None));
        let (mut p, calls) = pipeline(raster(10, 10), config, computer);
        let result = p.run().unwrap();
        assert_eq!(result.patch_results[0].features_text, "");
        assert_eq!(calls.lock().unwrap().written[0].4, 1);
        assert!(p.feature_types().iter().all(|t| t.name != PATCH_PRODUCT_FEATURE));
    }

    #[test]
    fn cancellation_skips_remaining_patches() {
        let (mut p, calls) = pipeline(raster(30, 30), PipelineConfig::new(10, 10), stats());
        p.cancel_handle().store(true, Ordering::Relaxed);
        let result = p.run().unwrap();
        assert_eq!(result.skipped.len(), 9);
        assert!(result.skipped.iter().all(|s| s.reason == SkipReason::Cancelled));
        p.dispose().unwrap();
        assert_eq!(calls.lock().unwrap().closed, 1);
    }

    #[test]
    fn invalid_settings_fail_fast() {
        let (mut p, _) = pipeline(raster(10, 10), PipelineConfig::new(0, 10), stats());
        assert!(matches!(p.initialize(), Err(FexError::Configuration(_))));
    }
}
