//! Patch extraction command
//!
//! Cuts an input image into patches, computes features for each and writes
//! the product's patch archive into a target directory.

use std::path::PathBuf;

use clap::ArgMatches;
use log::info;

use super::command_traits::Command;
use super::load_config;
use crate::api::PatchFex;
use crate::errors::{FexError, FexResult};

/// Command for extracting the patches of one product
pub struct ExtractCommand {
    /// Path to the input image
    input: PathBuf,
    /// Directory receiving the patch archive
    target: PathBuf,
    /// Use the rayon thread pool
    parallel: bool,
    fex: PatchFex,
}

fn parse_arg<T: std::str::FromStr>(args: &ArgMatches, name: &str) -> FexResult<Option<T>> {
    match args.get_one::<String>(name) {
        Some(raw) => raw.parse::<T>()
            .map(Some)
            .map_err(|_| FexError::Configuration(format!("Invalid value for --{}: '{}'", name, raw))),
        None => Ok(None),
    }
}

impl ExtractCommand {
    /// Create a new extract command
    ///
    /// # Arguments
    /// * `args` - Matches of the `extract` subcommand
    ///
    /// # Returns
    /// A new ExtractCommand instance or an error
    pub fn new(args: &ArgMatches) -> FexResult<Self> {
        let input: PathBuf = args.get_one::<String>("input")
            .ok_or_else(|| FexError::Configuration("Missing input file".to_string()))?
            .into();
        let target: PathBuf = args.get_one::<String>("target")
            .ok_or_else(|| FexError::Configuration("Missing target directory".to_string()))?
            .into();
        info!("Input: {}, target: {}", input.display(), target.display());

        let mut config = load_config(args)?;
        let extraction = &mut config.extraction;
        if let Some(width) = parse_arg(args, "patch-width")? {
            extraction.patch_width = width;
        }
        if let Some(height) = parse_arg(args, "patch-height")? {
            extraction.patch_height = height;
        }
        if let Some(threshold) = parse_arg(args, "threshold")? {
            extraction.params.threshold = threshold;
        }
        if let Some(computer) = args.get_one::<String>("computer") {
            extraction.computer = computer.clone();
        }
        if let Some(bands) = args.get_many::<String>("band") {
            extraction.params.bands = bands.cloned().collect();
        }
        if args.get_flag("zip") {
            extraction.zip_output = true;
        }
        if args.get_flag("overwrite") {
            extraction.overwrite = true;
        }

        Ok(ExtractCommand {
            input,
            target,
            parallel: args.get_flag("parallel"),
            fex: PatchFex::new(config)?,
        })
    }
}

impl Command for ExtractCommand {
    fn execute(&self) -> FexResult<()> {
        let result = self.fex.extract_image(&self.input, &self.target, self.parallel)?;

        println!("Product: {}", result.product_name);
        println!("Windows: {}", result.window_count);
        println!("Patches written: {}", result.patch_results.len());
        println!("Patches skipped: {}", result.skipped.len());
        for skipped in &result.skipped {
            println!("  x{:03}y{:03}: {}", skipped.x, skipped.y, skipped.reason);
        }
        Ok(())
    }
}
