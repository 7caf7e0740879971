//! Archive lookup command
//!
//! Shows where a product's patches live and, for a single patch, its
//! directory, quicklooks, sub-product and feature record.

use std::path::PathBuf;

use clap::ArgMatches;

use super::command_traits::Command;
use super::load_config;
use crate::api::PatchFex;
use crate::errors::{FexError, FexResult};

/// Command for resolving archive and patch locations
pub struct LocateCommand {
    root: PathBuf,
    product: String,
    /// Patch coordinates; the whole product is listed when absent
    patch: Option<(u32, u32)>,
    fex: PatchFex,
}

impl LocateCommand {
    /// Create a new locate command
    ///
    /// # Arguments
    /// * `args` - Matches of the `locate` subcommand
    pub fn new(args: &ArgMatches) -> FexResult<Self> {
        let root = args.get_one::<String>("root")
            .ok_or_else(|| FexError::Configuration("Missing archive root".to_string()))?
            .into();
        let product = args.get_one::<String>("product")
            .ok_or_else(|| FexError::Configuration("Missing product name".to_string()))?
            .clone();

        let patch = match (args.get_one::<u32>("x"), args.get_one::<u32>("y")) {
            (Some(x), Some(y)) => Some((*x, *y)),
            (None, None) => None,
            _ => return Err(FexError::Configuration("Both --x and --y are needed to locate a patch".to_string())),
        };

        let mut config = load_config(args)?;
        if let Some(pattern) = args.get_one::<String>("pattern") {
            config.archive.data_access_pattern = Some(pattern.clone());
        }

        Ok(LocateCommand { root, product, patch, fex: PatchFex::new(config)? })
    }
}

impl Command for LocateCommand {
    fn execute(&self) -> FexResult<()> {
        let resolver = self.fex.resolver(Some(&self.root))?;
        let archive = resolver.locate_archive(&self.product)?;
        println!("Archive: {}", archive);

        match self.patch {
            None => {
                let patches = resolver.list_patches(&self.product)?;
                println!("Patches: {}", patches.len());
                for (x, y) in patches {
                    println!("  x{:03}y{:03}", x, y);
                }
            }
            Some((x, y)) => {
                println!("Patch: {}", resolver.locate_patch(&self.product, x, y)?);
                for name in resolver.list_quicklooks(&self.product, x, y)? {
                    println!("Quicklook: {}", resolver.resolve_image_path(&self.product, x, y, Some(&name))?);
                }
                if let Some(product) = resolver.patch_product_path(&self.product, x, y)? {
                    println!("Sub-product: {}", product);
                }
                println!("Features:");
                print!("{}", resolver.read_feature_text(&self.product, x, y)?);
            }
        }
        Ok(())
    }
}
