//! Index building command

use std::path::PathBuf;

use clap::ArgMatches;

use super::command_traits::Command;
use super::load_config;
use crate::api::PatchFex;
use crate::errors::{FexError, FexResult};
use crate::model::DatasetDescriptor;

/// Command writing the binary index of an archive
pub struct IndexCommand {
    root: PathBuf,
    out: PathBuf,
    fex: PatchFex,
}

impl IndexCommand {
    /// Create a new index command
    ///
    /// # Arguments
    /// * `args` - Matches of the `index` subcommand
    pub fn new(args: &ArgMatches) -> FexResult<Self> {
        let root = args.get_one::<String>("root")
            .ok_or_else(|| FexError::Configuration("Missing archive root".to_string()))?
            .into();
        let out = args.get_one::<String>("out")
            .ok_or_else(|| FexError::Configuration("Missing output directory".to_string()))?
            .into();

        let mut fex = PatchFex::new(load_config(args)?)?;
        if let Some(descriptor) = args.get_one::<String>("descriptor") {
            fex.set_descriptor(DatasetDescriptor::read(&PathBuf::from(descriptor))?);
        }
        Ok(IndexCommand { root, out, fex })
    }
}

impl Command for IndexCommand {
    fn execute(&self) -> FexResult<()> {
        let count = self.fex.build_index(Some(&self.root), &self.out)?;
        println!("Indexed {} patch(es) into {}", count, self.out.display());
        Ok(())
    }
}
