//! Random patch sampling command

use std::path::PathBuf;

use clap::ArgMatches;
use log::info;

use super::command_traits::Command;
use super::load_config;
use crate::api::PatchFex;
use crate::errors::{FexError, FexResult};
use crate::query::QueryInterface;

/// Command drawing random patches from an archive or an index
pub struct SampleCommand {
    root: Option<PathBuf>,
    index: Option<PathBuf>,
    count: usize,
    fex: PatchFex,
}

impl SampleCommand {
    /// Create a new sample command
    ///
    /// # Arguments
    /// * `args` - Matches of the `sample` subcommand
    pub fn new(args: &ArgMatches) -> FexResult<Self> {
        let root = args.get_one::<String>("root").map(PathBuf::from);
        let index = args.get_one::<String>("index").map(PathBuf::from);
        if root.is_none() && index.is_none() {
            return Err(FexError::Configuration("Either an archive root or --index is needed".to_string()));
        }
        let count = *args.get_one::<usize>("count")
            .ok_or_else(|| FexError::Configuration("Missing sample size".to_string()))?;

        Ok(SampleCommand { root, index, count, fex: PatchFex::new(load_config(args)?)? })
    }

    fn backend(&self) -> FexResult<Box<dyn QueryInterface>> {
        match &self.index {
            Some(dir) => Ok(Box::new(self.fex.open_index(dir)?)),
            None => Ok(Box::new(self.fex.scan_query(self.root.as_deref())?)),
        }
    }
}

impl Command for SampleCommand {
    fn execute(&self) -> FexResult<()> {
        let backend = self.backend()?;
        info!("Sampling {} of {} patch(es)", self.count, backend.count());

        for patch in backend.sample(self.count)? {
            println!("{}", patch.id());
            for line in patch.features_as_text().lines() {
                println!("  {}", line);
            }
        }
        Ok(())
    }
}
