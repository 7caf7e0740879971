//! CLI command implementations
//!
//! This module contains implementations of various commands
//! supported by the CLI application using the Command pattern.

pub mod command_traits;
pub mod extract_command;
pub mod locate_command;
pub mod sample_command;
pub mod index_command;

pub use command_traits::{Command, CommandFactory};
pub use extract_command::ExtractCommand;
pub use locate_command::LocateCommand;
pub use sample_command::SampleCommand;
pub use index_command::IndexCommand;

use std::path::Path;

use clap::ArgMatches;

use crate::config::ApplicationConfig;
use crate::errors::{FexError, FexResult};

/// Configuration named by `--config`, or the defaults
pub(crate) fn load_config(args: &ArgMatches) -> FexResult<ApplicationConfig> {
    match args.get_one::<String>("config") {
        Some(path) => ApplicationConfig::load(Path::new(path)),
        None => Ok(ApplicationConfig::default()),
    }
}

/// Factory for creating command instances based on CLI arguments
///
/// This factory examines the selected subcommand and creates
/// the appropriate command instance for execution.
pub struct PatchFexCommandFactory;

impl PatchFexCommandFactory {
    /// Create a new factory instance
    pub fn new() -> Self {
        PatchFexCommandFactory
    }
}

impl Default for PatchFexCommandFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandFactory for PatchFexCommandFactory {
    fn create_command(&self, args: &ArgMatches) -> FexResult<Box<dyn Command>> {
        match args.subcommand() {
            Some(("extract", sub)) => Ok(Box::new(ExtractCommand::new(sub)?)),
            Some(("locate", sub)) => Ok(Box::new(LocateCommand::new(sub)?)),
            Some(("sample", sub)) => Ok(Box::new(SampleCommand::new(sub)?)),
            Some(("index", sub)) => Ok(Box::new(IndexCommand::new(sub)?)),
            Some((other, _)) => Err(FexError::Configuration(format!("Unknown command: {}", other))),
            None => Err(FexError::Configuration("No command given".to_string())),
        }
    }
}
