//! Command interfaces of the `patchfex` binary

use clap::ArgMatches;

use crate::errors::FexResult;

/// One CLI subcommand, parsed and ready to run
pub trait Command {
    /// Run the subcommand, printing its report to stdout
    fn execute(&self) -> FexResult<()>;
}

/// Builds the command selected on the command line
pub trait CommandFactory {
    /// Create the command for the chosen subcommand
    ///
    /// # Arguments
    /// * `args` - Top-level matches, including the global options
    ///
    /// # Returns
    /// The command to execute, or a configuration error for unusable arguments
    fn create_command(&self, args: &ArgMatches) -> FexResult<Box<dyn Command>>;
}
