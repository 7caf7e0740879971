use clap::{value_parser, Arg, ArgAction, Command as ClapCommand};
use log::{error, Level, LevelFilter};
use std::path::Path;
use std::process;

use patchfex::commands::{CommandFactory, PatchFexCommandFactory};
use patchfex::utils::logger::Logger;

fn cli() -> ClapCommand {
    ClapCommand::new("patchfex")
        .version("0.1.0")
        .about("Extract patch features from raster products and query patch archives")
        .subcommand_required(true)
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Write log output to this file")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Application configuration file (TOML)")
                .value_name("FILE")
                .global(true),
        )
        .subcommand(
            ClapCommand::new("extract")
                .about("Cut an image into patches and write their features")
                .arg(Arg::new("input").help("Input image file").required(true).index(1))
                .arg(
                    Arg::new("target")
                        .short('t')
                        .long("target")
                        .help("Directory receiving the patch archive")
                        .value_name("DIR")
                        .required(true),
                )
                .arg(Arg::new("patch-width").long("patch-width").help("Patch width in pixels").value_name("PX"))
                .arg(Arg::new("patch-height").long("patch-height").help("Patch height in pixels").value_name("PX"))
                .arg(
                    Arg::new("computer")
                        .long("computer")
                        .help("Feature computer (band-stats, threshold-regions)")
                        .value_name("NAME"),
                )
                .arg(
                    Arg::new("band")
                        .long("band")
                        .help("Band to process; may be repeated")
                        .value_name("BAND")
                        .action(ArgAction::Append),
                )
                .arg(Arg::new("threshold").long("threshold").help("Region growing threshold").value_name("VALUE"))
                .arg(
                    Arg::new("zip")
                        .long("zip")
                        .help("Write a <product>.fex.zip archive")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("overwrite")
                        .long("overwrite")
                        .help("Write into a non-empty target, creating it if missing")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("parallel")
                        .long("parallel")
                        .help("Process patches on all cores")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            ClapCommand::new("locate")
                .about("Resolve a product archive or one of its patches")
                .arg(Arg::new("root").help("Archive root directory").required(true).index(1))
                .arg(Arg::new("product").help("Product name").required(true).index(2))
                .arg(Arg::new("x").long("x").help("Patch column").value_parser(value_parser!(u32)))
                .arg(Arg::new("y").long("y").help("Patch row").value_parser(value_parser!(u32)))
                .arg(
                    Arg::new("pattern")
                        .long("pattern")
                        .help("Data access pattern, e.g. /data/${yyyy}/${MM}/${dd}/${name}")
                        .value_name("PATTERN"),
                ),
        )
        .subcommand(
            ClapCommand::new("sample")
                .about("Draw random patches from an archive or index")
                .arg(Arg::new("root").help("Archive root directory").index(1))
                .arg(
                    Arg::new("count")
                        .short('n')
                        .long("count")
                        .help("Number of patches")
                        .value_parser(value_parser!(usize))
                        .default_value("10"),
                )
                .arg(Arg::new("index").long("index").help("Binary index directory").value_name("DIR")),
        )
        .subcommand(
            ClapCommand::new("index")
                .about("Build a binary index of an archive")
                .arg(Arg::new("root").help("Archive root directory").required(true).index(1))
                .arg(
                    Arg::new("descriptor")
                        .long("descriptor")
                        .help("Dataset descriptor file")
                        .value_name("FILE"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .help("Index output directory")
                        .value_name("DIR")
                        .required(true),
                ),
        )
}

fn main() {
    let matches = cli().get_matches();

    let verbose = matches.get_flag("verbose");
    match matches.get_one::<String>("log-file") {
        Some(log_file) => {
            let level = if verbose { Level::Debug } else { Level::Info };
            if let Err(e) = Logger::init_global_logger(Path::new(log_file), level) {
                eprintln!("Error setting up global logger: {}", e);
                process::exit(1);
            }
        }
        None => Logger::init_console_logger(if verbose { LevelFilter::Debug } else { LevelFilter::Info }),
    }

    let factory = PatchFexCommandFactory::new();

    let command_result = factory.create_command(&matches);
    match command_result {
        Ok(command) => {
            if let Err(e) = command.execute() {
                error!("Command execution error: {}", e);
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to create command: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
}
