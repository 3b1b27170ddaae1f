mod commands;
mod config;
mod detector;
mod diagnostics;
mod error;
mod hasher;
mod logging;
mod markers;
mod parser;
mod pipeline;
mod scanner;
mod store;
mod syntax;
mod types;
mod validator;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::OutputFormat;

#[derive(Parser)]
#[command(
    name = "docmark",
    version,
    about = "Marker-delimited documentation regions with hierarchical change detection"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the marker blocks parsed from one file
    Blocks {
        /// Source file to parse
        file: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Report changed blocks without updating the hash store
    Check {
        /// Files or directories (default: the whole project)
        paths: Vec<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Report changed blocks and refresh the hash store
    Scan {
        /// Files or directories (default: the whole project)
        paths: Vec<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Check marker structure only
    Validate {
        /// Files or directories (default: the whole project)
        paths: Vec<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Re-run check whenever a source file changes
    Watch {
        /// Files or directories (default: the whole project)
        paths: Vec<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("warning: {e}");
    }

    let result = match cli.command {
        Commands::Blocks { file, format } => commands::blocks(&file, format),
        Commands::Check { paths, format } => commands::check(&paths, format),
        Commands::Scan { paths, format } => commands::scan(&paths, format),
        Commands::Validate { paths, format } => commands::validate(&paths, format),
        Commands::Watch { paths, format } => watch::run(&paths, format),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(3_u8)
        },
    };
}
