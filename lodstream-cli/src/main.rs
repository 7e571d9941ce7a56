//! LodStream CLI - Command-line interface
//!
//! Runs simulated viewer sessions, probes device capability and inspects
//! catalogs and configuration for the `lodstream` library.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use console::style;

use commands::catalog::CatalogAction;
use commands::config::ConfigCommands;
use commands::probe::ProbeArgs;
use commands::simulate::SimulateArgs;
use error::CliError;

/// Adaptive LOD streaming tools
#[derive(Debug, Parser)]
#[command(name = "lodstream", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or update the configuration file
    Init {
        /// Overwrite existing settings with defaults
        #[arg(long)]
        reset: bool,
    },

    /// View and modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Classify a device from capability signals
    Probe(ProbeArgs),

    /// Validate or inspect a catalog manifest
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Run a simulated viewer session against a catalog
    Simulate(SimulateArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { reset } => commands::init::run(reset),
        Commands::Config { command } => commands::config::run(command),
        Commands::Probe(args) => commands::probe::run(args),
        Commands::Catalog { action } => commands::catalog::run(action),
        Commands::Simulate(args) => commands::simulate::run(args),
    };

    if let Err(e) = result {
        exit_with(e);
    }
}

fn exit_with(e: CliError) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), e);
    std::process::exit(e.exit_code());
}
