use anyhow::Result;
use bankcsv::core::log::init_logging;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert a scrape result to the local currency and export CSV files
    Convert {
        /// JSON file produced by the bank scraper
        input: PathBuf,

        /// Name used for the exported files, defaults to the input file name
        #[arg(short, long)]
        scraper: Option<String>,
    },
    /// Fetch exchange rates for the given dates (YYYY-MM-DD) into the cache
    Rates {
        #[arg(required = true)]
        dates: Vec<NaiveDate>,
    },
}

impl From<Commands> for bankcsv::AppCommand {
    fn from(cmd: Commands) -> bankcsv::AppCommand {
        match cmd {
            Commands::Convert { input, scraper } => {
                bankcsv::AppCommand::Convert { input, scraper }
            }
            Commands::Rates { dates } => bankcsv::AppCommand::Rates { dates },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => bankcsv::cli::setup::setup_at_path(path),
            None => bankcsv::cli::setup::setup(),
        },
        Some(cmd) => bankcsv::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
