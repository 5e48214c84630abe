use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;

mod aggregate;
mod error;
mod fetch;
mod form;
mod logging;
mod transform;
mod types;
mod utils;
mod venue;

use fetch::{FetchConfig, StatePolicy, FORM_URL};

/// Where `fetch` writes and `transform` reads scraped CSVs
pub const RAW_DIR: &str = "raw";
/// Where `transform` writes per-date JSON
pub const OUTPUT_DIR: &str = "docs/json/memorial";

#[derive(Parser)]
#[command(name = "mortuary-schedule")]
#[command(about = "Tainan mortuary service schedule scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the schedule form for every listed date and save each day as CSV
    Fetch {
        /// Directory for raw/{year}/{month}/{date}.csv
        #[arg(long, default_value = RAW_DIR)]
        raw_dir: PathBuf,
        /// Pause between searches, in milliseconds
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
        /// Send the hidden state from each response instead of the initial page's
        #[arg(long)]
        rotate_state: bool,
        /// Search form URL
        #[arg(long, default_value = FORM_URL)]
        url: String,
    },
    /// Classify venues in all scraped CSVs and write per-date JSON
    Transform {
        /// Directory scanned recursively for .csv files
        #[arg(long, default_value = RAW_DIR)]
        raw_dir: PathBuf,
        /// Directory for {year}/{date}.json
        #[arg(long, default_value = OUTPUT_DIR)]
        output_dir: PathBuf,
    },
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fetch {
            raw_dir,
            delay_ms,
            rotate_state,
            url,
        } => {
            let config = FetchConfig {
                raw_dir,
                delay: Duration::from_millis(delay_ms),
                policy: if rotate_state {
                    StatePolicy::Rotate
                } else {
                    StatePolicy::ReuseInitial
                },
            };
            fetch::run_fetch(&url, &config)
        }
        Commands::Transform {
            raw_dir,
            output_dir,
        } => transform::run_transform(&raw_dir, &output_dir),
    }
}

fn main() {
    logging::init_logger();

    // Failures are reported, not turned into an exit code
    if let Err(e) = run(Cli::parse()) {
        error!("{:#}", e);
    }
}
