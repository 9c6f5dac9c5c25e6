//! Command implementations for the metrics CLI
//!
//! Each subcommand lives in its own module and returns an `anyhow::Result`
//! so `main` can print the error chain.

pub mod months;
pub mod report;
pub mod shared;
pub mod snapshot;

use crate::cli::args::{Args, Commands};
use anyhow::Result;

/// Dispatch to the subcommand handler
pub fn run(args: Args) -> Result<()> {
    shared::setup_logging(&args.global);
    let config = shared::load_config(&args.global)?;

    match args.command {
        Commands::Months => months::run_months(&config),
        Commands::Report(report_args) => report::run_report(&config, &report_args),
        Commands::Snapshot(snapshot_args) => {
            snapshot::run_snapshot(&config, &snapshot_args, args.global.show_progress())
        }
        Commands::SetLatest(set_args) => months::run_set_latest(&config, &set_args),
    }
}
