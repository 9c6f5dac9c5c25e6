//! Month listing and the latest-month pointer

use crate::cli::args::SetLatestArgs;
use crate::config::MetricsConfig;
use crate::month::DataSubset;
use anyhow::{Context, Result};
use colored::*;
use tracing::info;

pub fn run_months(config: &MetricsConfig) -> Result<()> {
    let layout = config.layout();
    let raw = layout.available_months(DataSubset::Raw);
    let processed = layout.available_months(DataSubset::Processed);
    let latest = layout.latest_month();

    println!("{}", "Available months".bright_green().bold());
    println!("Data root: {}", layout.root().display());

    if raw.is_empty() {
        println!(
            "  {}",
            format!(
                "No raw months under {}",
                layout.subset_base(DataSubset::Raw).display()
            )
            .yellow()
        );
    }

    for month in &raw {
        let mut line = format!("  {}", month);
        if processed.contains(month) {
            line.push_str(&format!(" {}", "processed".cyan()));
        }
        if latest.as_ref() == Some(month) {
            line.push_str(&format!(" {}", "latest".bright_green()));
        }
        println!("{}", line);
    }

    match latest {
        Some(month) if !raw.contains(&month) => println!(
            "{}",
            format!("Latest month {} has no raw directory", month).yellow()
        ),
        Some(_) => {}
        None => println!("{}", "No latest month recorded".yellow()),
    }

    Ok(())
}

pub fn run_set_latest(config: &MetricsConfig, args: &SetLatestArgs) -> Result<()> {
    let layout = config.layout();

    if !layout.available_months(DataSubset::Raw).contains(&args.month) {
        println!(
            "{}",
            format!("Warning: no raw directory for {} yet", args.month).yellow()
        );
    }

    layout
        .set_latest_month(&args.month)
        .with_context(|| format!("Failed to write {}", layout.latest_month_path().display()))?;

    info!("Latest month updated");
    println!(
        "{} {}",
        "Latest month set to".bright_green().bold(),
        args.month
    );
    Ok(())
}
