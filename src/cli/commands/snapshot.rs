//! Snapshot command: write a month's reports into data/processed/<month>/

use crate::cli::args::SnapshotArgs;
use crate::config::MetricsConfig;
use crate::report::{ReportBuilder, ReportKind, write_snapshot};
use anyhow::{Context, Result};
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of one snapshot run
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub written: Vec<(ReportKind, PathBuf)>,
    pub failed: Vec<(ReportKind, String)>,
}

pub fn run_snapshot(config: &MetricsConfig, args: &SnapshotArgs, show_progress: bool) -> Result<()> {
    let start_time = Instant::now();
    let layout = config.layout();
    let builder = ReportBuilder::new(&layout, config);
    let kinds = args.get_kinds();
    let first = kinds.first().copied().unwrap_or(ReportKind::Blog);

    let resolution = builder
        .resolve(first, args.month.as_deref())
        .context("Failed to resolve snapshot month")?;
    let month = resolution.month;

    layout
        .ensure_month_directories(&month)
        .with_context(|| format!("Failed to create output directories for {}", month))?;

    info!("Writing {} reports for {}", kinds.len(), month);

    let pb = if show_progress {
        let pb = ProgressBar::new(kinds.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut stats = SnapshotStats::default();
    for &kind in &kinds {
        if let Some(pb) = &pb {
            pb.set_message(kind.to_string());
        }

        let outcome = builder
            .envelope(kind, &resolution)
            .and_then(|envelope| write_snapshot(&layout, &envelope));

        match outcome {
            Ok(path) => stats.written.push((kind, path)),
            Err(e) => {
                warn!("Skipping {} report: {}", kind, e);
                stats.failed.push((kind, e.to_string()));
            }
        }

        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }

    if let Some(pb) = &pb {
        pb.finish_with_message(format!("Snapshot for {} complete", month));
    }

    print_summary(&stats, start_time);

    // Any missing export is a hard failure; the latest month stays untouched
    if !stats.failed.is_empty() {
        anyhow::bail!(
            "{} of {} reports failed for {}",
            stats.failed.len(),
            kinds.len(),
            month
        );
    }

    if args.set_latest {
        layout
            .set_latest_month(&month)
            .context("Failed to update the latest month")?;
        println!("{} {}", "Latest month set to".bright_green().bold(), month);
    }

    Ok(())
}

fn print_summary(stats: &SnapshotStats, start_time: Instant) {
    println!();
    println!("{}", "Snapshot summary".bright_green().bold());

    for (kind, path) in &stats.written {
        println!("  {} {:<14} {}", "✓".green(), kind.to_string(), path.display());
    }
    for (kind, reason) in &stats.failed {
        eprintln!("  {} {:<14} {}", "✗".red(), kind.to_string(), reason.dimmed());
    }

    println!(
        "{} written, {} failed in {}",
        stats.written.len().to_string().bright_green(),
        if stats.failed.is_empty() {
            "0".normal()
        } else {
            stats.failed.len().to_string().red()
        },
        HumanDuration(start_time.elapsed())
    );
}
