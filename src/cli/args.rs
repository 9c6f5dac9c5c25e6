//! Command-line argument definitions for the metrics CLI

use crate::error::{MetricsError, Result};
use crate::models::Month;
use crate::report::ReportKind;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Monthly marketing metrics for the Asterasys dashboard
///
/// Reads the month's raw CSV exports, aggregates them per product and
/// prints or persists the dashboard reports as JSON.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "asterasys-metrics",
    version,
    about = "Aggregate monthly marketing CSV exports into dashboard reports"
)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand
#[derive(Debug, Clone, ClapArgs)]
pub struct GlobalArgs {
    /// Project root holding data/ and config/
    #[arg(long = "data-root", value_name = "PATH", global = true)]
    pub data_root: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose",
        help = "Suppress output except errors"
    )]
    pub quiet: bool,
}

impl GlobalArgs {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List available months and the latest month
    Months,
    /// Build one report and print or write its envelope
    Report(ReportArgs),
    /// Write reports into data/processed/<month>/
    Snapshot(SnapshotArgs),
    /// Persist the default month
    SetLatest(SetLatestArgs),
}

#[derive(Debug, Clone, ClapArgs)]
pub struct ReportArgs {
    /// Report to build (blog, cafe, news, youtube, sales, traffic, organic-viral, kpis, channels)
    #[arg(value_name = "KIND", value_parser = ReportKind::from_str)]
    pub kind: ReportKind,

    /// Month to report on; defaults to the latest month
    #[arg(short = 'm', long = "month", value_name = "YYYY-MM")]
    pub month: Option<String>,

    /// Write the envelope to a file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pretty-print JSON
    #[arg(long = "pretty")]
    pub pretty: bool,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct SnapshotArgs {
    /// Month to snapshot; defaults to the latest month
    #[arg(short = 'm', long = "month", value_name = "YYYY-MM")]
    pub month: Option<String>,

    /// Comma-separated reports to write; all when omitted
    #[arg(short = 'k', long = "kinds", value_name = "LIST")]
    pub kinds: Option<ReportList>,

    /// Record the snapshot month as the latest month
    #[arg(long = "set-latest")]
    pub set_latest: bool,
}

impl SnapshotArgs {
    pub fn get_kinds(&self) -> Vec<ReportKind> {
        match &self.kinds {
            Some(list) => list.0.clone(),
            None => ReportKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, ClapArgs)]
pub struct SetLatestArgs {
    #[arg(value_name = "YYYY-MM", value_parser = Month::from_str)]
    pub month: Month,
}

/// Comma-separated report kinds
#[derive(Debug, Clone, PartialEq)]
pub struct ReportList(pub Vec<ReportKind>);

impl FromStr for ReportList {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        let mut kinds = Vec::new();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let kind = name.parse::<ReportKind>()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }

        if kinds.is_empty() {
            return Err(MetricsError::Configuration {
                message: "At least one report kind is required".to_string(),
            });
        }
        Ok(ReportList(kinds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_command() {
        let args = Args::try_parse_from([
            "asterasys-metrics",
            "--data-root",
            "/srv/dashboard",
            "report",
            "organic-viral",
            "--month",
            "2025-09",
            "--pretty",
        ])
        .unwrap();

        assert_eq!(args.global.data_root, Some(PathBuf::from("/srv/dashboard")));
        match args.command {
            Commands::Report(report) => {
                assert_eq!(report.kind, ReportKind::OrganicViral);
                assert_eq!(report.month.as_deref(), Some("2025-09"));
                assert!(report.pretty);
                assert!(report.output.is_none());
            }
            other => panic!("Expected report command, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_report_kind_rejected() {
        assert!(Args::try_parse_from(["asterasys-metrics", "report", "podcast"]).is_err());
    }

    #[test]
    fn test_snapshot_kinds() {
        let args = Args::try_parse_from([
            "asterasys-metrics",
            "snapshot",
            "--kinds",
            "blog, cafe,blog",
            "--set-latest",
        ])
        .unwrap();

        match args.command {
            Commands::Snapshot(snapshot) => {
                assert_eq!(snapshot.get_kinds(), vec![ReportKind::Blog, ReportKind::Cafe]);
                assert!(snapshot.set_latest);
            }
            other => panic!("Expected snapshot command, got {:?}", other),
        }

        assert_eq!("".parse::<ReportList>().ok(), None);
    }

    #[test]
    fn test_set_latest_validates_month() {
        assert!(Args::try_parse_from(["asterasys-metrics", "set-latest", "2025-13"]).is_err());

        let args = Args::try_parse_from(["asterasys-metrics", "set-latest", "2025-10"]).unwrap();
        match args.command {
            Commands::SetLatest(set) => assert_eq!(set.month.to_string(), "2025-10"),
            other => panic!("Expected set-latest command, got {:?}", other),
        }
    }

    #[test]
    fn test_log_levels() {
        let args = Args::try_parse_from(["asterasys-metrics", "-vv", "months"]).unwrap();
        assert_eq!(args.global.get_log_level(), "debug");

        let args = Args::try_parse_from(["asterasys-metrics", "months", "-q"]).unwrap();
        assert_eq!(args.global.get_log_level(), "error");
        assert!(!args.global.show_progress());

        assert!(Args::try_parse_from(["asterasys-metrics", "-q", "-v", "months"]).is_err());
    }
}
