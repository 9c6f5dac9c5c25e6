//! Error handling for metrics aggregation.
//!
//! File-level and month-resolution failures are errors; row-level problems
//! never reach this type (they are absorbed as zeros by the aggregator).

use crate::month::MissingSubset;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Source file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Data directories missing for month {month}: {}", describe_missing(.missing))]
    MonthDirectoryMissing {
        month: String,
        missing: Vec<MissingSubset>,
    },

    #[error("Invalid month format: '{value}' (expected YYYY-MM)")]
    InvalidMonth { value: String },

    #[error(
        "No month could be determined. Check latest-month.json or pass --month YYYY-MM"
    )]
    NoMonth,

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Unknown report: {name}")]
    UnknownReport { name: String },
}

impl MetricsError {
    /// Path the caller should look at, when the failure is about a location
    pub fn expected_path(&self) -> Option<PathBuf> {
        match self {
            MetricsError::FileNotFound { path } => Some(path.clone()),
            MetricsError::MonthDirectoryMissing { missing, .. } => {
                missing.first().map(|m| m.path.clone())
            }
            _ => None,
        }
    }

    /// HTTP-style status for the error envelope
    pub fn status_code(&self) -> u16 {
        match self {
            MetricsError::InvalidMonth { .. }
            | MetricsError::NoMonth
            | MetricsError::UnknownReport { .. } => 400,
            MetricsError::FileNotFound { .. } | MetricsError::MonthDirectoryMissing { .. } => 404,
            _ => 500,
        }
    }
}

fn describe_missing(missing: &[MissingSubset]) -> String {
    missing
        .iter()
        .map(|m| format!("{} ({})", m.subset, m.path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, MetricsError>;
