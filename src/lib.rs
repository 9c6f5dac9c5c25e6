//! Asterasys Metrics Library
//!
//! Month-scoped aggregation of marketing CSV exports for the Asterasys
//! dashboard. Each month's raw exports (blog, cafe, news, YouTube, sales,
//! search traffic) are read, grouped per product, classified by technology
//! (RF / HIFU) and ownership, ranked within their category and combined
//! across sources into dashboard reports.
//!
//! The pipeline:
//! - [`reader`] parses exports leniently (BOM, quoting, thousands separators)
//! - [`schema`] maps Korean/English header variants to canonical fields
//! - [`aggregator`] groups, sums, ranks and computes shares
//! - [`combiner`] joins sources per product (organic/managed split, KPIs)
//! - [`formatter`] lays records out for presentation
//! - [`report`] ties it together per dashboard view
//!
//! ```no_run
//! use asterasys_metrics::{MetricsConfig, ReportKind, build_report};
//!
//! let config = MetricsConfig::default().with_data_root("/srv/dashboard");
//! let envelope = build_report(&config.layout(), &config, ReportKind::Cafe, Some("2025-09"))?;
//! println!("{}", serde_json::to_string_pretty(&envelope)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregator;
pub mod classifier;
pub mod combiner;
pub mod config;
pub mod constants;
pub mod error;
pub mod formatter;
pub mod models;
pub mod month;
pub mod reader;
pub mod report;
pub mod schema;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

pub use aggregator::{AggregationSpec, Aggregator, DatasetLoader, aggregate, load_dataset};
pub use classifier::ProductClassifier;
pub use combiner::{Combiner, combine, organic_managed, summarize_groups};
pub use config::MetricsConfig;
pub use error::{MetricsError, Result};
pub use formatter::{FormatShape, PercentStyle, format};
pub use models::{
    CompositeMetricRecord, Month, Ownership, ProductKey, ProductMetricRecord, Technology,
};
pub use month::{DataLayout, DataSubset, MonthResolution, MonthResolver};
pub use reader::{RawRecord, RecordReader, read};
pub use report::{ReportEnvelope, ReportKind, build_report, write_snapshot};
pub use schema::{Dataset, DatasetSchema};
