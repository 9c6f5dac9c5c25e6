//! Core data structures and types for metrics aggregation.
//!
//! Defines the month identifier, product identity and classification
//! enums, and the per-product and composite metric records produced by
//! the aggregation pipeline.

use crate::constants::MONTH_PATTERN;
use crate::error::{MetricsError, Result};
use chrono::{Datelike, Months, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static MONTH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MONTH_PATTERN).expect("month pattern is valid"));

/// A calendar month in `YYYY-MM` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Create a month, validating the month number
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(MetricsError::InvalidMonth {
                value: format!("{:04}-{:02}", year, month),
            });
        }
        Ok(Self { year, month })
    }

    /// Check whether a string has the accepted `YYYY-MM` shape
    pub fn is_valid(value: &str) -> bool {
        MONTH_REGEX.is_match(value)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month before this one (used for month-over-month comparisons)
    pub fn previous(&self) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(self.year, self.month, 1)?;
        let prev = first.checked_sub_months(Months::new(1))?;
        Some(Self {
            year: prev.year(),
            month: prev.month(),
        })
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        if !Self::is_valid(value) {
            return Err(MetricsError::InvalidMonth {
                value: s.to_string(),
            });
        }

        // Shape is guaranteed by the regex above
        let (year, month) = value.split_at(4);
        let year = year.parse::<i32>().map_err(|_| MetricsError::InvalidMonth {
            value: s.to_string(),
        })?;
        let month = month[1..]
            .parse::<u32>()
            .map_err(|_| MetricsError::InvalidMonth {
                value: s.to_string(),
            })?;

        Self::new(year, month)
    }
}

impl TryFrom<String> for Month {
    type Error = MetricsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(month: Month) -> Self {
        month.to_string()
    }
}

/// Normalized product keyword, the join key across every source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductKey(String);

impl ProductKey {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Device technology used to partition rankings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Technology {
    #[serde(rename = "RF")]
    Rf,
    #[serde(rename = "HIFU")]
    Hifu,
    #[serde(rename = "UNCLASSIFIED")]
    Unclassified,
}

impl Technology {
    /// Categories that take part in leaderboards
    pub const RANKED: [Technology; 2] = [Technology::Rf, Technology::Hifu];

    /// Korean label used by the source exports
    pub fn label(&self) -> &'static str {
        match self {
            Technology::Rf => "고주파",
            Technology::Hifu => "초음파",
            Technology::Unclassified => "기타",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Technology::Rf => "RF",
            Technology::Hifu => "HIFU",
            Technology::Unclassified => "UNCLASSIFIED",
        }
    }

    pub fn is_ranked(&self) -> bool {
        !matches!(self, Technology::Unclassified)
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Own brand versus competitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    OwnBrand,
    Competitor,
}

impl Ownership {
    pub fn is_own_brand(&self) -> bool {
        matches!(self, Ownership::OwnBrand)
    }
}

/// Aggregate for one product in one month from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMetricRecord {
    pub month: Month,
    pub product: ProductKey,
    pub technology: Technology,
    pub ownership: Ownership,

    /// Number of raw rows folded into this record
    pub row_count: usize,

    /// Summed numeric columns keyed by canonical field name
    pub metrics: BTreeMap<String, f64>,

    /// Metric used for ranking and share
    pub primary_metric: String,

    /// Sum of the primary metric over the record's partition
    pub category_total: f64,

    /// Percentage of the partition total, rounded
    pub share: f64,

    /// 1-based rank within the technology category
    pub rank: usize,

    /// (comments + replies) / posts
    pub participation: f64,

    /// Posts per 1000 searches; None without search volume
    pub search_efficiency: Option<f64>,
}

impl ProductMetricRecord {
    /// Value of a summed metric, zero when the source lacks the column
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }

    pub fn primary_value(&self) -> f64 {
        self.metric(&self.primary_metric)
    }

    pub fn is_own_brand(&self) -> bool {
        self.ownership.is_own_brand()
    }
}

/// Cross-source composite for one product in one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeMetricRecord {
    pub month: Month,
    pub product: ProductKey,
    pub technology: Technology,
    pub ownership: Ownership,

    /// Named constituent volumes, all expressed as counts
    pub components: BTreeMap<String, f64>,

    pub organic_volume: f64,
    pub managed_volume: f64,

    /// Always organic_volume + managed_volume
    pub total_volume: f64,

    pub organic_percent: f64,
    pub managed_percent: f64,

    /// Sources in which the product actually appeared
    pub sources_present: Vec<String>,
}

impl CompositeMetricRecord {
    pub fn component(&self, name: &str) -> f64 {
        self.components.get(name).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_parsing() {
        let month: Month = "2025-09".parse().unwrap();
        assert_eq!(month.year(), 2025);
        assert_eq!(month.month(), 9);
        assert_eq!(month.to_string(), "2025-09");

        assert!("2025-13".parse::<Month>().is_err());
        assert!("2025-00".parse::<Month>().is_err());
        assert!("2025-9".parse::<Month>().is_err());
        assert!("25-09".parse::<Month>().is_err());
        assert!("".parse::<Month>().is_err());
    }

    #[test]
    fn test_month_previous_crosses_year() {
        let month: Month = "2025-01".parse().unwrap();
        assert_eq!(month.previous().unwrap().to_string(), "2024-12");

        let month: Month = "2025-10".parse().unwrap();
        assert_eq!(month.previous().unwrap().to_string(), "2025-09");
    }

    #[test]
    fn test_month_serde_as_string() {
        let month: Month = "2025-08".parse().unwrap();
        let json = serde_json::to_string(&month).unwrap();
        assert_eq!(json, "\"2025-08\"");

        let back: Month = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month);
        assert!(serde_json::from_str::<Month>("\"2025-8\"").is_err());
    }

    #[test]
    fn test_product_key_trims() {
        assert_eq!(ProductKey::new("  쿨페이즈 ").as_str(), "쿨페이즈");
        assert!(ProductKey::new("   ").is_empty());
    }

    #[test]
    fn test_technology_serialization() {
        assert_eq!(serde_json::to_string(&Technology::Rf).unwrap(), "\"RF\"");
        assert_eq!(serde_json::to_string(&Technology::Hifu).unwrap(), "\"HIFU\"");
        assert!(!Technology::Unclassified.is_ranked());
    }
}
