//! Presentation shapes for aggregated records.
//!
//! Turns ranked records into the summary / per-category / leaderboard /
//! own-brand layout consumed by the dashboard. Only rounding and layout
//! happen here; every number is computed upstream.

use crate::aggregator::round_to;
use crate::constants::{DEFAULT_LEADERBOARD_SIZE, DEFAULT_SHARE_PRECISION, RATIO_PRECISION};
use crate::models::{
    CompositeMetricRecord, Month, Ownership, ProductKey, ProductMetricRecord, Technology,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How percentages are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentStyle {
    /// JSON number rounded to the precision
    #[default]
    Number,
    /// String with a fixed number of decimals, e.g. "3.9"
    FixedString,
}

/// A rendered percentage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Percent {
    Number(f64),
    Text(String),
}

/// Layout options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatShape {
    pub leaderboard_size: usize,
    pub precision: u32,
    pub percent_style: PercentStyle,
}

impl Default for FormatShape {
    fn default() -> Self {
        Self {
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            precision: DEFAULT_SHARE_PRECISION,
            percent_style: PercentStyle::default(),
        }
    }
}

impl FormatShape {
    pub fn with_leaderboard_size(mut self, size: usize) -> Self {
        self.leaderboard_size = size;
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_percent_style(mut self, style: PercentStyle) -> Self {
        self.percent_style = style;
        self
    }

    pub fn percent(&self, value: f64) -> Percent {
        match self.percent_style {
            PercentStyle::Number => Percent::Number(round_to(value, self.precision)),
            PercentStyle::FixedString => Percent::Text(format!(
                "{:.*}",
                self.precision as usize,
                round_to(value, self.precision)
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductEntry {
    pub product: ProductKey,
    pub technology: Technology,
    pub category_label: &'static str,
    pub ownership: Ownership,
    pub rank: usize,
    pub value: f64,
    pub share: Percent,
    pub metrics: BTreeMap<String, f64>,
    pub participation: f64,
    pub search_efficiency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub primary_metric: String,
    pub total_products: usize,
    pub total_volume: f64,
    pub own_brand_products: usize,
    pub own_brand_volume: f64,
    pub own_brand_share: Percent,
    pub unclassified_products: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub technology: Technology,
    pub label: &'static str,
    pub product_count: usize,
    pub total: f64,
    pub own_brand_volume: f64,
    pub own_brand_share: Percent,
    pub leader: Option<ProductKey>,
    pub leaderboard: Vec<ProductEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedReport {
    pub month: Option<Month>,
    pub summary: Summary,
    pub categories: Vec<CategoryBreakdown>,
    pub own_brand: Vec<ProductEntry>,
    pub unclassified: Vec<ProductEntry>,
}

fn entry(record: &ProductMetricRecord, shape: &FormatShape) -> ProductEntry {
    ProductEntry {
        product: record.product.clone(),
        technology: record.technology,
        category_label: record.technology.label(),
        ownership: record.ownership,
        rank: record.rank,
        value: record.primary_value(),
        share: shape.percent(record.share),
        metrics: record.metrics.clone(),
        participation: round_to(record.participation, RATIO_PRECISION),
        search_efficiency: record
            .search_efficiency
            .map(|e| round_to(e, RATIO_PRECISION)),
    }
}

fn own_share(own: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        own / total * 100.0
    }
}

/// Lay out ranked records
///
/// Records are expected in aggregator order (category, then rank).
pub fn format(records: &[ProductMetricRecord], shape: &FormatShape) -> FormattedReport {
    let primary_metric = records
        .first()
        .map(|r| r.primary_metric.clone())
        .unwrap_or_default();

    let total_volume: f64 = records.iter().map(ProductMetricRecord::primary_value).sum();
    let own: Vec<&ProductMetricRecord> = records.iter().filter(|r| r.is_own_brand()).collect();
    let own_brand_volume: f64 = own.iter().map(|r| r.primary_value()).sum();

    let categories = Technology::RANKED
        .iter()
        .map(|&technology| {
            let members: Vec<&ProductMetricRecord> = records
                .iter()
                .filter(|r| r.technology == technology)
                .collect();
            let total: f64 = members.iter().map(|r| r.primary_value()).sum();
            let own_volume: f64 = members
                .iter()
                .filter(|r| r.is_own_brand())
                .map(|r| r.primary_value())
                .sum();

            CategoryBreakdown {
                technology,
                label: technology.label(),
                product_count: members.len(),
                total,
                own_brand_volume: own_volume,
                own_brand_share: shape.percent(own_share(own_volume, total)),
                leader: members.first().map(|r| r.product.clone()),
                leaderboard: members
                    .iter()
                    .take(shape.leaderboard_size)
                    .map(|r| entry(r, shape))
                    .collect(),
            }
        })
        .collect();

    let unclassified: Vec<ProductEntry> = records
        .iter()
        .filter(|r| !r.technology.is_ranked())
        .map(|r| entry(r, shape))
        .collect();

    FormattedReport {
        month: records.first().map(|r| r.month),
        summary: Summary {
            primary_metric,
            total_products: records.len(),
            total_volume,
            own_brand_products: own.len(),
            own_brand_volume,
            own_brand_share: shape.percent(own_share(own_brand_volume, total_volume)),
            unclassified_products: unclassified.len(),
        },
        categories,
        own_brand: own.iter().map(|r| entry(r, shape)).collect(),
        unclassified,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeEntry {
    pub product: ProductKey,
    pub technology: Technology,
    pub ownership: Ownership,
    pub organic: Percent,
    pub managed: Percent,
    pub organic_volume: f64,
    pub managed_volume: f64,
    pub total_volume: f64,
    pub components: BTreeMap<String, f64>,
    pub sources_present: Vec<String>,
}

/// Render composites, largest total volume first
pub fn format_composites(
    records: &[CompositeMetricRecord],
    shape: &FormatShape,
) -> Vec<CompositeEntry> {
    let mut entries: Vec<CompositeEntry> = records
        .iter()
        .map(|r| CompositeEntry {
            product: r.product.clone(),
            technology: r.technology,
            ownership: r.ownership,
            organic: shape.percent(r.organic_percent),
            managed: shape.percent(r.managed_percent),
            organic_volume: r.organic_volume,
            managed_volume: r.managed_volume,
            total_volume: r.total_volume,
            components: r.components.clone(),
            sources_present: r.sources_present.clone(),
        })
        .collect();

    entries.sort_by(|a, b| b.total_volume.total_cmp(&a.total_volume));
    entries
}
