//! Report assembly: one entry point per dashboard view.
//!
//! A report resolves its month, loads the datasets it needs, runs the
//! aggregation/combination stages and wraps the result in a success or
//! error envelope. Snapshots persist envelopes under
//! `data/processed/<month>/<kind>.json`.

use crate::aggregator::{DatasetLoader, enrich_with_search};
use crate::classifier::ProductClassifier;
use crate::combiner::{
    self, Combiner, GroupStats, MarketOverview, MonthOverMonth, ProductChange, SalesCorrelation,
    Sources,
};
use crate::config::MetricsConfig;
use crate::error::{MetricsError, Result};
use crate::formatter::{CompositeEntry, FormatShape, FormattedReport, format, format_composites};
use crate::models::{Month, ProductKey, ProductMetricRecord};
use crate::month::{DataLayout, DataSubset, MissingSubset, MonthResolution, MonthResolver};
use crate::schema::{Dataset, field};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Dashboard views that can be built for a month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Blog,
    Cafe,
    News,
    Youtube,
    Sales,
    Traffic,
    OrganicViral,
    Kpis,
    Channels,
}

impl ReportKind {
    pub const ALL: [ReportKind; 9] = [
        ReportKind::Blog,
        ReportKind::Cafe,
        ReportKind::News,
        ReportKind::Youtube,
        ReportKind::Sales,
        ReportKind::Traffic,
        ReportKind::OrganicViral,
        ReportKind::Kpis,
        ReportKind::Channels,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::Blog => "blog",
            ReportKind::Cafe => "cafe",
            ReportKind::News => "news",
            ReportKind::Youtube => "youtube",
            ReportKind::Sales => "sales",
            ReportKind::Traffic => "traffic",
            ReportKind::OrganicViral => "organic_viral",
            ReportKind::Kpis => "kpis",
            ReportKind::Channels => "channels",
        }
    }

    /// Datasets whose exports must exist for the report
    pub fn datasets(&self) -> &'static [Dataset] {
        match self {
            ReportKind::Blog => &[Dataset::Blog],
            ReportKind::Cafe => &[Dataset::Cafe],
            ReportKind::News => &[Dataset::News],
            ReportKind::Youtube => &[Dataset::Youtube],
            ReportKind::Sales => &[Dataset::Sales],
            ReportKind::Traffic => &[Dataset::Traffic],
            ReportKind::OrganicViral => &[Dataset::Blog, Dataset::NewsAnalysis, Dataset::Cafe],
            ReportKind::Kpis => &[
                Dataset::Blog,
                Dataset::Cafe,
                Dataset::News,
                Dataset::Sales,
                Dataset::Traffic,
            ],
            ReportKind::Channels => &[Dataset::Blog, Dataset::Cafe, Dataset::News],
        }
    }

    /// Month directories the report reads from
    pub fn required_subsets(&self) -> &'static [DataSubset] {
        &[DataSubset::Raw]
    }

    /// Snapshot file name inside data/processed/<month>
    pub fn file_name(&self) -> String {
        format!("{}.json", self.name())
    }

    fn single_dataset(&self) -> Option<Dataset> {
        match self {
            ReportKind::Blog => Some(Dataset::Blog),
            ReportKind::Cafe => Some(Dataset::Cafe),
            ReportKind::News => Some(Dataset::News),
            ReportKind::Youtube => Some(Dataset::Youtube),
            ReportKind::Sales => Some(Dataset::Sales),
            ReportKind::Traffic => Some(Dataset::Traffic),
            _ => None,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| MetricsError::UnknownReport {
                name: s.to_string(),
            })
    }
}

/// Successful report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEnvelope {
    pub success: bool,
    pub month: Month,
    pub kind: ReportKind,

    /// Month asked for, when it differs from the one served
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_month: Option<String>,

    pub data: serde_json::Value,
    pub generated_at: DateTime<Utc>,
}

/// Failed report, with an HTTP-style status
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub month: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<MissingSubset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_path: Option<PathBuf>,

    #[serde(skip)]
    pub status: u16,
}

impl ErrorEnvelope {
    pub fn from_error(error: &MetricsError, month: Option<&Month>) -> Self {
        let (month, missing) = match error {
            MetricsError::MonthDirectoryMissing { month, missing } => {
                (Some(month.clone()), missing.clone())
            }
            _ => (month.map(Month::to_string), Vec::new()),
        };

        Self {
            error: error.to_string(),
            month,
            missing,
            expected_path: error.expected_path(),
            status: error.status_code(),
        }
    }
}

// =============================================================================
// Report payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthComparison {
    pub previous_month: Month,
    pub total: MonthOverMonth,
    pub own_brand: MonthOverMonth,
    pub products: Vec<ProductChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelData {
    #[serde(flatten)]
    pub report: FormattedReport,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub month_over_month: Option<MonthComparison>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_correlation: Option<SalesCorrelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganicViralData {
    pub own_brand: GroupStats,
    pub competitors: GroupStats,
    pub gap: f64,
    pub excluded: Vec<ProductKey>,

    /// Products in neither group
    pub others: Vec<ProductKey>,
    pub products: Vec<CompositeEntry>,
    pub formula: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiData {
    pub overview: MarketOverview,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_brand_posts_change: Option<MonthOverMonth>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsData {
    pub channels: Vec<combiner::ChannelShare>,
}

const ORGANIC_FORMULA: &str =
    "organic = hospital blogs + hospital news; managed = general blogs + corporate news + cafe";

// =============================================================================
// Builder
// =============================================================================

/// Builds reports against one data layout
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    layout: DataLayout,
    resolver: MonthResolver,
    loader: DatasetLoader,
    classifier: ProductClassifier,
    combiner: Combiner,
    shape: FormatShape,
    share_precision: u32,
    competitors: Vec<String>,
    denylist: Vec<String>,
}

impl ReportBuilder {
    pub fn new(layout: &DataLayout, config: &MetricsConfig) -> Self {
        Self {
            layout: layout.clone(),
            resolver: config.resolver(layout),
            loader: config.loader(layout),
            classifier: config.classifier(),
            combiner: config.combiner(),
            shape: config.format_shape(),
            share_precision: config.share_precision,
            competitors: config.competitor_products.clone(),
            denylist: config.denylist.clone(),
        }
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Resolve the month and require its raw directory
    pub fn resolve(&self, kind: ReportKind, requested: Option<&str>) -> Result<MonthResolution> {
        let available = self.layout.available_months(DataSubset::Raw);
        let latest = self.layout.latest_month();
        self.resolver
            .resolve(requested, &available, latest, kind.required_subsets())?
            .require()
    }

    /// Build the report payload for an already-resolved month
    pub fn build(&self, kind: ReportKind, month: &Month) -> Result<serde_json::Value> {
        debug!("Building {} report for {}", kind, month);

        let value = match kind {
            ReportKind::OrganicViral => serde_json::to_value(self.organic_viral(month)?)?,
            ReportKind::Kpis => serde_json::to_value(self.kpis(month)?)?,
            ReportKind::Channels => serde_json::to_value(self.channels(month)?)?,
            _ => {
                let dataset = kind
                    .single_dataset()
                    .ok_or_else(|| MetricsError::UnknownReport {
                        name: kind.to_string(),
                    })?;
                serde_json::to_value(self.channel(month, dataset)?)?
            }
        };
        Ok(value)
    }

    /// Resolve, build and wrap in a success envelope
    pub fn report(&self, kind: ReportKind, requested: Option<&str>) -> Result<ReportEnvelope> {
        let resolution = self.resolve(kind, requested)?;
        self.envelope(kind, &resolution)
    }

    /// Like [`report`](Self::report) but failures become error envelopes
    pub fn run(
        &self,
        kind: ReportKind,
        requested: Option<&str>,
    ) -> std::result::Result<ReportEnvelope, ErrorEnvelope> {
        let resolution = self
            .resolve(kind, requested)
            .map_err(|e| ErrorEnvelope::from_error(&e, None))?;
        self.envelope(kind, &resolution)
            .map_err(|e| ErrorEnvelope::from_error(&e, Some(&resolution.month)))
    }

    /// Build and wrap a report for an already-resolved month
    pub fn envelope(
        &self,
        kind: ReportKind,
        resolution: &MonthResolution,
    ) -> Result<ReportEnvelope> {
        let data = self.build(kind, &resolution.month)?;
        info!("Built {} report for {}", kind, resolution.month);

        Ok(ReportEnvelope {
            success: true,
            month: resolution.month,
            kind,
            requested_month: resolution
                .requested
                .clone()
                .filter(|_| resolution.fell_back),
            data,
            generated_at: Utc::now(),
        })
    }

    fn load_all(&self, month: &Month, datasets: &[Dataset]) -> Result<Sources> {
        let mut sources = BTreeMap::new();
        for &dataset in datasets {
            sources.insert(dataset.name().to_string(), self.loader.load(month, dataset)?);
        }
        Ok(sources)
    }

    fn channel(&self, month: &Month, dataset: Dataset) -> Result<ChannelData> {
        let mut records = self.loader.load(month, dataset)?;

        if matches!(dataset, Dataset::Blog | Dataset::Cafe) {
            if let Some(search) = self.loader.load_optional(month, Dataset::Traffic)? {
                enrich_with_search(&mut records, &search);
            }
        }

        let sales_correlation = match dataset {
            Dataset::Sales => self
                .loader
                .load_optional(month, Dataset::Youtube)?
                .map(|youtube| {
                    combiner::sales_correlation(
                        &records,
                        &youtube,
                        field::VIEWS,
                        self.share_precision,
                    )
                }),
            _ => None,
        };

        let month_over_month = self.compare_with_previous(month, dataset, &records)?;

        Ok(ChannelData {
            report: format(&records, &self.shape),
            month_over_month,
            sales_correlation,
        })
    }

    fn compare_with_previous(
        &self,
        month: &Month,
        dataset: Dataset,
        records: &[ProductMetricRecord],
    ) -> Result<Option<MonthComparison>> {
        let Some(previous_month) = month.previous() else {
            return Ok(None);
        };
        let Some(previous) = self.loader.load_optional(&previous_month, dataset)? else {
            return Ok(None);
        };

        let total = |records: &[ProductMetricRecord]| -> f64 {
            records.iter().map(ProductMetricRecord::primary_value).sum()
        };
        let own_total = |records: &[ProductMetricRecord]| -> f64 {
            records
                .iter()
                .filter(|r| r.is_own_brand())
                .map(ProductMetricRecord::primary_value)
                .sum()
        };

        Ok(Some(MonthComparison {
            previous_month,
            total: combiner::month_over_month(total(records), total(&previous)),
            own_brand: combiner::month_over_month(own_total(records), own_total(&previous)),
            products: combiner::compare_months(records, &previous),
        }))
    }

    fn organic_viral(&self, month: &Month) -> Result<OrganicViralData> {
        let sources = self.load_all(month, ReportKind::OrganicViral.datasets())?;
        let composites = self.combiner.combine(&sources, combiner::organic_managed);
        let summary = self.combiner.summarize_groups(
            &composites,
            &self.classifier,
            &self.competitors,
            &self.denylist,
        );

        Ok(OrganicViralData {
            own_brand: summary.own_brand,
            competitors: summary.competitors,
            gap: summary.gap,
            excluded: summary.excluded,
            others: summary.others,
            products: format_composites(&composites, &self.shape),
            formula: ORGANIC_FORMULA,
        })
    }

    fn kpis(&self, month: &Month) -> Result<KpiData> {
        let overview = combiner::market_overview(
            &self.load_all(month, ReportKind::Kpis.datasets())?,
            self.share_precision,
        );

        let own_brand_posts_change = match month.previous() {
            Some(previous) => self
                .load_previous_posts(&previous)?
                .map(|previous| combiner::month_over_month(overview.own_brand_posts, previous)),
            None => None,
        };

        Ok(KpiData {
            overview,
            own_brand_posts_change,
        })
    }

    /// Own-brand posts across posting channels, if every export exists
    fn load_previous_posts(&self, month: &Month) -> Result<Option<f64>> {
        let mut total = 0.0;
        for dataset in [Dataset::Blog, Dataset::Cafe, Dataset::News] {
            let Some(records) = self.loader.load_optional(month, dataset)? else {
                return Ok(None);
            };
            total += records
                .iter()
                .filter(|r| r.is_own_brand())
                .map(|r| r.metric(field::POSTS))
                .sum::<f64>();
        }
        Ok(Some(total))
    }

    fn channels(&self, month: &Month) -> Result<ChannelsData> {
        let mut sources = self.load_all(month, ReportKind::Channels.datasets())?;
        if let Some(youtube) = self.loader.load_optional(month, Dataset::Youtube)? {
            sources.insert(Dataset::Youtube.name().to_string(), youtube);
        }

        Ok(ChannelsData {
            channels: combiner::channel_distribution(&sources, self.share_precision),
        })
    }
}

/// Build one report for a requested month (or the latest month)
pub fn build_report(
    layout: &DataLayout,
    config: &MetricsConfig,
    kind: ReportKind,
    requested_month: Option<&str>,
) -> Result<ReportEnvelope> {
    ReportBuilder::new(layout, config).report(kind, requested_month)
}

/// Persist an envelope as data/processed/<month>/<kind>.json
pub fn write_snapshot(layout: &DataLayout, envelope: &ReportEnvelope) -> Result<PathBuf> {
    let dir = layout.month_dir(DataSubset::Processed, &envelope.month);
    fs::create_dir_all(&dir)?;

    let path = dir.join(envelope.kind.file_name());
    write_json(&path, envelope, true)?;
    debug!("Wrote snapshot {}", path.display());
    Ok(path)
}

/// Serialize a value to a file
pub fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let body = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    fs::write(path, body)?;
    Ok(())
}
