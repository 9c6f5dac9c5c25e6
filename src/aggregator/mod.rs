//! Per-product aggregation with category ranking and share.
//!
//! One parameterised routine serves every dataset: an [`AggregationSpec`]
//! names the grouping column, the columns to sum and the metric to rank
//! by. Rows are grouped by product in first-seen order, summed leniently,
//! classified, ranked within their technology category and given a share
//! of the partition total.

pub mod datasets;

pub use datasets::{DatasetLoader, load_dataset, spec_for};

use crate::classifier::ProductClassifier;
use crate::constants::{DEFAULT_SHARE_PRECISION, SEARCH_EFFICIENCY_SCALE};
use crate::models::{Month, ProductKey, ProductMetricRecord, Technology};
use crate::reader::{CarryForward, RawRecord};
use crate::schema::field;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Denominator used for share percentages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Share of the product's technology category
    #[default]
    Technology,
    /// Share of every product in the source
    Overall,
}

/// How repeated rows of one product combine into a metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reduce {
    #[default]
    Sum,
    /// Keep the product's first row; later duplicates are ignored
    First,
}

/// A numeric source column reduced into a named metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricColumn {
    pub source: String,
    pub metric: String,
    pub reduce: Reduce,
}

impl MetricColumn {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source: name.clone(),
            metric: name,
            reduce: Reduce::Sum,
        }
    }

    pub fn renamed(source: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            metric: metric.into(),
            reduce: Reduce::Sum,
        }
    }

    pub fn first(mut self) -> Self {
        self.reduce = Reduce::First;
        self
    }
}

/// Splits one value column into separate metrics by a label column
///
/// Used for exports with one row per (product, sub-type), such as the blog
/// export's hospital/general/place rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pivot {
    pub label_column: String,
    pub value_column: String,
    buckets: Vec<(String, String)>,
}

impl Pivot {
    pub fn new(label_column: impl Into<String>, value_column: impl Into<String>) -> Self {
        Self {
            label_column: label_column.into(),
            value_column: value_column.into(),
            buckets: Vec::new(),
        }
    }

    /// Sum rows labelled `label` into `metric`
    pub fn bucket(mut self, label: impl Into<String>, metric: impl Into<String>) -> Self {
        self.buckets.push((label.into(), metric.into()));
        self
    }

    fn metric_for(&self, label: &str) -> Option<&str> {
        self.buckets
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, metric)| metric.as_str())
    }

    fn metrics(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(_, metric)| metric.as_str())
    }
}

/// Column configuration for one aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSpec {
    pub group_by: String,

    /// Column carrying a technology label (고주파/초음파); table lookup otherwise
    pub category_column: Option<String>,

    /// Columns whose blank cells inherit the value above
    pub carry_forward: Vec<String>,

    pub columns: Vec<MetricColumn>,
    pub pivot: Option<Pivot>,
    pub primary_metric: String,
    pub partition: Partition,
    pub share_precision: u32,
}

impl AggregationSpec {
    pub fn new(group_by: impl Into<String>, primary_metric: impl Into<String>) -> Self {
        Self {
            group_by: group_by.into(),
            category_column: None,
            carry_forward: Vec::new(),
            columns: Vec::new(),
            pivot: None,
            primary_metric: primary_metric.into(),
            partition: Partition::default(),
            share_precision: DEFAULT_SHARE_PRECISION,
        }
    }

    pub fn with_category_column(mut self, column: impl Into<String>) -> Self {
        self.category_column = Some(column.into());
        self
    }

    pub fn with_carry_forward(mut self, column: impl Into<String>) -> Self {
        self.carry_forward.push(column.into());
        self
    }

    pub fn with_sum(mut self, column: impl Into<String>) -> Self {
        self.columns.push(MetricColumn::new(column));
        self
    }

    pub fn with_sum_as(mut self, source: impl Into<String>, metric: impl Into<String>) -> Self {
        self.columns.push(MetricColumn::renamed(source, metric));
        self
    }

    /// Take the column from the product's first row only
    pub fn with_first(mut self, column: impl Into<String>) -> Self {
        self.columns.push(MetricColumn::new(column).first());
        self
    }

    pub fn with_pivot(mut self, pivot: Pivot) -> Self {
        self.pivot = Some(pivot);
        self
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_share_precision(mut self, precision: u32) -> Self {
        self.share_precision = precision;
        self
    }

    /// Whether rows with a blank grouping cell must survive until carry-forward
    pub fn carries_group_key(&self) -> bool {
        self.carry_forward.iter().any(|c| *c == self.group_by)
    }

    /// Every metric name this aggregation produces
    pub fn metric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.iter().map(|c| c.metric.as_str()).collect();
        if let Some(pivot) = &self.pivot {
            names.extend(pivot.metrics());
        }
        names
    }
}

#[derive(Debug)]
struct Group {
    product: ProductKey,
    label: Option<String>,
    rows: usize,
    metrics: BTreeMap<String, f64>,
}

impl Group {
    fn new(product: ProductKey, spec: &AggregationSpec) -> Self {
        let metrics = spec
            .metric_names()
            .into_iter()
            .map(|name| (name.to_string(), 0.0))
            .collect();
        Self {
            product,
            label: None,
            rows: 0,
            metrics,
        }
    }

    fn add(&mut self, record: &RawRecord, spec: &AggregationSpec) {
        self.rows += 1;

        if self.label.is_none() {
            self.label = spec
                .category_column
                .as_deref()
                .map(|column| record.value(column))
                .filter(|label| !label.is_empty())
                .map(str::to_string);
        }

        for column in &spec.columns {
            let value = record.number(&column.source);
            let metric = self.metrics.entry(column.metric.clone()).or_default();
            match column.reduce {
                Reduce::Sum => *metric += value,
                Reduce::First if self.rows == 1 => *metric = value,
                Reduce::First => {}
            }
        }

        if let Some(pivot) = &spec.pivot {
            if let Some(metric) = pivot.metric_for(record.value(&pivot.label_column)) {
                *self.metrics.entry(metric.to_string()).or_default() +=
                    record.number(&pivot.value_column);
            }
        }
    }
}

/// Round half away from zero to a number of decimal places
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Percentage of `part` in `total`, zero when the total is zero
pub fn percentage(part: f64, total: f64, precision: u32) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    round_to(part / total * 100.0, precision)
}

/// (comments + replies) per post
pub fn participation(metrics: &BTreeMap<String, f64>) -> f64 {
    let value = |name: &str| metrics.get(name).copied().unwrap_or(0.0);
    let posts = value(field::POSTS);
    if posts == 0.0 {
        return 0.0;
    }
    (value(field::COMMENTS) + value(field::REPLIES)) / posts
}

/// Groups raw rows into ranked per-product records
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    classifier: ProductClassifier,
}

impl Aggregator {
    pub fn new(classifier: ProductClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ProductClassifier {
        &self.classifier
    }

    pub fn aggregate<I>(
        &self,
        records: I,
        spec: &AggregationSpec,
        month: Month,
    ) -> Vec<ProductMetricRecord>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut groups: Vec<Group> = Vec::new();
        let mut index: HashMap<ProductKey, usize> = HashMap::new();
        let mut skipped = 0usize;

        for record in CarryForward::new(spec.carry_forward.iter().cloned()).fill(records) {
            let product = ProductKey::new(record.value(&spec.group_by));
            if product.is_empty() {
                skipped += 1;
                continue;
            }

            let slot = *index.entry(product.clone()).or_insert_with(|| {
                groups.push(Group::new(product, spec));
                groups.len() - 1
            });
            groups[slot].add(&record, spec);
        }

        if skipped > 0 {
            debug!("Skipped {} rows without a {} value", skipped, spec.group_by);
        }

        let mut records: Vec<ProductMetricRecord> = groups
            .into_iter()
            .map(|group| self.finish(group, spec, month))
            .collect();

        rank_and_share(&mut records, spec);

        debug!(
            "Aggregated {} products by {} for {}",
            records.len(),
            spec.primary_metric,
            month
        );
        records
    }

    fn finish(&self, group: Group, spec: &AggregationSpec, month: Month) -> ProductMetricRecord {
        let classification = self
            .classifier
            .classify_with_label(&group.product, group.label.as_deref());

        ProductMetricRecord {
            month,
            technology: classification.technology,
            ownership: classification.ownership,
            row_count: group.rows,
            participation: participation(&group.metrics),
            metrics: group.metrics,
            primary_metric: spec.primary_metric.clone(),
            category_total: 0.0,
            share: 0.0,
            rank: 0,
            search_efficiency: None,
            product: group.product,
        }
    }
}

/// Order by category then primary metric, and assign rank and share
///
/// The sort is stable so ties keep first-seen order. Unclassified products
/// are ranked among themselves only.
fn rank_and_share(records: &mut [ProductMetricRecord], spec: &AggregationSpec) {
    records.sort_by(|a, b| {
        a.technology
            .cmp(&b.technology)
            .then_with(|| b.primary_value().total_cmp(&a.primary_value()))
    });

    let overall: f64 = records.iter().map(ProductMetricRecord::primary_value).sum();
    let mut category_totals: HashMap<Technology, f64> = HashMap::new();
    for record in records.iter() {
        *category_totals.entry(record.technology).or_default() += record.primary_value();
    }

    let mut current: Option<Technology> = None;
    let mut rank = 0;
    for record in records.iter_mut() {
        if current != Some(record.technology) {
            current = Some(record.technology);
            rank = 0;
        }
        rank += 1;

        let total = match spec.partition {
            Partition::Technology => category_totals
                .get(&record.technology)
                .copied()
                .unwrap_or(0.0),
            Partition::Overall => overall,
        };

        record.rank = rank;
        record.category_total = total;
        record.share = percentage(record.primary_value(), total, spec.share_precision);
    }
}

/// Default-classifier aggregation
pub fn aggregate<I>(records: I, spec: &AggregationSpec, month: Month) -> Vec<ProductMetricRecord>
where
    I: IntoIterator<Item = RawRecord>,
{
    Aggregator::default().aggregate(records, spec, month)
}

/// Attach search volume and posts-per-1000-search efficiency
///
/// Products without search data, or with zero volume, get `None`.
pub fn enrich_with_search(records: &mut [ProductMetricRecord], search: &[ProductMetricRecord]) {
    let volumes: HashMap<&ProductKey, f64> = search
        .iter()
        .map(|r| (&r.product, r.metric(field::SEARCH_VOLUME)))
        .collect();

    for record in records.iter_mut() {
        let Some(&volume) = volumes.get(&record.product) else {
            record.search_efficiency = None;
            continue;
        };

        record
            .metrics
            .insert(field::SEARCH_VOLUME.to_string(), volume);
        record.search_efficiency = if volume > 0.0 {
            Some(record.metric(field::POSTS) / volume * SEARCH_EFFICIENCY_SCALE)
        } else {
            None
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ownership;
    use crate::reader::read_str;

    fn month() -> Month {
        "2025-09".parse().unwrap()
    }

    fn posts_spec() -> AggregationSpec {
        AggregationSpec::new(field::KEYWORD, field::POSTS)
            .with_sum(field::POSTS)
            .with_sum(field::COMMENTS)
            .with_sum(field::REPLIES)
    }

    fn find<'a>(records: &'a [ProductMetricRecord], product: &str) -> &'a ProductMetricRecord {
        records
            .iter()
            .find(|r| r.product.as_str() == product)
            .unwrap_or_else(|| panic!("{} not aggregated", product))
    }

    #[test]
    fn test_carry_forward_sums_into_one_group() {
        let content = "keyword,posts\n써마지,1\n,2\n,3\n";
        let spec = posts_spec().with_carry_forward(field::KEYWORD);
        let records = aggregate(read_str(content).keep_blank_leading(), &spec, month());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].primary_value(), 6.0);
        assert_eq!(records[0].row_count, 3);
    }

    #[test]
    fn test_blank_keys_dropped_without_carry_forward() {
        let content = "keyword,posts\n써마지,1\n,2\n";
        let records = aggregate(read_str(content).keep_blank_leading(), &posts_spec(), month());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].primary_value(), 1.0);
    }

    #[test]
    fn test_ranking_with_ties_keeps_first_seen_order() {
        let content = "keyword,posts\n써마지,100\n인모드,80\n덴서티,80\n튠페이스,50\n";
        let records = aggregate(read_str(content), &posts_spec(), month());

        let ranks: Vec<(&str, usize)> = records
            .iter()
            .map(|r| (r.product.as_str(), r.rank))
            .collect();
        assert_eq!(
            ranks,
            vec![("써마지", 1), ("인모드", 2), ("덴서티", 3), ("튠페이스", 4)]
        );

        let share_sum: f64 = records.iter().map(|r| r.share).sum();
        assert!((share_sum - 100.0).abs() <= 1.0, "shares sum to {}", share_sum);
    }

    #[test]
    fn test_zero_total_gives_zero_share() {
        let content = "keyword,posts\n써마지,0\n쿨페이즈,0\n";
        let records = aggregate(read_str(content), &posts_spec(), month());

        assert!(records.iter().all(|r| r.share == 0.0));
        assert!(records.iter().all(|r| r.share.is_finite()));
        assert_eq!(records[0].category_total, 0.0);
    }

    #[test]
    fn test_category_share_and_rank() {
        let content = "keyword,posts\n써마지,928\n쿨페이즈,38\n";
        let records = aggregate(read_str(content), &posts_spec(), month());

        let coolphase = find(&records, "쿨페이즈");
        assert_eq!(coolphase.technology, Technology::Rf);
        assert_eq!(coolphase.ownership, Ownership::OwnBrand);
        assert_eq!(coolphase.category_total, 966.0);
        assert_eq!(coolphase.share, 3.9);
        assert_eq!(coolphase.rank, 2);

        let thermage = find(&records, "써마지");
        assert_eq!(thermage.rank, 1);
        assert_eq!(thermage.share, 96.1);
    }

    #[test]
    fn test_categories_ranked_independently() {
        let content = "keyword,posts\n울쎄라,10\n써마지,50\n리프테라,30\n신제품,99\n";
        let records = aggregate(read_str(content), &posts_spec(), month());

        assert_eq!(find(&records, "써마지").rank, 1);
        assert_eq!(find(&records, "리프테라").rank, 1);
        assert_eq!(find(&records, "울쎄라").rank, 2);
        assert_eq!(find(&records, "리프테라").category_total, 40.0);

        let unknown = find(&records, "신제품");
        assert_eq!(unknown.technology, Technology::Unclassified);
        assert_eq!(unknown.rank, 1);
        assert_eq!(unknown.share, 100.0);

        let order: Vec<Technology> = records.iter().map(|r| r.technology).collect();
        assert_eq!(
            order,
            vec![
                Technology::Rf,
                Technology::Hifu,
                Technology::Hifu,
                Technology::Unclassified
            ]
        );
    }

    #[test]
    fn test_overall_partition() {
        let content = "keyword,posts\n써마지,75\n울쎄라,25\n";
        let spec = posts_spec().with_partition(Partition::Overall);
        let records = aggregate(read_str(content), &spec, month());

        assert_eq!(find(&records, "써마지").share, 75.0);
        assert_eq!(find(&records, "울쎄라").share, 25.0);
        assert_eq!(find(&records, "울쎄라").rank, 1);
    }

    #[test]
    fn test_category_label_column_wins() {
        let content = "keyword,category,posts\n신제품,초음파,5\n";
        let spec = posts_spec().with_category_column(field::CATEGORY);
        let records = aggregate(read_str(content), &spec, month());
        assert_eq!(records[0].technology, Technology::Hifu);
    }

    #[test]
    fn test_lenient_numbers_and_missing_columns() {
        let content = "keyword,posts\n써마지,\"1,200\"\n써마지,abc\n";
        let records = aggregate(read_str(content), &posts_spec(), month());

        assert_eq!(records[0].primary_value(), 1200.0);
        assert_eq!(records[0].metric(field::COMMENTS), 0.0);
        assert!(records[0].metrics.contains_key(field::REPLIES));
    }

    #[test]
    fn test_participation() {
        let content = "keyword,posts,comments,replies\n써마지,10,4,1\n울쎄라,0,5,5\n";
        let records = aggregate(read_str(content), &posts_spec(), month());

        assert_eq!(find(&records, "써마지").participation, 0.5);
        assert_eq!(find(&records, "울쎄라").participation, 0.0);
    }

    #[test]
    fn test_pivot_splits_by_label() {
        let content = "keyword,blog_type,type_count\n\
                       써마지,병원블로그,3\n\
                       ,일반블로그,5\n\
                       ,플레이스블로그,2\n";
        let spec = AggregationSpec::new(field::KEYWORD, field::POSTS)
            .with_carry_forward(field::KEYWORD)
            .with_sum_as(field::TYPE_COUNT, field::POSTS)
            .with_pivot(
                Pivot::new(field::BLOG_TYPE, field::TYPE_COUNT)
                    .bucket("병원블로그", "hospital")
                    .bucket("일반블로그", "general"),
            );
        let records = aggregate(read_str(content).keep_blank_leading(), &spec, month());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metric(field::POSTS), 10.0);
        assert_eq!(records[0].metric("hospital"), 3.0);
        assert_eq!(records[0].metric("general"), 5.0);
    }

    #[test]
    fn test_share_precision() {
        let content = "keyword,posts\n써마지,1\n인모드,2\n";
        let spec = posts_spec().with_share_precision(2);
        let records = aggregate(read_str(content), &spec, month());
        assert_eq!(find(&records, "써마지").share, 33.33);
    }

    #[test]
    fn test_enrich_with_search() {
        let month = month();
        let mut records = aggregate(
            read_str("keyword,posts\n써마지,50\n울쎄라,10\n쿨소닉,4\n"),
            &posts_spec(),
            month,
        );
        let search = aggregate(
            read_str("keyword,search_volume\n써마지,10000\n울쎄라,0\n"),
            &AggregationSpec::new(field::KEYWORD, field::SEARCH_VOLUME)
                .with_sum(field::SEARCH_VOLUME),
            month,
        );

        enrich_with_search(&mut records, &search);

        let thermage = find(&records, "써마지");
        assert_eq!(thermage.search_efficiency, Some(5.0));
        assert_eq!(thermage.metric(field::SEARCH_VOLUME), 10000.0);
        assert_eq!(find(&records, "울쎄라").search_efficiency, None);
        assert_eq!(find(&records, "쿨소닉").search_efficiency, None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3.9337, 1), 3.9);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(12.346, 2), 12.35);
        assert_eq!(percentage(1.0, 0.0, 1), 0.0);
    }
}
