//! Cross-source composite metrics.
//!
//! Joins per-product records from several sources on (month, product) and
//! applies a pure formula to each joined product. A product missing from a
//! source contributes zero for that source instead of being dropped.
//!
//! Also hosts the cross-source summaries built on top of the joined view:
//! own-brand versus competitor groups, month-over-month change, channel
//! distribution, market overview and the content/sales correlation.

use crate::aggregator::datasets::metric;
use crate::aggregator::{percentage, round_to};
use crate::classifier::ProductClassifier;
use crate::constants::{
    CHANGE_PERCENT_PRECISION, DEFAULT_COMPETITORS, DEFAULT_COMPOSITE_PRECISION, DEFAULT_DENYLIST,
};
use crate::models::{
    CompositeMetricRecord, Month, Ownership, ProductKey, ProductMetricRecord, Technology,
};
use crate::schema::{Dataset, field};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Named sources keyed by source name (usually [`Dataset::name`])
pub type Sources = BTreeMap<String, Vec<ProductMetricRecord>>;

/// Component names produced by [`organic_managed`]
pub mod component {
    pub const HOSPITAL_BLOGS: &str = "hospital_blogs";
    pub const HOSPITAL_NEWS: &str = "hospital_news";
    pub const GENERAL_BLOGS: &str = "general_blogs";
    pub const CORPORATE_NEWS: &str = "corporate_news";
    pub const CAFE: &str = "cafe";
}

/// One product's records across every source it appears in
#[derive(Debug, Clone)]
pub struct JoinedProduct<'a> {
    pub month: Month,
    pub product: ProductKey,
    pub technology: Technology,
    pub ownership: Ownership,
    records: BTreeMap<&'a str, &'a ProductMetricRecord>,
}

impl<'a> JoinedProduct<'a> {
    pub fn record(&self, source: &str) -> Option<&'a ProductMetricRecord> {
        self.records.get(source).copied()
    }

    /// Metric from one source, zero when the product is absent there
    pub fn metric(&self, source: &str, name: &str) -> f64 {
        self.record(source).map(|r| r.metric(name)).unwrap_or(0.0)
    }

    pub fn sources_present(&self) -> Vec<String> {
        self.records.keys().map(|s| s.to_string()).collect()
    }
}

/// Join sources on (month, product) in first-appearance order
pub fn join(sources: &Sources) -> Vec<JoinedProduct<'_>> {
    let mut joined: Vec<JoinedProduct<'_>> = Vec::new();
    let mut index: HashMap<(Month, &ProductKey), usize> = HashMap::new();

    for (name, records) in sources {
        for record in records {
            let key = (record.month, &record.product);
            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    joined.push(JoinedProduct {
                        month: record.month,
                        product: record.product.clone(),
                        technology: record.technology,
                        ownership: record.ownership,
                        records: BTreeMap::new(),
                    });
                    index.insert(key, joined.len() - 1);
                    joined.len() - 1
                }
            };

            let entry = &mut joined[slot];
            if !entry.technology.is_ranked() && record.technology.is_ranked() {
                entry.technology = record.technology;
            }
            entry.records.entry(name.as_str()).or_insert(record);
        }
    }

    joined
}

/// Which side of the organic/managed split a component counts toward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Organic,
    Managed,
}

/// Output of a formula: named volumes, each on one side
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    parts: Vec<(String, Side, f64)>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn organic(mut self, name: impl Into<String>, volume: f64) -> Self {
        self.parts.push((name.into(), Side::Organic, volume));
        self
    }

    pub fn managed(mut self, name: impl Into<String>, volume: f64) -> Self {
        self.parts.push((name.into(), Side::Managed, volume));
        self
    }

    fn volume(&self, side: Side) -> f64 {
        self.parts
            .iter()
            .filter(|(_, s, _)| *s == side)
            .map(|(_, _, v)| v)
            .sum()
    }

    pub fn organic_volume(&self) -> f64 {
        self.volume(Side::Organic)
    }

    pub fn managed_volume(&self) -> f64 {
        self.volume(Side::Managed)
    }
}

/// Convert a percentage of a total into a whole count
pub fn percent_to_count(total: f64, percent: f64) -> f64 {
    (total * percent / 100.0).round()
}

/// Organic = hospital blogs + hospital news;
/// managed = general blogs + corporate news + cafe posts.
///
/// News category shares are converted to article counts first so every
/// component is a count on the same scale.
pub fn organic_managed(joined: &JoinedProduct<'_>) -> Composition {
    let blog = Dataset::Blog.name();
    let news = Dataset::NewsAnalysis.name();
    let cafe = Dataset::Cafe.name();

    let articles = joined.metric(news, field::TOTAL_ARTICLES);
    let hospital_news = percent_to_count(articles, joined.metric(news, field::HOSPITAL_NEWS_PCT));
    let corporate_news = percent_to_count(articles, joined.metric(news, field::CORPORATE_NEWS_PCT));

    Composition::new()
        .organic(
            component::HOSPITAL_BLOGS,
            joined.metric(blog, metric::HOSPITAL_POSTS),
        )
        .organic(component::HOSPITAL_NEWS, hospital_news)
        .managed(
            component::GENERAL_BLOGS,
            joined.metric(blog, metric::GENERAL_POSTS),
        )
        .managed(component::CORPORATE_NEWS, corporate_news)
        .managed(component::CAFE, joined.metric(cafe, field::POSTS))
}

/// Organic and managed percentages of a total
///
/// Managed is derived from organic so the pair always sums to 100 (or both
/// are zero for an empty total).
pub fn split_percent(organic: f64, total: f64, precision: u32) -> (f64, f64) {
    if total == 0.0 {
        return (0.0, 0.0);
    }
    let organic_percent = percentage(organic, total, precision);
    (organic_percent, round_to(100.0 - organic_percent, precision))
}

/// Applies formulas over joined sources
#[derive(Debug, Clone)]
pub struct Combiner {
    precision: u32,
}

impl Default for Combiner {
    fn default() -> Self {
        Self {
            precision: DEFAULT_COMPOSITE_PRECISION,
        }
    }
}

impl Combiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn combine<F>(&self, sources: &Sources, formula: F) -> Vec<CompositeMetricRecord>
    where
        F: Fn(&JoinedProduct<'_>) -> Composition,
    {
        let composites: Vec<CompositeMetricRecord> = join(sources)
            .iter()
            .map(|joined| self.compose(joined, formula(joined)))
            .collect();

        debug!(
            "Combined {} products from {} sources",
            composites.len(),
            sources.len()
        );
        composites
    }

    fn compose(&self, joined: &JoinedProduct<'_>, composition: Composition) -> CompositeMetricRecord {
        let organic_volume = composition.organic_volume();
        let managed_volume = composition.managed_volume();
        let total_volume = organic_volume + managed_volume;
        let (organic_percent, managed_percent) =
            split_percent(organic_volume, total_volume, self.precision);

        let mut components = BTreeMap::new();
        for (name, _, volume) in composition.parts {
            *components.entry(name).or_insert(0.0) += volume;
        }

        CompositeMetricRecord {
            month: joined.month,
            product: joined.product.clone(),
            technology: joined.technology,
            ownership: joined.ownership,
            components,
            organic_volume,
            managed_volume,
            total_volume,
            organic_percent,
            managed_percent,
            sources_present: joined.sources_present(),
        }
    }

    /// Own-brand versus named competitor totals
    ///
    /// Denylisted products are dropped first; products that are neither
    /// own-brand nor listed competitors are reported under `others`.
    pub fn summarize_groups(
        &self,
        records: &[CompositeMetricRecord],
        classifier: &ProductClassifier,
        competitors: &[String],
        denylist: &[String],
    ) -> GroupSummary {
        let listed = |list: &[String], product: &ProductKey| {
            list.iter().any(|p| p.trim() == product.as_str())
        };

        let mut own_brand = GroupAccumulator::default();
        let mut competitor_group = GroupAccumulator::default();
        let mut excluded = Vec::new();
        let mut others = Vec::new();

        for record in records {
            if listed(denylist, &record.product) {
                excluded.push(record.product.clone());
            } else if classifier.is_own_brand(&record.product) {
                own_brand.add(record);
            } else if listed(competitors, &record.product) {
                competitor_group.add(record);
            } else {
                others.push(record.product.clone());
            }
        }

        let own_brand = own_brand.finish(self.precision);
        let competitors = competitor_group.finish(self.precision);
        let gap = round_to(
            own_brand.organic_percent - competitors.organic_percent,
            self.precision,
        );

        GroupSummary {
            own_brand,
            competitors,
            gap,
            excluded,
            others,
        }
    }
}

/// Combine with whole-point percentages
pub fn combine<F>(sources: &Sources, formula: F) -> Vec<CompositeMetricRecord>
where
    F: Fn(&JoinedProduct<'_>) -> Composition,
{
    Combiner::default().combine(sources, formula)
}

/// Group summary with whole-point percentages
pub fn summarize_groups(
    records: &[CompositeMetricRecord],
    classifier: &ProductClassifier,
    competitors: &[String],
    denylist: &[String],
) -> GroupSummary {
    Combiner::default().summarize_groups(records, classifier, competitors, denylist)
}

/// Default denylist as owned strings
pub fn default_denylist() -> Vec<String> {
    DEFAULT_DENYLIST.iter().map(|p| p.to_string()).collect()
}

/// Default competitor set as owned strings
pub fn default_competitors() -> Vec<String> {
    DEFAULT_COMPETITORS.iter().map(|p| p.to_string()).collect()
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    products: Vec<ProductKey>,
    organic_volume: f64,
    managed_volume: f64,
    components: BTreeMap<String, f64>,
}

impl GroupAccumulator {
    fn add(&mut self, record: &CompositeMetricRecord) {
        self.products.push(record.product.clone());
        self.organic_volume += record.organic_volume;
        self.managed_volume += record.managed_volume;
        for (name, volume) in &record.components {
            *self.components.entry(name.clone()).or_insert(0.0) += volume;
        }
    }

    fn finish(self, precision: u32) -> GroupStats {
        let total_volume = self.organic_volume + self.managed_volume;
        let (organic_percent, managed_percent) =
            split_percent(self.organic_volume, total_volume, precision);
        GroupStats {
            products: self.products,
            organic_volume: self.organic_volume,
            managed_volume: self.managed_volume,
            total_volume,
            organic_percent,
            managed_percent,
            components: self.components,
        }
    }
}

/// Volume-weighted totals for one group of products
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub products: Vec<ProductKey>,
    pub organic_volume: f64,
    pub managed_volume: f64,
    pub total_volume: f64,
    pub organic_percent: f64,
    pub managed_percent: f64,
    pub components: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub own_brand: GroupStats,
    pub competitors: GroupStats,

    /// Own-brand organic % minus competitor organic %, in points
    pub gap: f64,

    pub excluded: Vec<ProductKey>,

    /// Products in neither group
    pub others: Vec<ProductKey>,
}

// =============================================================================
// Month over month
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthOverMonth {
    pub current: f64,
    pub previous: f64,
    pub change: f64,

    /// Zero when the previous value is zero
    pub change_percent: f64,

    pub trend: Trend,
}

pub fn month_over_month(current: f64, previous: f64) -> MonthOverMonth {
    let change = current - previous;
    let change_percent = if previous == 0.0 {
        0.0
    } else {
        round_to(change / previous * 100.0, CHANGE_PERCENT_PRECISION)
    };
    let trend = if change > 0.0 {
        Trend::Up
    } else if change < 0.0 {
        Trend::Down
    } else {
        Trend::Neutral
    };

    MonthOverMonth {
        current,
        previous,
        change,
        change_percent,
        trend,
    }
}

/// Change of one product's primary metric and rank between two months
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductChange {
    pub product: ProductKey,
    pub technology: Technology,
    pub rank: usize,
    pub previous_rank: Option<usize>,

    /// Positive when the product climbed
    pub rank_change: Option<i64>,

    pub value: MonthOverMonth,
}

/// Compare current records with the previous month's, product by product
pub fn compare_months(
    current: &[ProductMetricRecord],
    previous: &[ProductMetricRecord],
) -> Vec<ProductChange> {
    let previous: HashMap<&ProductKey, &ProductMetricRecord> =
        previous.iter().map(|r| (&r.product, r)).collect();

    current
        .iter()
        .map(|record| {
            let before = previous.get(&record.product);
            let previous_rank = before.map(|r| r.rank);
            ProductChange {
                product: record.product.clone(),
                technology: record.technology,
                rank: record.rank,
                previous_rank,
                rank_change: previous_rank.map(|p| p as i64 - record.rank as i64),
                value: month_over_month(
                    record.primary_value(),
                    before.map(|r| r.primary_value()).unwrap_or(0.0),
                ),
            }
        })
        .collect()
}

// =============================================================================
// Channel distribution and market overview
// =============================================================================

/// Own-brand presence in one channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelShare {
    pub channel: String,
    pub own_brand_volume: f64,
    pub market_volume: f64,

    /// Own-brand share of the channel's volume
    pub market_share: f64,

    /// Channel's share of the own-brand volume across channels
    pub distribution: f64,
}

/// Own-brand primary-metric volume per source, with shares
pub fn channel_distribution(sources: &Sources, precision: u32) -> Vec<ChannelShare> {
    let mut channels: Vec<ChannelShare> = sources
        .iter()
        .map(|(name, records)| {
            let market_volume: f64 = records.iter().map(ProductMetricRecord::primary_value).sum();
            let own_brand_volume: f64 = records
                .iter()
                .filter(|r| r.is_own_brand())
                .map(ProductMetricRecord::primary_value)
                .sum();
            ChannelShare {
                channel: name.clone(),
                own_brand_volume,
                market_volume,
                market_share: percentage(own_brand_volume, market_volume, precision),
                distribution: 0.0,
            }
        })
        .collect();

    let own_total: f64 = channels.iter().map(|c| c.own_brand_volume).sum();
    for channel in &mut channels {
        channel.distribution = percentage(channel.own_brand_volume, own_total, precision);
    }
    channels
}

/// Posts, engagement, sales and search for one technology category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPerformance {
    pub technology: Technology,
    pub product_count: usize,
    pub posts: f64,
    pub comments: f64,
    pub sales: f64,
    pub search_volume: f64,
    pub engagement: f64,
    pub market_share: f64,
    pub sales_share: f64,
}

/// Headline numbers across channels
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOverview {
    pub total_market_posts: f64,
    pub total_market_sales: f64,
    pub total_search_volume: f64,
    pub own_brand_posts: f64,
    pub own_brand_sales: f64,
    pub own_brand_market_share: f64,
    pub own_brand_sales_share: f64,
    pub average_engagement: f64,
    pub categories: Vec<CategoryPerformance>,
}

/// Posting channels counted as market volume
const POST_CHANNELS: [Dataset; 3] = [Dataset::Blog, Dataset::Cafe, Dataset::News];

fn sum_metric(items: &[&ProductMetricRecord], name: &str) -> f64 {
    items.iter().map(|r| r.metric(name)).sum()
}

fn sum_comments(items: &[&ProductMetricRecord]) -> f64 {
    sum_metric(items, field::COMMENTS) + sum_metric(items, field::REPLIES)
}

fn select<'a, P>(items: &[&'a ProductMetricRecord], predicate: P) -> Vec<&'a ProductMetricRecord>
where
    P: Fn(&ProductMetricRecord) -> bool,
{
    items.iter().copied().filter(|r| predicate(*r)).collect()
}

fn ratio(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        part / total
    }
}

/// Market-wide totals from the blog, cafe, news, sales and traffic sources
pub fn market_overview(sources: &Sources, precision: u32) -> MarketOverview {
    let records = |dataset: Dataset| -> Vec<&ProductMetricRecord> {
        sources
            .get(dataset.name())
            .map(|records| records.iter().collect())
            .unwrap_or_default()
    };
    let posts: Vec<&ProductMetricRecord> =
        POST_CHANNELS.iter().flat_map(|d| records(*d)).collect();
    let sales = records(Dataset::Sales);
    let traffic = records(Dataset::Traffic);

    let total_market_posts = sum_metric(&posts, field::POSTS);
    let total_market_sales = sum_metric(&sales, field::SALES);
    let total_search_volume = sum_metric(&traffic, field::SEARCH_VOLUME);

    let own_brand_posts = sum_metric(
        &select(&posts, ProductMetricRecord::is_own_brand),
        field::POSTS,
    );
    let own_brand_sales = sum_metric(
        &select(&sales, ProductMetricRecord::is_own_brand),
        field::SALES,
    );

    // Engagement only exists for blog and cafe
    let engaged = select(&posts, |r| r.metrics.contains_key(field::COMMENTS));
    let average_engagement = ratio(sum_comments(&engaged), sum_metric(&engaged, field::POSTS));

    let categories = Technology::RANKED
        .iter()
        .map(|&technology| {
            let in_category = |r: &ProductMetricRecord| r.technology == technology;
            let category_posts = select(&posts, in_category);
            let category_sales = select(&sales, in_category);
            let category_traffic = select(&traffic, in_category);

            let mut products: Vec<&ProductKey> = category_posts
                .iter()
                .chain(category_sales.iter())
                .chain(category_traffic.iter())
                .map(|r| &r.product)
                .collect();
            products.sort();
            products.dedup();

            let posts_total = sum_metric(&category_posts, field::POSTS);
            let comments = sum_comments(&category_posts);
            let sales_total = sum_metric(&category_sales, field::SALES);

            CategoryPerformance {
                technology,
                product_count: products.len(),
                posts: posts_total,
                comments,
                sales: sales_total,
                search_volume: sum_metric(&category_traffic, field::SEARCH_VOLUME),
                engagement: ratio(comments, posts_total),
                market_share: percentage(posts_total, total_market_posts, precision),
                sales_share: percentage(sales_total, total_market_sales, precision),
            }
        })
        .collect();

    MarketOverview {
        total_market_posts,
        total_market_sales,
        total_search_volume,
        own_brand_posts,
        own_brand_sales,
        own_brand_market_share: percentage(own_brand_posts, total_market_posts, precision),
        own_brand_sales_share: percentage(own_brand_sales, total_market_sales, precision),
        average_engagement,
        categories,
    }
}

// =============================================================================
// Content volume versus sales
// =============================================================================

/// Pearson correlation coefficient
///
/// `None` with fewer than two pairs or when either side has no variance.
pub fn pearson_correlation(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut covariance, mut variance_x, mut variance_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x == 0.0 || variance_y == 0.0 {
        return None;
    }
    Some(covariance / (variance_x.sqrt() * variance_y.sqrt()))
}

/// Sales per unit of content score, times 100
pub fn sales_efficiency(sales: f64, score: f64) -> Option<f64> {
    if score == 0.0 {
        None
    } else {
        Some(sales / score * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesEfficiency {
    pub product: ProductKey,
    pub technology: Technology,
    pub ownership: Ownership,
    pub sales: f64,
    pub score: f64,
    pub efficiency: Option<f64>,
}

/// Correlation within one technology category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCorrelation {
    pub technology: Technology,
    pub products: usize,
    pub coefficient: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesCorrelation {
    /// Content metric the score is taken from
    pub score_metric: String,

    /// Correlation between content score and sales over products in both
    pub coefficient: Option<f64>,

    /// Per-category correlations, for categories with more than two products
    pub categories: Vec<CategoryCorrelation>,
    pub products: Vec<SalesEfficiency>,

    /// Content products without published sales
    pub content_only: Vec<ProductKey>,
}

/// Smallest category that gets its own correlation
const MIN_CATEGORY_PRODUCTS: usize = 3;

/// Relate a content metric (e.g. video views) to sales, product by product
pub fn sales_correlation(
    sales: &[ProductMetricRecord],
    content: &[ProductMetricRecord],
    score_metric: &str,
    precision: u32,
) -> SalesCorrelation {
    let scores: HashMap<&ProductKey, f64> = content
        .iter()
        .map(|r| (&r.product, r.metric(score_metric)))
        .collect();

    let products: Vec<SalesEfficiency> = sales
        .iter()
        .filter_map(|record| {
            let score = *scores.get(&record.product)?;
            let sales = record.metric(field::SALES);
            Some(SalesEfficiency {
                product: record.product.clone(),
                technology: record.technology,
                ownership: record.ownership,
                sales,
                score,
                efficiency: sales_efficiency(sales, score).map(|e| round_to(e, precision)),
            })
        })
        .collect();

    let pairs = |technology: Option<Technology>| -> Vec<(f64, f64)> {
        products
            .iter()
            .filter(|p| technology.is_none_or(|t| p.technology == t))
            .map(|p| (p.score, p.sales))
            .collect()
    };

    let categories = [Technology::Rf, Technology::Hifu]
        .into_iter()
        .filter_map(|technology| {
            let matched = pairs(Some(technology));
            (matched.len() >= MIN_CATEGORY_PRODUCTS).then(|| CategoryCorrelation {
                technology,
                products: matched.len(),
                coefficient: pearson_correlation(&matched),
            })
        })
        .collect();

    let content_only = content
        .iter()
        .filter(|r| !sales.iter().any(|s| s.product == r.product))
        .map(|r| r.product.clone())
        .collect();

    debug!(
        "Correlating {} with sales over {} products",
        score_metric,
        products.len()
    );

    SalesCorrelation {
        score_metric: score_metric.to_string(),
        coefficient: pearson_correlation(&pairs(None)),
        categories,
        products,
        content_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{AggregationSpec, aggregate, spec_for};
    use crate::reader::read_str;

    fn month() -> Month {
        "2025-09".parse().unwrap()
    }

    fn load(dataset: Dataset, content: &str) -> Vec<ProductMetricRecord> {
        let spec = spec_for(dataset);
        let reader = read_str(content);
        let reader = if spec.carries_group_key() {
            reader.keep_blank_leading()
        } else {
            reader
        };
        aggregate(dataset.schema().apply(reader), &spec, month())
    }

    fn viral_sources() -> Sources {
        let blog = load(
            Dataset::Blog,
            "키워드,기기구분,블로그유형,총 개수\n\
             쿨페이즈,고주파,병원블로그,30\n\
             ,,일반블로그,50\n\
             덴서티,고주파,병원블로그,10\n\
             ,,일반블로그,90\n\
             올리지오,고주파,병원블로그,1000\n",
        );
        let news = load(
            Dataset::NewsAnalysis,
            "product_name,total_articles,category_병원발행,category_기업소식\n\
             쿨페이즈,20,50,50\n\
             덴서티,10,30,70\n",
        );
        let cafe = load(
            Dataset::Cafe,
            "키워드,그룹,총 발행량\n\
             쿨페이즈,고주파,0\n\
             덴서티,고주파,50\n\
             리프테라,초음파,40\n",
        );

        BTreeMap::from([
            (Dataset::Blog.name().to_string(), blog),
            (Dataset::NewsAnalysis.name().to_string(), news),
            (Dataset::Cafe.name().to_string(), cafe),
        ])
    }

    fn find<'a>(records: &'a [CompositeMetricRecord], product: &str) -> &'a CompositeMetricRecord {
        records
            .iter()
            .find(|r| r.product.as_str() == product)
            .unwrap_or_else(|| panic!("{} missing", product))
    }

    #[test]
    fn test_organic_managed_formula() {
        let composites = combine(&viral_sources(), organic_managed);

        let coolphase = find(&composites, "쿨페이즈");
        assert_eq!(coolphase.component(component::HOSPITAL_BLOGS), 30.0);
        assert_eq!(coolphase.component(component::HOSPITAL_NEWS), 10.0);
        assert_eq!(coolphase.organic_volume, 40.0);
        assert_eq!(coolphase.managed_volume, 60.0);
        assert_eq!(coolphase.organic_percent, 40.0);
        assert_eq!(coolphase.managed_percent, 60.0);

        let density = find(&composites, "덴서티");
        assert_eq!(density.component(component::HOSPITAL_NEWS), 3.0);
        assert_eq!(density.component(component::CORPORATE_NEWS), 7.0);
        assert_eq!(density.organic_volume, 13.0);
        assert_eq!(density.managed_volume, 147.0);
    }

    #[test]
    fn test_absent_product_contributes_zero() {
        let composites = combine(&viral_sources(), organic_managed);

        let liftera = find(&composites, "리프테라");
        assert_eq!(liftera.organic_volume, 0.0);
        assert_eq!(liftera.managed_volume, 40.0);
        assert_eq!(liftera.organic_percent, 0.0);
        assert_eq!(liftera.managed_percent, 100.0);
        assert_eq!(liftera.sources_present, vec!["cafe".to_string()]);
    }

    #[test]
    fn test_conservation_invariant() {
        for record in combine(&viral_sources(), organic_managed) {
            assert_eq!(record.organic_volume + record.managed_volume, record.total_volume);
            if record.total_volume > 0.0 {
                assert_eq!(record.organic_percent + record.managed_percent, 100.0);
            }
        }
    }

    #[test]
    fn test_join_order_follows_source_names() {
        let products: Vec<String> = join(&viral_sources())
            .iter()
            .map(|j| j.product.to_string())
            .collect();
        // Blog records come ranked; "blog" < "cafe" < "news_analysis"
        assert_eq!(products, vec!["올리지오", "덴서티", "쿨페이즈", "리프테라"]);
    }

    #[test]
    fn test_zero_total_composite() {
        let sources = BTreeMap::from([(
            "cafe".to_string(),
            load(Dataset::Cafe, "키워드,그룹,총 발행량\n쿨소닉,초음파,0\n"),
        )]);
        let composites = combine(&sources, organic_managed);
        assert_eq!(composites[0].organic_percent, 0.0);
        assert_eq!(composites[0].managed_percent, 0.0);
    }

    #[test]
    fn test_custom_formula() {
        let sources = viral_sources();
        let composites = combine(&sources, |joined| {
            Composition::new()
                .organic("cafe_posts", joined.metric("cafe", field::POSTS))
                .managed("nothing", 0.0)
        });
        assert_eq!(find(&composites, "덴서티").organic_percent, 100.0);
    }

    #[test]
    fn test_summarize_groups_applies_denylist() {
        let composites = combine(&viral_sources(), organic_managed);
        let classifier = ProductClassifier::new();

        let summary = summarize_groups(
            &composites,
            &classifier,
            &default_competitors(),
            &default_denylist(),
        );
        assert_eq!(summary.excluded, vec![ProductKey::new("올리지오")]);
        assert!(summary.others.is_empty());

        // 쿨페이즈 40/100 + 리프테라 0/40
        assert_eq!(summary.own_brand.organic_volume, 40.0);
        assert_eq!(summary.own_brand.total_volume, 140.0);
        assert_eq!(summary.own_brand.organic_percent, 29.0);
        assert_eq!(summary.own_brand.managed_percent, 71.0);

        // 덴서티 13/160
        assert_eq!(summary.competitors.products, vec![ProductKey::new("덴서티")]);
        assert_eq!(summary.competitors.organic_percent, 8.0);
        assert_eq!(summary.gap, 21.0);

        let competitors = vec!["덴서티".to_string(), "올리지오".to_string()];
        let unfiltered = summarize_groups(&composites, &classifier, &competitors, &[]);
        assert!(unfiltered.excluded.is_empty());
        assert_eq!(unfiltered.competitors.products.len(), 2);

        // Denylist wins over the competitor list
        let filtered =
            summarize_groups(&composites, &classifier, &competitors, &default_denylist());
        assert_eq!(filtered.competitors.products, vec![ProductKey::new("덴서티")]);
    }

    #[test]
    fn test_summarize_groups_only_named_competitors() {
        let blog = load(
            Dataset::Blog,
            "키워드,기기구분,블로그유형,총 개수\n\
             쿨페이즈,고주파,병원블로그,50\n\
             ,,일반블로그,50\n\
             덴서티,고주파,병원블로그,10\n\
             ,,일반블로그,90\n\
             써마지,고주파,병원블로그,900\n\
             ,,일반블로그,100\n\
             울쎄라,초음파,병원블로그,500\n",
        );
        let sources = BTreeMap::from([(Dataset::Blog.name().to_string(), blog)]);
        let composites = combine(&sources, organic_managed);

        let summary = summarize_groups(
            &composites,
            &ProductClassifier::new(),
            &default_competitors(),
            &default_denylist(),
        );

        assert_eq!(summary.own_brand.organic_percent, 50.0);
        assert_eq!(summary.competitors.products, vec![ProductKey::new("덴서티")]);
        assert_eq!(summary.competitors.organic_percent, 10.0);
        assert_eq!(summary.gap, 40.0);

        let mut others: Vec<&str> = summary.others.iter().map(ProductKey::as_str).collect();
        others.sort();
        assert_eq!(others, vec!["써마지", "울쎄라"]);
    }

    #[test]
    fn test_month_over_month() {
        let up = month_over_month(120.0, 100.0);
        assert_eq!(up.change, 20.0);
        assert_eq!(up.change_percent, 20.0);
        assert_eq!(up.trend, Trend::Up);

        let down = month_over_month(2.0, 3.0);
        assert_eq!(down.change_percent, -33.3);
        assert_eq!(down.trend, Trend::Down);

        let from_zero = month_over_month(5.0, 0.0);
        assert_eq!(from_zero.change_percent, 0.0);
        assert_eq!(from_zero.trend, Trend::Up);

        assert_eq!(month_over_month(7.0, 7.0).trend, Trend::Neutral);
    }

    #[test]
    fn test_compare_months() {
        let spec = AggregationSpec::new(field::KEYWORD, field::POSTS).with_sum(field::POSTS);
        let current = aggregate(read_str("keyword,posts\n쿨페이즈,50\n써마지,40\n"), &spec, month());
        let previous = aggregate(read_str("keyword,posts\n써마지,60\n쿨페이즈,30\n"), &spec, month());

        let changes = compare_months(&current, &previous);
        let coolphase = changes.iter().find(|c| c.product.as_str() == "쿨페이즈").unwrap();
        assert_eq!(coolphase.rank, 1);
        assert_eq!(coolphase.previous_rank, Some(2));
        assert_eq!(coolphase.rank_change, Some(1));
        assert_eq!(coolphase.value.change, 20.0);
    }

    #[test]
    fn test_channel_distribution() {
        let sources = viral_sources();
        let channels = channel_distribution(&sources, 1);

        let cafe = channels.iter().find(|c| c.channel == "cafe").unwrap();
        assert_eq!(cafe.own_brand_volume, 40.0);
        assert_eq!(cafe.market_volume, 90.0);
        assert_eq!(cafe.market_share, 44.4);

        let distribution: f64 = channels.iter().map(|c| c.distribution).sum();
        assert!((distribution - 100.0).abs() <= 0.5);
    }

    #[test]
    fn test_market_overview() {
        let blog = load(
            Dataset::Blog,
            "키워드,기기구분,블로그유형,총 개수,댓글 총 개수,대댓글 총 개수\n\
             쿨페이즈,고주파,병원블로그,40,4,0\n\
             써마지,고주파,병원블로그,60,6,2\n",
        );
        let sales = load(
            Dataset::Sales,
            "키워드,그룹,총 판매량\n쿨페이즈,고주파,10\n울쎄라,초음파,30\n",
        );
        let traffic = load(Dataset::Traffic, "키워드,그룹,월간 검색량\n써마지,고주파,500\n");
        let sources = BTreeMap::from([
            ("blog".to_string(), blog),
            ("sales".to_string(), sales),
            ("traffic".to_string(), traffic),
        ]);

        let overview = market_overview(&sources, 1);
        assert_eq!(overview.total_market_posts, 100.0);
        assert_eq!(overview.own_brand_market_share, 40.0);
        assert_eq!(overview.total_market_sales, 40.0);
        assert_eq!(overview.own_brand_sales_share, 25.0);
        assert_eq!(overview.total_search_volume, 500.0);
        assert_eq!(overview.average_engagement, 0.12);

        let rf = &overview.categories[0];
        assert_eq!(rf.technology, Technology::Rf);
        assert_eq!(rf.product_count, 2);
        assert_eq!(rf.sales_share, 25.0);
        let hifu = &overview.categories[1];
        assert_eq!(hifu.posts, 0.0);
        assert_eq!(hifu.sales, 30.0);
    }

    #[test]
    fn test_pearson_correlation() {
        let perfect = pearson_correlation(&[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]).unwrap();
        assert!((perfect - 1.0).abs() < 1e-12);

        let inverse = pearson_correlation(&[(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)]).unwrap();
        assert!((inverse + 1.0).abs() < 1e-12);

        assert_eq!(pearson_correlation(&[(1.0, 1.0)]), None);
        assert_eq!(pearson_correlation(&[(1.0, 1.0), (1.0, 2.0)]), None);
    }

    #[test]
    fn test_sales_correlation_uses_views() {
        let sales = load(
            Dataset::Sales,
            "키워드,그룹,총 판매량\n쿨페이즈,고주파,100\n써마지,고주파,300\n울쎄라,초음파,50\n",
        );
        // Video counts run against sales; views track them
        let youtube = load(
            Dataset::Youtube,
            "키워드,그룹,총 발행량,총 조회수\n\
             쿨페이즈,고주파,90,1000\n\
             써마지,고주파,10,3000\n\
             인모드,고주파,40,800\n",
        );

        let correlation = sales_correlation(&sales, &youtube, field::VIEWS, 1);
        assert_eq!(correlation.score_metric, "views");
        assert_eq!(correlation.products.len(), 2);
        assert_eq!(correlation.products[0].product.as_str(), "써마지");
        assert_eq!(correlation.products[0].score, 3000.0);
        assert_eq!(correlation.products[0].efficiency, Some(10.0));
        assert!((correlation.coefficient.unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(correlation.content_only, vec![ProductKey::new("인모드")]);

        let by_posts = sales_correlation(&sales, &youtube, field::POSTS, 1);
        assert!((by_posts.coefficient.unwrap() + 1.0).abs() < 1e-12);

        assert_eq!(sales_efficiency(10.0, 0.0), None);
    }

    #[test]
    fn test_sales_correlation_per_category() {
        let sales = load(
            Dataset::Sales,
            "키워드,그룹,총 판매량\n\
             쿨페이즈,고주파,10\n\
             써마지,고주파,20\n\
             덴서티,고주파,30\n\
             울쎄라,초음파,50\n\
             쿨소닉,초음파,5\n",
        );
        let youtube = load(
            Dataset::Youtube,
            "키워드,그룹,총 발행량,총 조회수\n\
             쿨페이즈,고주파,1,100\n\
             써마지,고주파,1,200\n\
             덴서티,고주파,1,300\n\
             울쎄라,초음파,1,100\n\
             쿨소닉,초음파,1,900\n",
        );

        let correlation = sales_correlation(&sales, &youtube, field::VIEWS, 1);
        // HIFU has only two matched products
        assert_eq!(correlation.categories.len(), 1);
        let rf = &correlation.categories[0];
        assert_eq!(rf.technology, Technology::Rf);
        assert_eq!(rf.products, 3);
        assert!((rf.coefficient.unwrap() - 1.0).abs() < 1e-12);
        assert!(correlation.coefficient.unwrap() < 0.0);
        assert!(correlation.content_only.is_empty());
    }
}
