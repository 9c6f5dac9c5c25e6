//! Aggregation presets for the monthly exports and loading from disk.

use super::{AggregationSpec, Aggregator, Pivot};
use crate::classifier::ProductClassifier;
use crate::constants::{DEFAULT_SHARE_PRECISION, blog_types};
use crate::error::{MetricsError, Result};
use crate::models::{Month, ProductMetricRecord};
use crate::month::DataLayout;
use crate::reader::read;
use crate::schema::{Dataset, field};
use tracing::{debug, info, warn};

/// Metric names produced by presets beyond the canonical fields
pub mod metric {
    pub const HOSPITAL_POSTS: &str = "hospital_posts";
    pub const GENERAL_POSTS: &str = "general_posts";
    pub const PLACE_POSTS: &str = "place_posts";
}

/// Canonical aggregation for a dataset
pub fn spec_for(dataset: Dataset) -> AggregationSpec {
    let base = |primary: &str| {
        AggregationSpec::new(field::KEYWORD, primary).with_category_column(field::CATEGORY)
    };

    match dataset {
        // One row per (keyword, blog type); keyword and category only on the first
        Dataset::Blog => base(field::POSTS)
            .with_carry_forward(field::KEYWORD)
            .with_carry_forward(field::CATEGORY)
            .with_sum_as(field::TYPE_COUNT, field::POSTS)
            .with_sum(field::COMMENTS)
            .with_sum(field::REPLIES)
            .with_pivot(
                Pivot::new(field::BLOG_TYPE, field::TYPE_COUNT)
                    .bucket(blog_types::HOSPITAL, metric::HOSPITAL_POSTS)
                    .bucket(blog_types::GENERAL, metric::GENERAL_POSTS)
                    .bucket(blog_types::PLACE, metric::PLACE_POSTS),
            ),
        Dataset::Cafe => base(field::POSTS)
            .with_sum(field::POSTS)
            .with_sum(field::COMMENTS)
            .with_sum(field::REPLIES)
            .with_sum(field::VIEWS),
        Dataset::News => base(field::POSTS).with_sum(field::POSTS),
        // Percentages describe one row each; duplicate rows must not add up
        Dataset::NewsAnalysis => base(field::TOTAL_ARTICLES)
            .with_first(field::TOTAL_ARTICLES)
            .with_first(field::HOSPITAL_NEWS_PCT)
            .with_first(field::CORPORATE_NEWS_PCT),
        Dataset::Youtube => base(field::POSTS)
            .with_sum(field::POSTS)
            .with_sum(field::VIEWS)
            .with_sum(field::LIKES)
            .with_sum(field::COMMENTS),
        Dataset::Sales => base(field::SALES)
            .with_sum(field::SALES)
            .with_sum(field::MONTHLY_SALES),
        Dataset::Traffic => base(field::SEARCH_VOLUME).with_sum(field::SEARCH_VOLUME),
    }
}

/// Reads a month's raw exports and aggregates them with the presets
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    layout: DataLayout,
    aggregator: Aggregator,
    share_precision: u32,
}

impl DatasetLoader {
    pub fn new(layout: DataLayout) -> Self {
        Self {
            layout,
            aggregator: Aggregator::default(),
            share_precision: DEFAULT_SHARE_PRECISION,
        }
    }

    pub fn with_classifier(mut self, classifier: ProductClassifier) -> Self {
        self.aggregator = Aggregator::new(classifier);
        self
    }

    pub fn with_share_precision(mut self, precision: u32) -> Self {
        self.share_precision = precision;
        self
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn spec(&self, dataset: Dataset) -> AggregationSpec {
        spec_for(dataset).with_share_precision(self.share_precision)
    }

    /// Aggregate one dataset; a missing export is an error naming its path
    pub fn load(&self, month: &Month, dataset: Dataset) -> Result<Vec<ProductMetricRecord>> {
        let path = self.layout.raw_file(month, dataset.file_name());
        let spec = self.spec(dataset);
        let schema = dataset.schema();

        let mut reader = read(&path)?;
        if spec.carries_group_key() {
            reader = reader.keep_blank_leading();
        }
        let mut reader = schema.apply(reader);

        let missing = schema.missing_fields(reader.headers());
        if !missing.is_empty() {
            debug!("{} export lacks columns {:?}, treating them as 0", dataset, missing);
        }

        let records = self.aggregator.aggregate(reader.by_ref(), &spec, *month);

        if reader.rows_skipped() > 0 {
            warn!(
                "Skipped {} unreadable rows in {}",
                reader.rows_skipped(),
                path.display()
            );
        }
        info!("Loaded {} products from {} for {}", records.len(), dataset, month);

        Ok(records)
    }

    /// Like [`load`](Self::load) but a missing export yields `None`
    pub fn load_optional(
        &self,
        month: &Month,
        dataset: Dataset,
    ) -> Result<Option<Vec<ProductMetricRecord>>> {
        match self.load(month, dataset) {
            Ok(records) => Ok(Some(records)),
            Err(MetricsError::FileNotFound { path }) => {
                debug!("Optional {} export absent at {}", dataset, path.display());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Aggregate one dataset with the default classifier and precision
pub fn load_dataset(
    layout: &DataLayout,
    month: &Month,
    dataset: Dataset,
) -> Result<Vec<ProductMetricRecord>> {
    DatasetLoader::new(layout.clone()).load(month, dataset)
}
