//! Configuration management and validation.
//!
//! Settings are layered: built-in defaults, then an optional JSON file,
//! then the `ASTERASYS_DATA_ROOT` environment variable, then command-line
//! flags.

use crate::aggregator::DatasetLoader;
use crate::classifier::{ClassifierOverrides, ProductClassifier};
use crate::combiner::{Combiner, default_competitors, default_denylist};
use crate::constants::{
    DATA_ROOT_ENV, DEFAULT_COMPOSITE_PRECISION, DEFAULT_LEADERBOARD_SIZE, DEFAULT_SHARE_PRECISION,
};
use crate::error::{MetricsError, Result};
use crate::formatter::{FormatShape, PercentStyle};
use crate::month::{DataLayout, MonthResolver};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Largest accepted number of decimal places
const MAX_PRECISION: u32 = 6;

/// Global configuration for metrics reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Project root holding `data/` and `config/`
    pub data_root: PathBuf,

    /// Decimal places for shares and other percentages
    pub share_precision: u32,

    /// Decimal places for organic/managed percentages
    pub composite_precision: u32,

    pub percent_style: PercentStyle,

    /// Entries per category leaderboard
    pub leaderboard_size: usize,

    /// Products left out of own-brand/competitor group summaries
    pub denylist: Vec<String>,

    /// Products compared against the own brand in group summaries
    pub competitor_products: Vec<String>,

    /// Extra classifier entries layered over the built-in tables
    pub classifier: ClassifierOverrides,

    /// Use the latest month when the requested one is malformed
    pub fallback_to_latest: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            share_precision: DEFAULT_SHARE_PRECISION,
            composite_precision: DEFAULT_COMPOSITE_PRECISION,
            percent_style: PercentStyle::Number,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            denylist: default_denylist(),
            competitor_products: default_competitors(),
            classifier: ClassifierOverrides::default(),
            fallback_to_latest: true,
        }
    }
}

impl MetricsConfig {
    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self
    }

    pub fn with_share_precision(mut self, precision: u32) -> Self {
        self.share_precision = precision;
        self
    }

    pub fn with_percent_style(mut self, style: PercentStyle) -> Self {
        self.percent_style = style;
        self
    }

    pub fn with_leaderboard_size(mut self, size: usize) -> Self {
        self.leaderboard_size = size;
        self
    }

    pub fn with_denylist(mut self, denylist: Vec<String>) -> Self {
        self.denylist = denylist;
        self
    }

    pub fn with_competitor_products(mut self, products: Vec<String>) -> Self {
        self.competitor_products = products;
        self
    }

    pub fn with_classifier_overrides(mut self, overrides: ClassifierOverrides) -> Self {
        self.classifier = overrides;
        self
    }

    /// Reject malformed month requests instead of using the latest month
    pub fn without_fallback(mut self) -> Self {
        self.fallback_to_latest = false;
        self
    }

    /// Read a JSON configuration file; absent keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(MetricsError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| MetricsError::Configuration {
            message: format!("Invalid config file {}: {}", path.display(), e),
        })
    }

    /// Defaults, then file, then environment, then explicit data root
    pub fn load_layered(config_file: Option<&Path>, data_root: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => {
                info!("Using config file: {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        config.apply_overrides(std::env::var_os(DATA_ROOT_ENV), data_root);
        config.validate()?;

        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    fn apply_overrides(&mut self, env_root: Option<OsString>, arg_root: Option<PathBuf>) {
        if let Some(root) = env_root.filter(|r| !r.is_empty()) {
            debug!("{} overrides data root", DATA_ROOT_ENV);
            self.data_root = PathBuf::from(root);
        }
        if let Some(root) = arg_root {
            self.data_root = root;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.share_precision > MAX_PRECISION || self.composite_precision > MAX_PRECISION {
            return Err(MetricsError::Configuration {
                message: format!("Precision must be between 0 and {}", MAX_PRECISION),
            });
        }

        if self.leaderboard_size == 0 {
            return Err(MetricsError::Configuration {
                message: "Leaderboard size must be at least 1".to_string(),
            });
        }

        if self.denylist.iter().any(|p| p.trim().is_empty()) {
            return Err(MetricsError::Configuration {
                message: "Denylist entries must not be blank".to_string(),
            });
        }

        if self.competitor_products.iter().any(|p| p.trim().is_empty()) {
            return Err(MetricsError::Configuration {
                message: "Competitor entries must not be blank".to_string(),
            });
        }

        Ok(())
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_root)
    }

    pub fn resolver(&self, layout: &DataLayout) -> MonthResolver {
        let resolver = MonthResolver::new(layout.clone());
        if self.fallback_to_latest {
            resolver
        } else {
            resolver.without_fallback()
        }
    }

    pub fn classifier(&self) -> ProductClassifier {
        if self.classifier.is_empty() {
            ProductClassifier::default()
        } else {
            ProductClassifier::with_overrides(&self.classifier)
        }
    }

    pub fn format_shape(&self) -> FormatShape {
        FormatShape::default()
            .with_leaderboard_size(self.leaderboard_size)
            .with_precision(self.share_precision)
            .with_percent_style(self.percent_style)
    }

    pub fn loader(&self, layout: &DataLayout) -> DatasetLoader {
        DatasetLoader::new(layout.clone())
            .with_classifier(self.classifier())
            .with_share_precision(self.share_precision)
    }

    pub fn combiner(&self) -> Combiner {
        Combiner::new().with_precision(self.composite_precision)
    }
}
