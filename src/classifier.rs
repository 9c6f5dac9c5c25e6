//! Product classification.
//!
//! Maps a product keyword to its technology category and ownership using
//! fixed tables. Unknown keywords land in [`Technology::Unclassified`]
//! instead of failing, so one unexpected keyword never breaks a report.

use crate::constants::{HIFU_LABELS, HIFU_PRODUCTS, OWN_BRAND_PRODUCTS, RF_LABELS, RF_PRODUCTS};
use crate::models::{Ownership, ProductKey, Technology};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Result of classifying one product keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub technology: Technology,
    pub ownership: Ownership,
}

impl Classification {
    pub fn is_own_brand(&self) -> bool {
        self.ownership.is_own_brand()
    }
}

/// Extra entries layered over the built-in tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierOverrides {
    #[serde(default)]
    pub rf: Vec<String>,
    #[serde(default)]
    pub hifu: Vec<String>,
    #[serde(default)]
    pub own_brand: Vec<String>,
}

impl ClassifierOverrides {
    pub fn is_empty(&self) -> bool {
        self.rf.is_empty() && self.hifu.is_empty() && self.own_brand.is_empty()
    }
}

impl Technology {
    /// Interpret a category label from a source column
    pub fn from_label(label: &str) -> Option<Technology> {
        let label = label.trim();
        if RF_LABELS.contains(&label) {
            Some(Technology::Rf)
        } else if HIFU_LABELS.contains(&label) {
            Some(Technology::Hifu)
        } else {
            None
        }
    }
}

/// Static product lookup
#[derive(Debug, Clone)]
pub struct ProductClassifier {
    technology: HashMap<String, Technology>,
    own_brand: HashSet<String>,
}

impl Default for ProductClassifier {
    fn default() -> Self {
        let mut technology = HashMap::new();
        for product in RF_PRODUCTS {
            technology.insert(product.to_string(), Technology::Rf);
        }
        for product in HIFU_PRODUCTS {
            technology.insert(product.to_string(), Technology::Hifu);
        }

        Self {
            technology,
            own_brand: OWN_BRAND_PRODUCTS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ProductClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in tables plus configured extras
    pub fn with_overrides(overrides: &ClassifierOverrides) -> Self {
        let mut classifier = Self::default();
        for product in &overrides.rf {
            classifier
                .technology
                .insert(product.trim().to_string(), Technology::Rf);
        }
        for product in &overrides.hifu {
            classifier
                .technology
                .insert(product.trim().to_string(), Technology::Hifu);
        }
        classifier
            .own_brand
            .extend(overrides.own_brand.iter().map(|p| p.trim().to_string()));
        classifier
    }

    pub fn classify(&self, key: &ProductKey) -> Classification {
        Classification {
            technology: self.technology(key),
            ownership: self.ownership(key),
        }
    }

    /// Classify, preferring a category label carried by the source row
    pub fn classify_with_label(&self, key: &ProductKey, label: Option<&str>) -> Classification {
        let mut classification = self.classify(key);
        if let Some(technology) = label.and_then(Technology::from_label) {
            classification.technology = technology;
        }
        classification
    }

    pub fn technology(&self, key: &ProductKey) -> Technology {
        self.technology
            .get(key.as_str())
            .copied()
            .unwrap_or(Technology::Unclassified)
    }

    pub fn ownership(&self, key: &ProductKey) -> Ownership {
        if self.own_brand.contains(key.as_str()) {
            Ownership::OwnBrand
        } else {
            Ownership::Competitor
        }
    }

    pub fn is_own_brand(&self, key: &ProductKey) -> bool {
        self.ownership(key).is_own_brand()
    }

    /// Own-brand keywords in table order
    pub fn own_brand_products(&self) -> Vec<ProductKey> {
        let mut products: Vec<ProductKey> = OWN_BRAND_PRODUCTS
            .iter()
            .map(|p| ProductKey::new(p))
            .collect();
        let mut extras: Vec<&String> = self
            .own_brand
            .iter()
            .filter(|p| !OWN_BRAND_PRODUCTS.contains(&p.as_str()))
            .collect();
        extras.sort();
        products.extend(extras.into_iter().map(ProductKey::new));
        products
    }

    /// Every known keyword for a technology, sorted
    pub fn products_in(&self, technology: Technology) -> Vec<ProductKey> {
        let mut products: Vec<ProductKey> = self
            .technology
            .iter()
            .filter(|(_, t)| **t == technology)
            .map(|(p, _)| ProductKey::new(p))
            .collect();
        products.sort();
        products
    }
}
