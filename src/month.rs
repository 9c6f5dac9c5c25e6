//! Month resolution and the month-scoped directory layout.
//!
//! Every request works on one `YYYY-MM` partition. This module decides
//! which month that is (explicit request, else the persisted latest month)
//! and reports which of the month's data directories exist.
//!
//! ```text
//! <root>/
//!   config/latest-month.json
//!   data/
//!     raw/<month>/*.csv
//!     raw/generated/<month>/*.csv
//!     processed/<month>/*.json
//!     processed/youtube/<month>/*.json
//! ```

use crate::constants::{
    CONFIG_DIR_NAME, DATA_DIR_NAME, GENERATED_DIR_NAME, LATEST_MONTH_FILE, PROCESSED_DIR_NAME,
    RAW_DIR_NAME, YOUTUBE_DIR_NAME,
};
use crate::error::{MetricsError, Result};
use crate::models::Month;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Month-scoped data trees that a request may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataSubset {
    Raw,
    Processed,
    Generated,
    YoutubeProcessed,
}

impl DataSubset {
    pub fn name(&self) -> &'static str {
        match self {
            DataSubset::Raw => "raw",
            DataSubset::Processed => "processed",
            DataSubset::Generated => "generated",
            DataSubset::YoutubeProcessed => "youtubeProcessed",
        }
    }
}

impl fmt::Display for DataSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A required subset whose directory does not exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingSubset {
    #[serde(rename = "type")]
    pub subset: DataSubset,
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct LatestMonthFile {
    month: String,
}

/// Directory convention rooted at the project directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Base directory holding one folder per month for a subset
    pub fn subset_base(&self, subset: DataSubset) -> PathBuf {
        let data = self.root.join(DATA_DIR_NAME);
        match subset {
            DataSubset::Raw => data.join(RAW_DIR_NAME),
            DataSubset::Processed => data.join(PROCESSED_DIR_NAME),
            DataSubset::Generated => data.join(RAW_DIR_NAME).join(GENERATED_DIR_NAME),
            DataSubset::YoutubeProcessed => data.join(PROCESSED_DIR_NAME).join(YOUTUBE_DIR_NAME),
        }
    }

    pub fn month_dir(&self, subset: DataSubset, month: &Month) -> PathBuf {
        self.subset_base(subset).join(month.to_string())
    }

    /// Path of a raw export for a month
    pub fn raw_file(&self, month: &Month, file_name: &str) -> PathBuf {
        self.month_dir(DataSubset::Raw, month).join(file_name)
    }

    pub fn latest_month_path(&self) -> PathBuf {
        self.root.join(CONFIG_DIR_NAME).join(LATEST_MONTH_FILE)
    }

    /// Months that have a directory under the subset base, sorted ascending
    pub fn available_months(&self, subset: DataSubset) -> Vec<Month> {
        let base = self.subset_base(subset);
        if !base.is_dir() {
            debug!("No {} directory at {}", subset, base.display());
            return Vec::new();
        }

        let mut months = Vec::new();
        for entry in WalkDir::new(&base).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to list month directories under {}: {}", base.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            if let Some(month) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<Month>().ok())
            {
                months.push(month);
            }
        }

        months.sort();
        months
    }

    /// Month recorded in latest-month.json, if present and valid
    pub fn latest_month(&self) -> Option<Month> {
        let path = self.latest_month_path();
        if !path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<LatestMonthFile>(&content) {
            Ok(file) => match file.month.parse::<Month>() {
                Ok(month) => Some(month),
                Err(_) => {
                    warn!("Ignoring invalid month '{}' in {}", file.month, path.display());
                    None
                }
            },
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist the default month
    pub fn set_latest_month(&self, month: &Month) -> Result<()> {
        let path = self.latest_month_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_string_pretty(&LatestMonthFile {
            month: month.to_string(),
        })?;
        fs::write(&path, body)?;
        info!("Latest month set to {}", month);
        Ok(())
    }

    /// Create the output directories used by snapshot runs
    pub fn ensure_month_directories(&self, month: &Month) -> Result<()> {
        for subset in [
            DataSubset::Processed,
            DataSubset::Generated,
            DataSubset::YoutubeProcessed,
        ] {
            fs::create_dir_all(self.month_dir(subset, month))?;
        }
        Ok(())
    }
}

/// Outcome of month resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthResolution {
    pub month: Month,
    pub requested: Option<String>,

    /// True when the latest month was substituted for the request
    pub fell_back: bool,

    /// Whether the month is among the known raw months
    pub available: bool,

    pub satisfied: bool,
    pub missing: Vec<MissingSubset>,
    pub paths: BTreeMap<DataSubset, PathBuf>,
}

impl MonthResolution {
    /// Turn unsatisfied requirements into a hard error
    pub fn require(self) -> Result<Self> {
        if self.satisfied {
            Ok(self)
        } else {
            Err(MetricsError::MonthDirectoryMissing {
                month: self.month.to_string(),
                missing: self.missing,
            })
        }
    }

    pub fn path(&self, subset: DataSubset) -> Option<&Path> {
        self.paths.get(&subset).map(PathBuf::as_path)
    }
}

/// Chooses the month for a request
#[derive(Debug, Clone)]
pub struct MonthResolver {
    layout: DataLayout,
    fallback_to_latest: bool,
}

impl MonthResolver {
    pub fn new(layout: DataLayout) -> Self {
        Self {
            layout,
            fallback_to_latest: true,
        }
    }

    /// Reject invalid or absent requests instead of using the latest month
    pub fn without_fallback(mut self) -> Self {
        self.fallback_to_latest = false;
        self
    }

    pub fn resolve(
        &self,
        requested: Option<&str>,
        available: &[Month],
        latest: Option<Month>,
        required: &[DataSubset],
    ) -> Result<MonthResolution> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());

        let (month, fell_back) = match requested.map(str::parse::<Month>) {
            Some(Ok(month)) => (month, false),
            Some(Err(e)) => {
                if !self.fallback_to_latest {
                    return Err(e);
                }
                match latest {
                    Some(latest) => {
                        warn!(
                            "Invalid month '{}' requested, using latest month {}",
                            requested.unwrap_or_default(),
                            latest
                        );
                        (latest, true)
                    }
                    None => return Err(e),
                }
            }
            None => match latest.filter(|_| self.fallback_to_latest) {
                Some(latest) => (latest, true),
                None => return Err(MetricsError::NoMonth),
            },
        };

        let mut paths = BTreeMap::new();
        let mut missing = Vec::new();
        for &subset in required {
            let path = self.layout.month_dir(subset, &month);
            if !path.is_dir() {
                missing.push(MissingSubset {
                    subset,
                    path: path.clone(),
                });
            }
            paths.insert(subset, path);
        }

        debug!(
            "Resolved month {} (fell back: {}, missing: {})",
            month,
            fell_back,
            missing.len()
        );

        Ok(MonthResolution {
            month,
            requested: requested.map(str::to_string),
            fell_back,
            available: available.contains(&month),
            satisfied: missing.is_empty(),
            missing,
            paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn month(value: &str) -> Month {
        value.parse().unwrap()
    }

    fn layout_with_raw(months: &[&str]) -> (TempDir, DataLayout) {
        let temp_dir = TempDir::new().unwrap();
        let layout = DataLayout::new(temp_dir.path());
        for m in months {
            fs::create_dir_all(layout.month_dir(DataSubset::Raw, &month(m))).unwrap();
        }
        (temp_dir, layout)
    }

    #[test]
    fn test_layout_paths() {
        let layout = DataLayout::new("/project");
        let m = month("2025-09");

        assert_eq!(
            layout.month_dir(DataSubset::Raw, &m),
            PathBuf::from("/project/data/raw/2025-09")
        );
        assert_eq!(
            layout.month_dir(DataSubset::Generated, &m),
            PathBuf::from("/project/data/raw/generated/2025-09")
        );
        assert_eq!(
            layout.month_dir(DataSubset::YoutubeProcessed, &m),
            PathBuf::from("/project/data/processed/youtube/2025-09")
        );
        assert_eq!(
            layout.latest_month_path(),
            PathBuf::from("/project/config/latest-month.json")
        );
    }

    #[test]
    fn test_available_months_sorted_and_filtered() {
        let (temp_dir, layout) = layout_with_raw(&["2025-09", "2025-08"]);
        let raw = layout.subset_base(DataSubset::Raw);
        fs::create_dir_all(raw.join("generated")).unwrap();
        fs::write(raw.join("2025-10"), "not a directory").unwrap();

        let months = layout.available_months(DataSubset::Raw);
        assert_eq!(months, vec![month("2025-08"), month("2025-09")]);
        drop(temp_dir);
    }

    #[test]
    fn test_latest_month_round_trip() {
        let (_temp_dir, layout) = layout_with_raw(&[]);
        assert_eq!(layout.latest_month(), None);

        layout.set_latest_month(&month("2025-09")).unwrap();
        assert_eq!(layout.latest_month(), Some(month("2025-09")));
    }

    #[test]
    fn test_latest_month_invalid_content_ignored() {
        let (_temp_dir, layout) = layout_with_raw(&[]);
        let path = layout.latest_month_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"month": "2025-13"}"#).unwrap();
        assert_eq!(layout.latest_month(), None);

        fs::write(&path, "not json").unwrap();
        assert_eq!(layout.latest_month(), None);
    }

    #[test]
    fn test_resolve_explicit_month() {
        let (_temp_dir, layout) = layout_with_raw(&["2025-09"]);
        let resolver = MonthResolver::new(layout);

        let resolution = resolver
            .resolve(
                Some("2025-09"),
                &[month("2025-09")],
                Some(month("2025-08")),
                &[DataSubset::Raw],
            )
            .unwrap();

        assert_eq!(resolution.month, month("2025-09"));
        assert!(!resolution.fell_back);
        assert!(resolution.available);
        assert!(resolution.satisfied);
        assert!(resolution.path(DataSubset::Raw).is_some());
    }

    #[test]
    fn test_resolve_falls_back_to_latest() {
        let (_temp_dir, layout) = layout_with_raw(&["2025-08"]);
        let resolver = MonthResolver::new(layout);

        let absent = resolver
            .resolve(None, &[], Some(month("2025-08")), &[])
            .unwrap();
        assert_eq!(absent.month, month("2025-08"));
        assert!(absent.fell_back);

        let invalid = resolver
            .resolve(Some("2025/08"), &[], Some(month("2025-08")), &[])
            .unwrap();
        assert_eq!(invalid.month, month("2025-08"));
        assert!(invalid.fell_back);
        assert_eq!(invalid.requested.as_deref(), Some("2025/08"));
    }

    #[test]
    fn test_resolve_without_any_month_fails() {
        let (_temp_dir, layout) = layout_with_raw(&[]);
        let resolver = MonthResolver::new(layout);

        assert!(matches!(
            resolver.resolve(None, &[], None, &[]),
            Err(MetricsError::NoMonth)
        ));
        assert!(matches!(
            resolver.resolve(Some("bad"), &[], None, &[]),
            Err(MetricsError::InvalidMonth { .. })
        ));
    }

    #[test]
    fn test_resolve_without_fallback_rejects_invalid() {
        let (_temp_dir, layout) = layout_with_raw(&[]);
        let resolver = MonthResolver::new(layout).without_fallback();

        assert!(matches!(
            resolver.resolve(Some("2025-1"), &[], Some(month("2025-08")), &[]),
            Err(MetricsError::InvalidMonth { .. })
        ));
        assert!(matches!(
            resolver.resolve(None, &[], Some(month("2025-08")), &[]),
            Err(MetricsError::NoMonth)
        ));
    }

    #[test]
    fn test_missing_subsets_reported_not_raised() {
        let (_temp_dir, layout) = layout_with_raw(&["2025-09"]);
        let resolver = MonthResolver::new(layout.clone());

        let resolution = resolver
            .resolve(
                Some("2025-09"),
                &[],
                None,
                &[DataSubset::Raw, DataSubset::Processed],
            )
            .unwrap();

        assert!(!resolution.satisfied);
        assert_eq!(resolution.missing.len(), 1);
        assert_eq!(resolution.missing[0].subset, DataSubset::Processed);
        assert_eq!(
            resolution.missing[0].path,
            layout.month_dir(DataSubset::Processed, &month("2025-09"))
        );

        match resolution.require() {
            Err(MetricsError::MonthDirectoryMissing { month, missing }) => {
                assert_eq!(month, "2025-09");
                assert_eq!(missing.len(), 1);
            }
            other => panic!("Expected MonthDirectoryMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_month_uses_disk_state() {
        let (_temp_dir, layout) = layout_with_raw(&["2025-08", "2025-09"]);
        layout.set_latest_month(&month("2025-09")).unwrap();

        let resolution = MonthResolver::new(layout.clone())
            .resolve(
                None,
                &layout.available_months(DataSubset::Raw),
                layout.latest_month(),
                &[DataSubset::Raw],
            )
            .unwrap();
        assert_eq!(resolution.month, month("2025-09"));
        assert!(resolution.available);
        assert!(resolution.satisfied);
    }

    #[test]
    fn test_ensure_month_directories() {
        let (_temp_dir, layout) = layout_with_raw(&[]);
        let m = month("2025-10");
        layout.ensure_month_directories(&m).unwrap();

        assert!(layout.month_dir(DataSubset::Processed, &m).is_dir());
        assert!(layout.month_dir(DataSubset::Generated, &m).is_dir());
        assert!(layout.month_dir(DataSubset::YoutubeProcessed, &m).is_dir());
    }
}
