//! Application constants for the metrics aggregator
//!
//! Product tables, directory names, source file names and default values
//! used throughout the crate.

// =============================================================================
// Product Tables
// =============================================================================

/// Own-brand product keywords
pub const OWN_BRAND_PRODUCTS: &[&str] = &["쿨페이즈", "리프테라", "쿨소닉"];

/// Radio-frequency (고주파) device keywords
pub const RF_PRODUCTS: &[&str] = &[
    "써마지",
    "인모드",
    "쿨페이즈",
    "덴서티",
    "올리지오",
    "튠페이스",
    "세르프",
    "텐써마",
    "볼뉴머",
];

/// High-intensity focused ultrasound (초음파) device keywords
pub const HIFU_PRODUCTS: &[&str] = &[
    "울쎄라",
    "슈링크",
    "쿨소닉",
    "리프테라",
    "리니어지",
    "브이로",
    "텐쎄라",
    "튠라이너",
    "리니어펌",
];

/// Source labels that denote the RF category
pub const RF_LABELS: &[&str] = &["고주파", "RF", "rf"];

/// Source labels that denote the HIFU category
pub const HIFU_LABELS: &[&str] = &["초음파", "HIFU", "hifu"];

/// Products left out of group summaries by default (known bad source data)
pub const DEFAULT_DENYLIST: &[&str] = &["올리지오"];

/// Direct competitors compared against the own brand in group summaries
pub const DEFAULT_COMPETITORS: &[&str] = &["덴서티", "세르프", "볼뉴머", "텐써마"];

// =============================================================================
// Directory Layout
// =============================================================================

/// Data directory relative to the project root
pub const DATA_DIR_NAME: &str = "data";

/// Raw monthly exports live under data/raw/<month>
pub const RAW_DIR_NAME: &str = "raw";

/// Derived outputs live under data/processed/<month>
pub const PROCESSED_DIR_NAME: &str = "processed";

/// Script-generated CSVs live under data/raw/generated/<month>
pub const GENERATED_DIR_NAME: &str = "generated";

/// YouTube derived outputs live under data/processed/youtube/<month>
pub const YOUTUBE_DIR_NAME: &str = "youtube";

/// Config directory holding latest-month.json
pub const CONFIG_DIR_NAME: &str = "config";

/// File recording the default month
pub const LATEST_MONTH_FILE: &str = "latest-month.json";

/// Environment variable overriding the project root
pub const DATA_ROOT_ENV: &str = "ASTERASYS_DATA_ROOT";

/// Month shape accepted everywhere
pub const MONTH_PATTERN: &str = r"^\d{4}-(0[1-9]|1[0-2])$";

// =============================================================================
// Source Files
// =============================================================================

/// Raw export file names (inside data/raw/<month>)
pub mod files {
    pub const BLOG_RANK: &str = "asterasys_total_data - blog_rank.csv";
    pub const CAFE_RANK: &str = "asterasys_total_data - cafe_rank.csv";
    pub const NEWS_RANK: &str = "asterasys_total_data - news_rank.csv";
    pub const NEWS_ANALYSIS: &str = "asterasys_total_data - news analysis.csv";
    pub const YOUTUBE_RANK: &str = "asterasys_total_data - youtube_rank.csv";
    pub const SALES: &str = "asterasys_total_data - sale.csv";
    pub const TRAFFIC: &str = "asterasys_total_data - traffic.csv";
}

/// Blog types found in the blog export's 블로그유형 column
pub mod blog_types {
    pub const HOSPITAL: &str = "병원블로그";
    pub const GENERAL: &str = "일반블로그";
    pub const PLACE: &str = "플레이스블로그";
}

// =============================================================================
// Formatting Defaults
// =============================================================================

/// Decimal places for share percentages
pub const DEFAULT_SHARE_PRECISION: u32 = 1;

/// Decimal places for organic/managed percentages (whole points)
pub const DEFAULT_COMPOSITE_PRECISION: u32 = 0;

/// Decimal places for month-over-month change percentages
pub const CHANGE_PERCENT_PRECISION: u32 = 1;

/// Decimal places for per-post ratios in formatted output
pub const RATIO_PRECISION: u32 = 2;

/// Leaderboard length when none is requested
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

/// Multiplier for posts-per-search efficiency
pub const SEARCH_EFFICIENCY_SCALE: f64 = 1000.0;

/// Characters stripped from numeric cells before parsing
pub const NUMERIC_NOISE: &[char] = &[',', '₩', '$', '원', '%', ' ', '\u{a0}'];
