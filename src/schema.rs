//! Canonical schemas for the monthly source datasets.
//!
//! Source exports name the same concept differently (Korean and English
//! headers, typos, month-prefixed columns). Headers are mapped to one
//! canonical field name per concept at the parsing boundary, so the
//! aggregator never branches on raw header names.

use crate::constants::files;
use crate::error::MetricsError;
use crate::reader::RecordReader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical field names shared by all datasets
pub mod field {
    pub const KEYWORD: &str = "keyword";
    pub const CATEGORY: &str = "category";
    pub const BLOG_TYPE: &str = "blog_type";
    pub const TYPE_COUNT: &str = "type_count";
    pub const POSTS: &str = "posts";
    pub const COMMENTS: &str = "comments";
    pub const REPLIES: &str = "replies";
    pub const VIEWS: &str = "views";
    pub const LIKES: &str = "likes";
    pub const SALES: &str = "sales";
    pub const MONTHLY_SALES: &str = "monthly_sales";
    pub const SEARCH_VOLUME: &str = "search_volume";
    pub const SOURCE_RANK: &str = "source_rank";
    pub const TOTAL_ARTICLES: &str = "total_articles";
    pub const HOSPITAL_NEWS_PCT: &str = "hospital_news_pct";
    pub const CORPORATE_NEWS_PCT: &str = "corporate_news_pct";
}

/// How a source header is recognised
#[derive(Debug, Clone, Copy)]
enum Alias {
    Exact(&'static str),
    Suffix(&'static str),
}

impl Alias {
    fn matches(&self, header: &str) -> bool {
        match self {
            Alias::Exact(name) => header == *name,
            Alias::Suffix(suffix) => header.ends_with(suffix),
        }
    }
}

type FieldAliases = (&'static str, &'static [Alias]);

const KEYWORD_ALIASES: FieldAliases = (
    field::KEYWORD,
    &[
        Alias::Exact("키워드"),
        Alias::Exact("keyword"),
        Alias::Exact("product"),
        Alias::Exact("product_name"),
        Alias::Exact("디바이스명"),
    ],
);

const CATEGORY_ALIASES: FieldAliases = (
    field::CATEGORY,
    &[
        Alias::Exact("그룹"),
        Alias::Exact("기기구분"),
        Alias::Exact("category"),
        Alias::Exact("카테고리"),
    ],
);

const RANK_ALIASES: FieldAliases = (
    field::SOURCE_RANK,
    &[
        Alias::Exact("발행량 순위"),
        Alias::Exact("검색량 순위"),
        Alias::Exact("판매량 순위"),
        Alias::Exact("rank"),
    ],
);

const BLOG_FIELDS: &[FieldAliases] = &[
    KEYWORD_ALIASES,
    CATEGORY_ALIASES,
    RANK_ALIASES,
    (field::BLOG_TYPE, &[Alias::Exact("블로그유형")]),
    (field::TYPE_COUNT, &[Alias::Exact("총 개수")]),
    (field::COMMENTS, &[Alias::Exact("댓글 총 개수")]),
    (field::REPLIES, &[Alias::Exact("대댓글 총 개수")]),
    (field::POSTS, &[Alias::Exact("발행량합")]),
];

const CAFE_FIELDS: &[FieldAliases] = &[
    KEYWORD_ALIASES,
    CATEGORY_ALIASES,
    RANK_ALIASES,
    (field::POSTS, &[Alias::Exact("총 발행량")]),
    (field::COMMENTS, &[Alias::Exact("총 댓글수")]),
    (field::REPLIES, &[Alias::Exact("총 대댓글수")]),
    (field::VIEWS, &[Alias::Exact("총 조회수")]),
];

const NEWS_FIELDS: &[FieldAliases] = &[
    KEYWORD_ALIASES,
    CATEGORY_ALIASES,
    RANK_ALIASES,
    (field::POSTS, &[Alias::Exact("총 발행량")]),
];

const NEWS_ANALYSIS_FIELDS: &[FieldAliases] = &[
    KEYWORD_ALIASES,
    CATEGORY_ALIASES,
    (
        field::TOTAL_ARTICLES,
        &[Alias::Exact("total_articles"), Alias::Exact("총 기사수")],
    ),
    (field::HOSPITAL_NEWS_PCT, &[Alias::Exact("category_병원발행")]),
    (field::CORPORATE_NEWS_PCT, &[Alias::Exact("category_기업소식")]),
];

const YOUTUBE_FIELDS: &[FieldAliases] = &[
    KEYWORD_ALIASES,
    CATEGORY_ALIASES,
    RANK_ALIASES,
    (
        field::POSTS,
        &[Alias::Exact("총 발행량"), Alias::Exact("비디오수"), Alias::Exact("videos")],
    ),
    (
        field::VIEWS,
        &[Alias::Exact("총 조회수"), Alias::Exact("총조회수"), Alias::Exact("views")],
    ),
    (field::LIKES, &[Alias::Exact("총 좋아요"), Alias::Exact("likes")]),
    (field::COMMENTS, &[Alias::Exact("총 댓글"), Alias::Exact("comments")]),
];

const SALES_FIELDS: &[FieldAliases] = &[
    KEYWORD_ALIASES,
    CATEGORY_ALIASES,
    RANK_ALIASES,
    (field::SALES, &[Alias::Exact("총 판매량"), Alias::Exact("판매량")]),
    // "8월 판매량", "9월 판매량", ...
    (field::MONTHLY_SALES, &[Alias::Suffix("월 판매량")]),
];

const TRAFFIC_FIELDS: &[FieldAliases] = &[
    KEYWORD_ALIASES,
    CATEGORY_ALIASES,
    RANK_ALIASES,
    (
        field::SEARCH_VOLUME,
        &[Alias::Exact("월간 검색량"), Alias::Exact("월감 검색량")],
    ),
];

/// Logical datasets exported every month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Blog,
    Cafe,
    News,
    NewsAnalysis,
    Youtube,
    Sales,
    Traffic,
}

impl Dataset {
    pub const ALL: [Dataset; 7] = [
        Dataset::Blog,
        Dataset::Cafe,
        Dataset::News,
        Dataset::NewsAnalysis,
        Dataset::Youtube,
        Dataset::Sales,
        Dataset::Traffic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Blog => "blog",
            Dataset::Cafe => "cafe",
            Dataset::News => "news",
            Dataset::NewsAnalysis => "news_analysis",
            Dataset::Youtube => "youtube",
            Dataset::Sales => "sales",
            Dataset::Traffic => "traffic",
        }
    }

    /// Export file name inside data/raw/<month>
    pub fn file_name(&self) -> &'static str {
        match self {
            Dataset::Blog => files::BLOG_RANK,
            Dataset::Cafe => files::CAFE_RANK,
            Dataset::News => files::NEWS_RANK,
            Dataset::NewsAnalysis => files::NEWS_ANALYSIS,
            Dataset::Youtube => files::YOUTUBE_RANK,
            Dataset::Sales => files::SALES,
            Dataset::Traffic => files::TRAFFIC,
        }
    }

    pub fn schema(&self) -> DatasetSchema {
        let fields = match self {
            Dataset::Blog => BLOG_FIELDS,
            Dataset::Cafe => CAFE_FIELDS,
            Dataset::News => NEWS_FIELDS,
            Dataset::NewsAnalysis => NEWS_ANALYSIS_FIELDS,
            Dataset::Youtube => YOUTUBE_FIELDS,
            Dataset::Sales => SALES_FIELDS,
            Dataset::Traffic => TRAFFIC_FIELDS,
        };
        DatasetSchema {
            dataset: *self,
            fields,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.name() == s.trim())
            .ok_or_else(|| MetricsError::Configuration {
                message: format!("Unknown dataset: {}", s),
            })
    }
}

/// Header-to-field mapping for one dataset
#[derive(Debug, Clone, Copy)]
pub struct DatasetSchema {
    dataset: Dataset,
    fields: &'static [FieldAliases],
}

impl DatasetSchema {
    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    /// Canonical field for a source header, if the schema knows it
    pub fn canonical_name(&self, header: &str) -> Option<&'static str> {
        let header = header.trim();
        self.fields
            .iter()
            .find(|(canonical, aliases)| {
                *canonical == header || aliases.iter().any(|alias| alias.matches(header))
            })
            .map(|(canonical, _)| *canonical)
    }

    /// Canonical fields this schema defines
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(canonical, _)| *canonical)
    }

    /// Rename the reader's headers; unknown headers pass through unchanged
    pub fn apply(&self, reader: RecordReader) -> RecordReader {
        let schema = *self;
        reader.map_headers(move |header| {
            schema
                .canonical_name(header)
                .map(str::to_string)
                .unwrap_or_else(|| header.to_string())
        })
    }

    /// Canonical fields absent from a header row
    pub fn missing_fields(&self, headers: &[String]) -> Vec<&'static str> {
        self.fields()
            .filter(|field| !headers.iter().any(|h| h == field))
            .collect()
    }
}
