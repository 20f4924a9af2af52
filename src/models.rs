//! Core data models used throughout Tiro.
//!
//! These types represent the content units, articles, sources, and relation
//! edges that flow through the ingestion pipeline and the query surface.

use serde::{Deserialize, Serialize};

/// Normalized extracted content awaiting ingestion. Produced by an external
/// extractor (web or email); never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUnit {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Normalized body text (markdown).
    pub body: String,
    /// Canonical post-redirect URL for web content. `None` for email.
    #[serde(default)]
    pub url: Option<String>,
    /// Sender address for email newsletters. `None` for web content.
    #[serde(default)]
    pub email_sender: Option<String>,
    /// Published timestamp (unix seconds). Falls back to ingestion time.
    #[serde(default)]
    pub published_at: Option<i64>,
}

/// Where a source's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Web,
    Email,
    Feed,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Web => "web",
            SourceKind::Email => "email",
            SourceKind::Feed => "feed",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(SourceKind::Web),
            "email" => Ok(SourceKind::Email),
            "feed" => Ok(SourceKind::Feed),
            other => Err(format!("unknown source kind: '{other}'")),
        }
    }
}

/// A content source: a web domain or a newsletter sender.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub domain: Option<String>,
    pub email_sender: Option<String>,
    pub kind: String,
    pub is_vip: bool,
}

/// User rating on an article. Absence of a rating is represented as
/// `Option::None`, not a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Dislike,
    Like,
    Love,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Dislike => "dislike",
            Rating::Like => "like",
            Rating::Love => "love",
        }
    }

    /// Liked and loved articles are permanently immune to decay.
    pub fn is_positive(&self) -> bool {
        matches!(self, Rating::Like | Rating::Love)
    }
}

impl std::str::FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dislike" => Ok(Rating::Dislike),
            "like" => Ok(Rating::Like),
            "love" => Ok(Rating::Love),
            other => Err(format!(
                "unknown rating: '{other}' (expected dislike, like, or love)"
            )),
        }
    }
}

/// Coarse triage classification assigned by an external classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    MustRead,
    SummaryEnough,
    Discard,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::MustRead => "must-read",
            Tier::SummaryEnough => "summary-enough",
            Tier::Discard => "discard",
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "must-read" => Ok(Tier::MustRead),
            "summary-enough" => Ok(Tier::SummaryEnough),
            "discard" => Ok(Tier::Discard),
            other => Err(format!(
                "unknown tier: '{other}' (expected must-read, summary-enough, or discard)"
            )),
        }
    }
}

/// A named entity extracted during enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The canonical persisted record for one archived item, joined across the
/// metadata store (row), document store (body), and source table.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub source_name: String,
    pub is_vip: bool,
    pub title: String,
    pub author: Option<String>,
    /// Empty string for email-origin articles.
    pub url: String,
    pub slug: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub word_count: i64,
    pub reading_time_min: i64,
    pub published_at: Option<i64>,
    pub ingested_at: i64,
    pub last_opened_at: Option<i64>,
    pub is_read: bool,
    pub opened_count: i64,
    pub rating: Option<Rating>,
    pub tier: Option<Tier>,
    pub relevance_weight: f64,
    pub embedding_pending: bool,
    pub analysis: Option<String>,
    /// Full body text from the document store. Empty if the unit is missing.
    pub content: String,
}

/// Listing row: article metadata without the body.
#[derive(Debug, Clone)]
pub struct ArticleSummary {
    pub id: i64,
    pub source_id: i64,
    pub source_name: String,
    pub is_vip: bool,
    pub title: String,
    pub url: String,
    pub slug: String,
    pub summary: Option<String>,
    pub reading_time_min: i64,
    pub ingested_at: i64,
    pub is_read: bool,
    pub rating: Option<Rating>,
    pub tier: Option<Tier>,
    pub relevance_weight: f64,
    pub tags: Vec<String>,
}

/// Filters for article listing. All fields are conjunctive.
#[derive(Debug, Clone)]
pub struct ArticleFilters {
    pub tier: Option<Tier>,
    pub source_id: Option<i64>,
    pub tag: Option<String>,
    pub rating: Option<Rating>,
    pub is_read: Option<bool>,
    /// Inclusive ingested-at lower bound (unix seconds).
    pub since: Option<i64>,
    /// Inclusive ingested-at upper bound (unix seconds).
    pub until: Option<i64>,
    /// Case-insensitive substring match over title and summary.
    pub text: Option<String>,
    /// When false, rows below the configured decay threshold are excluded.
    pub include_decayed: bool,
}

/// No filtering: every article, decayed included.
impl Default for ArticleFilters {
    fn default() -> Self {
        Self {
            tier: None,
            source_id: None,
            tag: None,
            rating: None,
            is_read: None,
            since: None,
            until: None,
            text: None,
            include_decayed: true,
        }
    }
}

impl ArticleFilters {
    /// The default browsing view: everything except decayed articles.
    pub fn visible() -> Self {
        Self {
            include_decayed: false,
            ..Self::default()
        }
    }
}

/// Pagination request.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

/// Pagination metadata returned alongside a listing.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageInfo {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// A directed, scored similarity edge to another article.
#[derive(Debug, Clone)]
pub struct RelatedArticle {
    pub related_article_id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub similarity_score: f64,
    pub connection_note: Option<String>,
}

/// Counts reported by a full decay recalculation.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DecayReport {
    pub total: usize,
    pub updated: usize,
    pub immune: usize,
    /// Rows whose update failed and was logged; the sweep continued.
    pub skipped: usize,
    pub below_threshold: usize,
}

/// Counts reported by the reconciliation sweep.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub vector_orphans_removed: usize,
    pub document_orphans_removed: usize,
    /// Articles whose document unit is missing. Metadata is ground truth, so
    /// these are reported rather than deleted.
    pub missing_documents: Vec<i64>,
}
