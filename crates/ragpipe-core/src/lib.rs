use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("rerank failed: {0}")]
    Rerank(String),
    #[error("ingest failed: {0}")]
    Ingest(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn is_false(b: &bool) -> bool {
    !*b
}

/// One retrieved item, as returned by a search provider and shaped by the
/// response pipeline.
///
/// `url`, `source_id`, and `metadata` are opaque passthrough attributes: the
/// pipeline never interprets them. `similarity` is mutated only by the merge
/// step (overlap boost); `content` and `content_truncated` only by size
/// truncation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Stable identifier, unique within a single provider's result set.
    /// Absent for synthetic/partial records; id-less records are never
    /// matched for overlap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Primary text field, subject to size truncation.
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    /// Relevance in [0,1], higher = more relevant. Stays within [0,1] after
    /// boosting (the boost is clamped).
    #[serde(default)]
    pub similarity: f64,
    /// Set by an external reranker; when present, ordering by this field
    /// supersedes `similarity` ordering upstream of size management.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f64>,
    /// True when this record's content was shortened by size truncation.
    #[serde(rename = "_content_truncated", default, skip_serializing_if = "is_false")]
    pub content_truncated: bool,
}

impl SearchRecord {
    pub fn new(id: impl Into<String>, content: impl Into<String>, similarity: f64) -> Self {
        Self {
            id: Some(id.into()),
            content: content.into(),
            similarity,
            ..Self::default()
        }
    }
}

/// Per-request size budget, constructed once from caller-supplied or default
/// values and consumed read-only by result-set truncation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeConstraints {
    /// Hard ceiling on total estimated tokens of the returned payload.
    pub max_response_tokens: usize,
    /// Ceiling on characters per content field.
    pub max_content_length: usize,
    /// If true, bypass per-field truncation (result-set truncation still applies).
    pub include_full_content: bool,
    /// Tokens subtracted from the budget up front for envelope/metadata overhead.
    pub reserved_tokens: usize,
}

impl Default for SizeConstraints {
    fn default() -> Self {
        Self {
            max_response_tokens: 20_000,
            max_content_length: 1_000,
            include_full_content: false,
            reserved_tokens: 500,
        }
    }
}

impl SizeConstraints {
    /// Token budget available for result records (floored at 0).
    pub fn available_tokens(&self) -> usize {
        self.max_response_tokens.saturating_sub(self.reserved_tokens)
    }
}

/// What result-set truncation did to one response. Produced fresh per call,
/// consumed by warning synthesis and the envelope; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationInfo {
    /// True if either content or result count was reduced.
    pub truncated: bool,
    pub original_count: usize,
    pub final_count: usize,
    /// Number of records whose content field was shortened.
    pub content_truncated_count: usize,
    /// Final total estimate for the kept records.
    pub estimated_tokens: usize,
}

/// One retrieval request as seen by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub query: String,
    /// Result-count hint; providers may return fewer.
    pub match_count: usize,
    /// Optional source filter (exact `source_id` match).
    pub source: Option<String>,
}

impl RetrievalQuery {
    pub fn new(query: impl Into<String>, match_count: usize) -> Self {
        Self {
            query: query.into(),
            match_count,
            source: None,
        }
    }
}

/// Supplies results ordered by descending `similarity`. Assumed to already
/// perform embedding + nearest-neighbor search (or an offline stand-in).
#[async_trait::async_trait]
pub trait VectorSearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn vector_search(&self, q: &RetrievalQuery) -> Result<Vec<SearchRecord>>;
}

/// Supplies substring/ILIKE-style matches for a query.
#[async_trait::async_trait]
pub trait KeywordSearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn keyword_search(&self, q: &RetrievalQuery) -> Result<Vec<SearchRecord>>;
}

/// Annotates records with `rerank_score`; ordering is the caller's job.
#[async_trait::async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &'static str;
    async fn rerank(&self, query: &str, records: Vec<SearchRecord>) -> Result<Vec<SearchRecord>>;
}
