//! Search response assembly.
//!
//! Orchestrates merge -> rerank -> paginate -> truncate -> warn and emits the
//! response envelope `{success, query, results, count, pagination?,
//! warning?}`. This is the only place where failures are converted into an
//! envelope; the pure stages below it fail fast on programmer error and the
//! providers propagate their own errors up to here.

use ragpipe_core::{
    Error, KeywordSearchProvider, Reranker, Result, RetrievalQuery, SearchRecord, SizeConstraints,
    VectorSearchProvider,
};

use crate::merge::merge_vector_and_keyword_results;
use crate::paginate::paginate_results;
use crate::truncate::truncate_results_to_fit;
use crate::warn::{generate_truncation_warning, truncation_warning_codes};
use crate::RagConfig;

/// One search invocation. Built from per-process defaults plus per-call
/// overrides; validated once at the orchestration boundary.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Max merged candidates (providers receive this as a hint).
    pub match_count: usize,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    /// Optional source filter forwarded to providers.
    pub source: Option<String>,
    pub constraints: SizeConstraints,
    pub use_hybrid_search: bool,
    pub use_reranking: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, cfg: &RagConfig) -> Self {
        Self {
            query: query.into(),
            match_count: cfg.default_match_count,
            offset: None,
            limit: None,
            source: None,
            constraints: cfg.constraints(),
            use_hybrid_search: cfg.use_hybrid_search,
            use_reranking: cfg.use_reranking,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::InvalidParams(
                "query must be a non-empty string".to_string(),
            ));
        }
        if self.match_count == 0 {
            return Err(Error::InvalidParams(
                "match_count must be at least 1".to_string(),
            ));
        }
        if self.match_count > 1_000 {
            return Err(Error::InvalidParams(
                "match_count must be at most 1000".to_string(),
            ));
        }
        Ok(())
    }
}

/// Merge stage: hybrid merge when enabled, otherwise vector passthrough
/// capped at `match_count`.
pub fn merged_candidates(
    req: &SearchRequest,
    vector_results: Vec<SearchRecord>,
    keyword_results: Vec<SearchRecord>,
) -> Vec<SearchRecord> {
    if req.use_hybrid_search {
        merge_vector_and_keyword_results(&vector_results, &keyword_results, req.match_count)
    } else {
        let mut v = vector_results;
        v.truncate(req.match_count);
        v
    }
}

/// Paginate -> truncate -> warn -> envelope. Pagination runs before size
/// truncation: it selects which candidates compete for the budget.
pub fn finalize_response(req: &SearchRequest, merged: Vec<SearchRecord>) -> serde_json::Value {
    let total_candidates = merged.len();
    let paginate = req.offset.is_some() || req.limit.is_some();
    let candidates = if paginate {
        let offset = req.offset.unwrap_or(0);
        let limit = req.limit.unwrap_or(total_candidates as i64);
        paginate_results(&merged, offset, limit)
    } else {
        merged
    };

    let (results, info) = truncate_results_to_fit(&candidates, &req.constraints);
    let warning = generate_truncation_warning(&info, req.constraints.max_content_length);
    let codes = truncation_warning_codes(&info);

    let mut payload = serde_json::json!({
        "success": true,
        "query": req.query,
        "results": results,
        "count": info.final_count,
    });
    if paginate {
        payload["pagination"] = serde_json::json!({
            "offset": req.offset.unwrap_or(0).max(0),
            "limit": req.limit,
            "total_candidates": total_candidates,
        });
    }
    if !warning.is_empty() {
        payload["warning"] = serde_json::json!(warning);
        payload["warning_codes"] = serde_json::json!(codes);
    }
    payload
}

/// Synchronous pipeline over already-fetched result lists.
pub fn build_search_response(
    req: &SearchRequest,
    vector_results: Vec<SearchRecord>,
    keyword_results: Vec<SearchRecord>,
) -> serde_json::Value {
    match req.validate() {
        Ok(()) => finalize_response(req, merged_candidates(req, vector_results, keyword_results)),
        Err(e) => error_envelope(&req.query, &e),
    }
}

/// The failure envelope: `{success: false, query, error}`.
pub fn error_envelope(query: &str, err: &Error) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "query": query,
        "error": err.to_string(),
    })
}

/// Full pipeline against providers, surfacing failures as `Err` so callers
/// can build richer envelopes. Use [`run_search`] for the catch-all variant.
pub async fn try_run_search(
    vector: &dyn VectorSearchProvider,
    keyword: Option<&dyn KeywordSearchProvider>,
    reranker: Option<&dyn Reranker>,
    req: &SearchRequest,
) -> Result<serde_json::Value> {
    req.validate()?;

    let rq = RetrievalQuery {
        query: req.query.clone(),
        match_count: req.match_count,
        source: req.source.clone(),
    };

    let vector_results = vector.vector_search(&rq).await?;
    let keyword_results = if req.use_hybrid_search {
        match keyword {
            Some(k) => k.keyword_search(&rq).await?,
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };

    let mut merged = merged_candidates(req, vector_results, keyword_results);
    if req.use_reranking {
        if let Some(rr) = reranker {
            merged = rr.rerank(&req.query, merged).await?;
            // Stable sort: scored records first (descending), unscored keep
            // their merge order after them.
            merged.sort_by(|a, b| {
                b.rerank_score
                    .partial_cmp(&a.rerank_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
    }

    Ok(finalize_response(req, merged))
}

/// Like [`try_run_search`], but never fails: any stage error becomes a
/// `{success: false, query, error}` envelope.
pub async fn run_search(
    vector: &dyn VectorSearchProvider,
    keyword: Option<&dyn KeywordSearchProvider>,
    reranker: Option<&dyn Reranker>,
    req: &SearchRequest,
) -> serde_json::Value {
    match try_run_search(vector, keyword, reranker, req).await {
        Ok(payload) => payload,
        Err(e) => error_envelope(&req.query, &e),
    }
}
