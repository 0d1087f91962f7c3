//! In-memory document store with lexical retrieval.
//!
//! This module is intentionally:
//! - **offline**: no network calls, no embeddings backend
//! - **bounded**: callers cap result counts per query
//! - **deterministic**: stable scoring and tie-breaks (score desc, id asc)
//!
//! It implements the provider traits so the response pipeline can run
//! end-to-end without external services: token overlap with the query stands
//! in for vector similarity, and case-insensitive substring matching stands
//! in for ILIKE keyword search.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ragpipe_core::{
    KeywordSearchProvider, Result, RetrievalQuery, SearchRecord, VectorSearchProvider,
};

use crate::merge::KEYWORD_ONLY_SIMILARITY;
use crate::rerank::{overlap_score, tokenize};

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub content: String,
    pub url: Option<String>,
    pub source_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            url: None,
            source_id: None,
            metadata: serde_json::Value::Null,
        }
    }
}

/// Shared in-memory corpus. Holds no state beyond the document map; every
/// search call reads a consistent snapshot and returns fresh records.
#[derive(Debug, Default)]
pub struct MemoryStore {
    // Keyed by document id (stable iteration order).
    docs: RwLock<BTreeMap<String, StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, StoredDocument>> {
        self.docs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, StoredDocument>> {
        self.docs.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace by id. Returns true when an existing document was
    /// replaced.
    pub fn upsert(&self, doc: StoredDocument) -> bool {
        self.write().insert(doc.id.clone(), doc).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Distinct source ids with document counts, sorted by source id.
    /// Documents without a source are grouped under `"unknown"`.
    pub fn sources(&self) -> Vec<(String, usize)> {
        let docs = self.read();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for d in docs.values() {
            let key = d.source_id.clone().unwrap_or_else(|| "unknown".to_string());
            *counts.entry(key).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }

    fn matches_source(doc: &StoredDocument, q: &RetrievalQuery) -> bool {
        match q.source.as_deref() {
            Some(want) => doc.source_id.as_deref() == Some(want),
            None => true,
        }
    }

    fn record_for(doc: &StoredDocument, similarity: f64) -> SearchRecord {
        SearchRecord {
            id: Some(doc.id.clone()),
            content: doc.content.clone(),
            url: doc.url.clone(),
            source_id: doc.source_id.clone(),
            metadata: doc.metadata.clone(),
            similarity,
            rerank_score: None,
            content_truncated: false,
        }
    }
}

#[async_trait::async_trait]
impl VectorSearchProvider for MemoryStore {
    fn name(&self) -> &'static str {
        "memory_lexical"
    }

    async fn vector_search(&self, q: &RetrievalQuery) -> Result<Vec<SearchRecord>> {
        let q_toks = tokenize(&q.query);
        let docs = self.read();
        let mut out: Vec<SearchRecord> = docs
            .values()
            .filter(|d| Self::matches_source(d, q))
            .map(|d| Self::record_for(d, overlap_score(&q_toks, &tokenize(&d.content))))
            .filter(|r| r.similarity > 0.0)
            .collect();
        // Stable: similarity desc, then id asc.
        out.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        out.truncate(q.match_count.max(1));
        Ok(out)
    }
}

#[async_trait::async_trait]
impl KeywordSearchProvider for MemoryStore {
    fn name(&self) -> &'static str {
        "memory_keyword"
    }

    async fn keyword_search(&self, q: &RetrievalQuery) -> Result<Vec<SearchRecord>> {
        let needle = q.query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.read();
        let mut hits: Vec<(usize, SearchRecord)> = Vec::new();
        for d in docs.values().filter(|d| Self::matches_source(d, q)) {
            let occurrences = d.content.to_lowercase().matches(&needle).count();
            if occurrences == 0 {
                continue;
            }
            hits.push((occurrences, Self::record_for(d, KEYWORD_ONLY_SIMILARITY)));
        }
        // Stable: occurrence count desc, then id asc.
        hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        Ok(hits
            .into_iter()
            .take(q.match_count.max(1))
            .map(|(_, r)| r)
            .collect())
    }
}
