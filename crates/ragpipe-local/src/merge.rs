//! Hybrid search merge: combine vector-similarity and keyword-match results
//! into one deduplicated, boosted, ordered list.
//!
//! Merge order is fully deterministic for identical inputs:
//! 1. ids present in both lists, in keyword-result order, carrying the
//!    vector version's payload with a boosted similarity;
//! 2. remaining vector-only results, in vector order;
//! 3. remaining keyword-only results, in keyword order, with a fixed
//!    sentinel similarity marking keyword-only provenance.

use std::collections::{BTreeMap, BTreeSet};

use ragpipe_core::SearchRecord;

/// Multiplier applied to the similarity of records found by both searches.
/// The result is clamped to 1.0.
pub const OVERLAP_BOOST: f64 = 1.2;

/// Similarity assigned to keyword-only records (no vector score exists).
pub const KEYWORD_ONLY_SIMILARITY: f64 = 0.5;

/// Merge `vector_results` and `keyword_results` into at most `match_count`
/// records with no duplicate ids. Inputs are not mutated; boosting happens on
/// internal copies. Records lacking an id are never matched for overlap and
/// are only eligible through their originating list's pass.
pub fn merge_vector_and_keyword_results(
    vector_results: &[SearchRecord],
    keyword_results: &[SearchRecord],
    match_count: usize,
) -> Vec<SearchRecord> {
    let mut vector_by_id: BTreeMap<&str, &SearchRecord> = BTreeMap::new();
    for v in vector_results {
        if let Some(id) = v.id.as_deref() {
            vector_by_id.entry(id).or_insert(v);
        }
    }

    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut merged: Vec<SearchRecord> = Vec::new();

    // Overlap pass. Keyword-result order decides the order among overlaps.
    for k in keyword_results {
        let Some(id) = k.id.as_deref() else { continue };
        let Some(v) = vector_by_id.get(id) else {
            continue;
        };
        if !placed.insert(id) {
            continue;
        }
        let mut r = (*v).clone();
        r.similarity = (r.similarity * OVERLAP_BOOST).min(1.0);
        merged.push(r);
    }

    // Vector-only pass.
    for v in vector_results {
        if merged.len() >= match_count {
            break;
        }
        if let Some(id) = v.id.as_deref() {
            if !placed.insert(id) {
                continue;
            }
        }
        merged.push(v.clone());
    }

    // Keyword-only pass: synthesized records with the sentinel similarity.
    for k in keyword_results {
        if merged.len() >= match_count {
            break;
        }
        if let Some(id) = k.id.as_deref() {
            if !placed.insert(id) {
                continue;
            }
        }
        let mut r = k.clone();
        r.similarity = KEYWORD_ONLY_SIMILARITY;
        r.rerank_score = None;
        merged.push(r);
    }

    merged.truncate(match_count);
    merged
}
