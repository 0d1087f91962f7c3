//! Lightweight lexical reranking.
//!
//! This is intentionally self-contained (no external cross-encoder or
//! embeddings backend). It provides a best-effort "semantic-ish" score based
//! on token overlap with the query, which is often good enough to improve
//! ordering without network calls.

use ragpipe_core::{Reranker, Result, SearchRecord};

pub(crate) fn tokenize(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    for ch in s.chars() {
        let c = ch.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            cur.push(c);
        } else if !cur.is_empty() {
            if cur.len() >= 2 {
                out.push(cur.clone());
            }
            cur.clear();
        }
    }
    if !cur.is_empty() && cur.len() >= 2 {
        out.push(cur);
    }
    out.sort();
    out.dedup();
    out
}

pub(crate) fn overlap_score(query_toks: &[String], text_toks: &[String]) -> f64 {
    if query_toks.is_empty() || text_toks.is_empty() {
        return 0.0;
    }
    let mut i = 0usize;
    let mut j = 0usize;
    let mut inter = 0u64;
    while i < query_toks.len() && j < text_toks.len() {
        match query_toks[i].cmp(&text_toks[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                inter += 1;
                i += 1;
                j += 1;
            }
        }
    }
    // Normalize by query size so "covering the query" scores 1.0.
    inter as f64 / (query_toks.len() as f64)
}

/// Annotates records with a token-overlap `rerank_score` in [0,1]. Input
/// order is preserved; ordering by the score is the caller's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalReranker;

#[async_trait::async_trait]
impl Reranker for LexicalReranker {
    fn name(&self) -> &'static str {
        "lexical_overlap"
    }

    async fn rerank(&self, query: &str, records: Vec<SearchRecord>) -> Result<Vec<SearchRecord>> {
        let q_toks = tokenize(query);
        let mut out = records;
        for r in &mut out {
            let t_toks = tokenize(&r.content);
            r.rerank_score = Some(overlap_score(&q_toks, &t_toks));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_dedups_and_drops_single_chars() {
        assert_eq!(tokenize("The THE a cat cat!"), vec!["cat", "the"]);
        assert!(tokenize("a b c").is_empty());
    }

    #[test]
    fn overlap_is_zero_for_empty_sides_and_one_for_full_cover() {
        let q = tokenize("rust async runtime");
        assert_eq!(overlap_score(&q, &[]), 0.0);
        assert_eq!(overlap_score(&[], &q), 0.0);
        let t = tokenize("the rust async runtime is tokio");
        assert!((overlap_score(&q, &t) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partial_overlap_is_a_fraction_of_the_query() {
        let q = tokenize("rust async runtime");
        let t = tokenize("rust is fun");
        assert!((overlap_score(&q, &t) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn reranker_annotates_without_reordering() {
        let records = vec![
            SearchRecord::new("a", "nothing relevant here", 0.9),
            SearchRecord::new("b", "rust async runtime internals", 0.1),
        ];
        let out = LexicalReranker
            .rerank("rust async runtime", records)
            .await
            .unwrap();
        assert_eq!(out[0].id.as_deref(), Some("a"));
        assert_eq!(out[1].id.as_deref(), Some("b"));
        assert!(out[0].rerank_score.unwrap() < out[1].rerank_score.unwrap());
        assert!((out[1].rerank_score.unwrap() - 1.0).abs() < 1e-9);
    }
}
