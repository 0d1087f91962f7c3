//! Result-set truncation: fit an ordered list of records to a token budget.
//!
//! Records beyond the cutoff are dropped whole, never partially included, so
//! the payload estimate never exceeds the budget — with one documented
//! exception: when the input was non-empty and the budget is positive, at
//! least one (maximally truncated) record is kept.

use ragpipe_core::{SearchRecord, SizeConstraints, TruncationInfo};

use crate::budget::{estimate_tokens, truncate_content, CHARS_PER_TOKEN};

/// Fixed per-record token estimate for id/url/source/metadata and JSON keys.
pub const PER_RECORD_OVERHEAD_TOKENS: usize = 100;

fn record_cost(r: &SearchRecord) -> usize {
    estimate_tokens(&r.content) + PER_RECORD_OVERHEAD_TOKENS
}

/// Apply `constraints` to `results`: per-field content truncation (unless
/// `include_full_content`), then a budget walk in the existing order.
pub fn truncate_results_to_fit(
    results: &[SearchRecord],
    constraints: &SizeConstraints,
) -> (Vec<SearchRecord>, TruncationInfo) {
    let original_count = results.len();
    if original_count == 0 {
        return (Vec::new(), TruncationInfo::default());
    }

    let budget = constraints.available_tokens();

    let mut content_truncated_count = 0usize;
    let mut prepared: Vec<SearchRecord> = Vec::with_capacity(original_count);
    for r in results {
        let mut r = r.clone();
        if !constraints.include_full_content {
            let (content, was) = truncate_content(&r.content, constraints.max_content_length);
            if was {
                r.content = content;
                r.content_truncated = true;
                content_truncated_count += 1;
            }
        }
        prepared.push(r);
    }

    let mut cutoff = 0usize;
    let mut used_tokens = 0usize;
    for r in &prepared {
        let cost = record_cost(r);
        if used_tokens + cost > budget {
            break;
        }
        used_tokens += cost;
        cutoff += 1;
    }

    prepared.truncate(cutoff.max(1));
    let mut kept = prepared;

    if cutoff == 0 {
        if budget == 0 {
            // A zero budget is the one case where size enforcement may return
            // an empty set.
            kept.clear();
        } else if let Some(first) = kept.first_mut() {
            // Minimum-one-record policy: squeeze the first record's content
            // down to whatever the budget leaves after overhead.
            let content_tokens = budget.saturating_sub(PER_RECORD_OVERHEAD_TOKENS);
            let (content, was) =
                truncate_content(&first.content, content_tokens * CHARS_PER_TOKEN);
            if was {
                if !first.content_truncated {
                    first.content_truncated = true;
                    content_truncated_count += 1;
                }
                first.content = content;
            }
            used_tokens = record_cost(first);
        }
    }

    let final_count = kept.len();
    let info = TruncationInfo {
        truncated: final_count < original_count || content_truncated_count > 0,
        original_count,
        final_count,
        content_truncated_count,
        estimated_tokens: used_tokens,
    };
    (kept, info)
}
