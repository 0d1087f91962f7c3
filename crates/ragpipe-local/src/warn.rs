//! Truncation warning synthesis.
//!
//! One combined, deterministic message per response (stable for identical
//! input, so exact-match testing works), plus stable warning codes for
//! machine consumers.

use ragpipe_core::TruncationInfo;

pub const WARN_RESULTS_DROPPED: &str = "results_dropped_for_budget";
pub const WARN_CONTENT_TRUNCATED: &str = "content_truncated";

/// Stable codes for the conditions described by `info`. Empty when nothing
/// was truncated.
pub fn truncation_warning_codes(info: &TruncationInfo) -> Vec<&'static str> {
    let mut codes = Vec::new();
    if !info.truncated {
        return codes;
    }
    if info.original_count > info.final_count {
        codes.push(WARN_RESULTS_DROPPED);
    }
    if info.content_truncated_count > 0 {
        codes.push(WARN_CONTENT_TRUNCATED);
    }
    codes
}

/// Human-readable warning for `info`, or an empty string when nothing was
/// truncated. Multiple conditions compose into a single message.
pub fn generate_truncation_warning(info: &TruncationInfo, max_content_length: usize) -> String {
    if !info.truncated {
        return String::new();
    }
    let mut clauses: Vec<String> = Vec::new();
    if info.original_count > info.final_count {
        clauses.push(format!(
            "showing {} of {} results to stay within the response size limit \
             (increase `offset` to page through the rest, or narrow the query)",
            info.final_count, info.original_count
        ));
    }
    if info.content_truncated_count > 0 {
        clauses.push(format!(
            "{} result(s) had content shortened to {} characters \
             (set include_full_content=true to receive full content)",
            info.content_truncated_count, max_content_length
        ));
    }
    if clauses.is_empty() {
        clauses.push("results were reduced to fit the response size budget".to_string());
    }
    format!("Response truncated: {}.", clauses.join("; "))
}
