//! Token estimation and single-field content truncation.
//!
//! The token estimate is a fixed chars-per-token ratio, not a real tokenizer:
//! cheap, monotonic in text length, and stable across calls. Truncation cuts
//! at a character bound, backs up to the nearest word boundary within a small
//! lookback window, and appends a marker.

/// Approximate characters per token (conservative for English prose).
pub const CHARS_PER_TOKEN: usize = 4;

/// Appended to truncated content. Truncated output is always a strict prefix
/// of the original plus this marker.
pub const TRUNCATION_MARKER: &str = "...";

/// Estimate the token count of `text`. Returns 0 for empty input.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Truncate `text` to at most `max_length` characters of original content
/// (plus the marker), preferring a word boundary. Returns the new text and
/// whether it is a marked truncation.
///
/// `max_length == 0` yields an empty string (truncated if the input was
/// non-empty). Re-applying at the same bound returns the same string.
pub fn truncate_content(text: &str, max_length: usize) -> (String, bool) {
    if max_length == 0 {
        return if text.is_empty() {
            (String::new(), false)
        } else {
            (String::new(), true)
        };
    }

    let total_chars = text.chars().count();
    if total_chars <= max_length {
        return (text.to_string(), false);
    }

    let marker_chars = TRUNCATION_MARKER.chars().count();
    // Already-marked output at this bound: re-truncation is a no-op.
    if text.ends_with(TRUNCATION_MARKER) && total_chars <= max_length + marker_chars {
        return (text.to_string(), true);
    }

    let cut_byte = text
        .char_indices()
        .nth(max_length)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..cut_byte];

    // Back up to the nearest whitespace so a word is not severed, but only
    // within a bounded lookback; a long unbroken token is cut as-is.
    let lookback = (max_length / 4).clamp(1, 32);
    let trimmed = match head.rfind(char::is_whitespace) {
        Some(ws_byte) if head[ws_byte..].chars().count() <= lookback => {
            head[..ws_byte].trim_end()
        }
        _ => head,
    };

    let mut out = String::with_capacity(trimmed.len() + TRUNCATION_MARKER.len());
    out.push_str(trimmed);
    out.push_str(TRUNCATION_MARKER);
    (out, true)
}
