use serde::Serialize;

pub(crate) fn warning_hint(code: &str) -> Option<&'static str> {
    match code {
        "results_dropped_for_budget" => Some(
            "Some candidates were dropped to fit the response token budget. Page through the rest with offset/limit, narrow the query, or raise RAGPIPE_MAX_RESPONSE_TOKENS (server env).",
        ),
        "content_truncated" => Some(
            "Result content was shortened to max_content_length characters. Set include_full_content=true (per call) or raise max_content_length to receive more text per result.",
        ),
        "ingest_content_truncated" => Some(
            "Some ingested documents exceeded the per-document size cap and were stored truncated. Split very large documents into smaller ones before ingesting.",
        ),
        _ => None,
    }
}

pub(crate) fn warning_hints_from(codes: &[&str]) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    for c in codes {
        if let Some(h) = warning_hint(c) {
            m.insert((*c).to_string(), serde_json::json!(h));
        }
    }
    serde_json::Value::Object(m)
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum ErrorCode {
    InvalidParams,
    SearchFailed,
    RerankFailed,
    IngestFailed,
    UnexpectedError,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::SearchFailed => "search_failed",
            Self::RerankFailed => "rerank_failed",
            Self::IngestFailed => "ingest_failed",
            Self::UnexpectedError => "unexpected_error",
        }
    }

    pub(crate) fn retryable(self) -> bool {
        match self {
            Self::SearchFailed | Self::RerankFailed => true,
            // Invalid input is not retryable without changing something.
            Self::InvalidParams | Self::IngestFailed | Self::UnexpectedError => false,
        }
    }
}

pub(crate) fn error_hint(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::InvalidParams => {
            "Check the tool arguments: query must be a non-empty string and numeric bounds must be positive."
        }
        ErrorCode::SearchFailed => "Retry the query; if it keeps failing, call rag_meta to inspect the configuration.",
        ErrorCode::RerankFailed => "Retry with use_reranking=false to fall back to merge order.",
        ErrorCode::IngestFailed => "Check the document list: every document needs non-empty content.",
        ErrorCode::UnexpectedError => "This is a bug in the server; please report the query that triggered it.",
    }
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(super::SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
}

pub(crate) fn error_obj(
    code: ErrorCode,
    message: impl ToString,
    hint: impl ToString,
) -> serde_json::Value {
    #[derive(Serialize)]
    struct ErrorObject {
        code: &'static str,
        message: String,
        hint: String,
        retryable: bool,
    }

    let e = ErrorObject {
        code: code.as_str(),
        message: message.to_string(),
        hint: hint.to_string(),
        retryable: code.retryable(),
    };
    match serde_json::to_value(e) {
        Ok(v) => v,
        Err(_) => serde_json::json!({
            "code": code.as_str(),
            "message": message.to_string(),
            "hint": hint.to_string(),
            "retryable": code.retryable()
        }),
    }
}
