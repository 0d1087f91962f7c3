use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ragpipe")]
#[command(about = "Local RAG retrieval plumbing (MCP stdio server)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server (for Cursor / MCP clients).
    #[cfg(feature = "stdio")]
    McpStdio,
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Also spawn a child `ragpipe mcp-stdio` and perform a real handshake.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    check_stdio: bool,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format. Allowed: json, text
    #[arg(long, default_value = "json")]
    output: String,
}

#[cfg(feature = "stdio")]
mod mcp {
    use rmcp::{
        handler::server::router::tool::ToolRouter as RmcpToolRouter,
        handler::server::wrapper::Parameters,
        model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
        tool, tool_handler, tool_router,
        transport::stdio,
        ErrorData as McpError, ServiceExt,
    };
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use ragpipe_core::{Error as RagError, KeywordSearchProvider, Reranker};
    use ragpipe_local::budget::truncate_content;
    use ragpipe_local::rerank::LexicalReranker;
    use ragpipe_local::respond::{try_run_search, SearchRequest};
    use ragpipe_local::store::{MemoryStore, StoredDocument};
    use ragpipe_local::RagConfig;

    const SCHEMA_VERSION: u64 = 1;

    /// Per-document size cap at ingest time (characters). Oversized documents
    /// are stored truncated with a warning rather than rejected.
    const MAX_INGEST_CHARS: usize = 100_000;

    #[path = "envelope.rs"]
    mod envelope;
    use envelope::*;

    fn tool_result(payload: serde_json::Value) -> CallToolResult {
        // Always attach structured content for machine consumers, and include a text fallback
        // for older clients/tests that only read `content[0].text`.
        let mut r = CallToolResult::structured(payload.clone());
        r.content = vec![Content::text(payload.to_string())];
        r
    }

    fn error_code_for(err: &RagError) -> ErrorCode {
        match err {
            RagError::InvalidParams(_) => ErrorCode::InvalidParams,
            RagError::Search(_) => ErrorCode::SearchFailed,
            RagError::Rerank(_) => ErrorCode::RerankFailed,
            RagError::Ingest(_) => ErrorCode::IngestFailed,
        }
    }

    fn error_payload(query: &str, err: &RagError) -> serde_json::Value {
        let code = error_code_for(err);
        serde_json::json!({
            "success": false,
            "query": query,
            "error": error_obj(code, err, error_hint(code)),
        })
    }

    /// Attach `warning_hints` next to any `warning_codes` already in the payload.
    fn attach_warning_hints(payload: &mut serde_json::Value) {
        let codes: Vec<String> = payload
            .get("warning_codes")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if codes.is_empty() {
            return;
        }
        let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
        payload["warning_hints"] = warning_hints_from(&refs);
    }

    #[derive(Debug, Deserialize, JsonSchema, Default)]
    struct RagQueryArgs {
        /// Search query (required, non-empty).
        #[serde(default)]
        query: Option<String>,
        /// Max merged candidates before pagination (bounded).
        #[serde(default)]
        match_count: Option<usize>,
        /// Pagination offset into the merged candidate list.
        #[serde(default)]
        offset: Option<i64>,
        /// Pagination page size. Passing offset or limit adds a `pagination` object to the response.
        #[serde(default)]
        limit: Option<i64>,
        /// Restrict results to one source id (see rag_sources).
        #[serde(default)]
        source: Option<String>,
        /// If true, skip per-result content truncation (whole-response budget still applies).
        #[serde(default)]
        include_full_content: Option<bool>,
        /// Per-result content cap in characters (bounded).
        #[serde(default)]
        max_content_length: Option<usize>,
        /// Whole-response token budget (bounded).
        #[serde(default)]
        max_response_tokens: Option<usize>,
        /// Override hybrid (vector+keyword) search for this call.
        #[serde(default)]
        use_hybrid_search: Option<bool>,
        /// Override reranking for this call.
        #[serde(default)]
        use_reranking: Option<bool>,
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct IngestDocArg {
        /// Stable document id. Autogenerated (`doc-N`) when omitted.
        #[serde(default)]
        id: Option<String>,
        /// Document text (required, non-empty).
        content: String,
        /// Optional canonical URL for the document.
        #[serde(default)]
        url: Option<String>,
        /// Optional source id used for filtering and grouping.
        #[serde(default)]
        source_id: Option<String>,
        /// Optional freeform metadata, echoed back in search results.
        #[serde(default)]
        metadata: Option<serde_json::Value>,
    }

    #[derive(Debug, Deserialize, JsonSchema, Default)]
    struct RagIngestArgs {
        /// Documents to insert or replace (by id).
        #[serde(default)]
        documents: Vec<IngestDocArg>,
    }

    #[derive(Debug, Deserialize, JsonSchema, Default)]
    struct RagSourcesArgs {}

    #[derive(Debug, Deserialize, JsonSchema, Default)]
    struct RagMetaArgs {}

    #[derive(Clone)]
    pub(crate) struct RagpipeMcp {
        tool_router: RmcpToolRouter<Self>,
        store: Arc<MemoryStore>,
        reranker: Arc<LexicalReranker>,
        // Monotonic counter for autogenerated document ids.
        ingested: Arc<AtomicU64>,
    }

    #[tool_router]
    impl RagpipeMcp {
        pub(crate) fn new() -> Result<Self, McpError> {
            Ok(Self {
                tool_router: Self::tool_router(),
                store: Arc::new(MemoryStore::new()),
                reranker: Arc::new(LexicalReranker),
                ingested: Arc::new(AtomicU64::new(0)),
            })
        }

        #[tool(
            description = "Search ingested documents (hybrid vector+keyword merge, optional rerank) with budget-aware truncation and pagination"
        )]
        async fn rag_query(
            &self,
            params: Parameters<Option<RagQueryArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            let args = params.0.unwrap_or_default();
            let cfg = RagConfig::from_env();

            let mut req = SearchRequest::new(args.query.unwrap_or_default(), &cfg);
            if let Some(n) = args.match_count {
                req.match_count = n.clamp(1, 100);
            }
            req.offset = args.offset;
            req.limit = args.limit;
            req.source = args.source;
            if let Some(b) = args.include_full_content {
                req.constraints.include_full_content = b;
            }
            if let Some(n) = args.max_content_length {
                req.constraints.max_content_length = n.clamp(50, 100_000);
            }
            if let Some(n) = args.max_response_tokens {
                req.constraints.max_response_tokens = n.clamp(256, 200_000);
            }
            if let Some(b) = args.use_hybrid_search {
                req.use_hybrid_search = b;
            }
            if let Some(b) = args.use_reranking {
                req.use_reranking = b;
            }

            let keyword: Option<&dyn KeywordSearchProvider> = Some(self.store.as_ref());
            let reranker: Option<&dyn Reranker> = Some(self.reranker.as_ref());
            let mut payload =
                match try_run_search(self.store.as_ref(), keyword, reranker, &req).await {
                    Ok(p) => p,
                    Err(e) => error_payload(&req.query, &e),
                };
            attach_warning_hints(&mut payload);
            add_envelope_fields(&mut payload, "rag_query", t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }

        #[tool(description = "Insert or replace documents (by id) in the in-memory corpus")]
        async fn rag_ingest(
            &self,
            params: Parameters<Option<RagIngestArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            let args = params.0.unwrap_or_default();

            if args.documents.is_empty() {
                let code = ErrorCode::InvalidParams;
                let mut payload = serde_json::json!({
                    "ok": false,
                    "error": error_obj(code, "documents must be a non-empty list", error_hint(code)),
                });
                add_envelope_fields(&mut payload, "rag_ingest", t0.elapsed().as_millis());
                return Ok(tool_result(payload));
            }

            let mut ingested = 0usize;
            let mut replaced = 0usize;
            let mut content_truncated = 0usize;
            for d in args.documents {
                if d.content.trim().is_empty() {
                    let code = ErrorCode::InvalidParams;
                    let mut payload = serde_json::json!({
                        "ok": false,
                        "error": error_obj(
                            code,
                            "every document needs non-empty content",
                            error_hint(code),
                        ),
                    });
                    add_envelope_fields(&mut payload, "rag_ingest", t0.elapsed().as_millis());
                    return Ok(tool_result(payload));
                }
                let id = d.id.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
                    format!("doc-{}", self.ingested.fetch_add(1, Ordering::Relaxed) + 1)
                });
                let (content, was_truncated) = truncate_content(&d.content, MAX_INGEST_CHARS);
                if was_truncated {
                    content_truncated += 1;
                }
                let mut doc = StoredDocument::new(id, content);
                doc.url = d.url;
                doc.source_id = d.source_id;
                doc.metadata = d.metadata.unwrap_or(serde_json::Value::Null);
                if self.store.upsert(doc) {
                    replaced += 1;
                }
                ingested += 1;
            }

            let mut payload = serde_json::json!({
                "ok": true,
                "ingested": ingested,
                "replaced": replaced,
                "total_documents": self.store.len(),
            });
            if content_truncated > 0 {
                payload["warning"] = serde_json::json!(format!(
                    "{content_truncated} document(s) exceeded {MAX_INGEST_CHARS} characters and were stored truncated"
                ));
                payload["warning_codes"] = serde_json::json!(["ingest_content_truncated"]);
                attach_warning_hints(&mut payload);
            }
            add_envelope_fields(&mut payload, "rag_ingest", t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }

        #[tool(description = "List distinct source ids with document counts")]
        async fn rag_sources(
            &self,
            _params: Parameters<Option<RagSourcesArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            let sources = self
                .store
                .sources()
                .into_iter()
                .map(|(source_id, document_count)| {
                    serde_json::json!({
                        "source_id": source_id,
                        "document_count": document_count,
                    })
                })
                .collect::<Vec<_>>();
            let mut payload = serde_json::json!({
                "ok": true,
                "sources": sources,
                "total_documents": self.store.len(),
            });
            add_envelope_fields(&mut payload, "rag_sources", t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }

        #[tool(
            description = "Describe the server: resolved defaults, argument bounds, and corpus size"
        )]
        async fn rag_meta(
            &self,
            _params: Parameters<Option<RagMetaArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            let cfg = RagConfig::from_env();
            let mut payload = serde_json::json!({
                "ok": true,
                "name": "ragpipe",
                "version": env!("CARGO_PKG_VERSION"),
                "defaults": {
                    "match_count": cfg.default_match_count,
                    "max_response_tokens": cfg.max_response_tokens,
                    "max_content_length": cfg.max_content_length,
                    "reserved_tokens": cfg.reserved_tokens,
                    "use_hybrid_search": cfg.use_hybrid_search,
                    "use_reranking": cfg.use_reranking,
                },
                "limits": {
                    "match_count": [1, 100],
                    "max_response_tokens": [256, 200_000],
                    "max_content_length": [50, 100_000],
                    "max_ingest_chars": MAX_INGEST_CHARS,
                },
                "total_documents": self.store.len(),
            });
            add_envelope_fields(&mut payload, "rag_meta", t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }
    }

    #[tool_handler]
    impl rmcp::ServerHandler for RagpipeMcp {
        fn get_info(&self) -> ServerInfo {
            ServerInfo {
                instructions: Some(
                    "Local RAG retrieval plumbing. Responses are JSON, schema-versioned, and budget-aware: oversized result sets are truncated with explicit warnings and pagination hints."
                        .to_string(),
                ),
                capabilities: ServerCapabilities::builder().enable_tools().build(),
                ..Default::default()
            }
        }
    }

    pub(crate) async fn serve_stdio() -> Result<(), McpError> {
        let svc = RagpipeMcp::new()?;
        let running = svc
            .serve(stdio())
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        // Keep the stdio server alive until the client closes.
        running
            .waiting()
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use proptest::prelude::*;

        fn p<T>(v: T) -> Parameters<Option<T>> {
            Parameters(Some(v))
        }

        struct EnvGuard {
            // Hold the lock for the full test (env vars are process-global).
            _lock: std::sync::MutexGuard<'static, ()>,
            saved: Vec<(String, Option<String>)>,
        }

        impl EnvGuard {
            fn new(keys: &[&str]) -> Self {
                // If a prior test panicked while holding the lock, recover the guard so we
                // don't cascade failures behind a PoisonError. (Env is process-global anyway.)
                let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
                let saved: Vec<(String, Option<String>)> = keys
                    .iter()
                    .map(|k| (k.to_string(), std::env::var(k).ok()))
                    .collect();
                for (k, _) in &saved {
                    std::env::remove_var(k);
                }
                Self { _lock: lock, saved }
            }

            fn set(&self, k: &str, v: &str) {
                std::env::set_var(k, v);
            }
        }

        impl Drop for EnvGuard {
            fn drop(&mut self) {
                for (k, v) in self.saved.drain(..) {
                    match v {
                        Some(val) => std::env::set_var(k, val),
                        None => std::env::remove_var(k),
                    }
                }
            }
        }

        fn payload_from_call_tool_result(r: &CallToolResult) -> serde_json::Value {
            let s = r
                .content
                .first()
                .and_then(|c| c.as_text())
                .map(|t| t.text.clone())
                .unwrap_or_default();
            serde_json::from_str(&s).expect("tool result should be a JSON string")
        }

        // Env vars are global; serialize tests that mutate them.
        static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
        const CONFIG_ENV_KEYS: [&str; 6] = [
            "RAGPIPE_USE_HYBRID_SEARCH",
            "RAGPIPE_USE_RERANKING",
            "RAGPIPE_DEFAULT_MATCH_COUNT",
            "RAGPIPE_MAX_RESPONSE_TOKENS",
            "RAGPIPE_MAX_CONTENT_LENGTH",
            "RAGPIPE_RESERVED_TOKENS",
        ];

        fn ingest_doc(id: &str, content: &str, source_id: Option<&str>) -> IngestDocArg {
            IngestDocArg {
                id: Some(id.to_string()),
                content: content.to_string(),
                url: None,
                source_id: source_id.map(str::to_string),
                metadata: None,
            }
        }

        #[tokio::test]
        async fn ingest_then_query_round_trip() {
            let _g = EnvGuard::new(&CONFIG_ENV_KEYS);
            let mcp = RagpipeMcp::new().expect("mcp new");

            let r = mcp
                .rag_ingest(p(RagIngestArgs {
                    documents: vec![
                        ingest_doc("a", "tokio is an async runtime for rust", Some("docs.rs")),
                        ingest_doc("b", "gardening tips for spring", None),
                    ],
                }))
                .await
                .expect("ingest");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["ok"].as_bool(), Some(true));
            assert_eq!(v["ingested"].as_u64(), Some(2));
            assert_eq!(v["replaced"].as_u64(), Some(0));
            assert_eq!(v["total_documents"].as_u64(), Some(2));
            assert_eq!(v["kind"].as_str(), Some("rag_ingest"));
            assert_eq!(v["schema_version"].as_u64(), Some(1));

            let r = mcp
                .rag_query(p(RagQueryArgs {
                    query: Some("rust async runtime".to_string()),
                    ..Default::default()
                }))
                .await
                .expect("query");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["success"].as_bool(), Some(true));
            assert_eq!(v["kind"].as_str(), Some("rag_query"));
            assert!(v.get("elapsed_ms").is_some());
            assert_eq!(v["count"].as_u64(), Some(1));
            assert_eq!(v["results"][0]["id"].as_str(), Some("a"));
            assert_eq!(v["results"][0]["source_id"].as_str(), Some("docs.rs"));
        }

        #[tokio::test]
        async fn query_without_text_is_invalid_params() {
            let _g = EnvGuard::new(&CONFIG_ENV_KEYS);
            let mcp = RagpipeMcp::new().expect("mcp new");
            let r = mcp
                .rag_query(Parameters(None))
                .await
                .expect("query");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["success"].as_bool(), Some(false));
            assert_eq!(v["error"]["code"].as_str(), Some("invalid_params"));
            assert_eq!(v["error"]["retryable"].as_bool(), Some(false));
            assert!(!v["error"]["hint"].as_str().unwrap_or("").is_empty());
        }

        #[tokio::test]
        async fn ingest_rejects_empty_documents_and_empty_content() {
            let _g = EnvGuard::new(&CONFIG_ENV_KEYS);
            let mcp = RagpipeMcp::new().expect("mcp new");

            let r = mcp.rag_ingest(Parameters(None)).await.expect("ingest");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["ok"].as_bool(), Some(false));
            assert_eq!(v["error"]["code"].as_str(), Some("invalid_params"));

            let r = mcp
                .rag_ingest(p(RagIngestArgs {
                    documents: vec![ingest_doc("a", "   ", None)],
                }))
                .await
                .expect("ingest");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["ok"].as_bool(), Some(false));
            assert_eq!(v["total_documents"], serde_json::Value::Null);
        }

        #[tokio::test]
        async fn ingest_autogenerates_unique_ids() {
            let _g = EnvGuard::new(&CONFIG_ENV_KEYS);
            let mcp = RagpipeMcp::new().expect("mcp new");
            let anon = |content: &str| IngestDocArg {
                id: None,
                content: content.to_string(),
                url: None,
                source_id: None,
                metadata: None,
            };

            let r = mcp
                .rag_ingest(p(RagIngestArgs {
                    documents: vec![anon("one"), anon("two"), anon("three")],
                }))
                .await
                .expect("ingest");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["total_documents"].as_u64(), Some(3));

            // A second anonymous batch must not collide with the first.
            let r = mcp
                .rag_ingest(p(RagIngestArgs {
                    documents: vec![anon("four")],
                }))
                .await
                .expect("ingest");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["replaced"].as_u64(), Some(0));
            assert_eq!(v["total_documents"].as_u64(), Some(4));
        }

        #[tokio::test]
        async fn ingest_truncates_oversized_documents_with_hint() {
            let _g = EnvGuard::new(&CONFIG_ENV_KEYS);
            let mcp = RagpipeMcp::new().expect("mcp new");
            let r = mcp
                .rag_ingest(p(RagIngestArgs {
                    documents: vec![ingest_doc("big", &"word ".repeat(25_000), None)],
                }))
                .await
                .expect("ingest");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["ok"].as_bool(), Some(true));
            assert_eq!(
                v["warning_codes"][0].as_str(),
                Some("ingest_content_truncated")
            );
            assert!(v["warning_hints"]["ingest_content_truncated"]
                .as_str()
                .unwrap()
                .contains("Split"));
        }

        #[tokio::test]
        async fn tight_budget_attaches_truncation_warning_hints() {
            let g = EnvGuard::new(&CONFIG_ENV_KEYS);
            g.set("RAGPIPE_MAX_RESPONSE_TOKENS", "256");
            g.set("RAGPIPE_MAX_CONTENT_LENGTH", "60");
            g.set("RAGPIPE_RESERVED_TOKENS", "0");
            let mcp = RagpipeMcp::new().expect("mcp new");

            let body = format!("alpha beta {}", "filler text ".repeat(40));
            let docs = (0..10)
                .map(|i| ingest_doc(&format!("d{i}"), &body, None))
                .collect();
            let r = mcp
                .rag_ingest(p(RagIngestArgs { documents: docs }))
                .await
                .expect("ingest");
            assert_eq!(
                payload_from_call_tool_result(&r)["ok"].as_bool(),
                Some(true)
            );

            let r = mcp
                .rag_query(p(RagQueryArgs {
                    query: Some("alpha beta".to_string()),
                    ..Default::default()
                }))
                .await
                .expect("query");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["success"].as_bool(), Some(true));
            assert!(v["count"].as_u64().unwrap() < 5);
            assert!(v["warning"].as_str().unwrap().contains("Response truncated"));
            let hints = v["warning_hints"].as_object().expect("hints object");
            assert!(hints.contains_key("results_dropped_for_budget"));
            assert!(hints.contains_key("content_truncated"));
        }

        #[tokio::test]
        async fn sources_lists_grouped_counts() {
            let _g = EnvGuard::new(&CONFIG_ENV_KEYS);
            let mcp = RagpipeMcp::new().expect("mcp new");
            mcp.rag_ingest(p(RagIngestArgs {
                documents: vec![
                    ingest_doc("a", "one", Some("blog")),
                    ingest_doc("b", "two", Some("blog")),
                    ingest_doc("c", "three", None),
                ],
            }))
            .await
            .expect("ingest");

            let r = mcp
                .rag_sources(Parameters(None))
                .await
                .expect("sources");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["ok"].as_bool(), Some(true));
            assert_eq!(v["total_documents"].as_u64(), Some(3));
            assert_eq!(v["sources"][0]["source_id"].as_str(), Some("blog"));
            assert_eq!(v["sources"][0]["document_count"].as_u64(), Some(2));
            assert_eq!(v["sources"][1]["source_id"].as_str(), Some("unknown"));
        }

        #[tokio::test]
        async fn meta_reflects_env_overrides() {
            let g = EnvGuard::new(&CONFIG_ENV_KEYS);
            g.set("RAGPIPE_DEFAULT_MATCH_COUNT", "7");
            g.set("RAGPIPE_USE_HYBRID_SEARCH", "true");
            let mcp = RagpipeMcp::new().expect("mcp new");
            let r = mcp.rag_meta(Parameters(None)).await.expect("meta");
            let v = payload_from_call_tool_result(&r);
            assert_eq!(v["ok"].as_bool(), Some(true));
            assert_eq!(v["name"].as_str(), Some("ragpipe"));
            assert_eq!(v["defaults"]["match_count"].as_u64(), Some(7));
            assert_eq!(v["defaults"]["use_hybrid_search"].as_bool(), Some(true));
            assert_eq!(v["kind"].as_str(), Some("rag_meta"));
        }

        #[test]
        fn unknown_warning_codes_get_no_hint() {
            let hints = warning_hints_from(&["content_truncated", "no_such_code"]);
            let m = hints.as_object().unwrap();
            assert!(m.contains_key("content_truncated"));
            assert!(!m.contains_key("no_such_code"));
        }

        proptest! {
            #[test]
            fn tool_result_text_fallback_round_trips(s in "\\PC*") {
                let payload = serde_json::json!({"ok": true, "echo": s});
                let r = tool_result(payload.clone());
                prop_assert_eq!(payload_from_call_tool_result(&r), payload);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Optional env-file loader (opt-in).
    //
    // Rationale: MCP server environments often aren't interactive shells, so users
    // want a single place to keep settings without exporting them manually.
    //
    // Safety:
    // - opt-in only (RAGPIPE_ENV_FILE)
    // - sets vars only if not already set in the process environment
    // - does not log values
    if let Ok(p) = std::env::var("RAGPIPE_ENV_FILE") {
        let p = p.trim();
        if !p.is_empty() {
            if let Ok(txt) = std::fs::read_to_string(p) {
                for raw in txt.lines() {
                    let s = raw.trim();
                    if s.is_empty() || s.starts_with('#') {
                        continue;
                    }
                    let Some((k, v)) = s.split_once('=') else {
                        continue;
                    };
                    let k = k.trim();
                    let v = v.trim();
                    if k.is_empty() {
                        continue;
                    }
                    // Don't override explicit process env.
                    if std::env::var_os(k).is_none() {
                        std::env::set_var(k, v);
                    }
                }
            }
        }
    }

    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "stdio")]
        Commands::McpStdio => {
            mcp::serve_stdio()
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
        Commands::Doctor(args) => {
            fn overridden(k: &str) -> bool {
                std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
            }

            let t0 = std::time::Instant::now();
            let cfg = ragpipe_local::RagConfig::from_env();

            let mut checks: Vec<serde_json::Value> = Vec::new();

            // Check: the token budget leaves room for at least part of a result
            // after the reserved overhead.
            let available = cfg.constraints().available_tokens();
            checks.push(serde_json::json!({
                "name": "token_budget_positive",
                "ok": available > 0,
                "message": if available > 0 {
                    format!("{available} tokens available for results")
                } else {
                    "reserved tokens consume the whole response budget; every query would return empty".to_string()
                },
                "hint": if available > 0 {
                    ""
                } else {
                    "Lower RAGPIPE_RESERVED_TOKENS or raise RAGPIPE_MAX_RESPONSE_TOKENS."
                },
            }));

            // Check: stdio MCP handshake (optional; spawns a child process).
            if !cfg!(feature = "stdio") || !args.check_stdio {
                checks.push(serde_json::json!({
                    "name": "mcp_stdio_handshake",
                    "ok": true,
                    "skipped": true,
                    "elapsed_ms": 0,
                    "error": serde_json::Value::Null,
                }));
            } else {
                #[cfg(feature = "stdio")]
                {
                    use rmcp::service::ServiceExt;
                    use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
                    use tokio::process::Command;

                    let t = std::time::Instant::now();
                    let exe = std::env::current_exe()
                        .unwrap_or_else(|_| std::path::PathBuf::from("ragpipe"));
                    let res: Result<usize> = async {
                        let child =
                            TokioChildProcess::new(Command::new(exe).configure(|cmd| {
                                cmd.args(["mcp-stdio"]);
                            }))?;
                        let service = ().serve(child).await?;
                        let tools = service.list_tools(Default::default()).await?;
                        let n = tools.tools.len();
                        service.cancel().await?;
                        Ok(n)
                    }
                    .await;
                    match res {
                        Ok(n) => checks.push(serde_json::json!({
                            "name": "mcp_stdio_handshake",
                            "ok": n > 0,
                            "skipped": false,
                            "tool_count": n,
                            "elapsed_ms": t.elapsed().as_millis() as u64,
                            "error": serde_json::Value::Null,
                        })),
                        Err(e) => checks.push(serde_json::json!({
                            "name": "mcp_stdio_handshake",
                            "ok": false,
                            "skipped": false,
                            "elapsed_ms": t.elapsed().as_millis() as u64,
                            "error": e.to_string(),
                        })),
                    }
                }
            }

            let ok = checks
                .iter()
                .all(|c| c["ok"].as_bool().unwrap_or(false));
            let payload = serde_json::json!({
                "schema_version": 1,
                "kind": "doctor",
                "ok": ok,
                "name": "ragpipe",
                "version": env!("CARGO_PKG_VERSION"),
                "features": {
                    "stdio": cfg!(feature = "stdio"),
                },
                "config": {
                    "use_hybrid_search": cfg.use_hybrid_search,
                    "use_reranking": cfg.use_reranking,
                    "default_match_count": cfg.default_match_count,
                    "max_response_tokens": cfg.max_response_tokens,
                    "max_content_length": cfg.max_content_length,
                    "reserved_tokens": cfg.reserved_tokens,
                    "overridden": {
                        "use_hybrid_search": overridden("RAGPIPE_USE_HYBRID_SEARCH"),
                        "use_reranking": overridden("RAGPIPE_USE_RERANKING"),
                        "default_match_count": overridden("RAGPIPE_DEFAULT_MATCH_COUNT"),
                        "max_response_tokens": overridden("RAGPIPE_MAX_RESPONSE_TOKENS"),
                        "max_content_length": overridden("RAGPIPE_MAX_CONTENT_LENGTH"),
                        "reserved_tokens": overridden("RAGPIPE_RESERVED_TOKENS"),
                    },
                },
                "checks": checks,
                "elapsed_ms": t0.elapsed().as_millis() as u64,
            });
            println!("{payload}");
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "ragpipe",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("ragpipe {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }

    Ok(())
}
