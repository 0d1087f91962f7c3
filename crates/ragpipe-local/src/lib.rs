//! Local retrieval pipeline for ragpipe.
//!
//! This crate is intentionally:
//! - **offline**: no network calls
//! - **bounded**: every response fits a caller-supplied size budget
//! - **deterministic**: stable merge order, stable tie-breaks, stable warnings
//!
//! The pipeline stages (merge, paginate, truncate, warn) are synchronous pure
//! functions over in-memory lists; only the provider calls in [`respond`] are
//! async.

pub mod budget;
pub mod merge;
pub mod paginate;
pub mod rerank;
pub mod respond;
pub mod store;
pub mod truncate;
pub mod warn;

use ragpipe_core::SizeConstraints;

fn env_bool(key: &str) -> Option<bool> {
    let v = std::env::var(key).ok()?;
    let v = v.trim().to_ascii_lowercase();
    if v.is_empty() {
        return None;
    }
    Some(matches!(v.as_str(), "1" | "true" | "yes" | "on"))
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

/// Per-process retrieval defaults, read once per request from the environment.
///
/// Per-call tool arguments override these; nothing here is reconfigured
/// mid-request.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Merge keyword matches into vector results (`RAGPIPE_USE_HYBRID_SEARCH`).
    pub use_hybrid_search: bool,
    /// Run the reranker over merged candidates (`RAGPIPE_USE_RERANKING`).
    pub use_reranking: bool,
    /// Default merged result count (`RAGPIPE_DEFAULT_MATCH_COUNT`).
    pub default_match_count: usize,
    pub max_response_tokens: usize,
    pub max_content_length: usize,
    pub reserved_tokens: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        let c = SizeConstraints::default();
        Self {
            use_hybrid_search: false,
            use_reranking: false,
            default_match_count: 5,
            max_response_tokens: c.max_response_tokens,
            max_content_length: c.max_content_length,
            reserved_tokens: c.reserved_tokens,
        }
    }
}

impl RagConfig {
    /// Read defaults from the environment, clamped to sane bounds.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            use_hybrid_search: env_bool("RAGPIPE_USE_HYBRID_SEARCH")
                .unwrap_or(d.use_hybrid_search),
            use_reranking: env_bool("RAGPIPE_USE_RERANKING").unwrap_or(d.use_reranking),
            default_match_count: env_usize("RAGPIPE_DEFAULT_MATCH_COUNT", d.default_match_count)
                .clamp(1, 100),
            max_response_tokens: env_usize("RAGPIPE_MAX_RESPONSE_TOKENS", d.max_response_tokens)
                .clamp(256, 200_000),
            max_content_length: env_usize("RAGPIPE_MAX_CONTENT_LENGTH", d.max_content_length)
                .clamp(50, 100_000),
            reserved_tokens: env_usize("RAGPIPE_RESERVED_TOKENS", d.reserved_tokens)
                .min(10_000),
        }
    }

    /// Size constraints for one request, with per-call overrides applied by
    /// the caller afterwards.
    pub fn constraints(&self) -> SizeConstraints {
        SizeConstraints {
            max_response_tokens: self.max_response_tokens,
            max_content_length: self.max_content_length,
            include_full_content: false,
            reserved_tokens: self.reserved_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global; serialize tests that mutate them.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    struct EnvGuard {
        _lock: std::sync::MutexGuard<'static, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
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

    const CONFIG_ENV_KEYS: [&str; 6] = [
        "RAGPIPE_USE_HYBRID_SEARCH",
        "RAGPIPE_USE_RERANKING",
        "RAGPIPE_DEFAULT_MATCH_COUNT",
        "RAGPIPE_MAX_RESPONSE_TOKENS",
        "RAGPIPE_MAX_CONTENT_LENGTH",
        "RAGPIPE_RESERVED_TOKENS",
    ];

    #[test]
    fn config_defaults_when_env_unset() {
        let _g = EnvGuard::new(&CONFIG_ENV_KEYS);
        let c = RagConfig::from_env();
        assert!(!c.use_hybrid_search);
        assert!(!c.use_reranking);
        assert_eq!(c.default_match_count, 5);
        assert_eq!(c.max_response_tokens, 20_000);
        assert_eq!(c.max_content_length, 1_000);
        assert_eq!(c.reserved_tokens, 500);
    }

    #[test]
    fn config_reads_and_clamps_env_values() {
        let g = EnvGuard::new(&CONFIG_ENV_KEYS);
        g.set("RAGPIPE_USE_HYBRID_SEARCH", "true");
        g.set("RAGPIPE_USE_RERANKING", "on");
        g.set("RAGPIPE_DEFAULT_MATCH_COUNT", "5000");
        g.set("RAGPIPE_MAX_RESPONSE_TOKENS", "10");
        g.set("RAGPIPE_MAX_CONTENT_LENGTH", "3");
        let c = RagConfig::from_env();
        assert!(c.use_hybrid_search);
        assert!(c.use_reranking);
        assert_eq!(c.default_match_count, 100);
        assert_eq!(c.max_response_tokens, 256);
        assert_eq!(c.max_content_length, 50);
    }

    #[test]
    fn empty_or_garbage_env_values_fall_back_to_defaults() {
        let g = EnvGuard::new(&CONFIG_ENV_KEYS);
        g.set("RAGPIPE_USE_HYBRID_SEARCH", "   ");
        g.set("RAGPIPE_DEFAULT_MATCH_COUNT", "not-a-number");
        let c = RagConfig::from_env();
        assert!(!c.use_hybrid_search);
        assert_eq!(c.default_match_count, 5);
    }
}
