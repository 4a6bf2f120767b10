//! Runtime configuration for the editor pipeline.
//!
//! Values come from three layers: built-in defaults, environment variables
//! (see [`EditorConfig::from_env`]), and CLI flags applied on top with
//! [`EditorConfig::with_overrides`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::consts::{
    API_KEY_FILE, DEFAULT_API_BASE, DEFAULT_BATCH_TIMEOUT, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RETRY_BACKOFF,
};

/// Settings shared by the provider, the editor client and the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    pub model: String,
    pub api_base: String,
    /// Deadline for one provider attempt.
    pub request_timeout: Duration,
    /// Deadline for a whole evaluation batch.
    pub batch_timeout: Duration,
    /// Extra attempts after the first failure. Zero means single attempt.
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            max_retries: 0,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// CLI-level overrides. `None` keeps whatever the lower layers produced.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub batch_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

impl EditorConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads through `lookup`, so
    /// tests don't have to touch the real environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            model: lookup("REWRITE_MODEL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.model),
            api_base: lookup("OPENAI_API_BASE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.api_base),
            request_timeout: parsed("REWRITE_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.request_timeout),
            batch_timeout: parsed("REWRITE_BATCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.batch_timeout),
            max_retries: parsed("REWRITE_MAX_RETRIES")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(default.max_retries),
            retry_backoff: parsed("REWRITE_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.retry_backoff),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if let Some(secs) = overrides.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.batch_timeout_secs {
            self.batch_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = overrides.max_retries {
            self.max_retries = retries;
        }
        self
    }
}

/// Load `api_key.env` and then `.env` from `dir` into the process
/// environment. Variables already set are left alone. Returns the files that
/// were loaded. Call this before logging is set up so `RUST_LOG` from a file
/// takes effect.
pub fn load_dotenv(dir: &Path) -> Vec<PathBuf> {
    [API_KEY_FILE, ".env"]
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file() && dotenvy::from_path(path).is_ok())
        .collect()
}
