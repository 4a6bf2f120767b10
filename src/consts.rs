//! Project-wide constants.

use std::path::PathBuf;
use std::time::Duration;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Default chat model when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible API base (without the `/chat/completions` suffix).
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Dotenv file checked for the API key before the process environment.
pub const API_KEY_FILE: &str = "api_key.env";

/// Deadline for a single editor request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for a whole evaluation batch.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(90);

/// First retry delay; doubles on every further attempt.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Default HTTP port for `rewrite serve`.
pub const DEFAULT_PORT: u16 = 3001;

/// A length change larger than this many characters is logged as a new essay
/// rather than a user edit.
pub const NEW_ESSAY_THRESHOLD: usize = 1000;

/// Most diff baselines the tracker keeps at once.
pub const MAX_SESSIONS: usize = 1024;

/// A session unseen for this long is dropped when a new one arrives.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default database path: `~/.rewrite/edits.db`.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".rewrite")
        .join("edits.db")
}
