//! One schema-constrained editor call, and the result it settles into.
//!
//! [`EditorClient::execute`] is the isolation boundary: transport errors,
//! timeouts and malformed payloads are all turned into a failure marker here,
//! so nothing above this module has to catch per-task errors.

pub mod parse;
pub mod writer;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::EditorTask;
use crate::config::EditorConfig;
use crate::provider::{ChatMessage, Provider, StructuredRequest};

pub use parse::parse_edits;
pub use writer::EssayWriter;

/// Flagged spots for one task. Index `i` of each array describes the same spot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edits {
    pub context: Vec<String>,
    pub reasoning: Vec<String>,
    pub suggestion: Vec<String>,
}

impl Edits {
    /// Number of flagged spots.
    pub fn len(&self) -> usize {
        self.context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultStatus {
    Completed,
    Failed { reason: String },
}

/// Outcome of one editor task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorResult {
    pub task: String,
    pub status: ResultStatus,
    pub edits: Edits,
}

impl EditorResult {
    pub fn completed(task: impl Into<String>, edits: Edits) -> Self {
        Self {
            task: task.into(),
            status: ResultStatus::Completed,
            edits,
        }
    }

    /// The failure marker: well-formed, with all three arrays empty.
    pub fn failed(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            status: ResultStatus::Failed {
                reason: reason.into(),
            },
            edits: Edits::default(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ResultStatus::Failed { .. })
    }
}

/// Deadline and retry rules applied to every provider call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl From<&EditorConfig> for RequestPolicy {
    fn from(config: &EditorConfig) -> Self {
        Self {
            timeout: config.request_timeout,
            max_retries: config.max_retries,
            backoff: config.retry_backoff,
        }
    }
}

impl RequestPolicy {
    /// Call the provider, giving each attempt its own deadline. Failed
    /// attempts are retried with doubling backoff until `max_retries` runs out.
    pub async fn call(
        &self,
        provider: &dyn Provider,
        request: &StructuredRequest,
    ) -> Result<serde_json::Value> {
        let mut backoff = self.backoff;
        let mut attempt = 0;

        loop {
            let result = match tokio::time::timeout(self.timeout, provider.generate(request)).await
            {
                Ok(result) => result,
                Err(_) => Err(anyhow!("timed out after {:?}", self.timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        task = %request.label,
                        attempt,
                        error = %e,
                        "attempt failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Runs a single editor task against one provider.
pub struct EditorClient {
    provider: Arc<dyn Provider>,
    policy: RequestPolicy,
}

impl EditorClient {
    pub fn new(provider: Arc<dyn Provider>, policy: RequestPolicy) -> Self {
        Self { provider, policy }
    }

    /// System prompt, task instruction, essay, then source text for tasks
    /// that need it. A missing source is sent as an empty one.
    pub fn build_messages(
        task: &EditorTask,
        essay: &str,
        source_text: Option<&str>,
    ) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::system(task.system_prompt),
            ChatMessage::user(task.instruction_prompt),
            ChatMessage::user(format!("Essay: {}", essay)),
        ];
        if task.requires_source {
            messages.push(ChatMessage::user(format!(
                "Source Text: {}",
                source_text.unwrap_or("")
            )));
        }
        messages
    }

    pub fn build_request(
        task: &EditorTask,
        essay: &str,
        source_text: Option<&str>,
    ) -> StructuredRequest {
        StructuredRequest {
            label: task.name.to_string(),
            messages: Self::build_messages(task, essay, source_text),
            schema: task.response_schema(),
        }
    }

    /// Run `task` and settle into an [`EditorResult`]. Never fails: any error
    /// becomes a failure marker for this task.
    pub async fn execute(
        &self,
        task: &EditorTask,
        essay: &str,
        source_text: Option<&str>,
    ) -> EditorResult {
        info!(task = task.name, "running editor");
        let request = Self::build_request(task, essay, source_text);

        let payload = match self.policy.call(self.provider.as_ref(), &request).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(task = task.name, error = %e, "editor request failed");
                return EditorResult::failed(task.name, e.to_string());
            }
        };

        match parse_edits(task, &payload) {
            Ok(edits) => {
                info!(task = task.name, spots = edits.len(), "editor finished");
                EditorResult::completed(task.name, edits)
            }
            Err(e) => {
                warn!(task = task.name, error = %e, "editor payload rejected");
                EditorResult::failed(task.name, e.to_string())
            }
        }
    }
}
