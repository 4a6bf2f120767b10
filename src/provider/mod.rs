pub mod mock;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Who a chat message is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One role-tagged message sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A named, closed JSON schema the model output must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

/// Everything needed for one schema-constrained generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    /// Task name, for logs and for scripted providers.
    pub label: String,
    pub messages: Vec<ChatMessage>,
    pub schema: ResponseSchema,
}

/// Token usage from a single LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// An upstream model that answers with JSON matching the requested schema.
///
/// Implementations must be safe to call concurrently: the orchestrator issues
/// every editor request through one shared provider.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, request: &StructuredRequest) -> Result<serde_json::Value>;
}
