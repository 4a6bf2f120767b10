use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{GENERATION_TASK, GenerationTask};
use crate::error::PayloadError;
use crate::provider::{ChatMessage, Provider, StructuredRequest};

use super::RequestPolicy;

/// Prefix of the string returned when essay generation fails.
pub const ERROR_PREFIX: &str = "An unexpected error occurred: ";

/// Returned when the model answers without a `final_answer`.
pub const NO_ANSWER: &str = "No answer provided.";

/// Writes an essay from a source text and an assignment prompt.
///
/// Like [`EditorClient`](super::EditorClient) it never fails outright; errors
/// come back as a string starting with [`ERROR_PREFIX`].
pub struct EssayWriter {
    provider: Arc<dyn Provider>,
    policy: RequestPolicy,
    task: GenerationTask,
}

impl EssayWriter {
    pub fn new(provider: Arc<dyn Provider>, policy: RequestPolicy) -> Self {
        Self {
            provider,
            policy,
            task: GENERATION_TASK,
        }
    }

    pub fn build_request(&self, source_text: &str, essay_prompt: &str) -> StructuredRequest {
        StructuredRequest {
            label: self.task.name.to_string(),
            messages: vec![
                ChatMessage::system(self.task.system_prompt),
                ChatMessage::user(format!("Textbook: {}", source_text)),
                ChatMessage::user(format!("Assignment: {}", essay_prompt)),
            ],
            schema: self.task.response_schema(),
        }
    }

    pub async fn generate(&self, source_text: &str, essay_prompt: &str) -> String {
        info!("generating essay");
        let request = self.build_request(source_text, essay_prompt);

        let payload = match self.policy.call(self.provider.as_ref(), &request).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "essay generation failed");
                return format!("{}{}", ERROR_PREFIX, e);
            }
        };

        let Some(object) = payload.as_object() else {
            warn!("essay payload is not an object: {}", payload);
            return format!("{}{}", ERROR_PREFIX, PayloadError::NotAnObject);
        };
        if let Some(extra) = object.keys().find(|k| *k != self.task.answer_field) {
            warn!(field = %extra, "essay payload has an unexpected field");
            return format!("{}{}", ERROR_PREFIX, PayloadError::UnexpectedField(extra.clone()));
        }

        // A missing answer is not an error: the client shows a placeholder.
        match object.get(self.task.answer_field) {
            Some(serde_json::Value::String(answer)) => answer.clone(),
            Some(other) => {
                warn!("final answer is not a string: {}", other);
                format!("{}{} is not a string", ERROR_PREFIX, self.task.answer_field)
            }
            None => NO_ANSWER.to_string(),
        }
    }
}
