//! Shapes batches into the JSON the browser client consumes.

use serde::{Deserialize, Serialize};

use crate::editor::Edits;
use crate::engine::EvaluationBatch;

/// `{"type": <task>, "edits": {"context": [...], "reasoning": [...], "suggestion": [...]}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    #[serde(rename = "type")]
    pub task_type: String,
    pub edits: Edits,
}

/// `{"response": <essay or error string>}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationEnvelope {
    pub response: String,
}

/// One envelope per slot, in batch order. Failed slots keep their place with
/// empty arrays.
pub fn to_envelope(batch: &EvaluationBatch) -> Vec<TaskEnvelope> {
    batch
        .iter()
        .map(|result| TaskEnvelope {
            task_type: result.task.clone(),
            edits: result.edits.clone(),
        })
        .collect()
}
