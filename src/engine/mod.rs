pub mod batch;

use async_trait::async_trait;

use crate::editor::EditorResult;
use crate::error::BatchError;

/// The boundary the HTTP layer and the CLI talk to.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Run every evaluation editor over `essay`. Pass an empty `source_text`
    /// when none is available.
    async fn run_batch(&self, essay: &str, source_text: &str) -> Result<EvaluationBatch, BatchError>;

    /// Write an essay. Failures come back as an error string, never as `Err`.
    async fn generate(&self, source_text: &str, essay_prompt: &str) -> String;
}

/// Results of one evaluation run, one per configured task, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationBatch {
    results: Vec<EditorResult>,
}

impl EvaluationBatch {
    pub fn new(results: Vec<EditorResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EditorResult> {
        self.results.iter()
    }

    /// Look up a slot by task name.
    pub fn get(&self, task: &str) -> Option<&EditorResult> {
        self.results.iter().find(|r| r.task == task)
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }
}

impl<'a> IntoIterator for &'a EvaluationBatch {
    type Item = &'a EditorResult;
    type IntoIter = std::slice::Iter<'a, EditorResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
