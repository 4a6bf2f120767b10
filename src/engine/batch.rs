use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::{Engine, EvaluationBatch};
use crate::catalog::{EditorTask, evaluation_tasks};
use crate::config::EditorConfig;
use crate::editor::{EditorClient, EditorResult, EssayWriter, RequestPolicy};
use crate::error::BatchError;
use crate::provider::Provider;

/// Fans every evaluation task out concurrently and joins them all.
///
/// Each task runs in its own tokio task, so a slow or failing editor never
/// holds up or cancels its siblings. Results land in a fixed slot per task;
/// the batch order is the task order, not the completion order. The tasks
/// live in a [`JoinSet`], so dropping an unfinished batch aborts them.
pub struct BatchEngine {
    client: Arc<EditorClient>,
    writer: EssayWriter,
    tasks: Arc<[EditorTask]>,
    batch_timeout: Duration,
}

impl BatchEngine {
    pub fn new(provider: Arc<dyn Provider>, config: &EditorConfig) -> Self {
        let policy = RequestPolicy::from(config);
        Self {
            client: Arc::new(EditorClient::new(Arc::clone(&provider), policy)),
            writer: EssayWriter::new(provider, policy),
            tasks: evaluation_tasks().into(),
            batch_timeout: config.batch_timeout,
        }
    }

    /// Replace the evaluation task list.
    pub fn with_tasks(mut self, tasks: Vec<EditorTask>) -> Self {
        self.tasks = tasks.into();
        self
    }
}

#[async_trait]
impl Engine for BatchEngine {
    async fn run_batch(&self, essay: &str, source_text: &str) -> Result<EvaluationBatch, BatchError> {
        if self.tasks.is_empty() {
            return Err(BatchError::EmptyCatalog);
        }
        info!(tasks = self.tasks.len(), "evaluation batch started");

        let essay: Arc<str> = Arc::from(essay);
        let source: Arc<str> = Arc::from(source_text);

        let mut set = JoinSet::new();
        let mut slot_of = HashMap::with_capacity(self.tasks.len());
        for (slot, task) in self.tasks.iter().copied().enumerate() {
            let client = Arc::clone(&self.client);
            let essay = Arc::clone(&essay);
            let source = Arc::clone(&source);
            let handle =
                set.spawn(async move { client.execute(&task, &essay, Some(&*source)).await });
            slot_of.insert(handle.id(), slot);
        }

        let mut slots: Vec<Option<EditorResult>> = vec![None; self.tasks.len()];

        // `timeout` saturates oversized deadlines instead of overflowing.
        let collected = tokio::time::timeout(self.batch_timeout, async {
            while let Some(joined) = set.join_next_with_id().await {
                match joined {
                    Ok((id, result)) => {
                        if let Some(&slot) = slot_of.get(&id) {
                            slots[slot] = Some(result);
                        }
                    }
                    Err(e) if e.is_cancelled() => {
                        if let Some(&slot) = slot_of.get(&e.id()) {
                            slots[slot] =
                                Some(EditorResult::failed(self.tasks[slot].name, "cancelled"));
                        }
                    }
                    Err(e) => {
                        let task = slot_of
                            .get(&e.id())
                            .map(|&slot| self.tasks[slot].name)
                            .unwrap_or("unknown");
                        return Err(BatchError::Join {
                            task: task.to_string(),
                            source: e,
                        });
                    }
                }
            }
            Ok(())
        })
        .await;

        match collected {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                set.abort_all();
                return Err(e);
            }
            Err(_) => {
                warn!(
                    timeout = ?self.batch_timeout,
                    "batch deadline exceeded, cancelling unfinished editors"
                );
                set.abort_all();
            }
        }

        let results: Vec<_> = slots
            .into_iter()
            .zip(self.tasks.iter())
            .map(|(slot, task)| {
                slot.unwrap_or_else(|| EditorResult::failed(task.name, "batch deadline exceeded"))
            })
            .collect();

        let batch = EvaluationBatch::new(results);
        info!(
            tasks = batch.len(),
            failed = batch.failed_count(),
            "evaluation batch finished"
        );
        Ok(batch)
    }

    async fn generate(&self, source_text: &str, essay_prompt: &str) -> String {
        self.writer.generate(source_text, essay_prompt).await
    }
}
