use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Provider, StructuredRequest};

#[derive(Debug, Clone)]
enum Outcome {
    Json(serde_json::Value),
    Error(String),
    Panic(String),
}

/// What a [`MockProvider`] does for one call.
#[derive(Debug, Clone)]
pub struct MockReply {
    delay: Duration,
    outcome: Outcome,
}

impl MockReply {
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Json(value),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Error(message.into()),
        }
    }

    /// Panic inside `generate`, as a buggy provider would.
    pub fn panic(message: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Panic(message.into()),
        }
    }

    /// Sleep for `delay` before answering.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A scripted provider for tests. Replies are keyed by request label (the
/// task name); unknown labels fail like a transport error would.
///
/// A label may hold a sequence of replies. Each call takes the next one and
/// the last reply repeats once the sequence runs out.
pub struct MockProvider {
    replies: HashMap<String, Vec<MockReply>>,
    served: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<StructuredRequest>>,
    count: AtomicUsize,
    finished: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            served: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn reply(self, label: impl Into<String>, reply: MockReply) -> Self {
        self.sequence(label, vec![reply])
    }

    /// Script successive replies for one label.
    pub fn sequence(mut self, label: impl Into<String>, replies: Vec<MockReply>) -> Self {
        self.replies.insert(label.into(), replies);
        self
    }

    /// Number of `generate` calls started so far.
    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Number of calls that ran to the end of their scripted delay.
    pub fn finished_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order.
    pub fn calls(&self) -> Vec<StructuredRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// The last request received for `label`, if any.
    pub fn last_call(&self, label: &str) -> Option<StructuredRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.label == label)
            .cloned()
    }

    fn next_reply(&self, label: &str) -> Option<MockReply> {
        let replies = self.replies.get(label).filter(|r| !r.is_empty())?;
        let mut served = self.served.lock().unwrap();
        let n = served.entry(label.to_string()).or_insert(0);
        let reply = replies[(*n).min(replies.len() - 1)].clone();
        *n += 1;
        Some(reply)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn generate(&self, request: &StructuredRequest) -> Result<serde_json::Value> {
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(request.clone());

        let reply = self.next_reply(&request.label).ok_or_else(|| {
            anyhow!(
                "MockProvider: no reply scripted for '{}' (call {})",
                request.label,
                n + 1
            )
        })?;

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);

        match reply.outcome {
            Outcome::Json(value) => Ok(value),
            Outcome::Error(message) => Err(anyhow!(message)),
            Outcome::Panic(message) => panic!("{message}"),
        }
    }
}
