//! Tracks how the user changes their essay between snapshots.
//!
//! Each document gets its own [`EditSession`] holding the last text seen for
//! it. The [`SessionRegistry`] keys sessions by id so concurrent editors never
//! share a diff baseline.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::consts::{MAX_SESSIONS, NEW_ESSAY_THRESHOLD, SESSION_IDLE_TTL};
use crate::store::ChangeLog;

/// Session id used when the client doesn't send one.
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    #[serde(rename = "user edit")]
    UserEdit,
    #[serde(rename = "new essay")]
    NewEssay,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::UserEdit => "user edit",
            ChangeType::NewEssay => "new essay",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The changed region between two snapshots. Indices are character offsets
/// into the new text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub start_index: usize,
    pub end_index: usize,
    pub change_type: ChangeType,
    pub edit_content: String,
}

/// Diff two snapshots by trimming their common prefix and suffix.
///
/// Everything between the first and last differing character counts as one
/// replaced region. Identical inputs report the whole new text as the span.
pub fn calculate_edit(old_text: &str, new_text: &str) -> TextChange {
    let old: Vec<char> = old_text.chars().collect();
    let new: Vec<char> = new_text.chars().collect();

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let deleted: String = old[prefix..old.len() - suffix].iter().collect();
    let added: String = new[prefix..new.len() - suffix].iter().collect();

    let (start_index, end_index) = if added.is_empty() && deleted.is_empty() {
        (0, new.len())
    } else {
        (prefix, new.len() - suffix)
    };

    let change_type = if old.len().abs_diff(new.len()) > NEW_ESSAY_THRESHOLD {
        ChangeType::NewEssay
    } else {
        ChangeType::UserEdit
    };

    TextChange {
        start_index,
        end_index,
        change_type,
        edit_content: format!("Added: {}; Deleted: {}", added, deleted),
    }
}

/// The diff baseline for one document.
#[derive(Debug, Default, Clone)]
pub struct EditSession {
    last_text: String,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_text(&self) -> &str {
        &self.last_text
    }

    /// Compare `text` with the baseline without moving it. `None` if nothing
    /// changed.
    pub fn diff(&self, text: &str) -> Option<TextChange> {
        (self.last_text != text).then(|| calculate_edit(&self.last_text, text))
    }

    pub fn commit(&mut self, text: &str) {
        self.last_text = text.to_string();
    }

    /// [`diff`](Self::diff) and then [`commit`](Self::commit).
    pub fn observe(&mut self, text: &str) -> Option<TextChange> {
        let change = self.diff(text)?;
        self.commit(text);
        Some(change)
    }
}

#[derive(Debug)]
struct SessionEntry {
    session: EditSession,
    last_seen: Instant,
}

/// Per-document sessions, created on first use.
///
/// Holds at most `max_sessions` baselines. Sessions idle for longer than
/// `idle_ttl` are dropped when a new one arrives; if the registry is still
/// full, the least recently seen session goes.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_limits(MAX_SESSIONS, SESSION_IDLE_TTL)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    /// Diff `text` against the session baseline and advance it.
    pub async fn observe(&self, session_id: &str, text: &str) -> Option<TextChange> {
        let mut sessions = self.sessions.lock().await;
        let entry = self.entry(&mut sessions, session_id);
        entry.session.observe(text)
    }

    /// Diff `text` against the session baseline and write the change to
    /// `log`. The baseline only moves once the write succeeds, so a failed
    /// write can be retried with the same text. Returns the logged row id.
    pub async fn record(
        &self,
        session_id: &str,
        text: &str,
        log: &dyn ChangeLog,
    ) -> Result<Option<(i64, TextChange)>> {
        let mut sessions = self.sessions.lock().await;
        let entry = self.entry(&mut sessions, session_id);
        let Some(change) = entry.session.diff(text) else {
            return Ok(None);
        };

        let id = log.record_change(&change).await?;
        entry.session.commit(text);
        Ok(Some((id, change)))
    }

    pub async fn reset(&self) {
        self.sessions.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains_key(session_id)
    }

    fn entry<'a>(
        &self,
        sessions: &'a mut HashMap<String, SessionEntry>,
        session_id: &str,
    ) -> &'a mut SessionEntry {
        let now = Instant::now();
        if !sessions.contains_key(session_id) {
            self.evict(sessions, now);
        }
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                session: EditSession::new(),
                last_seen: now,
            });
        entry.last_seen = now;
        entry
    }

    /// Make room for one more session.
    fn evict(&self, sessions: &mut HashMap<String, SessionEntry>, now: Instant) {
        let ttl = self.idle_ttl;
        sessions.retain(|_, e| now.saturating_duration_since(e.last_seen) < ttl);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    debug!(session = %id, "evicting least recently seen session");
                    sessions.remove(&id);
                }
                None => break,
            }
        }
    }
}
