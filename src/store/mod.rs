pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tracker::TextChange;

/// An editor suggestion the user chose to keep, anchored to a span of the
/// essay. `(type, start_index, end_index)` identifies a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRecord {
    #[serde(rename = "type")]
    pub edit_type: String,
    pub phrase: String,
    pub suggestion: String,
    pub reasoning: String,
    pub start_index: i64,
    pub end_index: i64,
    #[serde(default)]
    pub completed: bool,
}

/// An [`EditRecord`] as read back, with its row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEdit {
    pub id: i64,
    #[serde(flatten)]
    pub record: EditRecord,
}

/// A logged user change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedChange {
    pub id: i64,
    pub timestamp: String,
    #[serde(flatten)]
    pub change: TextChange,
}

/// Accepted editor suggestions.
#[async_trait]
pub trait EditStore: Send + Sync {
    /// Insert or update all records in one go. Returns how many were written.
    async fn store_edits(&self, records: &[EditRecord]) -> Result<usize>;
    async fn list_edits(&self) -> Result<Vec<StoredEdit>>;
    /// Returns `false` if no edit has that id.
    async fn set_completed(&self, id: i64, completed: bool) -> Result<bool>;
    /// Drop every edit and every logged change.
    async fn clear(&self) -> Result<()>;
}

/// History of user changes to the essay text.
#[async_trait]
pub trait ChangeLog: Send + Sync {
    async fn record_change(&self, change: &TextChange) -> Result<i64>;
    async fn list_changes(&self) -> Result<Vec<LoggedChange>>;
}
