use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::sync::Mutex;

use super::{ChangeLog, EditRecord, EditStore, LoggedChange, StoredEdit};
use crate::tracker::{ChangeType, TextChange};

/// SQLite-backed edit store and change log. Both tables live in one database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database. Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open edit database at {path}"))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS edits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                phrase TEXT NOT NULL,
                suggestion TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                start_index INTEGER NOT NULL,
                end_index INTEGER NOT NULL,
                completed BOOLEAN NOT NULL,
                UNIQUE(type, start_index, end_index)
            );
            CREATE TABLE IF NOT EXISTS user_edits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                start_index INTEGER NOT NULL,
                end_index INTEGER NOT NULL,
                change_type TEXT NOT NULL,
                edit_content TEXT NOT NULL
            );",
        )
        .context("failed to create edit tables")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }
}

#[async_trait]
impl EditStore for SqliteStore {
    async fn store_edits(&self, records: &[EditRecord]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO edits (type, phrase, suggestion, reasoning, start_index, end_index, completed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(type, start_index, end_index) DO UPDATE SET
                    phrase = excluded.phrase,
                    suggestion = excluded.suggestion,
                    reasoning = excluded.reasoning,
                    completed = excluded.completed",
            )?;
            for record in records {
                stmt.execute(params![
                    record.edit_type,
                    record.phrase,
                    record.suggestion,
                    record.reasoning,
                    record.start_index,
                    record.end_index,
                    record.completed,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    async fn list_edits(&self) -> Result<Vec<StoredEdit>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, type, phrase, suggestion, reasoning, start_index, end_index, completed
             FROM edits ORDER BY id ASC",
        )?;
        let edits = stmt
            .query_map([], |row| {
                Ok(StoredEdit {
                    id: row.get(0)?,
                    record: EditRecord {
                        edit_type: row.get(1)?,
                        phrase: row.get(2)?,
                        suggestion: row.get(3)?,
                        reasoning: row.get(4)?,
                        start_index: row.get(5)?,
                        end_index: row.get(6)?,
                        completed: row.get(7)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edits)
    }

    async fn set_completed(&self, id: i64, completed: bool) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE edits SET completed = ?1 WHERE id = ?2",
            params![completed, id],
        )?;
        Ok(updated > 0)
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "DELETE FROM edits;
            DELETE FROM user_edits;
            DELETE FROM sqlite_sequence WHERE name IN ('edits', 'user_edits');",
        )?;
        Ok(())
    }
}

#[async_trait]
impl ChangeLog for SqliteStore {
    async fn record_change(&self, change: &TextChange) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_edits (start_index, end_index, change_type, edit_content)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                change.start_index as i64,
                change.end_index as i64,
                change.change_type.as_str(),
                change.edit_content,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_changes(&self) -> Result<Vec<LoggedChange>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, start_index, end_index, change_type, edit_content
             FROM user_edits ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, timestamp, start, end, change_type, edit_content)| {
                Ok(LoggedChange {
                    id,
                    timestamp,
                    change: TextChange {
                        start_index: usize::try_from(start)?,
                        end_index: usize::try_from(end)?,
                        change_type: parse_change_type(&change_type)?,
                        edit_content,
                    },
                })
            })
            .collect()
    }
}

fn parse_change_type(label: &str) -> Result<ChangeType> {
    match label {
        "user edit" => Ok(ChangeType::UserEdit),
        "new essay" => Ok(ChangeType::NewEssay),
        other => bail!("unknown change type in user_edits: {other}"),
    }
}
