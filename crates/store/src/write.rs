use chrono::SubsecRound;
use duckdb::params;
use funclogs_core::error::{FunclogsError, Result};
use funclogs_core::model::log::LogEntry;
use funclogs_core::query::StoredLog;

use crate::Store;

impl Store {
    pub fn insert_log(&self, entry: &LogEntry) -> Result<StoredLog> {
        self.insert_logs(std::slice::from_ref(entry))?
            .pop()
            .ok_or_else(|| FunclogsError::Internal("insert returned no row".to_string()))
    }

    /// Inserts entries in one transaction and returns them with their ids.
    /// Timestamps are truncated to the column's microsecond precision, and the
    /// returned entries carry the truncated value.
    pub fn insert_logs(&self, entries: &[LogEntry]) -> Result<Vec<StoredLog>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| FunclogsError::Store(format!("begin tx failed: {e}")))?;

        let mut stored = Vec::with_capacity(entries.len());
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO logs (id, ts, severity, text_payload, resource)
                     VALUES (nextval('logs_id_seq'), ?, ?, ?, ?)
                     RETURNING id",
                )
                .map_err(|e| FunclogsError::Store(format!("prepare insert logs failed: {e}")))?;

            for entry in entries {
                let entry = LogEntry {
                    timestamp: entry.timestamp.trunc_subsecs(6),
                    ..entry.clone()
                };
                let resource = serde_json::to_string(&entry.resource).map_err(|e| {
                    FunclogsError::Internal(format!("resource serialization failed: {e}"))
                })?;
                let id = stmt
                    .query_row(
                        params![
                            entry.timestamp.naive_utc(),
                            entry.severity.as_str(),
                            entry.text_payload,
                            resource,
                        ],
                        |row| row.get::<_, i64>(0),
                    )
                    .map_err(|e| FunclogsError::Store(format!("insert log failed: {e}")))?;
                stored.push(StoredLog { id, entry });
            }
        }

        tx.commit()
            .map_err(|e| FunclogsError::Store(format!("commit logs failed: {e}")))?;
        tracing::debug!(count = stored.len(), "stored log entries");
        Ok(stored)
    }
}
