use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use duckdb::{Row, params};
use funclogs_core::error::{FunclogsError, Result};
use funclogs_core::filter::Severity;
use funclogs_core::model::log::LogEntry;
use funclogs_core::query::{LogLookup, StoredLog};

use crate::Store;

const SELECT_COLUMNS: &str = "SELECT id, ts, severity, text_payload, resource FROM logs";

impl Store {
    /// Fetches one persisted entry. A timestamp lookup returns the earliest
    /// stored entry carrying exactly that timestamp.
    pub fn find_log(&self, lookup: &LogLookup) -> Result<Option<StoredLog>> {
        let conn = self.conn();
        let row = match lookup {
            LogLookup::Id(id) => {
                let mut stmt = conn
                    .prepare(&format!("{SELECT_COLUMNS} WHERE id = ?"))
                    .map_err(|e| FunclogsError::Store(format!("prepare lookup failed: {e}")))?;
                let mut rows = stmt
                    .query_map(params![*id], read_row)
                    .map_err(|e| FunclogsError::Store(format!("lookup by id failed: {e}")))?;
                rows.next()
            }
            LogLookup::Timestamp(ts) => {
                let mut stmt = conn
                    .prepare(&format!(
                        "{SELECT_COLUMNS} WHERE ts = ? ORDER BY id ASC LIMIT 1"
                    ))
                    .map_err(|e| FunclogsError::Store(format!("prepare lookup failed: {e}")))?;
                let mut rows = stmt
                    .query_map(params![ts.naive_utc()], read_row)
                    .map_err(|e| {
                        FunclogsError::Store(format!("lookup by timestamp failed: {e}"))
                    })?;
                rows.next()
            }
        };

        let Some(row) = row else {
            return Ok(None);
        };
        let raw = row.map_err(|e| FunclogsError::Store(format!("map log row failed: {e}")))?;
        raw.into_stored().map(Some)
    }
}

struct LogRow {
    id: i64,
    ts: NaiveDateTime,
    severity: String,
    text_payload: Option<String>,
    resource: String,
}

fn read_row(row: &Row<'_>) -> duckdb::Result<LogRow> {
    Ok(LogRow {
        id: row.get(0)?,
        ts: row.get(1)?,
        severity: row.get(2)?,
        text_payload: row.get(3)?,
        resource: row.get(4)?,
    })
}

impl LogRow {
    fn into_stored(self) -> Result<StoredLog> {
        let severity = self.severity.parse::<Severity>()?;
        let resource: BTreeMap<String, String> = serde_json::from_str(&self.resource)
            .map_err(|e| FunclogsError::Store(format!("corrupt resource column: {e}")))?;
        Ok(StoredLog {
            id: self.id,
            entry: LogEntry {
                timestamp: self.ts.and_utc(),
                severity,
                text_payload: self.text_payload,
                resource,
            },
        })
    }
}
