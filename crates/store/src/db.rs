use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;
use duckdb::Connection;
use funclogs_core::error::{FunclogsError, Result};
use funclogs_core::query::StatusResponse;

use crate::schema::SCHEMA_SQL;

const MEMORY_PATH: &str = ":memory:";

const STATUS_SQL: &str = "SELECT COUNT(*), MIN(ts), MAX(ts) FROM logs";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Memory,
    File(PathBuf),
}

impl Location {
    fn display(&self) -> String {
        match self {
            Location::Memory => MEMORY_PATH.to_string(),
            Location::File(path) => path.display().to_string(),
        }
    }

    fn size_bytes(&self) -> u64 {
        match self {
            Location::Memory => 0,
            Location::File(path) => fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        }
    }
}

/// Shared handle to the entry store. Clones share one connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    location: Location,
}

impl Store {
    /// Opens (creating if needed) a file-backed store, including any missing
    /// parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                FunclogsError::Io(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| FunclogsError::Store(format!("failed to open duckdb: {e}")))?;
        let store = Self::with_schema(conn, Location::File(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), "store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FunclogsError::Store(format!("failed to open in-memory db: {e}")))?;
        Self::with_schema(conn, Location::Memory)
    }

    fn with_schema(conn: Connection, location: Location) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| FunclogsError::Store(format!("failed to initialize schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    /// Entry count and timestamp span of the store.
    pub fn status(&self) -> Result<StatusResponse> {
        let (count, oldest, newest) = self
            .conn()
            .query_row(STATUS_SQL, [], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<NaiveDateTime>>(1)?,
                    row.get::<_, Option<NaiveDateTime>>(2)?,
                ))
            })
            .map_err(|e| FunclogsError::Store(format!("status query failed: {e}")))?;

        Ok(StatusResponse {
            db_path: self.location.display(),
            db_size_bytes: self.location.size_bytes(),
            entries_count: usize::try_from(count).unwrap_or_default(),
            oldest_ts: oldest.map(|ts| ts.and_utc()),
            newest_ts: newest.map(|ts| ts.and_utc()),
        })
    }
}
