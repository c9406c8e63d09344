use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FunclogsError, QueryError, Result};
use crate::filter::DEFAULT_SEVERITY;
use crate::model::log::LogEntry;
use crate::time::parse_instant;

/// Parameters of a single log query against the logging backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryRequest {
    pub target_name: String,
    pub target_region: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Backend filter fragment, appended verbatim when non-empty.
    #[serde(default)]
    pub filter: String,
    /// Minimum severity token, passed to the backend as-is.
    #[serde(default = "default_severity")]
    pub severity: String,
}

fn default_severity() -> String {
    DEFAULT_SEVERITY.to_string()
}

impl QueryRequest {
    pub fn new(target_name: impl Into<String>, target_region: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            target_region: target_region.into(),
            start: None,
            end: None,
            filter: String::new(),
            severity: default_severity(),
        }
    }

    /// Checks that every required field is present and non-blank.
    pub fn validate(&self) -> std::result::Result<(), QueryError> {
        let mut missing = Vec::new();
        if self.target_name.trim().is_empty() {
            missing.push("cloud_function_name");
        }
        if self.target_region.trim().is_empty() {
            missing.push("cloud_function_region");
        }
        if self.start.is_none() {
            missing.push("start_time");
        }
        if self.end.is_none() {
            missing.push("end_time");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(QueryError::MissingParameter(missing))
        }
    }
}

/// Key used to fetch a persisted entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogLookup {
    Id(i64),
    Timestamp(DateTime<Utc>),
}

impl FromStr for LogLookup {
    type Err = FunclogsError;

    /// Integers are ids; anything else must parse as a timestamp.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(Self::Id(id));
        }
        parse_instant(s)
            .map(Self::Timestamp)
            .map_err(|_| FunclogsError::Parse(format!("expected entry id or timestamp, got {s}")))
    }
}

impl fmt::Display for LogLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLookup::Id(id) => write!(f, "id {id}"),
            LogLookup::Timestamp(ts) => write!(f, "timestamp {}", ts.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredLog {
    pub id: i64,
    #[serde(flatten)]
    pub entry: LogEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub db_path: String,
    pub db_size_bytes: u64,
    pub entries_count: usize,
    pub oldest_ts: Option<DateTime<Utc>>,
    pub newest_ts: Option<DateTime<Utc>>,
}
