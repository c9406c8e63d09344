use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::Severity;

/// Normalized log entry exposed by the gateway. An entry without a severity,
/// or with one outside the Cloud Logging set, reports `DEFAULT`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(rename = "textPayload")]
    pub text_payload: Option<String>,
    pub resource: BTreeMap<String, String>,
}

/// Log record as returned by the logging backend, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub timestamp: DateTime<Utc>,
    pub severity: Option<Severity>,
    pub payload: Payload,
    pub resource_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    Structured(serde_json::Map<String, serde_json::Value>),
    Text(String),
    #[default]
    Absent,
}

impl Payload {
    /// Human-readable text carried by the payload: the `message` field of a
    /// structured payload, or the whole string payload.
    pub fn text(&self) -> Option<String> {
        match self {
            Payload::Structured(map) => match map.get("message")? {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            },
            Payload::Text(s) => Some(s.clone()),
            Payload::Absent => None,
        }
    }
}

impl LogEntry {
    pub fn from_raw(raw: RawRecord) -> Self {
        Self {
            timestamp: raw.timestamp,
            severity: raw.severity.unwrap_or_default(),
            text_payload: raw.payload.text(),
            resource: raw.resource_labels,
        }
    }
}
