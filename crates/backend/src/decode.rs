use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use funclogs_core::backend::BackendError;
use funclogs_core::filter::Severity;
use funclogs_core::model::log::{Payload, RawRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /v2/entries:list`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListEntriesRequest {
    pub resource_names: Vec<String>,
    pub filter: String,
    pub order_by: String,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntriesResponse {
    #[serde(default)]
    pub entries: Vec<ApiLogEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLogEntry {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub receive_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub text_payload: Option<String>,
    #[serde(default)]
    pub json_payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub proto_payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub resource: MonitoredResource,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonitoredResource {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

pub fn decode_page(body: &[u8]) -> Result<ListEntriesResponse, BackendError> {
    serde_json::from_slice(body).map_err(|e| BackendError::Decode(format!("entries page: {e}")))
}

pub fn decode_entry(entry: ApiLogEntry) -> Result<RawRecord, BackendError> {
    let timestamp = entry
        .timestamp
        .or(entry.receive_timestamp)
        .ok_or_else(|| BackendError::Decode("log entry carries no timestamp".to_string()))?;

    let severity = entry.severity.as_deref().and_then(|s| match s.parse::<Severity>() {
        Ok(sev) => Some(sev),
        Err(_) => {
            tracing::warn!(severity = s, "unknown severity from backend, reporting DEFAULT");
            None
        }
    });

    let payload = if let Some(text) = entry.text_payload {
        Payload::Text(text)
    } else if let Some(map) = entry.json_payload {
        Payload::Structured(map)
    } else if let Some(map) = entry.proto_payload {
        Payload::Structured(map)
    } else {
        Payload::Absent
    };

    Ok(RawRecord {
        timestamp,
        severity,
        payload,
        resource_labels: entry.resource.labels,
    })
}

/// Maps a non-success response to a backend error. Filter grammar problems
/// surface as HTTP 400 / `INVALID_ARGUMENT`.
pub fn error_from_response(status: u16, body: &str) -> BackendError {
    let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error)
        .unwrap_or_default();
    let message = if detail.message.is_empty() {
        truncate(body.trim(), 256)
    } else {
        detail.message
    };

    match status {
        400 => BackendError::Rejected { status, message },
        _ if detail.status == "INVALID_ARGUMENT" => BackendError::Rejected { status, message },
        401 | 403 => BackendError::Auth(format!("status {status}: {message}")),
        _ => BackendError::Status { status, message },
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_text_and_json_payloads() {
        let body = json!({
            "entries": [
                {
                    "timestamp": "2023-12-15T12:00:00.123456Z",
                    "severity": "ERROR",
                    "textPayload": "boom",
                    "resource": {
                        "type": "cloud_run_revision",
                        "labels": {"service_name": "sample-func", "location": "europe-central2"}
                    }
                },
                {
                    "timestamp": "2023-12-15T12:00:01Z",
                    "jsonPayload": {"message": "structured", "code": 7},
                    "resource": {"type": "cloud_function", "labels": {"function_name": "sample-func"}}
                }
            ],
            "nextPageToken": "abc"
        })
        .to_string();

        let page = decode_page(body.as_bytes()).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
        assert_eq!(page.entries[0].resource.kind, "cloud_run_revision");

        let records: Vec<RawRecord> = page
            .entries
            .into_iter()
            .map(|e| decode_entry(e).unwrap())
            .collect();
        assert_eq!(records[0].severity, Some(Severity::Error));
        assert_eq!(records[0].payload, Payload::Text("boom".to_string()));
        assert_eq!(records[0].resource_labels["location"], "europe-central2");
        assert_eq!(
            records[0].timestamp,
            Utc.with_ymd_and_hms(2023, 12, 15, 12, 0, 0).unwrap()
                + chrono::Duration::microseconds(123_456)
        );

        assert_eq!(records[1].severity, None);
        assert_eq!(records[1].payload.text().as_deref(), Some("structured"));
    }

    #[test]
    fn empty_page_has_no_entries() {
        let page = decode_page(b"{}").unwrap();
        assert!(page.entries.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn receive_timestamp_backs_up_missing_timestamp() {
        let entry = ApiLogEntry {
            receive_timestamp: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..ApiLogEntry::default()
        };
        let record = decode_entry(entry).unwrap();
        assert_eq!(record.payload, Payload::Absent);

        assert!(matches!(
            decode_entry(ApiLogEntry::default()),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn unknown_severity_reports_default() {
        let entry = ApiLogEntry {
            timestamp: Some(Utc::now()),
            severity: Some("LOUD".to_string()),
            ..ApiLogEntry::default()
        };
        let record = decode_entry(entry).unwrap();
        assert_eq!(record.severity, None);
        assert_eq!(
            funclogs_core::model::log::LogEntry::from_raw(record).severity,
            Severity::Default
        );
    }

    #[test]
    fn invalid_argument_maps_to_rejection() {
        let body = json!({
            "error": {"code": 400, "message": "Unparseable filter: syntax error", "status": "INVALID_ARGUMENT"}
        })
        .to_string();
        assert_eq!(
            error_from_response(400, &body),
            BackendError::Rejected {
                status: 400,
                message: "Unparseable filter: syntax error".to_string()
            }
        );
    }

    #[test]
    fn other_statuses_map_by_kind() {
        assert!(matches!(
            error_from_response(403, r#"{"error":{"message":"denied","status":"PERMISSION_DENIED"}}"#),
            BackendError::Auth(_)
        ));
        assert_eq!(
            error_from_response(503, "upstream unavailable"),
            BackendError::Status {
                status: 503,
                message: "upstream unavailable".to_string()
            }
        );
    }
}
