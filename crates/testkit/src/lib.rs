use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use funclogs_core::backend::{BackendError, LogBackend};
use funclogs_core::filter::Severity;
use funclogs_core::model::log::{Payload, RawRecord};
use serde_json::{Value, json};

pub const SAMPLE_FUNCTION: &str = "sample-func";
pub const SAMPLE_REGION: &str = "europe-central2";

pub fn sample_base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 12, 15, 12, 0, 0).unwrap()
}

/// Backend stand-in that answers every call with the same outcome and
/// remembers the filters it was handed.
pub struct StaticBackend {
    outcome: Result<Vec<RawRecord>, BackendError>,
    filters: Mutex<Vec<String>>,
}

impl StaticBackend {
    pub fn with_records(records: Vec<RawRecord>) -> Self {
        Self {
            outcome: Ok(records),
            filters: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: BackendError) -> Self {
        Self {
            outcome: Err(err),
            filters: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.filters.lock().unwrap().len()
    }

    pub fn filters(&self) -> Vec<String> {
        self.filters.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogBackend for StaticBackend {
    async fn list(&self, filter: &str) -> Result<Vec<RawRecord>, BackendError> {
        self.filters.lock().unwrap().push(filter.to_string());
        self.outcome.clone()
    }
}

fn sample_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("service_name".to_string(), SAMPLE_FUNCTION.to_string()),
        ("location".to_string(), SAMPLE_REGION.to_string()),
        ("project_id".to_string(), "demo-project".to_string()),
    ])
}

/// Three records covering a text payload, a structured payload and a
/// payload-less entry without severity.
pub fn sample_records() -> Vec<RawRecord> {
    let base = sample_base_time();
    let mut structured = serde_json::Map::new();
    structured.insert("message".to_string(), json!("cold start took 2.1s"));
    structured.insert("latency_ms".to_string(), json!(2100));

    vec![
        RawRecord {
            timestamp: base,
            severity: Some(Severity::Error),
            payload: Payload::Text("Traceback: division by zero".to_string()),
            resource_labels: sample_labels(),
        },
        RawRecord {
            timestamp: base + Duration::seconds(1),
            severity: Some(Severity::Warning),
            payload: Payload::Structured(structured),
            resource_labels: sample_labels(),
        },
        RawRecord {
            timestamp: base + Duration::seconds(2),
            severity: None,
            payload: Payload::Absent,
            resource_labels: sample_labels(),
        },
    ]
}

/// The same three records as one Cloud Logging `entries.list` page.
pub fn sample_entries_page() -> Value {
    let resource = json!({
        "type": "cloud_run_revision",
        "labels": {
            "service_name": SAMPLE_FUNCTION,
            "location": SAMPLE_REGION,
            "project_id": "demo-project"
        }
    });
    json!({
        "entries": [
            {
                "logName": "projects/demo-project/logs/run.googleapis.com%2Fstderr",
                "timestamp": "2023-12-15T12:00:00Z",
                "severity": "ERROR",
                "textPayload": "Traceback: division by zero",
                "resource": resource
            },
            {
                "logName": "projects/demo-project/logs/run.googleapis.com%2Fstdout",
                "timestamp": "2023-12-15T12:00:01Z",
                "severity": "WARNING",
                "jsonPayload": {"message": "cold start took 2.1s", "latency_ms": 2100},
                "resource": resource
            },
            {
                "logName": "projects/demo-project/logs/run.googleapis.com%2Frequests",
                "timestamp": "2023-12-15T12:00:02Z",
                "resource": resource
            }
        ]
    })
}
