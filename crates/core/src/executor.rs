use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, LogBackend};
use crate::error::{FunclogsError, QueryError};
use crate::filter::FilterBuilder;
use crate::model::log::LogEntry;
use crate::query::QueryRequest;

/// How backend failures are folded into [`QueryError`] kinds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClassification {
    /// Every backend failure is reported as an invalid filter.
    #[default]
    Narrow,
    /// Only grammar rejections are invalid filters; transport, auth and
    /// other backend failures are unexpected.
    Strict,
}

impl FromStr for ErrorClassification {
    type Err = FunclogsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "narrow" => Ok(Self::Narrow),
            "strict" => Ok(Self::Strict),
            _ => Err(FunclogsError::Parse(format!(
                "unknown error classification: {s} (expected narrow or strict)"
            ))),
        }
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Narrow => f.write_str("narrow"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

impl ErrorClassification {
    pub fn classify(self, err: BackendError) -> QueryError {
        match self {
            Self::Narrow => QueryError::InvalidFilterQuery(err.to_string()),
            Self::Strict if err.is_filter_rejection() => {
                QueryError::InvalidFilterQuery(err.to_string())
            }
            Self::Strict => QueryError::Unexpected(err.to_string()),
        }
    }
}

/// Runs one log query: validate, build the filter, call the backend once and
/// normalize what comes back. Holds no per-query state, so a single executor
/// can serve concurrent callers.
#[derive(Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn LogBackend>,
    classification: ErrorClassification,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn LogBackend>) -> Self {
        Self {
            backend,
            classification: ErrorClassification::default(),
        }
    }

    pub fn with_classification(mut self, classification: ErrorClassification) -> Self {
        self.classification = classification;
        self
    }

    pub async fn query(&self, req: &QueryRequest) -> Result<Vec<LogEntry>, QueryError> {
        req.validate()?;
        let filter = FilterBuilder::build(req);

        let records = self
            .backend
            .list(&filter)
            .await
            .map_err(|e| self.classification.classify(e))?;

        Ok(records.into_iter().map(LogEntry::from_raw).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::filter::Severity;
    use crate::model::log::{Payload, RawRecord};

    struct FakeBackend {
        outcome: Result<Vec<RawRecord>, BackendError>,
        filters: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn returning(records: Vec<RawRecord>) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(records),
                filters: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: BackendError) -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(err),
                filters: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.filters.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LogBackend for FakeBackend {
        async fn list(&self, filter: &str) -> Result<Vec<RawRecord>, BackendError> {
            self.filters.lock().unwrap().push(filter.to_string());
            self.outcome.clone()
        }
    }

    fn records() -> Vec<RawRecord> {
        let base = Utc.with_ymd_and_hms(2023, 10, 1, 12, 0, 0).unwrap();
        let labels = BTreeMap::from([("function_name".to_string(), "test_function".to_string())]);
        vec![
            RawRecord {
                timestamp: base,
                severity: Some(Severity::Info),
                payload: Payload::Text("Test log entry".into()),
                resource_labels: labels.clone(),
            },
            RawRecord {
                timestamp: base + Duration::seconds(5),
                severity: Some(Severity::Error),
                payload: Payload::Structured(
                    json!({"message": "boom"}).as_object().cloned().unwrap(),
                ),
                resource_labels: labels.clone(),
            },
            RawRecord {
                timestamp: base - Duration::seconds(5),
                severity: None,
                payload: Payload::Absent,
                resource_labels: labels,
            },
        ]
    }

    fn request() -> QueryRequest {
        QueryRequest {
            start: Some(Utc.with_ymd_and_hms(2023, 10, 1, 0, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2023, 10, 1, 23, 59, 59).unwrap()),
            ..QueryRequest::new("test_function", "us-central1")
        }
    }

    #[tokio::test]
    async fn missing_parameters_never_reach_backend() {
        let backend = FakeBackend::returning(records());
        let executor = QueryExecutor::new(backend.clone());

        let cases = [
            QueryRequest {
                target_name: String::new(),
                ..request()
            },
            QueryRequest {
                target_region: String::new(),
                ..request()
            },
            QueryRequest {
                start: None,
                ..request()
            },
            QueryRequest {
                end: None,
                ..request()
            },
        ];

        for req in &cases {
            let err = executor.query(req).await.unwrap_err();
            assert!(matches!(err, QueryError::MissingParameter(_)), "{err:?}");
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn normalizes_records_in_backend_order() {
        let backend = FakeBackend::returning(records());
        let executor = QueryExecutor::new(backend.clone());

        let logs = executor.query(&request()).await.unwrap();

        assert_eq!(backend.calls(), 1);
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].text_payload.as_deref(), Some("Test log entry"));
        assert_eq!(logs[0].severity, Severity::Info);
        assert_eq!(logs[1].text_payload.as_deref(), Some("boom"));
        assert_eq!(logs[2].text_payload, None);
        assert_eq!(logs[2].severity, Severity::Default);
        assert!(logs[2].timestamp < logs[0].timestamp);
        assert_eq!(logs[0].resource["function_name"], "test_function");
    }

    #[tokio::test]
    async fn passes_built_filter_to_backend() {
        let backend = FakeBackend::returning(Vec::new());
        let executor = QueryExecutor::new(backend.clone());
        let req = QueryRequest {
            filter: "textPayload:POST".into(),
            severity: "ERROR".into(),
            ..request()
        };

        let logs = executor.query(&req).await.unwrap();

        assert!(logs.is_empty());
        let filters = backend.filters.lock().unwrap();
        assert_eq!(filters.as_slice(), [FilterBuilder::build(&req)]);
    }

    #[tokio::test]
    async fn backend_failure_is_invalid_filter_by_default() {
        let executor = QueryExecutor::new(FakeBackend::failing(BackendError::Rejected {
            status: 400,
            message: "Unparseable filter".into(),
        }));
        let err = executor.query(&request()).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilterQuery(_)));

        let executor = QueryExecutor::new(FakeBackend::failing(BackendError::Transport(
            "connection refused".into(),
        )));
        let err = executor.query(&request()).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilterQuery(_)));
    }

    #[tokio::test]
    async fn strict_classification_separates_operational_failures() {
        let executor = QueryExecutor::new(FakeBackend::failing(BackendError::Auth(
            "token exchange failed".into(),
        )))
        .with_classification(ErrorClassification::Strict);
        let err = executor.query(&request()).await.unwrap_err();
        assert!(matches!(err, QueryError::Unexpected(_)));

        let executor = QueryExecutor::new(FakeBackend::failing(BackendError::Rejected {
            status: 400,
            message: "Unparseable filter".into(),
        }))
        .with_classification(ErrorClassification::Strict);
        let err = executor.query(&request()).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilterQuery(_)));
    }

    #[tokio::test]
    async fn identical_queries_yield_identical_results() {
        let executor = QueryExecutor::new(FakeBackend::returning(records()));
        let first = executor.query(&request()).await.unwrap();
        let second = executor.query(&request()).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn classification_parse() {
        assert_eq!(
            "STRICT".parse::<ErrorClassification>().unwrap(),
            ErrorClassification::Strict
        );
        assert!("loose".parse::<ErrorClassification>().is_err());
    }
}
