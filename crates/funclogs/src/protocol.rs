use funclogs_core::QueryError;
use funclogs_core::filter::DEFAULT_SEVERITY;
use funclogs_core::query::QueryRequest;
use funclogs_core::time::parse_time_or_relative;
use serde::{Deserialize, Serialize};

/// JSON body of every non-2xx gateway response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
}

/// Query string of `GET /logs/{cloud_function_name}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogsQueryParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_function_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

impl LogsQueryParams {
    /// Builds the executor request. A time that does not parse counts as
    /// missing.
    pub fn into_request(self, cloud_function_name: String) -> Result<QueryRequest, QueryError> {
        let mut unparsable = Vec::new();
        let start = parse_param(self.start_time.as_deref(), "start_time", &mut unparsable);
        let end = parse_param(self.end_time.as_deref(), "end_time", &mut unparsable);
        if !unparsable.is_empty() {
            return Err(QueryError::MissingParameter(unparsable));
        }

        Ok(QueryRequest {
            target_name: cloud_function_name,
            target_region: self.cloud_function_region.unwrap_or_default(),
            start,
            end,
            filter: self.log_query.unwrap_or_default(),
            severity: self
                .severity
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SEVERITY.to_string()),
        })
    }
}

fn parse_param(
    raw: Option<&str>,
    name: &'static str,
    unparsable: &mut Vec<&'static str>,
) -> Option<chrono::DateTime<chrono::Utc>> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match parse_time_or_relative(raw) {
        Ok(ts) => Some(ts),
        Err(_) => {
            unparsable.push(name);
            None
        }
    }
}
