use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FunclogsError, Result};
use crate::query::QueryRequest;
use crate::time::render_filter_timestamp;

/// Severity token that matches every entry.
pub const DEFAULT_SEVERITY: &str = "DEFAULT";

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Default = 0,
    Debug = 100,
    Info = 200,
    Notice = 300,
    Warning = 400,
    Error = 500,
    Critical = 600,
    Alert = 700,
    Emergency = 800,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Alert => "ALERT",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = FunclogsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(Self::Default),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "NOTICE" => Ok(Self::Notice),
            "WARN" | "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            "ALERT" => Ok(Self::Alert),
            "EMERGENCY" => Ok(Self::Emergency),
            _ => Err(FunclogsError::Parse(format!("unknown severity: {s}"))),
        }
    }
}

/// Renders a [`QueryRequest`] into a Cloud Logging filter expression.
///
/// The target matches either a Cloud Functions resource or a Cloud Run
/// revision, since the backend labels the same function differently
/// depending on its runtime generation. The free-text fragment is appended
/// verbatim and is never inspected.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterBuilder;

impl FilterBuilder {
    /// Callers validate the request first; an absent bound renders as an
    /// empty literal.
    pub fn build(req: &QueryRequest) -> String {
        let name = quote(&req.target_name);
        let region = quote(&req.target_region);
        let start = req.start.map(render_filter_timestamp).unwrap_or_default();
        let end = req.end.map(render_filter_timestamp).unwrap_or_default();

        let mut filter = format!(
            "((resource.type = \"cloud_function\" \
             AND resource.labels.function_name = {name} \
             AND resource.labels.region = {region}) \
             OR (resource.type = \"cloud_run_revision\" \
             AND resource.labels.service_name = {name} \
             AND resource.labels.location = {region})) \
             AND timestamp >= \"{start}\" AND timestamp <= \"{end}\" \
             AND severity >= {severity}",
            severity = req.severity,
        );

        if !req.filter.is_empty() {
            filter.push_str(" AND ");
            filter.push_str(&req.filter);
        }
        filter
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
