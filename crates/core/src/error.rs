use thiserror::Error;

#[derive(Debug, Error)]
pub enum FunclogsError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, FunclogsError>;

/// Outcome of a failed log query. Exactly one kind applies to any failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// A required request field was absent or empty. Raised before the backend is touched.
    #[error("missing required parameters: {}", .0.join(", "))]
    MissingParameter(Vec<&'static str>),

    /// The backend rejected the constructed filter (or, under narrow
    /// classification, the backend call failed for any reason).
    #[error("invalid filter query: {0}")]
    InvalidFilterQuery(String),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}
