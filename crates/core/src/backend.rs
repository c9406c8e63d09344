use async_trait::async_trait;
use thiserror::Error;

use crate::model::log::RawRecord;

/// Remote log store that evaluates filter expressions.
#[async_trait]
pub trait LogBackend: Send + Sync {
    /// Returns every record matching `filter`, in backend order. Paginated
    /// backends concatenate their pages before returning.
    async fn list(&self, filter: &str) -> std::result::Result<Vec<RawRecord>, BackendError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend rejected filter ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("backend transport failed: {0}")]
    Transport(String),

    #[error("backend authentication failed: {0}")]
    Auth(String),

    #[error("backend response could not be decoded: {0}")]
    Decode(String),
}

impl BackendError {
    /// True when the backend refused the filter grammar itself.
    pub fn is_filter_rejection(&self) -> bool {
        matches!(self, BackendError::Rejected { .. })
    }
}
