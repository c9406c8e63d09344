pub mod auth;
pub mod client;
pub mod decode;

pub use client::{CloudLoggingClient, CloudLoggingConfig};
pub use funclogs_core::backend::{BackendError, LogBackend};
