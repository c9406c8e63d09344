pub mod backend;
pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod model;
pub mod query;
pub mod time;

pub use error::{FunclogsError, QueryError, Result};
