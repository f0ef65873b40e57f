pub mod cli;
pub mod config;
pub mod error;
pub mod evict; // scan, batch delete, auxiliary cleanup
pub mod namespace;
pub mod pattern;
pub mod storage;

pub use error::{EvictError, StoreError};
pub use evict::{EvictionStatus, EvictionSummary, NamespaceEvictor};
