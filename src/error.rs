//! Error types for synchronization runs.
//!
//! Per-file problems never surface here; they become [`Diagnostic`]s in the
//! run report. These errors stop a run, either before any write happens
//! (scan root, state, configuration, planning) or while operations are
//! applied (store), and in both cases the persisted sync state is left as
//! it was.
//!
//! [`Diagnostic`]: crate::diagnostics::Diagnostic

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort a synchronization run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("scan root {} is not readable: {source}", path.display())]
    ScanRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sync state unavailable: {0}")]
    State(#[from] StateError),
    #[error("planning failed to {operation} {artifact}: {source}")]
    Plan {
        operation: &'static str,
        artifact: String,
        #[source]
        source: StoreError,
    },
    #[error("artifact store failed to {operation} {artifact}: {source}")]
    Store {
        operation: &'static str,
        artifact: String,
        #[source]
        source: StoreError,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("run cancelled")]
    Cancelled,
}

/// Errors reported by an artifact store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("front matter encoding failed: {0}")]
    Encode(#[from] serde_yaml::Error),
    #[error("invalid artifact id: {0}")]
    InvalidId(String),
    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// Errors reported by a sync state backend.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt state file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported state version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },
}

impl SyncError {
    /// Whether the run stopped before writing to the artifact store.
    pub fn is_before_writes(&self) -> bool {
        !matches!(self, SyncError::Store { .. })
    }
}
