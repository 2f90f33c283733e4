//! Log-store error type.

use std::path::PathBuf;

use domisafe_domain::error::DomiSafeError;

/// Errors originating from the local log store.
#[derive(Debug, thiserror::Error)]
pub enum LogStoreError {
    /// Writing or flushing an open partition failed.
    #[error("log I/O error")]
    Io(#[from] std::io::Error),

    /// The partition for a new day could not be opened. No partition is
    /// left open for that category; the next append retries.
    #[error("could not open log partition {}", path.display())]
    Rotation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record could not be encoded as a log line.
    #[error("log line encoding error")]
    Encoding(#[from] serde_json::Error),
}

impl From<LogStoreError> for DomiSafeError {
    fn from(err: LogStoreError) -> Self {
        Self::Storage(Box::new(err))
    }
}
