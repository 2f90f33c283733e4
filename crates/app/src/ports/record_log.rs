//! Record log port — the local, date-partitioned text log.

use domisafe_domain::error::DomiSafeError;
use domisafe_domain::record::Payload;

/// Append-only local log of everything the orchestrator fans out.
///
/// Unlike the other ports this one is synchronous: `append` only copies a
/// line into an in-memory buffer, durability comes from a periodic
/// [`flush`](Self::flush).
pub trait RecordLog: Send + Sync {
    /// Append one record to the partition of its category and date.
    ///
    /// # Errors
    ///
    /// Returns [`DomiSafeError::Storage`] when the partition cannot be
    /// opened or written. The caller keeps going; the next append retries.
    fn append(&self, payload: &Payload) -> Result<(), DomiSafeError>;

    /// Push buffered lines of every open partition to disk.
    ///
    /// # Errors
    ///
    /// Returns [`DomiSafeError::Storage`] on I/O failure.
    fn flush(&self) -> Result<(), DomiSafeError>;
}

impl<T: RecordLog> RecordLog for std::sync::Arc<T> {
    fn append(&self, payload: &Payload) -> Result<(), DomiSafeError> {
        (**self).append(payload)
    }

    fn flush(&self) -> Result<(), DomiSafeError> {
        (**self).flush()
    }
}
