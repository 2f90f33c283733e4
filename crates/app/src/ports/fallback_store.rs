//! Fallback store port — durable buffer for records not yet confirmed remotely.

use std::future::Future;

use domisafe_domain::error::DomiSafeError;
use domisafe_domain::id::RecordId;
use domisafe_domain::record::PublishRecord;

/// Persistent queue of unconfirmed [`PublishRecord`]s.
///
/// A record leaves the store only through [`mark_confirmed`](Self::mark_confirmed).
pub trait FallbackStore: Send + Sync {
    /// Persist a record as `pending`.
    ///
    /// Re-enqueuing an id that is already stored keeps its original position.
    fn enqueue(
        &self,
        record: &PublishRecord,
    ) -> impl Future<Output = Result<(), DomiSafeError>> + Send;

    /// Delete a delivered record. Unknown ids are ignored.
    fn mark_confirmed(&self, id: RecordId)
    -> impl Future<Output = Result<(), DomiSafeError>> + Send;

    /// Flag a record whose replay attempt failed; it stays queued.
    fn mark_failed(&self, id: RecordId) -> impl Future<Output = Result<(), DomiSafeError>> + Send;

    /// All queued records, oldest enqueue first. Nothing is removed.
    fn drain_for_replay(
        &self,
    ) -> impl Future<Output = Result<Vec<PublishRecord>, DomiSafeError>> + Send;

    /// Number of queued records.
    fn pending_count(&self) -> impl Future<Output = Result<u64, DomiSafeError>> + Send;

    /// Highest record id ever stored, used to seed the id generator.
    fn last_record_id(
        &self,
    ) -> impl Future<Output = Result<Option<RecordId>, DomiSafeError>> + Send;
}

impl<T: FallbackStore> FallbackStore for std::sync::Arc<T> {
    fn enqueue(
        &self,
        record: &PublishRecord,
    ) -> impl Future<Output = Result<(), DomiSafeError>> + Send {
        (**self).enqueue(record)
    }

    fn mark_confirmed(
        &self,
        id: RecordId,
    ) -> impl Future<Output = Result<(), DomiSafeError>> + Send {
        (**self).mark_confirmed(id)
    }

    fn mark_failed(&self, id: RecordId) -> impl Future<Output = Result<(), DomiSafeError>> + Send {
        (**self).mark_failed(id)
    }

    fn drain_for_replay(
        &self,
    ) -> impl Future<Output = Result<Vec<PublishRecord>, DomiSafeError>> + Send {
        (**self).drain_for_replay()
    }

    fn pending_count(&self) -> impl Future<Output = Result<u64, DomiSafeError>> + Send {
        (**self).pending_count()
    }

    fn last_record_id(
        &self,
    ) -> impl Future<Output = Result<Option<RecordId>, DomiSafeError>> + Send {
        (**self).last_record_id()
    }
}
