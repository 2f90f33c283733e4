//! `SQLite` implementation of [`FallbackStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use domisafe_app::ports::FallbackStore;
use domisafe_domain::error::DomiSafeError;
use domisafe_domain::id::RecordId;
use domisafe_domain::record::{DeliveryState, Payload, PublishRecord};
use domisafe_domain::time;

use crate::error::StorageError;

struct Wrapper(PublishRecord);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let record_id: i64 = row.try_get("record_id")?;
        let payload_json: String = row.try_get("payload")?;
        let delivery_state: String = row.try_get("delivery_state")?;
        let created_at: String = row.try_get("created_at")?;

        let id = u64::try_from(record_id)
            .map(RecordId::from_raw)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let payload: Payload =
            serde_json::from_str(&payload_json).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let delivery_state: DeliveryState = delivery_state
            .parse()
            .map_err(|err: String| sqlx::Error::Decode(err.into()))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(PublishRecord {
            id,
            payload,
            delivery_state,
            created_at,
        }))
    }
}

// Re-enqueuing an existing id only resets its state, `seq` is untouched.
const INSERT: &str = r"
    INSERT INTO pending_records (record_id, category, payload, delivery_state, attempts, created_at)
    VALUES (?, ?, ?, 'pending', 0, ?)
    ON CONFLICT (record_id) DO UPDATE SET delivery_state = 'pending'
";

const BUMP_WATERMARK: &str = r"
    INSERT INTO record_watermark (id, last_record_id) VALUES (1, ?)
    ON CONFLICT (id) DO UPDATE SET last_record_id = MAX(last_record_id, excluded.last_record_id)
";

const DELETE: &str = "DELETE FROM pending_records WHERE record_id = ?";
const MARK_FAILED: &str = r"
    UPDATE pending_records
    SET delivery_state = 'failed', attempts = attempts + 1
    WHERE record_id = ?
";
// Rows that cannot be decoded are flagged `corrupt` and left out of replay.
const SELECT_ALL: &str =
    "SELECT * FROM pending_records WHERE delivery_state != 'corrupt' ORDER BY seq ASC";
const COUNT: &str = "SELECT COUNT(*) FROM pending_records WHERE delivery_state != 'corrupt'";
const MARK_CORRUPT: &str = "UPDATE pending_records SET delivery_state = 'corrupt' WHERE seq = ?";
const SELECT_WATERMARK: &str = "SELECT last_record_id FROM record_watermark WHERE id = 1";
const SELECT_ATTEMPTS: &str = "SELECT attempts FROM pending_records WHERE record_id = ?";

fn to_db(id: RecordId) -> Result<i64, StorageError> {
    i64::try_from(id.as_u64()).map_err(|_| StorageError::IdOutOfRange(id.as_u64()))
}

/// `SQLite`-backed fallback store.
#[derive(Clone)]
pub struct SqliteFallbackStore {
    pool: SqlitePool,
}

impl SqliteFallbackStore {
    /// Create a new fallback store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Failed replay attempts of a queued record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the query fails.
    pub async fn attempts(&self, id: RecordId) -> Result<Option<u32>, StorageError> {
        let row: Option<(i64,)> = sqlx::query_as(SELECT_ATTEMPTS)
            .bind(to_db(id)?)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(attempts,)| u32::try_from(attempts).unwrap_or(u32::MAX)))
    }
}

impl FallbackStore for SqliteFallbackStore {
    async fn enqueue(&self, record: &PublishRecord) -> Result<(), DomiSafeError> {
        let record_id = to_db(record.id)?;
        let payload_json = serde_json::to_string(&record.payload).map_err(StorageError::from)?;

        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        sqlx::query(INSERT)
            .bind(record_id)
            .bind(record.category().as_str())
            .bind(&payload_json)
            .bind(time::format_iso(&record.created_at))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        sqlx::query(BUMP_WATERMARK)
            .bind(record_id)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        tx.commit().await.map_err(StorageError::from)?;

        Ok(())
    }

    async fn mark_confirmed(&self, id: RecordId) -> Result<(), DomiSafeError> {
        sqlx::query(DELETE)
            .bind(to_db(id)?)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn mark_failed(&self, id: RecordId) -> Result<(), DomiSafeError> {
        sqlx::query(MARK_FAILED)
            .bind(to_db(id)?)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn drain_for_replay(&self) -> Result<Vec<PublishRecord>, DomiSafeError> {
        let rows = sqlx::query(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match Wrapper::from_row(&row) {
                Ok(Wrapper(record)) => records.push(record),
                Err(err) => {
                    let seq: i64 = row.try_get("seq").map_err(StorageError::from)?;
                    tracing::error!(error = %err, seq, "undecodable fallback row, skipping it");
                    sqlx::query(MARK_CORRUPT)
                        .bind(seq)
                        .execute(&self.pool)
                        .await
                        .map_err(StorageError::from)?;
                }
            }
        }
        Ok(records)
    }

    async fn pending_count(&self) -> Result<u64, DomiSafeError> {
        let (count,): (i64,) = sqlx::query_as(COUNT)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn last_record_id(&self) -> Result<Option<RecordId>, DomiSafeError> {
        let row: Option<(i64,)> = sqlx::query_as(SELECT_WATERMARK)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(row
            .and_then(|(id,)| u64::try_from(id).ok())
            .map(RecordId::from_raw))
    }
}
