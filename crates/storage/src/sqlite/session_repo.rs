use async_trait::async_trait;
use chrono::Utc;
use interview_core::model::{SessionId, SessionRecord};
use sqlx::Row;

use crate::repository::{SessionStoreRepository, StorageError};

use super::SqliteRepository;

#[async_trait]
impl SessionStoreRepository for SqliteRepository {
    async fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let document = serde_json::to_string(record)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO sessions (session_id, record, is_completed, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id) DO UPDATE SET
                record = excluded.record,
                is_completed = excluded.is_completed,
                updated_at = excluded.updated_at
            ",
        )
        .bind(record.session_id().to_string())
        .bind(document)
        .bind(i64::from(record.is_completed()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT record
            FROM sessions
            WHERE session_id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document: String = row
            .try_get("record")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let record = serde_json::from_str(&document)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        Ok(Some(record))
    }
}
