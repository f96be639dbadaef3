use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::repository::{GenerationUsageRepository, StorageError};

use super::SqliteRepository;

#[async_trait]
impl GenerationUsageRepository for SqliteRepository {
    async fn record_attempt(&self, at: DateTime<Utc>) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO generation_usage (attempted_at)
            VALUES (?1)
            ",
        )
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u32, StorageError> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) as count
            FROM generation_usage
            WHERE attempted_at >= ?1
            ",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
