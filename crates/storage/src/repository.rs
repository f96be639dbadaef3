use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interview_core::model::{SessionId, SessionRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Document store for session records, keyed by session id.
///
/// Writes are upserts; the caller persists on every state transition and
/// treats each write as best-effort. No transactionality is assumed.
#[async_trait]
pub trait SessionStoreRepository: Send + Sync {
    /// Persist (insert or replace) a session record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Fetch a session record by id, or `None` if it was never saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or deserialization failures.
    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError>;
}

/// Append-only log of generation attempts, backing the daily quota counter.
///
/// One row per attempt; the gateway counts rows since local midnight to
/// decide whether the daily ceiling has been reached.
#[async_trait]
pub trait GenerationUsageRepository: Send + Sync {
    /// Record one generation attempt at the given instant.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be recorded.
    async fn record_attempt(&self, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Count attempts at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn count_since(&self, since: DateTime<Utc>) -> Result<u32, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
    attempts: Arc<Mutex<Vec<DateTime<Utc>>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl SessionStoreRepository for InMemoryRepository {
    async fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.session_id(), record.clone());
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&id).cloned())
    }
}

#[async_trait]
impl GenerationUsageRepository for InMemoryRepository {
    async fn record_attempt(&self, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(at);
        Ok(())
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u32, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let count = guard.iter().filter(|at| **at >= since).count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

/// Aggregates the session store and usage log behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionStoreRepository>,
    pub usage: Arc<dyn GenerationUsageRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionStoreRepository> = Arc::new(repo.clone());
        let usage: Arc<dyn GenerationUsageRepository> = Arc::new(repo);
        Self { sessions, usage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use interview_core::model::{ArtifactId, Feedback, InterviewConfigDraft, SessionRecord};
    use interview_core::time::fixed_now;

    fn build_record() -> SessionRecord {
        let config = InterviewConfigDraft::new("Backend Engineer", "Intermediate", "Rust services")
            .validate()
            .unwrap();
        SessionRecord::new(config, fixed_now())
    }

    #[tokio::test]
    async fn save_then_get_roundtrips() {
        let repo = InMemoryRepository::new();
        let mut record = build_record();
        record.push_question("Q1").unwrap();
        record.answer_current("A1").unwrap();
        record.attach_recording(ArtifactId::new()).unwrap();
        repo.save(&record).await.unwrap();

        let fetched = repo.get(record.session_id()).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let repo = InMemoryRepository::new();
        let fetched = repo.get(SessionId::new()).await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let repo = InMemoryRepository::new();
        let mut record = build_record();
        repo.save(&record).await.unwrap();

        record.push_question("Q1").unwrap();
        record.answer_current("A1").unwrap();
        record
            .finalize(Feedback::new(Vec::new(), Vec::new(), Some(7)), fixed_now())
            .unwrap();
        repo.save(&record).await.unwrap();

        let fetched = repo.get(record.session_id()).await.unwrap().unwrap();
        assert!(fetched.is_completed());
        assert_eq!(fetched.transcript().len(), 1);
    }

    #[tokio::test]
    async fn usage_counts_since_cutoff() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        repo.record_attempt(now - Duration::hours(30)).await.unwrap();
        repo.record_attempt(now - Duration::minutes(5)).await.unwrap();
        repo.record_attempt(now).await.unwrap();

        let count = repo.count_since(now - Duration::hours(1)).await.unwrap();
        assert_eq!(count, 2);
    }
}
