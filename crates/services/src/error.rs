//! Shared error types for the services crate.

use thiserror::Error;

use interview_core::model::{InterviewConfigError, SessionRecordError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Failure kinds of the generation gateway.
///
/// Every caller-visible outcome of a generation call is a distinct variant so
/// call sites can match exhaustively instead of probing error strings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    /// The daily quota is spent. Fatal for the rest of the day; never retried.
    #[error("daily generation quota of {quota} requests is exhausted")]
    QuotaExhausted { quota: u32 },

    /// The endpoint answered 429. Retried with a fixed long delay, bounded by
    /// the configured retry budget.
    #[error("generation endpoint rate-limited the request")]
    RateLimited,

    /// Network trouble or a 5xx answer. Retried with exponential backoff.
    #[error("transient generation failure: {0}")]
    Transient(String),

    /// Empty or degenerate generated text. Never retried.
    #[error("generation returned an empty or degenerate response")]
    InvalidResponse,

    /// The credential was rejected (401/403). Fatal until reconfigured.
    #[error("generation credential was rejected")]
    InvalidCredential,

    /// The admission queue is full. The caller must back off and retry later.
    #[error("generation queue is full")]
    QueueOverloaded,

    /// No API key is configured.
    #[error("generation is not configured")]
    Disabled,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the capture device seam and the recorder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CaptureError {
    #[error("capture stream has no enabled live tracks")]
    NoActiveTracks,

    #[error("no capture device is available")]
    NoDeviceAvailable,

    #[error("recorder has no stream bound")]
    NotInitialized,
}

/// Errors emitted by the interview session controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InterviewError {
    #[error("session is not active")]
    NotActive,

    #[error("session has already been started")]
    AlreadyStarted,

    #[error("session is already completed")]
    Completed,

    #[error("session was terminated by the integrity monitor")]
    IntegrityAborted,

    #[error("session not found")]
    NotFound,

    #[error(transparent)]
    Config(#[from] InterviewConfigError),

    #[error(transparent)]
    Record(#[from] SessionRecordError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
