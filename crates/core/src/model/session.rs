use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ArtifactId, Feedback, InterviewConfig, SessionId};

/// Maximum number of focus-loss strikes before a session is force-terminated.
pub const MAX_INTEGRITY_STRIKES: u8 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionRecordError {
    #[error("session is already completed")]
    AlreadyCompleted,

    #[error("question text is empty")]
    EmptyQuestion,

    #[error("previous turn has not been answered yet")]
    TurnOpen,

    #[error("no open turn to answer")]
    NoOpenTurn,
}

/// One question/answer pair within a session.
///
/// The answer is backfilled after the question is asked; until then it is
/// empty and the turn counts as open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// The persisted unit of work: everything a session accumulates between
/// setup and completion.
///
/// The transcript is append-only and its insertion order is the only record
/// of turn ordering. `recordings` may legitimately hold fewer entries than
/// the transcript; a turn without an artifact is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    session_id: SessionId,
    config: InterviewConfig,
    transcript: Vec<Turn>,
    recordings: Vec<ArtifactId>,
    feedback: Option<Feedback>,
    is_completed: bool,
    integrity_strikes: u8,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    answered_turns: usize,
}

impl SessionRecord {
    /// Create a fresh record in the setup state.
    ///
    /// `started_at` should come from the services layer clock.
    #[must_use]
    pub fn new(config: InterviewConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: SessionId::new(),
            config,
            transcript: Vec::new(),
            recordings: Vec::new(),
            feedback: None,
            is_completed: false,
            integrity_strikes: 0,
            started_at,
            completed_at: None,
            answered_turns: 0,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn config(&self) -> &InterviewConfig {
        &self.config
    }

    #[must_use]
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    #[must_use]
    pub fn recordings(&self) -> &[ArtifactId] {
        &self.recordings
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn integrity_strikes(&self) -> u8 {
        self.integrity_strikes
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Number of turns whose answer has been backfilled.
    #[must_use]
    pub fn answered_turns(&self) -> usize {
        self.answered_turns
    }

    /// The question currently awaiting an answer, if any.
    #[must_use]
    pub fn open_turn(&self) -> Option<&Turn> {
        if self.answered_turns < self.transcript.len() {
            self.transcript.get(self.answered_turns)
        } else {
            None
        }
    }

    /// Append a new turn for the given question.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyCompleted` after finalization, `TurnOpen` while a
    /// previous question awaits its answer, and `EmptyQuestion` for blank text.
    pub fn push_question(&mut self, question: impl Into<String>) -> Result<(), SessionRecordError> {
        if self.is_completed {
            return Err(SessionRecordError::AlreadyCompleted);
        }
        if self.open_turn().is_some() {
            return Err(SessionRecordError::TurnOpen);
        }
        let question = question.into();
        if question.trim().is_empty() {
            return Err(SessionRecordError::EmptyQuestion);
        }

        self.transcript.push(Turn {
            question,
            answer: String::new(),
        });
        Ok(())
    }

    /// Backfill the answer of the open turn.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyCompleted` after finalization and `NoOpenTurn` when
    /// every question has already been answered.
    pub fn answer_current(&mut self, answer: impl Into<String>) -> Result<(), SessionRecordError> {
        if self.is_completed {
            return Err(SessionRecordError::AlreadyCompleted);
        }
        let index = self.answered_turns;
        let Some(turn) = self.transcript.get_mut(index) else {
            return Err(SessionRecordError::NoOpenTurn);
        };

        turn.answer = answer.into();
        self.answered_turns += 1;
        Ok(())
    }

    /// Append a finalized recording artifact reference.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyCompleted` after finalization.
    pub fn attach_recording(&mut self, artifact: ArtifactId) -> Result<(), SessionRecordError> {
        if self.is_completed {
            return Err(SessionRecordError::AlreadyCompleted);
        }
        self.recordings.push(artifact);
        Ok(())
    }

    /// Mirror the integrity monitor's strike counter into the record.
    ///
    /// The monitor owns the counter; the record only persists what it reports.
    pub fn record_strikes(&mut self, strikes: u8) {
        self.integrity_strikes = strikes.min(MAX_INTEGRITY_STRIKES);
    }

    /// Write feedback and mark the record completed. Exactly once.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyCompleted` on any second call, regardless of which
    /// path (normal completion or integrity abort) finalized first.
    pub fn finalize(
        &mut self,
        feedback: Feedback,
        completed_at: DateTime<Utc>,
    ) -> Result<(), SessionRecordError> {
        if self.is_completed {
            return Err(SessionRecordError::AlreadyCompleted);
        }
        self.feedback = Some(feedback);
        self.is_completed = true;
        self.completed_at = Some(completed_at);
        Ok(())
    }
}
