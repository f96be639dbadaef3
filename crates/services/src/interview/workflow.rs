use std::sync::Arc;

use tokio::sync::mpsc;

use interview_core::Clock;
use interview_core::model::{
    Feedback, InterviewConfigDraft, MAX_INTEGRITY_STRIKES, SessionId, SessionRecord,
};
use storage::repository::SessionStoreRepository;

use crate::capture::{CaptureDevice, RecordingArtifact, StreamView, acquire_with_fallback};
use crate::error::{GenerationError, InterviewError};
use crate::generation::{GenerationGateway, GenerationRequest};
use crate::integrity::{FocusSignal, IntegrityEvent, IntegrityMonitor, spawn_pump};
use crate::interview::prompt;
use crate::interview::session::{EndReason, InterviewPhase, InterviewSession};

/// Result of answering the open turn.
#[derive(Debug)]
pub struct TurnOutcome {
    /// The finalized capture for this turn. `None` when the capture produced
    /// nothing; the turn still counts.
    pub artifact: Option<RecordingArtifact>,
    pub answered_turns: usize,
}

enum Raced {
    Done(Result<String, GenerationError>),
    Aborted,
}

/// The session controller: drives Setup → Active → Feedback, fans out to the
/// gateway, the recorder, and the integrity monitor, and persists the record
/// on every transition.
///
/// The other components never call each other; everything routes through
/// here.
#[derive(Clone)]
pub struct InterviewLoopService {
    clock: Clock,
    sessions: Arc<dyn SessionStoreRepository>,
    gateway: Arc<GenerationGateway>,
    device: Arc<dyn CaptureDevice>,
    integrity_debounce: chrono::Duration,
}

impl InterviewLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn SessionStoreRepository>,
        gateway: Arc<GenerationGateway>,
        device: Arc<dyn CaptureDevice>,
    ) -> Self {
        Self {
            clock,
            sessions,
            gateway,
            device,
            integrity_debounce: chrono::Duration::seconds(1),
        }
    }

    #[must_use]
    pub fn with_integrity_debounce(mut self, debounce: chrono::Duration) -> Self {
        self.integrity_debounce = debounce;
        self
    }

    /// Validate the setup form and build a session in the setup phase.
    ///
    /// # Errors
    ///
    /// Returns `InterviewError::Config` when any setup field is empty.
    pub fn create_session(
        &self,
        draft: InterviewConfigDraft,
    ) -> Result<InterviewSession, InterviewError> {
        let config = draft.validate()?;
        let record = SessionRecord::new(config, self.clock.now());
        Ok(InterviewSession::new(record, self.clock))
    }

    /// Setup → Active.
    ///
    /// Persists the record immediately, acquires capture with a video-only
    /// fallback, starts the recorder, and arms the integrity monitor against
    /// the supplied focus-signal source.
    ///
    /// # Errors
    ///
    /// Setup failures abort the transition: a storage failure on the initial
    /// save, `NoDeviceAvailable` when both acquisitions fail, or
    /// `NoActiveTracks` when the acquired stream is dead.
    pub async fn begin(
        &self,
        session: &mut InterviewSession,
        focus_signals: mpsc::Receiver<FocusSignal>,
    ) -> Result<StreamView, InterviewError> {
        match session.phase() {
            InterviewPhase::Setup => {}
            InterviewPhase::Active => return Err(InterviewError::AlreadyStarted),
            InterviewPhase::Feedback => return Err(InterviewError::Completed),
        }

        self.sessions.save(session.record()).await?;

        let stream = acquire_with_fallback(self.device.as_ref()).await?;
        let stream_id = stream.id().to_string();
        let view = match session.recorder_mut().initialize(stream).await {
            Ok(view) => view,
            Err(err) => {
                self.device.release(&stream_id).await;
                return Err(err.into());
            }
        };
        session.recorder_mut().start()?;

        let monitor = IntegrityMonitor::new().with_debounce(self.integrity_debounce);
        let events = spawn_pump(monitor, self.clock, focus_signals);
        session.activate(view.clone(), events);

        tracing::info!(session = %session.session_id(), "interview session active");
        Ok(view)
    }

    /// Ask the gateway for the next question and append it to the transcript.
    ///
    /// The call races the integrity channel: a violation mid-flight abandons
    /// the pending generation (its eventual result is discarded) and
    /// finalizes the session on the abort path.
    ///
    /// # Errors
    ///
    /// Generation failures surface to the caller without changing session
    /// state; the turn can simply be retried. `IntegrityAborted` means the
    /// session is already finalized.
    pub async fn next_question(
        &self,
        session: &mut InterviewSession,
    ) -> Result<String, InterviewError> {
        session.ensure_active()?;
        self.poll_integrity(session).await?;

        let prompt = prompt::question_prompt(session.record().config(), session.record().transcript());
        let question = self.generate_with_preemption(session, prompt).await?;

        session.record_mut().push_question(question.as_str())?;
        self.save_best_effort(session).await;
        Ok(question)
    }

    /// Backfill the open turn's answer and finalize its capture artifact.
    ///
    /// A missing or failed artifact does not abort the session; the turn is
    /// kept without a recording and capture restarts for the next turn.
    ///
    /// # Errors
    ///
    /// Returns record guard errors (`NoOpenTurn`, …) and `IntegrityAborted`
    /// when a pending violation finalized the session first.
    pub async fn submit_answer(
        &self,
        session: &mut InterviewSession,
        answer: impl Into<String>,
    ) -> Result<TurnOutcome, InterviewError> {
        session.ensure_active()?;
        self.poll_integrity(session).await?;

        session.record_mut().answer_current(answer)?;

        let artifact = session.recorder_mut().stop().await;
        match &artifact {
            Some(finished) => {
                if let Err(err) = session.record_mut().attach_recording(finished.id) {
                    tracing::warn!(error = %err, "could not attach recording to the session");
                }
            }
            None => {
                tracing::warn!(session = %session.session_id(), "turn finished without a capture artifact");
            }
        }

        if session.recorder().is_initialized() {
            if let Err(err) = session.recorder_mut().start() {
                tracing::warn!(error = %err, "could not restart capture for the next turn");
            }
        }

        self.save_best_effort(session).await;
        Ok(TurnOutcome {
            artifact,
            answered_turns: session.record().answered_turns(),
        })
    }

    /// Ask the gateway to assess the finished transcript.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::InvalidResponse` when the reply is not a
    /// parseable feedback payload; the caller can fall back to completing
    /// with manually assembled feedback.
    pub async fn generate_feedback(
        &self,
        session: &mut InterviewSession,
    ) -> Result<Feedback, InterviewError> {
        session.ensure_active()?;
        self.poll_integrity(session).await?;

        let prompt = prompt::feedback_prompt(session.record().config(), session.record().transcript());
        let text = self.generate_with_preemption(session, prompt).await?;
        let feedback =
            prompt::parse_feedback(&text).ok_or(GenerationError::InvalidResponse)?;
        Ok(feedback)
    }

    /// Active → Feedback, normal path.
    ///
    /// Stops capture, persists, writes the feedback exactly once, and
    /// persists again. A failure of that final save is reported but does not
    /// roll back the completed state.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityAborted` when a pending violation finalized the
    /// session first, or the record guard error for a double completion.
    pub async fn finish(
        &self,
        session: &mut InterviewSession,
        feedback: Feedback,
    ) -> Result<(), InterviewError> {
        session.ensure_active()?;
        self.poll_integrity(session).await?;
        self.finalize_with(session, feedback, EndReason::Completed)
            .await
    }

    /// Active → Feedback, integrity path. Safe to call more than once; only
    /// the first call finalizes.
    ///
    /// # Errors
    ///
    /// Returns storage or record errors from the finalize sequence.
    pub async fn abort(&self, session: &mut InterviewSession) -> Result<(), InterviewError> {
        if session.phase() == InterviewPhase::Feedback {
            return Ok(());
        }

        session.note_strikes(MAX_INTEGRITY_STRIKES);
        tracing::warn!(session = %session.session_id(), "aborting session after integrity violation");
        self.finalize_with(
            session,
            Feedback::integrity_violation(),
            EndReason::IntegrityViolation,
        )
        .await
    }

    /// Drain integrity events that arrived between awaits.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityAborted` after finalizing on a pending violation.
    pub async fn poll_integrity(
        &self,
        session: &mut InterviewSession,
    ) -> Result<(), InterviewError> {
        while let Some(event) = session.try_next_integrity_event() {
            match event {
                IntegrityEvent::Warning { strikes } => {
                    session.note_strikes(strikes);
                    self.save_best_effort(session).await;
                }
                IntegrityEvent::Violation => {
                    self.abort(session).await?;
                    return Err(InterviewError::IntegrityAborted);
                }
            }
        }
        Ok(())
    }

    /// Rebuild a session from the store.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id or `Storage` on read failures.
    pub async fn resume(&self, session_id: SessionId) -> Result<InterviewSession, InterviewError> {
        let record = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(InterviewError::NotFound)?;
        Ok(InterviewSession::resume(record, self.clock))
    }

    async fn generate_with_preemption(
        &self,
        session: &mut InterviewSession,
        prompt: String,
    ) -> Result<String, InterviewError> {
        let generation = self.gateway.submit(GenerationRequest::for_prompt(prompt));
        tokio::pin!(generation);

        let mut events = session.take_integrity_events();
        let raced = loop {
            let Some(rx) = events.as_mut() else {
                break Raced::Done(generation.as_mut().await);
            };

            let mut source_closed = false;
            tokio::select! {
                event = rx.recv() => match event {
                    Some(IntegrityEvent::Warning { strikes }) => {
                        session.note_strikes(strikes);
                        self.save_best_effort(session).await;
                    }
                    Some(IntegrityEvent::Violation) => break Raced::Aborted,
                    None => source_closed = true,
                },
                result = &mut generation => break Raced::Done(result),
            }
            if source_closed {
                events = None;
            }
        };

        match raced {
            Raced::Done(result) => {
                session.restore_integrity_events(events);
                Ok(result?)
            }
            Raced::Aborted => {
                // The pending generation is dropped here; whatever it would
                // have resolved to is discarded, never surfaced.
                self.abort(session).await?;
                Err(InterviewError::IntegrityAborted)
            }
        }
    }

    async fn finalize_with(
        &self,
        session: &mut InterviewSession,
        feedback: Feedback,
        reason: EndReason,
    ) -> Result<(), InterviewError> {
        // Stop capture first; a trailing artifact still belongs to the session.
        if let Some(artifact) = session.recorder_mut().stop().await {
            if let Err(err) = session.record_mut().attach_recording(artifact.id) {
                tracing::warn!(error = %err, "could not attach the final recording");
            }
        }
        session.recorder_mut().cleanup().await;
        if let Some(view) = session.stream_view().cloned() {
            self.device.release(&view.id).await;
        }

        self.save_best_effort(session).await;

        session.record_mut().finalize(feedback, self.clock.now())?;
        session.mark_ended(reason);

        if let Err(err) = self.sessions.save(session.record()).await {
            tracing::error!(
                error = %err,
                session = %session.session_id(),
                "final persistence failed; completed state is kept locally"
            );
        }

        tracing::info!(session = %session.session_id(), reason = ?reason, "interview session finalized");
        Ok(())
    }

    async fn save_best_effort(&self, session: &InterviewSession) {
        if let Err(err) = self.sessions.save(session.record()).await {
            tracing::warn!(
                error = %err,
                session = %session.session_id(),
                "mid-session persistence failed; continuing"
            );
        }
    }
}
