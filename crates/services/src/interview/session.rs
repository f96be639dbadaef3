use std::fmt;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use interview_core::Clock;
use interview_core::model::{SessionId, SessionRecord};

use crate::capture::{MediaCaptureRecorder, StreamView};
use crate::error::InterviewError;
use crate::integrity::IntegrityEvent;
use crate::interview::progress::InterviewProgress;

/// Lifecycle phase of an interview session.
///
/// An integrity abort lands in `Feedback` like a normal completion; the
/// difference is visible in [`EndReason`] and the synthesized feedback, not
/// in a fourth phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterviewPhase {
    Setup,
    Active,
    Feedback,
}

/// Which path finalized the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    Completed,
    IntegrityViolation,
}

/// In-memory state for one interview: the durable record plus the runtime
/// pieces (recorder, integrity event channel) that never touch storage.
pub struct InterviewSession {
    record: SessionRecord,
    phase: InterviewPhase,
    end_reason: Option<EndReason>,
    recorder: MediaCaptureRecorder,
    integrity_events: Option<mpsc::Receiver<IntegrityEvent>>,
    stream_view: Option<StreamView>,
}

impl InterviewSession {
    /// Fresh session in the setup phase.
    #[must_use]
    pub fn new(record: SessionRecord, clock: Clock) -> Self {
        Self {
            record,
            phase: InterviewPhase::Setup,
            end_reason: None,
            recorder: MediaCaptureRecorder::new(clock),
            integrity_events: None,
            stream_view: None,
        }
    }

    /// Rebuild a session from a persisted record.
    ///
    /// Records are first persisted on the setup-to-active transition, so an
    /// uncompleted record resumes straight into the active phase, without
    /// capture or integrity monitoring until the caller re-attaches them.
    #[must_use]
    pub fn resume(record: SessionRecord, clock: Clock) -> Self {
        let phase = if record.is_completed() {
            InterviewPhase::Feedback
        } else {
            InterviewPhase::Active
        };
        Self {
            record,
            phase,
            end_reason: None,
            recorder: MediaCaptureRecorder::new(clock),
            integrity_events: None,
            stream_view: None,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.record.session_id()
    }

    #[must_use]
    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    #[must_use]
    pub fn phase(&self) -> InterviewPhase {
        self.phase
    }

    #[must_use]
    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == InterviewPhase::Feedback
    }

    /// Display snapshot of the capture stream, if one is attached.
    #[must_use]
    pub fn stream_view(&self) -> Option<&StreamView> {
        self.stream_view.as_ref()
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> InterviewProgress {
        InterviewProgress {
            questions_asked: self.record.transcript().len(),
            answered: self.record.answered_turns(),
            recordings: self.record.recordings().len(),
            strikes: self.record.integrity_strikes(),
            is_complete: self.is_complete(),
        }
    }

    pub(crate) fn ensure_active(&self) -> Result<(), InterviewError> {
        match self.phase {
            InterviewPhase::Active => Ok(()),
            InterviewPhase::Setup => Err(InterviewError::NotActive),
            InterviewPhase::Feedback => Err(InterviewError::Completed),
        }
    }

    pub(crate) fn record_mut(&mut self) -> &mut SessionRecord {
        &mut self.record
    }

    pub(crate) fn recorder(&self) -> &MediaCaptureRecorder {
        &self.recorder
    }

    pub(crate) fn recorder_mut(&mut self) -> &mut MediaCaptureRecorder {
        &mut self.recorder
    }

    pub(crate) fn note_strikes(&mut self, strikes: u8) {
        self.record.record_strikes(strikes);
    }

    pub(crate) fn activate(
        &mut self,
        view: StreamView,
        events: mpsc::Receiver<IntegrityEvent>,
    ) {
        self.stream_view = Some(view);
        self.integrity_events = Some(events);
        self.phase = InterviewPhase::Active;
    }

    pub(crate) fn mark_ended(&mut self, reason: EndReason) {
        self.phase = InterviewPhase::Feedback;
        self.end_reason = Some(reason);
        self.integrity_events = None;
    }

    pub(crate) fn take_integrity_events(&mut self) -> Option<mpsc::Receiver<IntegrityEvent>> {
        self.integrity_events.take()
    }

    pub(crate) fn restore_integrity_events(
        &mut self,
        events: Option<mpsc::Receiver<IntegrityEvent>>,
    ) {
        self.integrity_events = events;
    }

    /// Non-blocking read of the next pending integrity event.
    pub(crate) fn try_next_integrity_event(&mut self) -> Option<IntegrityEvent> {
        let events = self.integrity_events.as_mut()?;
        match events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.integrity_events = None;
                None
            }
        }
    }
}

impl fmt::Debug for InterviewSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterviewSession")
            .field("session_id", &self.record.session_id())
            .field("phase", &self.phase)
            .field("end_reason", &self.end_reason)
            .field("questions", &self.record.transcript().len())
            .field("recordings", &self.record.recordings().len())
            .field("strikes", &self.record.integrity_strikes())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::model::{Feedback, InterviewConfigDraft};
    use interview_core::time::{fixed_clock, fixed_now};

    fn build_record() -> SessionRecord {
        let config = InterviewConfigDraft::new("Backend Engineer", "Intermediate", "Rust services")
            .validate()
            .unwrap();
        SessionRecord::new(config, fixed_now())
    }

    #[test]
    fn new_session_starts_in_setup() {
        let session = InterviewSession::new(build_record(), fixed_clock());
        assert_eq!(session.phase(), InterviewPhase::Setup);
        assert!(!session.is_complete());
        assert!(matches!(
            session.ensure_active(),
            Err(InterviewError::NotActive)
        ));
    }

    #[test]
    fn resume_maps_completion_onto_phase() {
        let mut record = build_record();
        let open = InterviewSession::resume(record.clone(), fixed_clock());
        assert_eq!(open.phase(), InterviewPhase::Active);

        record
            .finalize(Feedback::new(Vec::new(), Vec::new(), Some(6)), fixed_now())
            .unwrap();
        let done = InterviewSession::resume(record, fixed_clock());
        assert_eq!(done.phase(), InterviewPhase::Feedback);
        assert!(matches!(
            done.ensure_active(),
            Err(InterviewError::Completed)
        ));
    }

    #[test]
    fn progress_reflects_the_record() {
        let mut session = InterviewSession::new(build_record(), fixed_clock());
        session.record_mut().push_question("Q1").unwrap();
        session.record_mut().answer_current("A1").unwrap();
        session.record_mut().push_question("Q2").unwrap();
        session.note_strikes(1);

        let progress = session.progress();
        assert_eq!(progress.questions_asked, 2);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.recordings, 0);
        assert_eq!(progress.strikes, 1);
        assert!(!progress.is_complete);
    }
}
