use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use interview_core::model::{Feedback, InterviewConfigDraft};
use interview_core::time::fixed_clock;
use services::capture::{
    CaptureConstraints, CaptureDevice, CaptureStream, MediaChunk, MediaTrack, TrackKind,
};
use services::generation::{
    GenerationGateway, GenerationLimits, GenerationRequest, GenerationUsageService,
    GenerativeClient,
};
use services::interview::{EndReason, InterviewLoopService, InterviewPhase};
use services::{CaptureError, FocusSignal, GenerationError, InterviewError};
use storage::repository::{InMemoryRepository, SessionStoreRepository};

struct ScriptedClient {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(script: Vec<Result<String, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok("Tell me about a production incident you handled.".to_string()),
        }
    }
}

struct HangingClient;

#[async_trait]
impl GenerativeClient for HangingClient {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        std::future::pending::<()>().await;
        unreachable!("pending future never resolves")
    }
}

#[derive(Default)]
struct FakeDevice {
    reject_audio: bool,
    reject_all: bool,
    chunk_senders: Mutex<Vec<mpsc::Sender<MediaChunk>>>,
    released: Mutex<Vec<String>>,
    acquired: AtomicUsize,
}

impl FakeDevice {
    fn send_chunk(&self, byte: u8) {
        let senders = self.chunk_senders.lock().unwrap();
        let sender = senders.last().expect("no stream acquired").clone();
        drop(senders);
        sender
            .try_send(MediaChunk {
                data: vec![byte; 4],
                timestamp_ms: u64::from(byte) * 100,
            })
            .expect("chunk channel full");
    }

    fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    async fn acquire(
        &self,
        constraints: CaptureConstraints,
    ) -> Result<CaptureStream, CaptureError> {
        if self.reject_all {
            return Err(CaptureError::NoDeviceAvailable);
        }
        if self.reject_audio && constraints.audio {
            return Err(CaptureError::NoDeviceAvailable);
        }

        let index = self.acquired.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        self.chunk_senders.lock().unwrap().push(tx);

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack::live(format!("audio-{index}"), TrackKind::Audio));
        }
        if constraints.video {
            tracks.push(MediaTrack::live(format!("video-{index}"), TrackKind::Video));
        }
        Ok(CaptureStream::new(format!("stream-{index}"), tracks, rx))
    }

    async fn release(&self, stream_id: &str) {
        self.released.lock().unwrap().push(stream_id.to_string());
    }
}

fn quick_limits() -> GenerationLimits {
    GenerationLimits {
        requests_per_minute: 600,
        max_queue_size: 16,
        ..GenerationLimits::default()
    }
}

fn build_service(
    repo: &InMemoryRepository,
    client: Arc<dyn GenerativeClient>,
    device: Arc<FakeDevice>,
) -> InterviewLoopService {
    let limits = quick_limits();
    let usage = GenerationUsageService::new(
        fixed_clock(),
        Arc::new(repo.clone()),
        limits.daily_quota,
        limits.warn_ratio,
    );
    let gateway = Arc::new(GenerationGateway::new(client, usage, limits));
    InterviewLoopService::new(fixed_clock(), Arc::new(repo.clone()), gateway, device)
        .with_integrity_debounce(chrono::Duration::zero())
}

fn setup_draft() -> InterviewConfigDraft {
    InterviewConfigDraft::new(
        "Backend Engineer",
        "Intermediate",
        "Own and scale the billing APIs.",
    )
}

#[tokio::test]
async fn full_interview_reaches_feedback_with_two_recorded_turns() {
    let repo = InMemoryRepository::new();
    let client = ScriptedClient::new(vec![
        Ok("What is ownership in Rust?".to_string()),
        Ok("How do you test async code?".to_string()),
    ]);
    let device = Arc::new(FakeDevice::default());
    let service = build_service(&repo, client.clone(), Arc::clone(&device));

    let mut session = service.create_session(setup_draft()).unwrap();
    let (_signals_tx, signals_rx) = mpsc::channel(8);
    let view = service.begin(&mut session, signals_rx).await.unwrap();
    assert_eq!(view.kinds, vec![TrackKind::Audio, TrackKind::Video]);
    assert_eq!(session.phase(), InterviewPhase::Active);

    // Turn one.
    let q1 = service.next_question(&mut session).await.unwrap();
    assert_eq!(q1, "What is ownership in Rust?");
    device.send_chunk(1);
    let outcome = service
        .submit_answer(&mut session, "Each value has a single owner.")
        .await
        .unwrap();
    assert!(outcome.artifact.is_some());

    // Turn two; the prompt must carry turn one verbatim.
    let q2 = service.next_question(&mut session).await.unwrap();
    assert_eq!(q2, "How do you test async code?");
    let prompts = client.prompts();
    assert!(prompts[1].contains("Q1: What is ownership in Rust?"));
    assert!(prompts[1].contains("A1: Each value has a single owner."));

    device.send_chunk(2);
    service
        .submit_answer(&mut session, "With a paused tokio runtime.")
        .await
        .unwrap();

    let feedback = Feedback::new(
        vec!["Precise answers".to_string()],
        vec!["Give more real-world examples".to_string()],
        Some(8),
    );
    service.finish(&mut session, feedback).await.unwrap();

    assert_eq!(session.phase(), InterviewPhase::Feedback);
    assert_eq!(session.end_reason(), Some(EndReason::Completed));
    assert!(session.record().is_completed());
    assert_eq!(session.record().transcript().len(), 2);
    assert_eq!(session.record().recordings().len(), 2);

    let persisted = repo.get(session.session_id()).await.unwrap().unwrap();
    assert!(persisted.is_completed());
    assert_eq!(persisted.transcript().len(), 2);
    assert_eq!(persisted.recordings().len(), 2);
    assert_eq!(persisted.feedback().unwrap().overall_score, Some(8));

    assert_eq!(device.released(), vec!["stream-0".to_string()]);
}

#[tokio::test]
async fn integrity_violation_preempts_an_in_flight_generation() {
    let repo = InMemoryRepository::new();
    let device = Arc::new(FakeDevice::default());
    let service = build_service(&repo, Arc::new(HangingClient), Arc::clone(&device));

    let mut session = service.create_session(setup_draft()).unwrap();
    let (signals_tx, signals_rx) = mpsc::channel(8);
    service.begin(&mut session, signals_rx).await.unwrap();

    // Three focus losses while the generation call hangs.
    tokio::spawn(async move {
        for _ in 0..3 {
            let _ = signals_tx.send(FocusSignal::FocusLost).await;
        }
    });

    let err = service.next_question(&mut session).await.unwrap_err();
    assert!(matches!(err, InterviewError::IntegrityAborted));

    assert_eq!(session.phase(), InterviewPhase::Feedback);
    assert_eq!(session.end_reason(), Some(EndReason::IntegrityViolation));
    assert!(session.record().is_completed());
    assert_eq!(session.record().integrity_strikes(), 3);

    let feedback = session.record().feedback().unwrap();
    assert_eq!(feedback.overall_score, Some(0));
    assert!(feedback.strengths.is_empty());

    let persisted = repo.get(session.session_id()).await.unwrap().unwrap();
    assert!(persisted.is_completed());
    assert_eq!(persisted.feedback().unwrap().overall_score, Some(0));
}

#[tokio::test]
async fn a_turn_without_capture_does_not_void_the_session() {
    let repo = InMemoryRepository::new();
    let client = ScriptedClient::new(Vec::new());
    let device = Arc::new(FakeDevice::default());
    let service = build_service(&repo, client, Arc::clone(&device));

    let mut session = service.create_session(setup_draft()).unwrap();
    let (_signals_tx, signals_rx) = mpsc::channel(8);
    service.begin(&mut session, signals_rx).await.unwrap();

    service.next_question(&mut session).await.unwrap();
    // No chunks fed: the capture produced nothing for this turn.
    let outcome = service
        .submit_answer(&mut session, "An answer without a recording.")
        .await
        .unwrap();
    assert!(outcome.artifact.is_none());

    assert_eq!(session.record().transcript().len(), 1);
    assert!(session.record().recordings().is_empty());

    // The session keeps going.
    service.next_question(&mut session).await.unwrap();
    assert_eq!(session.record().transcript().len(), 2);
}

#[tokio::test]
async fn setup_falls_back_to_video_only_capture() {
    let repo = InMemoryRepository::new();
    let client = ScriptedClient::new(Vec::new());
    let device = Arc::new(FakeDevice {
        reject_audio: true,
        ..FakeDevice::default()
    });
    let service = build_service(&repo, client, Arc::clone(&device));

    let mut session = service.create_session(setup_draft()).unwrap();
    let (_signals_tx, signals_rx) = mpsc::channel(8);
    let view = service.begin(&mut session, signals_rx).await.unwrap();

    assert_eq!(view.kinds, vec![TrackKind::Video]);
    assert_eq!(session.phase(), InterviewPhase::Active);
}

#[tokio::test]
async fn setup_aborts_when_no_device_is_available() {
    let repo = InMemoryRepository::new();
    let client = ScriptedClient::new(Vec::new());
    let device = Arc::new(FakeDevice {
        reject_all: true,
        ..FakeDevice::default()
    });
    let service = build_service(&repo, client, Arc::clone(&device));

    let mut session = service.create_session(setup_draft()).unwrap();
    let (_signals_tx, signals_rx) = mpsc::channel(8);
    let err = service.begin(&mut session, signals_rx).await.unwrap_err();

    assert!(matches!(
        err,
        InterviewError::Capture(CaptureError::NoDeviceAvailable)
    ));
    assert_eq!(session.phase(), InterviewPhase::Setup);
    assert!(!session.record().is_completed());
}

#[tokio::test]
async fn empty_setup_fields_are_rejected() {
    let repo = InMemoryRepository::new();
    let client = ScriptedClient::new(Vec::new());
    let device = Arc::new(FakeDevice::default());
    let service = build_service(&repo, client, device);

    let err = service
        .create_session(InterviewConfigDraft::new("", "Senior", "desc"))
        .unwrap_err();
    assert!(matches!(err, InterviewError::Config(_)));
}

#[tokio::test]
async fn generated_feedback_parses_the_json_payload() {
    let repo = InMemoryRepository::new();
    let client = ScriptedClient::new(vec![
        Ok("What is a deadlock?".to_string()),
        Ok(
            "```json\n{\"strengths\": [\"clarity\"], \"improvements\": [\"depth\"], \"overallScore\": 7}\n```"
                .to_string(),
        ),
    ]);
    let device = Arc::new(FakeDevice::default());
    let service = build_service(&repo, client, Arc::clone(&device));

    let mut session = service.create_session(setup_draft()).unwrap();
    let (_signals_tx, signals_rx) = mpsc::channel(8);
    service.begin(&mut session, signals_rx).await.unwrap();

    service.next_question(&mut session).await.unwrap();
    service
        .submit_answer(&mut session, "Two locks taken in opposite order.")
        .await
        .unwrap();

    let feedback = service.generate_feedback(&mut session).await.unwrap();
    assert_eq!(feedback.strengths, vec!["clarity"]);
    assert_eq!(feedback.overall_score, Some(7));

    service.finish(&mut session, feedback).await.unwrap();
    assert!(session.record().is_completed());
}

#[tokio::test]
async fn resume_restores_a_persisted_session() {
    let repo = InMemoryRepository::new();
    let client = ScriptedClient::new(vec![Ok("What is backpressure?".to_string())]);
    let device = Arc::new(FakeDevice::default());
    let service = build_service(&repo, client, Arc::clone(&device));

    let mut session = service.create_session(setup_draft()).unwrap();
    let (_signals_tx, signals_rx) = mpsc::channel(8);
    service.begin(&mut session, signals_rx).await.unwrap();
    service.next_question(&mut session).await.unwrap();
    let session_id = session.session_id();
    drop(session);

    // A crash mid-session leaves the last persisted turn durable.
    let mut resumed = service.resume(session_id).await.unwrap();
    assert_eq!(resumed.phase(), InterviewPhase::Active);
    assert_eq!(resumed.record().transcript().len(), 1);

    // The open turn can still be answered; there is just no capture attached.
    let outcome = service
        .submit_answer(&mut resumed, "Slow consumers signal the producer.")
        .await
        .unwrap();
    assert!(outcome.artifact.is_none());
    assert_eq!(resumed.record().answered_turns(), 1);
}
