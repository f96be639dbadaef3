#![forbid(unsafe_code)]

pub mod app_services;
pub mod capture;
pub mod error;
pub mod generation;
pub mod integrity;
pub mod interview;

pub use interview_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, CaptureError, GenerationError, InterviewError};

pub use capture::{
    CaptureConstraints, CaptureDevice, CaptureStream, MediaCaptureRecorder, MediaChunk,
    RecordingArtifact, StreamView,
};
pub use generation::{
    GenerationGateway, GenerationLimits, GenerationRequest, GenerationUsageService,
    GenerativeClient, HttpGenerativeClient,
};
pub use integrity::{FocusSignal, IntegrityEvent, IntegrityMonitor};
pub use interview::{
    EndReason, InterviewLoopService, InterviewPhase, InterviewProgress, InterviewSession,
    TurnOutcome,
};
