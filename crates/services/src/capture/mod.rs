mod device;
mod recorder;

// Public API of the capture subsystem.
pub use crate::error::CaptureError;
pub use device::{
    CaptureConstraints, CaptureDevice, CaptureStream, MediaChunk, MediaTrack, StreamView,
    TrackKind, TrackState, acquire_with_fallback,
};
pub use recorder::{ARTIFACT_MIME_TYPE, MediaCaptureRecorder, RecordingArtifact};
