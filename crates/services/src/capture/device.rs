use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CaptureError;

/// Kind of a capture track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Ready-state of a capture track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// One track of a capture stream.
#[derive(Clone, Debug)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub enabled: bool,
    pub state: TrackState,
}

impl MediaTrack {
    /// A live, enabled track of the given kind.
    #[must_use]
    pub fn live(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: true,
            state: TrackState::Live,
        }
    }

    /// True when the track can contribute media right now.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.state == TrackState::Live
    }
}

/// One encoded media payload delivered by the capture layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaChunk {
    pub data: Vec<u8>,
    pub timestamp_ms: u64,
}

/// A capture stream handed out by the device layer.
///
/// The frames receiver makes the stream single-owner by construction: once
/// the recorder takes it, nothing else can consume or tear down the capture.
/// Display layers get a [`StreamView`] snapshot instead.
#[derive(Debug)]
pub struct CaptureStream {
    id: String,
    tracks: Vec<MediaTrack>,
    frames: Option<mpsc::Receiver<MediaChunk>>,
}

impl CaptureStream {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        tracks: Vec<MediaTrack>,
        frames: mpsc::Receiver<MediaChunk>,
    ) -> Self {
        Self {
            id: id.into(),
            tracks,
            frames: Some(frames),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// True when at least one track is enabled and live.
    #[must_use]
    pub fn has_active_track(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_active)
    }

    /// Read-only snapshot for display purposes.
    #[must_use]
    pub fn view(&self) -> StreamView {
        StreamView {
            id: self.id.clone(),
            kinds: self.tracks.iter().map(|track| track.kind).collect(),
        }
    }

    pub(crate) fn take_frames(&mut self) -> Option<mpsc::Receiver<MediaChunk>> {
        self.frames.take()
    }

    pub(crate) fn restore_frames(&mut self, frames: mpsc::Receiver<MediaChunk>) {
        self.frames = Some(frames);
    }

    /// Mark every track ended, releasing the capture hardware.
    pub(crate) fn end_tracks(&mut self) {
        for track in &mut self.tracks {
            track.state = TrackState::Ended;
        }
    }
}

/// What the controller and UI are allowed to see of an owned stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamView {
    pub id: String,
    pub kinds: Vec<TrackKind>,
}

/// Requested track kinds for an acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub audio: bool,
    pub video: bool,
}

impl CaptureConstraints {
    #[must_use]
    pub fn audio_video() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }

    #[must_use]
    pub fn video_only() -> Self {
        Self {
            audio: false,
            video: true,
        }
    }
}

/// Seam to the platform capture layer.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire a stream matching the constraints.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::NoDeviceAvailable` when no matching device can
    /// be opened.
    async fn acquire(&self, constraints: CaptureConstraints) -> Result<CaptureStream, CaptureError>;

    /// Release a previously acquired stream by id.
    async fn release(&self, stream_id: &str);
}

/// Acquire with graceful degradation: audio+video first, then video-only.
///
/// # Errors
///
/// Returns `CaptureError::NoDeviceAvailable` only when both acquisitions fail.
pub async fn acquire_with_fallback(
    device: &dyn CaptureDevice,
) -> Result<CaptureStream, CaptureError> {
    match device.acquire(CaptureConstraints::audio_video()).await {
        Ok(stream) => Ok(stream),
        Err(err) => {
            tracing::warn!(error = %err, "audio+video acquisition failed; trying video-only");
            device
                .acquire(CaptureConstraints::video_only())
                .await
                .map_err(|_| CaptureError::NoDeviceAvailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_with_one_live_track_is_active() {
        let (_tx, rx) = mpsc::channel(1);
        let stream = CaptureStream::new(
            "stream-1",
            vec![
                MediaTrack {
                    id: "audio-1".into(),
                    kind: TrackKind::Audio,
                    enabled: false,
                    state: TrackState::Live,
                },
                MediaTrack::live("video-1", TrackKind::Video),
            ],
            rx,
        );
        assert!(stream.has_active_track());
    }

    #[test]
    fn ended_tracks_deactivate_the_stream() {
        let (_tx, rx) = mpsc::channel(1);
        let mut stream =
            CaptureStream::new("stream-1", vec![MediaTrack::live("v", TrackKind::Video)], rx);
        stream.end_tracks();
        assert!(!stream.has_active_track());
    }

    #[test]
    fn view_exposes_ids_and_kinds_only() {
        let (_tx, rx) = mpsc::channel(1);
        let stream = CaptureStream::new(
            "stream-1",
            vec![
                MediaTrack::live("a", TrackKind::Audio),
                MediaTrack::live("v", TrackKind::Video),
            ],
            rx,
        );
        let view = stream.view();
        assert_eq!(view.id, "stream-1");
        assert_eq!(view.kinds, vec![TrackKind::Audio, TrackKind::Video]);
    }
}
