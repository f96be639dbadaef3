use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use interview_core::Clock;
use interview_core::model::ArtifactId;

use crate::capture::device::{CaptureStream, MediaChunk, StreamView};
use crate::error::CaptureError;

/// Container type of assembled artifacts.
pub const ARTIFACT_MIME_TYPE: &str = "video/webm";

/// The finalized recorded-media object for a single turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingArtifact {
    pub id: ArtifactId,
    pub data: Vec<u8>,
    pub chunk_count: usize,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

struct BufferWorker {
    handle: JoinHandle<mpsc::Receiver<MediaChunk>>,
    stop: watch::Sender<bool>,
}

/// Buffers encoded chunks from an owned capture stream and assembles them
/// into per-turn artifacts.
///
/// The recorder is the stream's only owner. The buffer outlives stream swaps
/// (`update_stream`), so chunks captured before a device hot-swap stay part
/// of the turn's artifact.
pub struct MediaCaptureRecorder {
    clock: Clock,
    stream: Option<CaptureStream>,
    chunks: Arc<Mutex<Vec<MediaChunk>>>,
    worker: Option<BufferWorker>,
}

impl MediaCaptureRecorder {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            stream: None,
            chunks: Arc::new(Mutex::new(Vec::new())),
            worker: None,
        }
    }

    /// Bind a capture stream and return the display snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::NoActiveTracks` when no track in the stream is
    /// both enabled and live.
    pub async fn initialize(&mut self, stream: CaptureStream) -> Result<StreamView, CaptureError> {
        if !stream.has_active_track() {
            return Err(CaptureError::NoActiveTracks);
        }

        let _ = self.release_worker().await;
        if let Some(mut old) = self.stream.take() {
            old.end_tracks();
        }

        let view = stream.view();
        self.stream = Some(stream);
        Ok(view)
    }

    /// Begin buffering chunks from the bound stream.
    ///
    /// Calling while already recording is a warn-and-no-op.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::NotInitialized` when no stream is bound.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            tracing::warn!("recorder already running; ignoring start");
            return Ok(());
        }

        let stream = self.stream.as_mut().ok_or(CaptureError::NotInitialized)?;
        let frames = stream.take_frames().ok_or(CaptureError::NotInitialized)?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(buffer_frames(frames, Arc::clone(&self.chunks), stop_rx));
        self.worker = Some(BufferWorker {
            handle,
            stop: stop_tx,
        });
        Ok(())
    }

    /// Stop buffering and assemble the artifact for this turn.
    ///
    /// Resolves `None` when zero chunks were captured (a device that died
    /// instantly, or a stop before any data arrived). `None` is an expected
    /// outcome the caller must handle, not a failure.
    pub async fn stop(&mut self) -> Option<RecordingArtifact> {
        if let Some(frames) = self.release_worker().await {
            if let Some(stream) = self.stream.as_mut() {
                stream.restore_frames(frames);
            }
        }

        let mut buffer = self.chunks.lock().await;
        if buffer.is_empty() {
            tracing::warn!("recording stopped with no buffered chunks");
            return None;
        }

        let chunks: Vec<MediaChunk> = buffer.drain(..).collect();
        drop(buffer);

        let chunk_count = chunks.len();
        let mut data = Vec::new();
        for chunk in chunks {
            data.extend_from_slice(&chunk.data);
        }

        Some(RecordingArtifact {
            id: ArtifactId::new(),
            data,
            chunk_count,
            mime_type: ARTIFACT_MIME_TYPE.to_string(),
            created_at: self.clock.now(),
        })
    }

    /// Swap the underlying capture stream without losing buffered chunks.
    ///
    /// Used when the device layer re-grants permission mid-recording: the old
    /// stream is ended, the new one takes its place, and buffering resumes if
    /// it was running.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::NoActiveTracks` when the replacement stream has
    /// no usable track; the current stream and buffer are left untouched.
    pub async fn update_stream(&mut self, new_stream: CaptureStream) -> Result<(), CaptureError> {
        if !new_stream.has_active_track() {
            return Err(CaptureError::NoActiveTracks);
        }

        let was_recording = self.worker.is_some();
        let _ = self.release_worker().await;
        if let Some(mut old) = self.stream.take() {
            old.end_tracks();
        }
        self.stream = Some(new_stream);

        if was_recording {
            self.start()?;
        }
        Ok(())
    }

    /// Release the capture unconditionally.
    ///
    /// Safe to call repeatedly and after any error state.
    pub async fn cleanup(&mut self) {
        let _ = self.release_worker().await;
        if let Some(mut stream) = self.stream.take() {
            stream.end_tracks();
        }
        self.chunks.lock().await.clear();
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.worker.is_some()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.stream.is_some()
    }

    /// Display snapshot of the bound stream, if any.
    #[must_use]
    pub fn stream_view(&self) -> Option<StreamView> {
        self.stream.as_ref().map(CaptureStream::view)
    }

    /// Number of chunks currently buffered for the open turn.
    pub async fn buffered_chunks(&self) -> usize {
        self.chunks.lock().await.len()
    }

    async fn release_worker(&mut self) -> Option<mpsc::Receiver<MediaChunk>> {
        let worker = self.worker.take()?;
        let _ = worker.stop.send(true);
        match worker.handle.await {
            Ok(frames) => Some(frames),
            Err(err) => {
                tracing::warn!(error = %err, "recorder buffer task failed");
                None
            }
        }
    }
}

impl fmt::Debug for MediaCaptureRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaCaptureRecorder")
            .field("initialized", &self.stream.is_some())
            .field("recording", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

async fn buffer_frames(
    mut frames: mpsc::Receiver<MediaChunk>,
    chunks: Arc<Mutex<Vec<MediaChunk>>>,
    mut stop: watch::Receiver<bool>,
) -> mpsc::Receiver<MediaChunk> {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            frame = frames.recv() => match frame {
                Some(chunk) => chunks.lock().await.push(chunk),
                None => break,
            }
        }
    }

    // Pick up anything already delivered but not yet consumed, so a stop or
    // stream swap never drops the tail of the buffer.
    while let Ok(chunk) = frames.try_recv() {
        chunks.lock().await.push(chunk);
    }

    frames
}
