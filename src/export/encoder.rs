use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    audio::AudioBuffer,
    error::{ExportError, Result},
    export::settings::{ExportFormat, ExportSettings},
    video::types::{CanvasSize, Frame},
};

/// Everything an encoder needs to know before the first submission
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EncodeParams {
    pub canvas: CanvasSize,
    pub settings: ExportSettings,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
}

impl EncodeParams {
    pub fn fps(&self) -> u32 {
        self.settings.frame_rate.fps()
    }
}

/// What an encoder hands back on a successful finish
#[derive(Debug, Clone, Default)]
pub struct EncodedOutput {
    pub bytes: Vec<u8>,
    pub video_frames: u64,
    pub audio_samples: usize,
}

/// Video encoder, audio encoder and container muxer behind one interface.
///
/// Submissions arrive in presentation order: video batches cut by cut, audio
/// either once up front (overlay) or once per cut. After `abort` no output is
/// produced and further calls may fail.
pub trait MediaEncoder: Send {
    fn begin(&mut self, params: &EncodeParams) -> Result<()>;

    fn push_video(&mut self, frames: &[Frame]) -> Result<()>;

    fn push_audio(&mut self, audio: &AudioBuffer) -> Result<()>;

    /// Flush, mux and return the container bytes
    fn finish(&mut self) -> Result<EncodedOutput>;

    /// Discard everything buffered and release encoder resources
    fn abort(&mut self);
}

/// The finished export
#[derive(Debug, Clone, Serialize)]
pub struct ExportArtifact {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
    pub mime_type: &'static str,
    pub settings: ExportSettings,
    pub width: u32,
    pub height: u32,
    /// Seconds of video actually encoded
    pub duration: f64,
    pub frame_count: u64,
    pub dropped_frames: u64,
    pub audio_samples: usize,
    pub created_at: DateTime<Utc>,
}

impl ExportArtifact {
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }

    /// Suggested file name, e.g. `reel-20260101-120000.mp4`
    pub fn file_name(&self) -> String {
        format!(
            "reel-{}.{}",
            self.created_at.format("%Y%m%d-%H%M%S"),
            self.format.extension()
        )
    }
}

/// Submissions captured by an [`InMemoryEncoder`]
#[derive(Debug, Default)]
pub struct Recording {
    pub params: Option<EncodeParams>,
    pub frames: Vec<Frame>,
    pub frame_count: u64,
    pub video_batches: usize,
    pub audio: Option<AudioBuffer>,
    pub audio_batches: usize,
    pub finished: bool,
    pub aborted: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct FailurePlan {
    on_begin: bool,
    on_finish: bool,
    after_frames: Option<u64>,
}

/// Encoder that keeps submissions in memory instead of producing a container.
///
/// Used for dry runs and tests; `finish` returns no container bytes.
#[derive(Debug)]
pub struct InMemoryEncoder {
    recording: Arc<Mutex<Recording>>,
    keep_frames: bool,
    failures: FailurePlan,
}

impl InMemoryEncoder {
    /// Keep every submitted frame
    pub fn new() -> Self {
        Self {
            recording: Arc::new(Mutex::new(Recording::default())),
            keep_frames: true,
            failures: FailurePlan::default(),
        }
    }

    /// Count frames without keeping their pixels
    pub fn counting() -> Self {
        Self {
            keep_frames: false,
            ..Self::new()
        }
    }

    pub fn fail_on_begin(mut self) -> Self {
        self.failures.on_begin = true;
        self
    }

    pub fn fail_on_finish(mut self) -> Self {
        self.failures.on_finish = true;
        self
    }

    pub fn fail_after_frames(mut self, frames: u64) -> Self {
        self.failures.after_frames = Some(frames);
        self
    }

    /// Shared view of what has been submitted so far
    pub fn recording(&self) -> Arc<Mutex<Recording>> {
        Arc::clone(&self.recording)
    }

    fn with_recording<T>(&self, f: impl FnOnce(&mut Recording) -> T) -> Result<T> {
        let mut recording = self.recording.lock().map_err(|_| ExportError::SubmissionFailed {
            reason: "recording lock poisoned".to_string(),
        })?;
        Ok(f(&mut recording))
    }
}

impl Default for InMemoryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEncoder for InMemoryEncoder {
    fn begin(&mut self, params: &EncodeParams) -> Result<()> {
        if self.failures.on_begin {
            return Err(ExportError::EncoderInitFailure {
                reason: "in-memory encoder configured to fail".to_string(),
            }
            .into());
        }

        let params = *params;
        self.with_recording(|r| {
            *r = Recording {
                params: Some(params),
                audio: Some(AudioBuffer::empty(params.audio_sample_rate, params.audio_channels)),
                ..Recording::default()
            };
        })
    }

    fn push_video(&mut self, frames: &[Frame]) -> Result<()> {
        let keep = self.keep_frames;
        let limit = self.failures.after_frames;

        self.with_recording(|r| {
            let params = r.params.ok_or_else(|| ExportError::SubmissionFailed {
                reason: "video submitted before begin".to_string(),
            })?;

            if let Some(limit) = limit {
                if r.frame_count + frames.len() as u64 > limit {
                    return Err(ExportError::SubmissionFailed {
                        reason: format!("encoder failed after {limit} frames"),
                    });
                }
            }

            if let Some(frame) = frames
                .iter()
                .find(|f| f.dimensions() != (params.canvas.width, params.canvas.height))
            {
                return Err(ExportError::SubmissionFailed {
                    reason: format!(
                        "frame is {}x{}, canvas is {}x{}",
                        frame.width(),
                        frame.height(),
                        params.canvas.width,
                        params.canvas.height
                    ),
                });
            }

            r.frame_count += frames.len() as u64;
            r.video_batches += 1;
            if keep {
                r.frames.extend_from_slice(frames);
            }
            Ok(())
        })?
        .map_err(Into::into)
    }

    fn push_audio(&mut self, audio: &AudioBuffer) -> Result<()> {
        self.with_recording(|r| {
            let track = r.audio.as_mut().ok_or_else(|| ExportError::SubmissionFailed {
                reason: "audio submitted before begin".to_string(),
            })?;

            if !track.append(audio) {
                return Err(ExportError::SubmissionFailed {
                    reason: format!(
                        "audio layout {} Hz x{} does not match {} Hz x{}",
                        audio.sample_rate,
                        audio.channel_count(),
                        track.sample_rate,
                        track.channel_count()
                    ),
                });
            }
            r.audio_batches += 1;
            Ok(())
        })?
        .map_err(Into::into)
    }

    fn finish(&mut self) -> Result<EncodedOutput> {
        if self.failures.on_finish {
            return Err(ExportError::MuxFinalizeFailure {
                reason: "in-memory encoder configured to fail".to_string(),
            }
            .into());
        }

        self.with_recording(|r| {
            r.finished = true;
            EncodedOutput {
                bytes: Vec::new(),
                video_frames: r.frame_count,
                audio_samples: r.audio.as_ref().map_or(0, AudioBuffer::len),
            }
        })
    }

    fn abort(&mut self) {
        if let Ok(mut r) = self.recording.lock() {
            r.aborted = true;
            r.frames.clear();
            r.audio = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::settings::ExportSettings;

    fn params() -> EncodeParams {
        EncodeParams {
            canvas: CanvasSize::new(4, 4),
            settings: ExportSettings::default(),
            audio_sample_rate: 8_000,
            audio_channels: 2,
        }
    }

    #[test]
    fn test_records_submissions() {
        let mut encoder = InMemoryEncoder::new();
        let recording = encoder.recording();

        encoder.begin(&params()).unwrap();
        encoder.push_video(&[Frame::new_black(4, 4), Frame::new_black(4, 4)]).unwrap();
        encoder.push_audio(&AudioBuffer::silence(8_000, 2, 100)).unwrap();
        let output = encoder.finish().unwrap();

        assert_eq!(output.video_frames, 2);
        assert_eq!(output.audio_samples, 100);
        let r = recording.lock().unwrap();
        assert!(r.finished);
        assert_eq!(r.frames.len(), 2);
    }

    #[test]
    fn test_rejects_mismatched_submissions() {
        let mut encoder = InMemoryEncoder::new();
        assert!(encoder.push_video(&[Frame::new_black(4, 4)]).is_err());

        encoder.begin(&params()).unwrap();
        assert!(encoder.push_video(&[Frame::new_black(6, 4)]).is_err());
        assert!(encoder.push_audio(&AudioBuffer::silence(44_100, 2, 10)).is_err());
    }

    #[test]
    fn test_abort_discards() {
        let mut encoder = InMemoryEncoder::new();
        let recording = encoder.recording();
        encoder.begin(&params()).unwrap();
        encoder.push_video(&[Frame::new_black(4, 4)]).unwrap();
        encoder.abort();

        let r = recording.lock().unwrap();
        assert!(r.aborted);
        assert!(r.frames.is_empty());
        assert!(!r.finished);
    }
}
