use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::{
    audio::AudioBuffer,
    error::Result,
    video::types::{CanvasSize, Frame},
};

/// Stream information reported by a media backend once it has read the headers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Natural duration in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    /// Native frame rate
    pub fps: f64,
    /// First audio stream, if the source has one
    pub audio: Option<AudioStreamInfo>,
}

impl SourceMetadata {
    pub fn frame_size(&self) -> CanvasSize {
        CanvasSize::new(self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decodable video+audio data behind a [`VideoSource`](crate::timeline::VideoSource).
///
/// Implementations must be safe to share between the preview and export paths;
/// the session guarantees only one of them drives a source at a time.
pub trait MediaSource: Send + Sync + Debug {
    /// Human-readable name (usually the file name)
    fn name(&self) -> &str;

    /// Stream metadata, or `None` while the backend is still opening the source
    fn metadata(&self) -> Option<SourceMetadata>;

    /// Decode the frame presented at `time` seconds.
    ///
    /// An undecodable frame is reported as
    /// [`VideoError::DecodeFailure`](crate::error::VideoError::DecodeFailure);
    /// callers skip it rather than fabricating a replacement.
    fn frame_at(&self, time: f64) -> Result<Frame>;

    /// Decode `duration` seconds of audio starting at `start`, converted to the
    /// requested layout. Returns `Ok(None)` when the source has no audio stream.
    /// Requests running past the end return whatever audio exists.
    fn audio_range(
        &self,
        start: f64,
        duration: f64,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Option<AudioBuffer>>;

    fn is_ready(&self) -> bool {
        self.metadata().is_some()
    }
}
