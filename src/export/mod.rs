//! Offline export: render a clip frame by frame through the compositor and
//! hand video and audio to an encoder/muxer.
//!
//! The [`ExportPipeline`] drives any [`MediaEncoder`]. [`FfmpegEncoder`]
//! produces real MP4/WebM files; [`InMemoryEncoder`] records submissions for
//! dry runs and tests.

pub mod encoder;
pub mod ffmpeg;
pub mod pipeline;
pub mod progress;
pub mod settings;

pub use encoder::{EncodeParams, EncodedOutput, ExportArtifact, InMemoryEncoder, MediaEncoder, Recording};
pub use ffmpeg::FfmpegEncoder;
pub use pipeline::{CancelFlag, ExportJob, ExportPipeline};
pub use progress::ProgressTracker;
pub use settings::{ExportFormat, ExportSettings, FrameRate, Quality};
