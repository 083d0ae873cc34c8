//! # Video Module
//!
//! Frames, decodable media sources and the frame compositor.

pub mod compositor;
pub mod ffmpeg;
pub mod source;
pub mod synthetic;
pub mod types;

pub use compositor::{canvas_size, contain, FrameCompositor, Placement, RenderOutcome};
pub use ffmpeg::FfmpegSource;
pub use source::{AudioStreamInfo, MediaSource, SourceMetadata};
pub use synthetic::SyntheticSource;
pub use types::{CanvasSize, Frame};
