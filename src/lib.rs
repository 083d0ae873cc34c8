//! # Reel-Composer
//!
//! Assemble a finished video from cuts across several source recordings, with
//! per-clip filters, aspect-ratio framing and overlay audio.
//!
//! The library keeps a live preview and an offline export in lockstep: both
//! walk the same cut list, draw frames through the same compositor and build
//! the same continuous audio track.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reel_composer::{
//!     config::Config,
//!     export::{CancelFlag, ExportSettings, FfmpegEncoder},
//!     filters::{Filter, FilterSet},
//!     timeline::{AspectRatio, Clip, Cut, EditSession},
//!     video::FfmpegSource,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let mut session = EditSession::new(config.clone())?;
//!
//! let camera = FfmpegSource::open("camera.mp4", &config.export).await?;
//! let source = session.open_source(Arc::new(camera)).await?;
//!
//! let clip = Clip::simple("intro", Cut::new(source, 2.0, 8.0)?)
//!     .with_aspect_ratio(AspectRatio::Square)
//!     .with_filters(FilterSet::single(Filter::Grayscale));
//! let id = session.add_clip(clip)?;
//!
//! let artifact = session
//!     .export(
//!         id,
//!         ExportSettings::default(),
//!         Box::new(FfmpegEncoder::new(&config.export.ffmpeg_path)),
//!         &CancelFlag::new(),
//!         |percent| println!("{percent}%"),
//!     )
//!     .await?;
//! artifact.save(artifact.file_name())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`timeline`] - Sources, cuts, clips and the edit session that owns them
//! - [`video`] - Media sources, frames and the frame compositor
//! - [`filters`] - Colour-matrix filters and the VHS overlay
//! - [`audio`] - Audio buffers, loading, overlay tracks and mixing
//! - [`playback`] - Preview state machine and sequencer
//! - [`export`] - Export pipeline and encoders
//! - [`composition`] - Multi-cam generation and scene/caption suggestions
//! - [`config`] - Configuration management

pub mod audio;
pub mod composition;
pub mod config;
pub mod error;
pub mod export;
pub mod filters;
pub mod playback;
pub mod timeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{CompositorError, Result},
    export::{ExportArtifact, ExportPipeline, ExportSettings},
    filters::{Filter, FilterSet},
    timeline::{AspectRatio, Clip, ClipId, Cut, EditSession, VideoSource},
};
