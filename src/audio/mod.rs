//! # Audio Module
//!
//! Planar PCM buffers, file loading, overlay track bookkeeping and the mixer
//! that turns a clip's audio sources into one continuous track.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reel_composer::audio::{AudioLoader, AudioMixer};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let overlay = AudioLoader::load("song.wav").await?;
//!
//! // Ten seconds of output: the song, then silence if it is shorter
//! let track = AudioMixer::default().render_continuous_track(Some(&overlay.buffer), 10.0);
//! println!("{} samples per channel", track.len());
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod mixer;
pub mod overlay;
pub mod types;

pub use loader::{AudioLoader, LoadedAudio};
pub use mixer::AudioMixer;
pub use overlay::{OverlayAudio, OverlayId, OverlayRegistry};
pub use types::{AudioBuffer, AudioFormat};

/// Sample rate used when nothing else dictates one (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
