//! # Timeline Model
//!
//! Sources, cuts and clips, plus the [`EditSession`] that owns them and
//! enforces the editing invariants at every mutation.

pub mod session;
pub mod types;

pub use session::EditSession;
pub use types::{AspectRatio, Clip, ClipId, ClipTiming, Cut, VideoSource};
