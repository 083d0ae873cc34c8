//! # Preview Playback
//!
//! Live preview of one clip at a time. The switching rules live in a pure state
//! machine ([`state`]); [`PlaybackSequencer`] applies the resulting effects to
//! [`MediaHandle`]s and reports continuous clip progress.
//!
//! ```rust
//! use std::time::Duration;
//! use reel_composer::playback::{HandleSet, MediaHandle, PlaybackPlan, PlaybackSequencer, VirtualHandle};
//! use reel_composer::timeline::{AspectRatio, ClipId, Cut};
//! use reel_composer::filters::FilterSet;
//!
//! let handles = HandleSet::new(vec![Box::new(VirtualHandle::new(10.0)) as Box<dyn MediaHandle>]);
//! let mut sequencer = PlaybackSequencer::new(handles);
//! sequencer.start(PlaybackPlan {
//!     clip: ClipId(1),
//!     cuts: vec![Cut::new(0, 2.0, 4.0).unwrap()],
//!     composite: false,
//!     muted: false,
//!     filters: FilterSet::none(),
//!     aspect_ratio: AspectRatio::Source,
//!     overlay: None,
//! }).unwrap();
//!
//! let progress = sequencer.tick(Duration::from_millis(500)).unwrap();
//! assert_eq!(progress, 0.5);
//! ```

pub mod handle;
pub mod sequencer;
pub mod state;
pub mod wait;

pub use handle::{HandleSet, MediaHandle, Presentation, VirtualHandle};
pub use sequencer::PlaybackSequencer;
pub use state::{transition, Effect, PlaybackEvent, PlaybackPlan, PlaybackState, Transition};
pub use wait::wait_until;
