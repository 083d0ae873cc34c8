//! # Composition Helpers
//!
//! Batch clip generation on top of the timeline model: the multi-cam composer
//! that alternates sources to cover an overlay track, and the scene/caption
//! suggestion contract with its local fallbacks.

pub mod multicam;
pub mod suggest;

pub use multicam::MultiCamComposer;
pub use suggest::{
    captions_with_fallback, scene_boundaries_with_fallback, split_at_boundaries, suggested_cuts,
    LumaSceneDetector, SuggestionService, PLACEHOLDER_CAPTION,
};
