use std::fmt::Debug;
use std::sync::Arc;

use crate::{
    error::PlaybackError,
    filters::FilterSet,
    timeline::AspectRatio,
    video::source::MediaSource,
};

/// How a handle should present its picture and sound
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Presentation {
    pub muted: bool,
    pub filters: FilterSet,
    pub aspect_ratio: AspectRatio,
}

/// A playable media element driven by the preview sequencer
pub trait MediaHandle: Send + Debug {
    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, time: f64);

    /// Current playback position in seconds
    fn position(&self) -> f64;

    fn is_playing(&self) -> bool;

    fn present(&mut self, presentation: Presentation);

    /// Called by the driver on every tick with the wall time (seconds) since
    /// the previous tick. Handles running on their own clock can ignore it.
    fn advance(&mut self, _elapsed: f64) {}
}

/// A handle whose clock only moves when the driver advances it.
///
/// Position never runs past `duration`; reaching it pauses the handle.
#[derive(Debug, Clone)]
pub struct VirtualHandle {
    source: Option<Arc<dyn MediaSource>>,
    duration: f64,
    position: f64,
    playing: bool,
    presentation: Presentation,
}

impl VirtualHandle {
    pub fn new(duration: f64) -> Self {
        Self {
            source: None,
            duration,
            position: 0.0,
            playing: false,
            presentation: Presentation::default(),
        }
    }

    /// A handle that also exposes the source it plays, for preview frames
    pub fn for_source(source: Arc<dyn MediaSource>, duration: f64) -> Self {
        Self {
            source: Some(source),
            ..Self::new(duration)
        }
    }

    pub fn source(&self) -> Option<&Arc<dyn MediaSource>> {
        self.source.as_ref()
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }
}

impl MediaHandle for VirtualHandle {
    fn play(&mut self) {
        self.playing = self.position < self.duration;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, time: f64) {
        self.position = time.clamp(0.0, self.duration);
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn present(&mut self, presentation: Presentation) {
        self.presentation = presentation;
    }

    fn advance(&mut self, elapsed: f64) {
        if !self.playing {
            return;
        }
        self.position = (self.position + elapsed.max(0.0)).min(self.duration);
        if self.position >= self.duration {
            self.playing = false;
        }
    }
}

/// The handles a preview drives: one per source plus the overlay track
#[derive(Debug, Default)]
pub struct HandleSet {
    sources: Vec<Box<dyn MediaHandle>>,
    overlay: Option<Box<dyn MediaHandle>>,
}

impl HandleSet {
    pub fn new(sources: Vec<Box<dyn MediaHandle>>) -> Self {
        Self {
            sources,
            overlay: None,
        }
    }

    pub fn with_overlay(mut self, overlay: Box<dyn MediaHandle>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn set_overlay(&mut self, overlay: Option<Box<dyn MediaHandle>>) {
        self.overlay = overlay;
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn contains(&self, source_index: usize) -> bool {
        source_index < self.sources.len()
    }

    pub fn source(&self, source_index: usize) -> Result<&dyn MediaHandle, PlaybackError> {
        self.sources
            .get(source_index)
            .map(|h| h.as_ref())
            .ok_or(PlaybackError::MissingHandle { source_index })
    }

    pub fn source_mut(&mut self, source_index: usize) -> Result<&mut Box<dyn MediaHandle>, PlaybackError> {
        self.sources
            .get_mut(source_index)
            .ok_or(PlaybackError::MissingHandle { source_index })
    }

    pub fn overlay(&self) -> Option<&dyn MediaHandle> {
        self.overlay.as_deref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut Box<dyn MediaHandle>> {
        self.overlay.as_mut()
    }

    /// Pause every source handle and the overlay
    pub fn pause_all(&mut self) {
        for handle in &mut self.sources {
            handle.pause();
        }
        if let Some(overlay) = &mut self.overlay {
            overlay.pause();
        }
    }

    pub fn any_playing(&self) -> bool {
        self.sources.iter().any(|h| h.is_playing())
            || self.overlay.as_ref().is_some_and(|h| h.is_playing())
    }

    pub(crate) fn advance_all(&mut self, elapsed: f64) {
        for handle in &mut self.sources {
            handle.advance(elapsed);
        }
        if let Some(overlay) = &mut self.overlay {
            overlay.advance(elapsed);
        }
    }
}
