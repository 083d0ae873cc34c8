use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{audio::types::AudioBuffer, error::TimelineError};

/// Identifier of an overlay track inside one edit session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay-{}", self.0)
    }
}

/// A decoded replacement audio track shared between clips
#[derive(Debug)]
pub struct OverlayAudio {
    pub id: OverlayId,
    pub name: String,
    pub buffer: AudioBuffer,
}

impl OverlayAudio {
    pub fn duration(&self) -> f64 {
        self.buffer.duration()
    }
}

#[derive(Debug)]
struct OverlayEntry {
    audio: Arc<OverlayAudio>,
    references: usize,
}

/// Reference-counted store of overlay tracks.
///
/// Clips acquire an overlay when they attach it and release it when they are
/// deleted or switch overlays. The track is dropped from the registry when the
/// last referencing clip lets go of it.
#[derive(Debug, Default)]
pub struct OverlayRegistry {
    entries: HashMap<OverlayId, OverlayEntry>,
    next_id: u64,
    released_count: usize,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a track with no references yet
    pub fn register(&mut self, name: impl Into<String>, buffer: AudioBuffer) -> OverlayId {
        self.next_id += 1;
        let id = OverlayId(self.next_id);
        let audio = Arc::new(OverlayAudio {
            id,
            name: name.into(),
            buffer,
        });

        debug!("Registered {} ({:.2}s)", id, audio.duration());
        self.entries.insert(id, OverlayEntry { audio, references: 0 });
        id
    }

    pub fn get(&self, id: OverlayId) -> Option<Arc<OverlayAudio>> {
        self.entries.get(&id).map(|e| Arc::clone(&e.audio))
    }

    pub fn contains(&self, id: OverlayId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Add one clip reference
    pub fn acquire(&mut self, id: OverlayId) -> Result<Arc<OverlayAudio>, TimelineError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(TimelineError::OverlayNotFound { id: id.0 })?;
        entry.references += 1;
        Ok(Arc::clone(&entry.audio))
    }

    /// Drop one clip reference. Returns `true` when this was the last one and
    /// the track has been released.
    pub fn release(&mut self, id: OverlayId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };

        entry.references = entry.references.saturating_sub(1);
        if entry.references > 0 {
            return false;
        }

        self.entries.remove(&id);
        self.released_count += 1;
        debug!("Released {}", id);
        true
    }

    pub fn references(&self, id: OverlayId) -> usize {
        self.entries.get(&id).map_or(0, |e| e.references)
    }

    /// Number of tracks released since the registry was created
    pub fn released_count(&self) -> usize {
        self.released_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
