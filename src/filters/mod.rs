//! # Clip Filters
//!
//! Per-clip visual filters. A clip's [`FilterSet`] is resolved once into a
//! single [`FilterTransform`]: one composed colour matrix plus an optional VHS
//! texture pass. The same transform is used by the preview presentation and the
//! export compositor, so both render a clip identically.
//!
//! Composition order is fixed: VHS grade, then night vision, then grayscale.
//! Grayscale is last so its output always has equal channels.

pub mod matrix;
pub mod set;
pub mod vhs;

use serde::{Deserialize, Serialize};

use crate::{config::FilterConfig, video::types::Frame};

pub use matrix::ColorMatrix;
pub use set::{Filter, FilterSet};
pub use vhs::VhsOverlay;

/// Night vision appearance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NightVisionParams {
    /// Colour highlights are shifted toward
    pub tint: [u8; 3],
    /// Strength in percent (0 - 100); every component scales linearly with it
    pub intensity: f32,
}

impl Default for NightVisionParams {
    fn default() -> Self {
        Self {
            tint: [0x3c, 0xff, 0x5a],
            intensity: 100.0,
        }
    }
}

impl NightVisionParams {
    /// Desaturate, brighten and colorize, each interpolated from identity by intensity
    pub fn matrix(&self) -> ColorMatrix {
        let k = (self.intensity / 100.0).clamp(0.0, 1.0);
        let identity = ColorMatrix::identity();

        ColorMatrix::saturate(1.0 - k)
            .then(&ColorMatrix::brightness(1.0 + 0.5 * k))
            .then(&ColorMatrix::lerp(&identity, &ColorMatrix::colorize(self.tint), k))
    }
}

/// Fixed VHS colour grade
pub fn vhs_grade() -> ColorMatrix {
    ColorMatrix::saturate(1.3)
        .then(&ColorMatrix::contrast(1.15))
        .then(&ColorMatrix::brightness(1.05))
}

/// The resolved per-frame transform for one filter set
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTransform {
    matrix: ColorMatrix,
    overlay: Option<VhsOverlay>,
}

impl FilterTransform {
    pub fn identity() -> Self {
        Self {
            matrix: ColorMatrix::identity(),
            overlay: None,
        }
    }

    pub fn for_set(filters: &FilterSet, config: &FilterConfig) -> Self {
        let mut matrix = ColorMatrix::identity();
        let mut overlay = None;

        if filters.contains(Filter::Vhs) {
            matrix = matrix.then(&vhs_grade());
            if config.vhs_overlay {
                overlay = Some(VhsOverlay::default());
            }
        }

        if filters.contains(Filter::NightVision) {
            matrix = matrix.then(&config.night_vision.matrix());
        }

        if filters.contains(Filter::Grayscale) {
            matrix = matrix.then(&ColorMatrix::grayscale(1.0));
        }

        Self { matrix, overlay }
    }

    pub fn matrix(&self) -> &ColorMatrix {
        &self.matrix
    }

    pub fn is_identity(&self) -> bool {
        self.overlay.is_none() && self.matrix.is_identity()
    }

    /// Apply to an output frame. `frame_index` seeds the VHS grain.
    pub fn apply(&self, frame: &mut Frame, frame_index: u64) {
        self.matrix.apply(frame);
        if let Some(overlay) = &self.overlay {
            overlay.apply(frame, frame_index);
        }
    }
}

impl Default for FilterTransform {
    fn default() -> Self {
        Self::identity()
    }
}
