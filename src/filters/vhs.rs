// Scanline and grain pass drawn on top of the VHS colour grade

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::video::types::Frame;

/// Parameters of the VHS texture overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VhsOverlay {
    /// Darkening of alternate lines (0.0 - 1.0)
    pub scanline_intensity: f32,
    /// Fraction of pixels that receive grain
    pub grain_density: f32,
    /// Largest grain offset in 0-255 units
    pub grain_amplitude: i16,
    /// Base seed; combined with the frame index so grain is reproducible
    pub seed: u64,
}

impl Default for VhsOverlay {
    fn default() -> Self {
        Self {
            scanline_intensity: 0.35,
            grain_density: 0.06,
            grain_amplitude: 24,
            seed: 0x5648_5300,
        }
    }
}

impl VhsOverlay {
    /// Draw scanlines and grain. Every channel of a pixel gets the same
    /// adjustment so an already gray frame stays gray.
    pub fn apply(&self, frame: &mut Frame, frame_index: u64) {
        self.apply_scanlines(frame);
        self.apply_grain(frame, frame_index);
    }

    fn apply_scanlines(&self, frame: &mut Frame) {
        let (width, height) = frame.dimensions();

        for y in 0..height {
            let factor = if y % 2 == 0 {
                1.0 - self.scanline_intensity * 0.4
            } else {
                1.0 - self.scanline_intensity * 0.1
            };

            for x in 0..width {
                let pixel = frame.get_pixel_mut(x, y);
                for channel in pixel.iter_mut() {
                    *channel = (*channel as f32 * factor).round() as u8;
                }
            }
        }
    }

    fn apply_grain(&self, frame: &mut Frame, frame_index: u64) {
        if self.grain_density <= 0.0 || self.grain_amplitude == 0 {
            return;
        }

        let (width, height) = frame.dimensions();
        let mut rng = SmallRng::seed_from_u64(self.seed ^ frame_index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let amplitude = self.grain_amplitude.abs();

        for y in 0..height {
            for x in 0..width {
                if rng.gen::<f32>() >= self.grain_density {
                    continue;
                }

                let noise = rng.gen_range(-amplitude..=amplitude);
                let pixel = frame.get_pixel_mut(x, y);
                for channel in pixel.iter_mut() {
                    *channel = (*channel as i16 + noise).clamp(0, 255) as u8;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grain_is_deterministic_per_frame() {
        let overlay = VhsOverlay::default();
        let mut a = Frame::new_filled(32, 16, [120, 120, 120]);
        let mut b = a.clone();
        let mut c = a.clone();

        overlay.apply(&mut a, 7);
        overlay.apply(&mut b, 7);
        overlay.apply(&mut c, 8);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_gray_stays_gray() {
        let overlay = VhsOverlay {
            grain_density: 0.5,
            ..VhsOverlay::default()
        };
        let mut frame = Frame::new_filled(16, 16, [90, 90, 90]);
        overlay.apply(&mut frame, 3);

        for y in 0..16 {
            for x in 0..16 {
                let [r, g, b] = frame.get_pixel(x, y);
                assert!(r == g && g == b);
            }
        }
    }

    #[test]
    fn test_even_lines_darker() {
        let overlay = VhsOverlay {
            grain_density: 0.0,
            ..VhsOverlay::default()
        };
        let mut frame = Frame::new_filled(4, 4, [200, 200, 200]);
        overlay.apply(&mut frame, 0);
        assert!(frame.get_pixel(0, 0)[0] < frame.get_pixel(0, 1)[0]);
    }
}
