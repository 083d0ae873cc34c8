use rayon::prelude::*;

use crate::video::types::Frame;

const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// A 3x4 affine colour transform on 0-255 RGB values.
///
/// Each row produces one output channel: `out = r*m0 + g*m1 + b*m2 + m3`.
/// The coefficient formulas follow the CSS filter-effects definitions so a
/// filter looks the same in preview and export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix {
    rows: [[f32; 4]; 3],
}

impl ColorMatrix {
    pub fn identity() -> Self {
        Self {
            rows: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
        }
    }

    /// Desaturate by `amount` (0 = unchanged, 1 = fully gray)
    pub fn grayscale(amount: f32) -> Self {
        let a = 1.0 - amount.clamp(0.0, 1.0);
        Self {
            rows: [
                [LUMA[0] + 0.7874 * a, LUMA[1] - 0.7152 * a, LUMA[2] - 0.0722 * a, 0.0],
                [LUMA[0] - 0.2126 * a, LUMA[1] + 0.2848 * a, LUMA[2] - 0.0722 * a, 0.0],
                [LUMA[0] - 0.2126 * a, LUMA[1] - 0.7152 * a, LUMA[2] + 0.9278 * a, 0.0],
            ],
        }
    }

    /// Scale saturation (0 = gray, 1 = unchanged, >1 = boosted)
    pub fn saturate(s: f32) -> Self {
        Self {
            rows: [
                [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s, 0.0],
                [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s, 0.0],
                [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s, 0.0],
            ],
        }
    }

    pub fn brightness(b: f32) -> Self {
        Self {
            rows: [
                [b, 0.0, 0.0, 0.0],
                [0.0, b, 0.0, 0.0],
                [0.0, 0.0, b, 0.0],
            ],
        }
    }

    /// Scale contrast around mid-gray
    pub fn contrast(c: f32) -> Self {
        let offset = 127.5 * (1.0 - c);
        Self {
            rows: [
                [c, 0.0, 0.0, offset],
                [0.0, c, 0.0, offset],
                [0.0, 0.0, c, offset],
            ],
        }
    }

    /// Map luminance onto `tint`: black stays black, white becomes the tint colour
    pub fn colorize(tint: [u8; 3]) -> Self {
        let row = |c: u8| {
            let k = c as f32 / 255.0;
            [LUMA[0] * k, LUMA[1] * k, LUMA[2] * k, 0.0]
        };
        Self {
            rows: [row(tint[0]), row(tint[1]), row(tint[2])],
        }
    }

    /// Transform that applies `self` first and then `next`
    pub fn then(&self, next: &ColorMatrix) -> ColorMatrix {
        let mut rows = [[0.0f32; 4]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                let mut sum: f32 = (0..3).map(|k| next.rows[i][k] * self.rows[k][j]).sum();
                if j == 3 {
                    sum += next.rows[i][3];
                }
                *value = sum;
            }
        }
        ColorMatrix { rows }
    }

    /// Coefficient-wise interpolation, `t = 0` gives `from`, `t = 1` gives `to`
    pub fn lerp(from: &ColorMatrix, to: &ColorMatrix, t: f32) -> ColorMatrix {
        let t = t.clamp(0.0, 1.0);
        let mut rows = from.rows;
        for (row, target) in rows.iter_mut().zip(&to.rows) {
            for (value, goal) in row.iter_mut().zip(target) {
                *value = *value * (1.0 - t) + goal * t;
            }
        }
        ColorMatrix { rows }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn apply_pixel(&self, pixel: [u8; 3]) -> [u8; 3] {
        let [r, g, b] = pixel.map(f32::from);
        self.rows.map(|m| (r * m[0] + g * m[1] + b * m[2] + m[3]).round().clamp(0.0, 255.0) as u8)
    }

    /// Apply the transform in place, one row of pixels per rayon task
    pub fn apply(&self, frame: &mut Frame) {
        if self.is_identity() {
            return;
        }

        let stride = frame.width() as usize * 3;
        if stride == 0 {
            return;
        }

        let pixels: &mut [u8] = frame.as_image_mut();
        pixels.par_chunks_mut(stride).for_each(|row| {
            for px in row.chunks_exact_mut(3) {
                let out = self.apply_pixel([px[0], px[1], px[2]]);
                px.copy_from_slice(&out);
            }
        });
    }
}

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_grayscale_equalizes_channels() {
        let matrix = ColorMatrix::saturate(1.4)
            .then(&ColorMatrix::contrast(1.2))
            .then(&ColorMatrix::grayscale(1.0));

        for pixel in [[255, 0, 0], [12, 200, 97], [1, 2, 3], [255, 255, 255]] {
            let [r, g, b] = matrix.apply_pixel(pixel);
            assert_eq!(r, g);
            assert_eq!(g, b);
        }
    }

    #[test]
    fn test_zero_amounts_are_identity() {
        let pixel = [40, 120, 220];
        assert_eq!(ColorMatrix::grayscale(0.0).apply_pixel(pixel), pixel);
        assert_eq!(ColorMatrix::saturate(1.0).apply_pixel(pixel), pixel);
        assert_eq!(ColorMatrix::contrast(1.0).apply_pixel(pixel), pixel);
    }

    #[test]
    fn test_then_composes_in_order() {
        let brighten_then_contrast = ColorMatrix::brightness(2.0).then(&ColorMatrix::contrast(0.5));
        // 100 * 2 = 200, then 200 * 0.5 + 63.75
        assert_eq!(brighten_then_contrast.apply_pixel([100, 100, 100]), [164, 164, 164]);
    }

    #[test]
    fn test_lerp_endpoints() {
        let a = ColorMatrix::identity();
        let b = ColorMatrix::colorize([0, 255, 0]);
        assert_eq!(ColorMatrix::lerp(&a, &b, 0.0), a);
        assert_eq!(ColorMatrix::lerp(&a, &b, 1.0), b);
        assert_eq!(b.apply_pixel([255, 255, 255]), [0, 255, 0]);
    }

    #[test]
    fn test_apply_frame() {
        let mut frame = Frame::new_filled(5, 3, [10, 20, 30]);
        ColorMatrix::brightness(2.0).apply(&mut frame);
        assert_eq!(frame.get_pixel(4, 2), [20, 40, 60]);
    }
}
