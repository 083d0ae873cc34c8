use image::{imageops, ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Represents a single video frame
///
/// This is a simple wrapper around an RGB image buffer that provides
/// convenient methods for pixel manipulation used by the compositor and filters.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        let buffer = ImageBuffer::new(width, height);
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let pixel = self.buffer.get_pixel(x, y);
        [pixel[0], pixel[1], pixel[2]]
    }

    /// Get a mutable reference to a pixel at the given coordinates
    pub fn get_pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let pixel = self.buffer.get_pixel_mut(x, y);
        &mut pixel.0
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Get a mutable reference to the underlying image buffer
    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.buffer
    }

    /// Raw interleaved RGB bytes, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Scale the frame to exactly `width` x `height`
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Frame::new(imageops::resize(
            &self.buffer,
            width,
            height,
            imageops::FilterType::Triangle,
        ))
    }

    /// Copy `other` into this frame with its top-left corner at `(x, y)`.
    /// Pixels falling outside this frame are clipped.
    pub fn paste(&mut self, other: &Frame, x: u32, y: u32) {
        imageops::replace(&mut self.buffer, &other.buffer, x as i64, y as i64);
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// Output canvas dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Round both dimensions to the nearest even integer (minimum 2), as
    /// required by yuv420p encoders.
    pub fn to_even(self) -> Self {
        Self {
            width: round_even(self.width as f64),
            height: round_even(self.height as f64),
        }
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

pub(crate) fn round_even(value: f64) -> u32 {
    let rounded = (value / 2.0).round() as u32 * 2;
    rounded.max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paste_clips_to_bounds() {
        let mut canvas = Frame::new_black(4, 4);
        let tile = Frame::new_filled(3, 3, [200, 10, 10]);
        canvas.paste(&tile, 2, 2);

        assert_eq!(canvas.get_pixel(1, 1), [0, 0, 0]);
        assert_eq!(canvas.get_pixel(3, 3), [200, 10, 10]);
    }

    #[test]
    fn test_canvas_rounds_to_even() {
        let canvas = CanvasSize::new(607, 1081).to_even();
        assert_eq!(canvas, CanvasSize::new(608, 1082));
        assert_eq!(CanvasSize::new(1, 1).to_even(), CanvasSize::new(2, 2));
    }

    #[test]
    fn test_resized_keeps_same_size_untouched() {
        let frame = Frame::new_filled(8, 6, [1, 2, 3]);
        assert_eq!(frame.resized(8, 6), frame);
        assert_eq!(frame.resized(4, 3).dimensions(), (4, 3));
    }
}
