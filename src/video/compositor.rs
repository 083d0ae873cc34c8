use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::{
    error::{CompositorError, Result, VideoError},
    filters::FilterTransform,
    timeline::AspectRatio,
    video::{
        source::MediaSource,
        types::{round_even, CanvasSize, Frame},
    },
};

/// Result of rendering one output frame
#[derive(Debug)]
pub enum RenderOutcome {
    Rendered(Frame),
    /// The source frame could not be decoded; nothing was drawn
    Dropped { time: f64, reason: String },
}

impl RenderOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, RenderOutcome::Dropped { .. })
    }

    pub fn into_frame(self) -> Option<Frame> {
        match self {
            RenderOutcome::Rendered(frame) => Some(frame),
            RenderOutcome::Dropped { .. } => None,
        }
    }
}

/// Placement of the scaled source inside the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Output canvas for a source frame size and target aspect ratio.
///
/// `source` keeps the frame size. Any other ratio keeps the source height and
/// derives the width from it. Both dimensions end up even.
pub fn canvas_size(source: CanvasSize, aspect_ratio: AspectRatio) -> CanvasSize {
    match aspect_ratio.ratio() {
        None => source.to_even(),
        Some(ratio) => CanvasSize {
            width: round_even(source.height as f64 * ratio),
            height: round_even(source.height as f64),
        },
    }
}

/// Contain placement: the largest scaled copy of `source` that fits inside
/// `canvas` with its aspect ratio preserved, centred. Exactly one dimension
/// matches the canvas; nothing is cropped.
pub fn contain(source: CanvasSize, canvas: CanvasSize) -> Placement {
    let sx = canvas.width as f64 / source.width.max(1) as f64;
    let sy = canvas.height as f64 / source.height.max(1) as f64;

    let (width, height) = if sx <= sy {
        let h = (source.height as f64 * sx).round() as u32;
        (canvas.width, h.clamp(1, canvas.height))
    } else {
        let w = (source.width as f64 * sy).round() as u32;
        (w.clamp(1, canvas.width), canvas.height)
    };

    Placement {
        x: (canvas.width - width) / 2,
        y: (canvas.height - height) / 2,
        width,
        height,
    }
}

/// Draws output frames: fetch, frame with contain semantics, filter.
///
/// Pixel work runs on a dedicated rayon pool so export does not compete with
/// other rayon users in the process.
pub struct FrameCompositor {
    pool: ThreadPool,
}

impl FrameCompositor {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("compositor-{i}"))
            .build()
            .map_err(|e| VideoError::InvalidParameters {
                details: format!("could not start compositor threads: {e}"),
            })?;

        debug!("Frame compositor using {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// Render the frame `source` presents at `time` onto `canvas`.
    ///
    /// Decode failures are reported as [`RenderOutcome::Dropped`]; no
    /// substitute frame is produced.
    pub fn render(
        &self,
        source: &dyn MediaSource,
        time: f64,
        canvas: CanvasSize,
        transform: &FilterTransform,
        frame_index: u64,
    ) -> RenderOutcome {
        match source.frame_at(time) {
            Ok(frame) => RenderOutcome::Rendered(self.compose(&frame, canvas, transform, frame_index)),
            Err(CompositorError::Video(VideoError::DecodeFailure { time, reason })) => {
                RenderOutcome::Dropped { time, reason }
            }
            Err(e) => RenderOutcome::Dropped {
                time,
                reason: e.to_string(),
            },
        }
    }

    /// Frame an already decoded picture onto `canvas` and apply the filters
    pub fn compose(&self, frame: &Frame, canvas: CanvasSize, transform: &FilterTransform, frame_index: u64) -> Frame {
        self.pool.install(|| {
            let mut output = if frame.dimensions() == (canvas.width, canvas.height) {
                frame.clone()
            } else {
                let placement = contain(
                    CanvasSize::new(frame.width(), frame.height()),
                    canvas,
                );
                let scaled = frame.resized(placement.width, placement.height);
                let mut output = Frame::new_black(canvas.width, canvas.height);
                output.paste(&scaled, placement.x, placement.y);
                output
            };

            transform.apply(&mut output, frame_index);
            output
        })
    }
}

impl std::fmt::Debug for FrameCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCompositor")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::FilterConfig,
        filters::{Filter, FilterSet},
        video::synthetic::SyntheticSource,
    };

    #[test]
    fn test_canvas_keeps_source_height() {
        let source = CanvasSize::new(1920, 1080);
        assert_eq!(canvas_size(source, AspectRatio::Source), source);
        assert_eq!(canvas_size(source, AspectRatio::Square), CanvasSize::new(1080, 1080));
        assert_eq!(canvas_size(source, AspectRatio::Portrait), CanvasSize::new(608, 1080));
        assert_eq!(canvas_size(source, AspectRatio::Landscape), CanvasSize::new(1920, 1080));
    }

    #[test]
    fn test_contain_fits_exactly_one_side() {
        // Wide source in a square canvas is letterboxed
        let placement = contain(CanvasSize::new(1920, 1080), CanvasSize::new(1080, 1080));
        assert_eq!(placement.width, 1080);
        assert_eq!(placement.height, 608);
        assert_eq!(placement.y, (1080 - 608) / 2);
        assert_eq!(placement.x, 0);

        // Tall source in a wide canvas: pillarboxed
        let placement = contain(CanvasSize::new(100, 200), CanvasSize::new(400, 100));
        assert_eq!((placement.width, placement.height), (50, 100));
        assert_eq!(placement.x, 175);
    }

    #[test]
    fn test_render_letterboxes_with_black() {
        let compositor = FrameCompositor::new(2).unwrap();
        let source = SyntheticSource::new("cam", 5.0, 64, 32);
        let canvas = canvas_size(CanvasSize::new(64, 32), AspectRatio::Square);

        let frame = compositor
            .render(&source, 1.0, canvas, &FilterTransform::identity(), 0)
            .into_frame()
            .unwrap();

        assert_eq!(frame.dimensions(), (32, 32));
        assert_eq!(frame.get_pixel(16, 0), [0, 0, 0]);
        assert_ne!(frame.get_pixel(16, 16), [0, 0, 0]);
    }

    #[test]
    fn test_render_grayscale() {
        let compositor = FrameCompositor::new(2).unwrap();
        let source = SyntheticSource::new("cam", 5.0, 24, 16);
        let transform = FilterTransform::for_set(&FilterSet::single(Filter::Grayscale), &FilterConfig::default());

        let frame = compositor
            .render(&source, 2.0, CanvasSize::new(24, 16), &transform, 0)
            .into_frame()
            .unwrap();

        let [r, g, b] = frame.get_pixel(5, 9);
        assert!(r == g && g == b);
    }

    #[test]
    fn test_undecodable_frame_is_dropped() {
        let compositor = FrameCompositor::new(1).unwrap();
        let source = SyntheticSource::new("cam", 5.0, 8, 8).with_undecodable_range(1.0, 2.0);

        let outcome = compositor.render(&source, 1.5, CanvasSize::new(8, 8), &FilterTransform::identity(), 0);
        assert!(outcome.is_dropped());
    }
}
