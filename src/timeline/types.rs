use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    audio::OverlayId,
    error::{Result, TimelineError, VideoError},
    filters::FilterSet,
    playback::wait::wait_until,
    video::source::{MediaSource, SourceMetadata},
};

/// Output framing of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// Keep the source frame size
    #[default]
    #[serde(rename = "source")]
    Source,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 4] = [
        AspectRatio::Source,
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
    ];

    /// Width / height, or `None` for [`AspectRatio::Source`]
    pub fn ratio(&self) -> Option<f64> {
        match self {
            AspectRatio::Source => None,
            AspectRatio::Square => Some(1.0),
            AspectRatio::Portrait => Some(9.0 / 16.0),
            AspectRatio::Landscape => Some(16.0 / 9.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Source => "source",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = TimelineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" | "original" => Ok(AspectRatio::Source),
            "1:1" | "square" => Ok(AspectRatio::Square),
            "9:16" | "portrait" => Ok(AspectRatio::Portrait),
            "16:9" | "landscape" => Ok(AspectRatio::Landscape),
            _ => Err(TimelineError::UnknownIdentifier {
                kind: "aspect ratio",
                value: s.to_string(),
            }),
        }
    }
}

/// A loaded source recording.
///
/// The handle is shared; clips refer to a source only by its index in the
/// session.
#[derive(Debug, Clone)]
pub struct VideoSource {
    name: String,
    handle: Arc<dyn MediaSource>,
    metadata: SourceMetadata,
}

impl VideoSource {
    /// Wrap a handle whose metadata is already available
    pub fn from_handle(handle: Arc<dyn MediaSource>) -> Result<Self> {
        let metadata = handle.metadata().ok_or_else(|| VideoError::LoadFailed {
            path: handle.name().to_string(),
        })?;
        Self::with_metadata(handle, metadata)
    }

    /// Wait (bounded) for the handle to report metadata. `source_index` is
    /// the slot the source will take and is only used for error reporting.
    pub async fn open(handle: Arc<dyn MediaSource>, source_index: usize, timeout: Duration) -> Result<Self> {
        let ready = wait_until(|| handle.is_ready(), timeout, Duration::from_millis(10)).await;
        if !ready {
            return Err(VideoError::SourceNotReady {
                source_index,
                timeout_ms: timeout.as_millis() as u64,
            }
            .into());
        }
        Self::from_handle(handle)
    }

    fn with_metadata(handle: Arc<dyn MediaSource>, metadata: SourceMetadata) -> Result<Self> {
        if !(metadata.duration.is_finite() && metadata.duration > 0.0) {
            return Err(VideoError::InvalidParameters {
                details: format!("{} has no usable duration", handle.name()),
            }
            .into());
        }
        if metadata.width == 0 || metadata.height == 0 {
            return Err(VideoError::InvalidParameters {
                details: format!("{} has an empty frame size", handle.name()),
            }
            .into());
        }

        Ok(Self {
            name: handle.name().to_string(),
            handle,
            metadata,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Natural duration in seconds
    pub fn duration(&self) -> f64 {
        self.metadata.duration
    }

    pub fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    pub fn handle(&self) -> &Arc<dyn MediaSource> {
        &self.handle
    }

    pub fn has_audio(&self) -> bool {
        self.metadata.audio.is_some()
    }
}

/// A time range taken from one source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    pub source_index: usize,
    pub start: f64,
    pub end: f64,
}

impl Cut {
    /// A cut with a well-formed range; source bounds are checked by
    /// [`Cut::validate`] once the source list is known.
    pub fn new(source_index: usize, start: f64, end: f64) -> std::result::Result<Self, TimelineError> {
        if !(start.is_finite() && end.is_finite()) || start < 0.0 || start >= end {
            return Err(TimelineError::InvalidTimeRange { start, end });
        }
        Ok(Self {
            source_index,
            start,
            end,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn validate(&self, sources: &[VideoSource]) -> std::result::Result<(), TimelineError> {
        if !(self.start.is_finite() && self.end.is_finite()) || self.start < 0.0 || self.start >= self.end {
            return Err(TimelineError::InvalidTimeRange {
                start: self.start,
                end: self.end,
            });
        }

        let source = sources.get(self.source_index).ok_or(TimelineError::InvalidSourceIndex {
            index: self.source_index,
            source_count: sources.len(),
        })?;

        if self.end > source.duration() {
            return Err(TimelineError::OutOfSourceRange {
                source_index: self.source_index,
                start: self.start,
                end: self.end,
                duration: source.duration(),
            });
        }
        Ok(())
    }
}

/// How a clip maps onto its sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ClipTiming {
    /// One range of one source
    Simple { cut: Cut },
    /// Ordered cuts, possibly across sources
    Composite { cuts: Vec<Cut> },
}

impl ClipTiming {
    pub fn simple(cut: Cut) -> Self {
        ClipTiming::Simple { cut }
    }

    pub fn composite(cuts: Vec<Cut>) -> std::result::Result<Self, TimelineError> {
        if cuts.is_empty() {
            return Err(TimelineError::EmptyComposite);
        }
        Ok(ClipTiming::Composite { cuts })
    }

    pub fn cuts(&self) -> &[Cut] {
        match self {
            ClipTiming::Simple { cut } => std::slice::from_ref(cut),
            ClipTiming::Composite { cuts } => cuts,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, ClipTiming::Composite { .. })
    }

    pub fn total_duration(&self) -> f64 {
        self.cuts().iter().map(Cut::duration).sum()
    }

    pub fn validate(&self, sources: &[VideoSource]) -> std::result::Result<(), TimelineError> {
        if self.cuts().is_empty() {
            return Err(TimelineError::EmptyComposite);
        }
        self.cuts().iter().try_for_each(|cut| cut.validate(sources))
    }
}

/// Session-unique clip identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipId(pub u64);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip-{}", self.0)
    }
}

/// A user-facing editable clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub(crate) id: ClipId,
    pub title: String,
    timing: ClipTiming,
    pub filters: FilterSet,
    pub aspect_ratio: AspectRatio,
    pub muted: bool,
    pub(crate) overlay: Option<OverlayId>,
}

impl Clip {
    /// A new clip; its id is assigned when it is added to a session
    pub fn new(title: impl Into<String>, timing: ClipTiming) -> Self {
        Self {
            id: ClipId(0),
            title: title.into(),
            timing,
            filters: FilterSet::none(),
            aspect_ratio: AspectRatio::Source,
            muted: false,
            overlay: None,
        }
    }

    pub fn simple(title: impl Into<String>, cut: Cut) -> Self {
        Self::new(title, ClipTiming::simple(cut))
    }

    pub fn composite(title: impl Into<String>, cuts: Vec<Cut>) -> std::result::Result<Self, TimelineError> {
        Ok(Self::new(title, ClipTiming::composite(cuts)?))
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    /// Reference an overlay track; the session takes the reference on add
    pub fn with_overlay(mut self, overlay: OverlayId) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn timing(&self) -> &ClipTiming {
        &self.timing
    }

    pub(crate) fn set_timing(&mut self, timing: ClipTiming) {
        self.timing = timing;
    }

    pub fn cuts(&self) -> &[Cut] {
        self.timing.cuts()
    }

    pub fn is_composite(&self) -> bool {
        self.timing.is_composite()
    }

    pub fn overlay(&self) -> Option<OverlayId> {
        self.overlay
    }

    /// Sum of the cut durations, always positive for a valid clip
    pub fn total_duration(&self) -> f64 {
        self.timing.total_duration()
    }

    /// Clip-relative time at which cut `index` begins
    pub fn cut_offset(&self, index: usize) -> f64 {
        self.cuts().iter().take(index).map(Cut::duration).sum()
    }

    /// Map a clip-relative time onto `(cut index, source time)`.
    /// Times past the end map to the end of the last cut.
    pub fn locate(&self, clip_time: f64) -> Option<(usize, f64)> {
        let cuts = self.cuts();
        let mut offset = 0.0;
        for (index, cut) in cuts.iter().enumerate() {
            if clip_time < offset + cut.duration() {
                let within = (clip_time - offset).max(0.0);
                return Some((index, cut.start + within));
            }
            offset += cut.duration();
        }
        cuts.last().map(|cut| (cuts.len() - 1, cut.end))
    }

    pub fn validate(&self, sources: &[VideoSource]) -> std::result::Result<(), TimelineError> {
        self.timing.validate(sources)?;
        FilterSet::new(self.filters.iter())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::synthetic::SyntheticSource;

    fn sources(durations: &[f64]) -> Vec<VideoSource> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| {
                VideoSource::from_handle(Arc::new(SyntheticSource::new(format!("cam{i}"), *d, 16, 9))).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_cut_range_validation() {
        assert!(matches!(Cut::new(0, 3.0, 3.0), Err(TimelineError::InvalidTimeRange { .. })));
        assert!(matches!(Cut::new(0, -1.0, 3.0), Err(TimelineError::InvalidTimeRange { .. })));

        let sources = sources(&[10.0]);
        assert!(Cut::new(0, 2.0, 10.0).unwrap().validate(&sources).is_ok());
        assert!(matches!(
            Cut::new(0, 2.0, 10.5).unwrap().validate(&sources),
            Err(TimelineError::OutOfSourceRange { .. })
        ));
        assert!(matches!(
            Cut::new(1, 0.0, 1.0).unwrap().validate(&sources),
            Err(TimelineError::InvalidSourceIndex { index: 1, source_count: 1 })
        ));
    }

    #[test]
    fn test_composite_total_duration() {
        let clip = Clip::composite(
            "mix",
            vec![
                Cut::new(0, 0.0, 2.0).unwrap(),
                Cut::new(1, 1.0, 4.0).unwrap(),
                Cut::new(0, 5.0, 6.0).unwrap(),
            ],
        )
        .unwrap();

        assert!(clip.is_composite());
        assert_eq!(clip.total_duration(), 6.0);
        assert_eq!(clip.cut_offset(2), 5.0);
        assert_eq!(clip.locate(2.5), Some((1, 1.5)));
        assert_eq!(clip.locate(99.0), Some((2, 6.0)));
        assert!(matches!(Clip::composite("empty", vec![]), Err(TimelineError::EmptyComposite)));
    }

    #[test]
    fn test_aspect_ratio_identifiers() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert_eq!("Square".parse::<AspectRatio>().unwrap(), AspectRatio::Square);
        assert!("4:3".parse::<AspectRatio>().is_err());
        assert_eq!(serde_json::to_string(&AspectRatio::Landscape).unwrap(), r#""16:9""#);
        assert_eq!(serde_json::from_str::<AspectRatio>(r#""source""#).unwrap(), AspectRatio::Source);
    }

    #[tokio::test]
    async fn test_open_waits_for_metadata() {
        let handle: Arc<dyn MediaSource> = Arc::new(SyntheticSource::new("cam", 4.0, 8, 8).ready_after(3));
        assert!(VideoSource::from_handle(Arc::clone(&handle)).is_err());

        let source = VideoSource::open(handle, 0, Duration::from_secs(1)).await.unwrap();
        assert_eq!(source.duration(), 4.0);
    }

    #[tokio::test]
    async fn test_open_times_out() {
        let handle: Arc<dyn MediaSource> = Arc::new(SyntheticSource::new("cam", 4.0, 8, 8).ready_after(usize::MAX));
        let result = VideoSource::open(handle, 2, Duration::from_millis(50)).await;
        assert!(matches!(
            result,
            Err(crate::error::CompositorError::Video(VideoError::SourceNotReady {
                source_index: 2,
                timeout_ms: 50
            }))
        ));
    }
}
