use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    audio::AudioBuffer,
    error::{Result, SuggestionError, TimelineError},
    timeline::{Cut, VideoSource},
    video::{source::MediaSource, types::Frame},
};

/// Caption used when the suggestion service cannot provide one
pub const PLACEHOLDER_CAPTION: &str = "[caption unavailable]";

/// Scene and caption suggestions from an external collaborator.
///
/// Implementations may call a remote model. Results are only ever inserted
/// into the timeline as ordinary data; a failure never changes anything.
pub trait SuggestionService: Send + Sync {
    /// Timestamps (seconds) where the footage changes scene
    fn suggest_scene_boundaries(
        &self,
        video: &VideoSource,
    ) -> impl Future<Output = std::result::Result<Vec<f64>, SuggestionError>> + Send;

    /// Caption text for a stretch of audio
    fn suggest_captions(
        &self,
        audio: &AudioBuffer,
    ) -> impl Future<Output = std::result::Result<String, SuggestionError>> + Send;
}

/// Scene boundaries, or none when the service fails.
///
/// Returned timestamps are sorted, deduplicated and limited to the inside of
/// the source.
pub async fn scene_boundaries_with_fallback<S: SuggestionService>(service: &S, video: &VideoSource) -> Vec<f64> {
    match service.suggest_scene_boundaries(video).await {
        Ok(boundaries) => sanitize_boundaries(boundaries, video.duration()),
        Err(e) => {
            warn!("Scene suggestions for {} unavailable: {}", video.name(), e);
            Vec::new()
        }
    }
}

/// Caption text, or [`PLACEHOLDER_CAPTION`] when the service fails or
/// returns nothing
pub async fn captions_with_fallback<S: SuggestionService>(service: &S, audio: &AudioBuffer) -> String {
    match service.suggest_captions(audio).await {
        Ok(caption) if !caption.trim().is_empty() => caption.trim().to_string(),
        Ok(_) => {
            debug!("Suggestion service returned an empty caption");
            PLACEHOLDER_CAPTION.to_string()
        }
        Err(e) => {
            warn!("Caption suggestion unavailable: {}", e);
            PLACEHOLDER_CAPTION.to_string()
        }
    }
}

fn sanitize_boundaries(mut boundaries: Vec<f64>, duration: f64) -> Vec<f64> {
    boundaries.retain(|t| t.is_finite() && *t > 0.0 && *t < duration);
    boundaries.sort_by(f64::total_cmp);
    boundaries.dedup_by(|a, b| (*a - *b).abs() < 1e-6);
    boundaries
}

/// Split `cut` at every boundary strictly inside it, dropping pieces shorter
/// than `min_length`
pub fn split_at_boundaries(cut: Cut, boundaries: &[f64], min_length: f64) -> std::result::Result<Vec<Cut>, TimelineError> {
    let mut edges = vec![cut.start];
    edges.extend(boundaries.iter().copied().filter(|t| *t > cut.start && *t < cut.end));
    edges.push(cut.end);
    edges.sort_by(f64::total_cmp);

    edges
        .windows(2)
        .filter(|w| w[1] - w[0] >= min_length)
        .map(|w| Cut::new(cut.source_index, w[0], w[1]))
        .collect()
}

/// Local scene detector: samples frames at a fixed interval and reports a
/// boundary wherever mean luma jumps by more than `threshold` (0-1).
#[derive(Debug, Clone)]
pub struct LumaSceneDetector {
    pub sample_interval: f64,
    pub threshold: f64,
}

impl Default for LumaSceneDetector {
    fn default() -> Self {
        Self {
            sample_interval: 0.5,
            threshold: 0.15,
        }
    }
}

impl LumaSceneDetector {
    /// Blocking detection over a whole source. Undecodable samples are skipped.
    pub fn detect(&self, source: &dyn MediaSource, duration: f64) -> Vec<f64> {
        let step = self.sample_interval.max(0.01);
        let samples = (duration / step).floor() as usize;
        let mut boundaries = Vec::new();
        let mut previous: Option<f64> = None;

        for i in 0..=samples {
            let time = i as f64 * step;
            if time >= duration {
                break;
            }

            let luma = match source.frame_at(time) {
                Ok(frame) => mean_luma(&frame),
                Err(e) => {
                    debug!("Scene detector skipped {:.3}s: {}", time, e);
                    continue;
                }
            };

            if let Some(prev) = previous {
                if (luma - prev).abs() > self.threshold {
                    boundaries.push(time);
                }
            }
            previous = Some(luma);
        }

        debug!("Luma detector found {} boundaries in {}", boundaries.len(), source.name());
        boundaries
    }
}

impl SuggestionService for LumaSceneDetector {
    async fn suggest_scene_boundaries(&self, video: &VideoSource) -> std::result::Result<Vec<f64>, SuggestionError> {
        let detector = self.clone();
        let handle = Arc::clone(video.handle());
        let duration = video.duration();

        tokio::task::spawn_blocking(move || detector.detect(handle.as_ref(), duration))
            .await
            .map_err(|e| SuggestionError::SuggestionServiceFailure {
                reason: format!("scene detection task failed: {e}"),
            })
    }

    async fn suggest_captions(&self, _audio: &AudioBuffer) -> std::result::Result<String, SuggestionError> {
        Err(SuggestionError::SuggestionServiceFailure {
            reason: "captioning needs a remote service".to_string(),
        })
    }
}

/// Mean Rec. 601 luma in 0-1
fn mean_luma(frame: &Frame) -> f64 {
    let pixels = frame.as_rgb_bytes();
    if pixels.is_empty() {
        return 0.0;
    }

    let total: f64 = pixels
        .chunks_exact(3)
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .sum();
    total / (pixels.len() / 3) as f64 / 255.0
}

/// Run scene detection and fall back to the whole source as one cut.
///
/// Convenience for callers that want ready-to-use cuts rather than timestamps.
pub async fn suggested_cuts<S: SuggestionService>(
    service: &S,
    sources: &[VideoSource],
    source_index: usize,
    min_length: f64,
) -> Result<Vec<Cut>> {
    let source = sources.get(source_index).ok_or(TimelineError::InvalidSourceIndex {
        index: source_index,
        source_count: sources.len(),
    })?;

    let boundaries = scene_boundaries_with_fallback(service, source).await;
    let whole = Cut::new(source_index, 0.0, source.duration())?;
    Ok(split_at_boundaries(whole, &boundaries, min_length)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::VideoError,
        video::{source::SourceMetadata, synthetic::SyntheticSource},
    };

    /// Dark before `cut_at`, bright after
    #[derive(Debug)]
    struct HardCutSource {
        cut_at: f64,
        duration: f64,
    }

    impl MediaSource for HardCutSource {
        fn name(&self) -> &str {
            "hard-cut"
        }

        fn metadata(&self) -> Option<SourceMetadata> {
            Some(SourceMetadata {
                duration: self.duration,
                width: 8,
                height: 8,
                fps: 30.0,
                audio: None,
            })
        }

        fn frame_at(&self, time: f64) -> Result<Frame> {
            if time > self.duration {
                return Err(VideoError::DecodeFailure {
                    time,
                    reason: "past end".to_string(),
                }
                .into());
            }
            let level = if time < self.cut_at { 20 } else { 220 };
            Ok(Frame::new_filled(8, 8, [level; 3]))
        }

        fn audio_range(&self, _: f64, _: f64, _: u32, _: u16) -> Result<Option<AudioBuffer>> {
            Ok(None)
        }
    }

    struct FailingService;

    impl SuggestionService for FailingService {
        async fn suggest_scene_boundaries(&self, _: &VideoSource) -> std::result::Result<Vec<f64>, SuggestionError> {
            Err(SuggestionError::SuggestionServiceFailure {
                reason: "timeout".to_string(),
            })
        }

        async fn suggest_captions(&self, _: &AudioBuffer) -> std::result::Result<String, SuggestionError> {
            Err(SuggestionError::InvalidResponse {
                details: "not json".to_string(),
            })
        }
    }

    struct FixedService(Vec<f64>, String);

    impl SuggestionService for FixedService {
        async fn suggest_scene_boundaries(&self, _: &VideoSource) -> std::result::Result<Vec<f64>, SuggestionError> {
            Ok(self.0.clone())
        }

        async fn suggest_captions(&self, _: &AudioBuffer) -> std::result::Result<String, SuggestionError> {
            Ok(self.1.clone())
        }
    }

    fn source(handle: Arc<dyn MediaSource>) -> VideoSource {
        VideoSource::from_handle(handle).unwrap()
    }

    #[tokio::test]
    async fn test_failures_fall_back_to_defaults() {
        let video = source(Arc::new(SyntheticSource::new("cam", 5.0, 8, 8)));
        let audio = AudioBuffer::silence(8_000, 1, 800);

        assert!(scene_boundaries_with_fallback(&FailingService, &video).await.is_empty());
        assert_eq!(captions_with_fallback(&FailingService, &audio).await, PLACEHOLDER_CAPTION);
    }

    #[tokio::test]
    async fn test_service_results_are_sanitized() {
        let video = source(Arc::new(SyntheticSource::new("cam", 5.0, 8, 8)));
        let service = FixedService(vec![4.0, -1.0, 2.0, 9.0, 2.0, f64::NAN], "  hello  ".to_string());

        assert_eq!(scene_boundaries_with_fallback(&service, &video).await, vec![2.0, 4.0]);
        let audio = AudioBuffer::silence(8_000, 1, 800);
        assert_eq!(captions_with_fallback(&service, &audio).await, "hello");

        let blank = FixedService(Vec::new(), "   ".to_string());
        assert_eq!(captions_with_fallback(&blank, &audio).await, PLACEHOLDER_CAPTION);
    }

    #[tokio::test]
    async fn test_luma_detector_finds_hard_cut() {
        let video = source(Arc::new(HardCutSource {
            cut_at: 2.0,
            duration: 5.0,
        }));
        let boundaries = LumaSceneDetector::default().suggest_scene_boundaries(&video).await.unwrap();
        assert_eq!(boundaries, vec![2.0]);
    }

    #[tokio::test]
    async fn test_local_captions_fall_back() {
        let audio = AudioBuffer::silence(8_000, 1, 800);
        assert_eq!(
            captions_with_fallback(&LumaSceneDetector::default(), &audio).await,
            PLACEHOLDER_CAPTION
        );
    }

    #[test]
    fn test_split_at_boundaries() {
        let cut = Cut::new(1, 0.0, 10.0).unwrap();
        let pieces = split_at_boundaries(cut, &[2.0, 2.1, 7.0, 12.0], 0.5).unwrap();
        let ranges: Vec<(f64, f64)> = pieces.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(ranges, vec![(0.0, 2.0), (2.1, 7.0), (7.0, 10.0)]);
        assert!(pieces.iter().all(|c| c.source_index == 1));
    }

    #[tokio::test]
    async fn test_suggested_cuts_without_service_is_whole_source() {
        let sources = vec![source(Arc::new(SyntheticSource::new("cam", 5.0, 8, 8)))];
        let cuts = suggested_cuts(&FailingService, &sources, 0, 0.5).await.unwrap();
        assert_eq!(cuts, vec![Cut::new(0, 0.0, 5.0).unwrap()]);
        assert!(suggested_cuts(&FailingService, &sources, 3, 0.5).await.is_err());
    }
}
