use tracing::{debug, info};

use crate::{
    config::CompositionConfig,
    error::TimelineError,
    timeline::{Clip, Cut, VideoSource},
};

/// Cuts shorter than this are rounding noise, not a tail
const TAIL_EPSILON: f64 = 1e-9;

/// Builds a composite clip that switches between sources every `cut_duration`
/// seconds until `target_duration` is covered, typically the length of an
/// overlay track.
///
/// Sources are used round-robin and the same source never plays twice in a
/// row. Each source is read forward from where its previous cut ended,
/// wrapping to its start when the remaining footage is too short.
#[derive(Debug, Clone)]
pub struct MultiCamComposer {
    cut_duration: f64,
    min_tail_duration: f64,
}

impl MultiCamComposer {
    pub fn new(config: &CompositionConfig) -> Self {
        Self {
            cut_duration: config.cut_duration,
            min_tail_duration: config.min_tail_duration,
        }
    }

    pub fn with_cut_duration(mut self, cut_duration: f64) -> Self {
        self.cut_duration = cut_duration;
        self
    }

    pub fn cut_duration(&self) -> f64 {
        self.cut_duration
    }

    /// Lengths of the cuts covering `target_duration`: full cuts, then the
    /// remainder. A remainder shorter than `min_tail_duration` is folded into
    /// the previous cut instead.
    pub fn cut_lengths(&self, target_duration: f64) -> Result<Vec<f64>, TimelineError> {
        if !(target_duration.is_finite() && target_duration > 0.0) {
            return Err(TimelineError::InvalidTimeRange {
                start: 0.0,
                end: target_duration,
            });
        }
        if !(self.cut_duration.is_finite() && self.cut_duration > 0.0) {
            return Err(TimelineError::InvalidTimeRange {
                start: 0.0,
                end: self.cut_duration,
            });
        }

        let full = (target_duration / self.cut_duration + TAIL_EPSILON).floor() as usize;
        let mut lengths = vec![self.cut_duration; full];
        let remainder = target_duration - full as f64 * self.cut_duration;

        if remainder > TAIL_EPSILON {
            match lengths.last_mut() {
                Some(last) if remainder < self.min_tail_duration => *last += remainder,
                _ => lengths.push(remainder),
            }
        }
        Ok(lengths)
    }

    /// Generate the alternating clip.
    ///
    /// Fails with [`TimelineError::UnsupportedSource`], listing every source
    /// duration, when fewer than two sources can hold a full cut (or none can
    /// when a single cut suffices).
    pub fn compose(
        &self,
        title: impl Into<String>,
        sources: &[VideoSource],
        target_duration: f64,
    ) -> Result<Clip, TimelineError> {
        let lengths = self.cut_lengths(target_duration)?;
        let longest = lengths.iter().copied().fold(0.0, f64::max);

        let eligible: Vec<usize> = sources
            .iter()
            .enumerate()
            .filter(|(_, s)| s.duration() >= longest)
            .map(|(i, _)| i)
            .collect();

        let needed = if lengths.len() > 1 { 2 } else { 1 };
        if eligible.len() < needed {
            return Err(TimelineError::UnsupportedSource {
                required: longest,
                durations: sources.iter().map(VideoSource::duration).collect(),
            });
        }

        let mut cursors = vec![0.0_f64; sources.len()];
        let mut cuts = Vec::with_capacity(lengths.len());
        let mut previous: Option<usize> = None;
        let mut turn = 0;

        for length in lengths {
            let source_index = loop {
                let candidate = eligible[turn % eligible.len()];
                turn += 1;
                if Some(candidate) != previous {
                    break candidate;
                }
            };

            let duration = sources[source_index].duration();
            let mut start = cursors[source_index];
            if start + length > duration {
                start = 0.0;
            }
            let end = (start + length).min(duration);
            cursors[source_index] = end;

            debug!(
                "Multi-cam cut {}: source {} {:.3}s-{:.3}s",
                cuts.len(),
                source_index,
                start,
                end
            );
            cuts.push(Cut::new(source_index, start, end)?);
            previous = Some(source_index);
        }

        info!(
            "Multi-cam: {} cuts over {} sources covering {:.2}s",
            cuts.len(),
            eligible.len(),
            target_duration
        );
        Clip::composite(title, cuts)
    }
}

impl Default for MultiCamComposer {
    fn default() -> Self {
        Self::new(&CompositionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::video::{source::MediaSource, synthetic::SyntheticSource};

    fn sources(durations: &[f64]) -> Vec<VideoSource> {
        durations
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let handle: Arc<dyn MediaSource> = Arc::new(SyntheticSource::new(format!("cam-{i}"), d, 8, 8));
                VideoSource::from_handle(handle).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_alternates_and_covers_overlay() {
        let sources = sources(&[12.0, 9.0]);
        let composer = MultiCamComposer::default().with_cut_duration(3.0);
        let clip = composer.compose("multicam", &sources, 10.0).unwrap();

        let cuts = clip.cuts();
        assert_eq!(cuts.len(), 4);
        assert!((cuts[3].duration() - 1.0).abs() < 1e-9);
        assert!((clip.total_duration() - 10.0).abs() < 1e-9);
        assert!(cuts.windows(2).all(|w| w[0].source_index != w[1].source_index));
        assert!(clip.validate(&sources).is_ok());

        // each source reads forward
        assert_eq!((cuts[0].start, cuts[2].start), (0.0, 3.0));
        assert_eq!((cuts[1].start, cuts[3].start), (0.0, 3.0));
    }

    #[test]
    fn test_short_tail_is_folded() {
        let composer = MultiCamComposer::new(&CompositionConfig {
            cut_duration: 3.0,
            min_tail_duration: 0.5,
        });
        assert_eq!(composer.cut_lengths(9.2).unwrap().len(), 3);
        assert!((composer.cut_lengths(9.2).unwrap()[2] - 3.2).abs() < 1e-9);
        assert_eq!(composer.cut_lengths(9.0).unwrap(), vec![3.0, 3.0, 3.0]);
        assert_eq!(composer.cut_lengths(0.2).unwrap(), vec![0.2]);
    }

    #[test]
    fn test_rejects_short_sources_listing_durations() {
        let sources = sources(&[2.0, 12.0, 1.5]);
        let err = MultiCamComposer::default()
            .with_cut_duration(3.0)
            .compose("multicam", &sources, 10.0)
            .unwrap_err();

        match err {
            TimelineError::UnsupportedSource { required, durations } => {
                assert_eq!(required, 3.0);
                assert_eq!(durations, vec![2.0, 12.0, 1.5]);
            }
            other => panic!("Expected UnsupportedSource, got {other:?}"),
        }
    }

    #[test]
    fn test_skips_ineligible_sources() {
        let sources = sources(&[12.0, 1.0, 9.0]);
        let clip = MultiCamComposer::default()
            .with_cut_duration(3.0)
            .compose("multicam", &sources, 12.0)
            .unwrap();
        assert!(clip.cuts().iter().all(|c| c.source_index != 1));
        assert!(clip.validate(&sources).is_ok());
    }

    #[test]
    fn test_wraps_exhausted_source() {
        let sources = sources(&[4.0, 4.0]);
        let clip = MultiCamComposer::default()
            .with_cut_duration(3.0)
            .compose("multicam", &sources, 12.0)
            .unwrap();
        assert_eq!(clip.cuts().len(), 4);
        assert!(clip.cuts().iter().all(|c| c.start == 0.0));
    }

    #[test]
    fn test_invalid_target() {
        let sources = sources(&[12.0, 9.0]);
        assert!(MultiCamComposer::default().compose("x", &sources, 0.0).is_err());
        assert!(MultiCamComposer::default().compose("x", &sources, f64::NAN).is_err());
    }
}
