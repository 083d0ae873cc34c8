use tracing::warn;

use crate::{
    audio::types::{frames_for, AudioBuffer},
    config::AudioConfig,
    video::source::MediaSource,
};

/// Produces the audio that accompanies a composed clip.
///
/// `sample_rate` and `channels` are the layout used when no overlay track
/// dictates one; source audio is always converted to this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioMixer {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioMixer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.default_sample_rate, config.default_channels)
    }

    /// One continuous track exactly `total_duration` seconds long.
    ///
    /// The overlay is copied verbatim up to the shorter of the two lengths; the
    /// remainder is silence. The overlay is never looped or resampled. Without
    /// an overlay the result is silence in the mixer's default layout.
    pub fn render_continuous_track(&self, overlay: Option<&AudioBuffer>, total_duration: f64) -> AudioBuffer {
        match overlay {
            Some(overlay) => {
                let total = overlay.frames_for(total_duration);
                let mut track = overlay.slice(0, total);
                track.fit_to_len(total);
                track
            }
            None => AudioBuffer::silence(
                self.sample_rate,
                self.channels,
                frames_for(self.sample_rate, total_duration),
            ),
        }
    }

    /// Source audio for `start..start + duration`.
    ///
    /// Returns `None` when the source has no audio stream. Requests past the
    /// end of the source yield an empty or partial buffer; decode problems are
    /// logged and also yield an empty buffer.
    pub fn extract_chunk(&self, source: &dyn MediaSource, start: f64, duration: f64) -> Option<AudioBuffer> {
        if let Some(metadata) = source.metadata() {
            if metadata.audio.is_none() {
                return None;
            }
            if start >= metadata.duration || duration <= 0.0 {
                return Some(AudioBuffer::empty(self.sample_rate, self.channels));
            }
        }

        match source.audio_range(start, duration.max(0.0), self.sample_rate, self.channels) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(
                    "Audio extraction from {} at {:.3}s failed: {}",
                    source.name(),
                    start,
                    e
                );
                Some(AudioBuffer::empty(self.sample_rate, self.channels))
            }
        }
    }

    /// Source audio for one cut, padded with silence or trimmed so it lasts
    /// exactly `duration` seconds. Sources without audio give silence.
    pub fn cut_audio(&self, source: &dyn MediaSource, start: f64, duration: f64) -> AudioBuffer {
        let frames = frames_for(self.sample_rate, duration);
        let mut chunk = self
            .extract_chunk(source, start, duration)
            .filter(|c| c.sample_rate == self.sample_rate && c.channel_count() == self.channels)
            .unwrap_or_else(|| AudioBuffer::empty(self.sample_rate, self.channels));
        chunk.fit_to_len(frames);
        chunk
    }
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::synthetic::SyntheticSource;

    fn ramp(sample_rate: u32, frames: usize) -> AudioBuffer {
        let left: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        AudioBuffer::from_planar(sample_rate, vec![left, right]).unwrap()
    }

    #[test]
    fn test_overlay_shorter_than_total_is_padded() {
        let mixer = AudioMixer::default();
        let overlay = ramp(1_000, 2_000);
        let track = mixer.render_continuous_track(Some(&overlay), 3.5);

        assert_eq!(track.sample_rate, 1_000);
        assert_eq!(track.len(), 3_500);
        assert_eq!(&track.channel(0).unwrap()[..2_000], overlay.channel(0).unwrap());
        assert_eq!(&track.channel(1).unwrap()[..2_000], overlay.channel(1).unwrap());
        assert!(track.channel(0).unwrap()[2_000..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_overlay_longer_than_total_is_truncated() {
        let mixer = AudioMixer::default();
        let overlay = ramp(1_000, 5_000);
        let track = mixer.render_continuous_track(Some(&overlay), 2.0);

        assert_eq!(track.len(), 2_000);
        assert_eq!(track.channel(0).unwrap(), &overlay.channel(0).unwrap()[..2_000]);
    }

    #[test]
    fn test_no_overlay_is_silence_at_default_rate() {
        let track = AudioMixer::default().render_continuous_track(None, 1.0);
        assert_eq!(track.sample_rate, 44_100);
        assert_eq!(track.len(), 44_100);
        assert!(track.channels().iter().flatten().all(|s| *s == 0.0));
    }

    #[test]
    fn test_extract_past_end_is_empty() {
        let mixer = AudioMixer::new(8_000, 2);
        let source = SyntheticSource::new("cam", 4.0, 4, 4);

        let chunk = mixer.extract_chunk(&source, 4.0, 1.0).unwrap();
        assert!(chunk.is_empty());

        let partial = mixer.extract_chunk(&source, 3.5, 1.0).unwrap();
        assert_eq!(partial.len(), 4_000);

        let silent = SyntheticSource::new("mute", 4.0, 4, 4).without_audio();
        assert!(mixer.extract_chunk(&silent, 0.0, 1.0).is_none());
    }

    #[test]
    fn test_cut_audio_has_exact_length() {
        let mixer = AudioMixer::new(8_000, 2);
        let source = SyntheticSource::new("cam", 4.0, 4, 4);

        assert_eq!(mixer.cut_audio(&source, 3.0, 2.0).len(), 16_000);
        let silent = SyntheticSource::new("mute", 4.0, 4, 4).without_audio();
        assert_eq!(mixer.cut_audio(&silent, 0.0, 1.5).len(), 12_000);
    }
}
