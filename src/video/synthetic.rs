//! Deterministic generated sources.
//!
//! Used for dry runs, the `filter_preview` binary and throughout the tests, so
//! the compositor, sequencer and export pipeline can be exercised without real
//! media files or an ffmpeg install.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    audio::{types::frames_for, AudioBuffer},
    error::{Result, VideoError},
    video::{
        source::{AudioStreamInfo, MediaSource, SourceMetadata},
        types::Frame,
    },
};

/// A colour-cycling test pattern with an optional sine tone
#[derive(Debug)]
pub struct SyntheticSource {
    name: String,
    metadata: SourceMetadata,
    base_hue: f32,
    tone_hz: f32,
    undecodable: Vec<(f64, f64)>,
    pending_polls: AtomicUsize,
    frames_decoded: AtomicUsize,
}

impl SyntheticSource {
    /// A 30 fps source with a stereo 44.1 kHz tone
    pub fn new(name: impl Into<String>, duration: f64, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            metadata: SourceMetadata {
                duration,
                width,
                height,
                fps: 30.0,
                audio: Some(AudioStreamInfo {
                    sample_rate: crate::audio::DEFAULT_SAMPLE_RATE,
                    channels: 2,
                }),
            },
            base_hue: 0.0,
            tone_hz: 440.0,
            undecodable: Vec::new(),
            pending_polls: AtomicUsize::new(0),
            frames_decoded: AtomicUsize::new(0),
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.metadata.fps = fps;
        self
    }

    /// Offset the pattern's hue so different sources are visually distinct
    pub fn with_base_hue(mut self, hue: f32) -> Self {
        self.base_hue = hue;
        self
    }

    pub fn with_tone(mut self, hz: f32) -> Self {
        self.tone_hz = hz;
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.metadata.audio = None;
        self
    }

    /// Frames in `start..end` fail to decode
    pub fn with_undecodable_range(mut self, start: f64, end: f64) -> Self {
        self.undecodable.push((start, end));
        self
    }

    /// Report no metadata for the first `polls` calls to [`MediaSource::metadata`]
    pub fn ready_after(self, polls: usize) -> Self {
        self.pending_polls.store(polls, Ordering::SeqCst);
        self
    }

    /// Number of frames successfully produced so far
    pub fn frames_decoded(&self) -> usize {
        self.frames_decoded.load(Ordering::SeqCst)
    }

    fn pattern(&self, time: f64) -> Frame {
        let width = self.metadata.width;
        let height = self.metadata.height;
        let mut frame = Frame::new_black(width, height);

        for y in 0..height {
            let value = 0.35 + 0.6 * (y as f32 / height.max(1) as f32);
            for x in 0..width {
                let hue = (self.base_hue
                    + time as f32 * 36.0
                    + x as f32 / width.max(1) as f32 * 120.0)
                    .rem_euclid(360.0);
                frame.set_pixel(x, y, hsv_to_rgb(hue, 0.75, value));
            }
        }

        frame
    }
}

impl MediaSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> Option<SourceMetadata> {
        let still_pending = self
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if still_pending {
            None
        } else {
            Some(self.metadata)
        }
    }

    fn frame_at(&self, time: f64) -> Result<Frame> {
        if !time.is_finite() || time < 0.0 || time > self.metadata.duration {
            return Err(VideoError::DecodeFailure {
                time,
                reason: format!("outside source duration {:.3}s", self.metadata.duration),
            }
            .into());
        }

        if self.undecodable.iter().any(|&(s, e)| time >= s && time < e) {
            return Err(VideoError::DecodeFailure {
                time,
                reason: "corrupt frame".to_string(),
            }
            .into());
        }

        self.frames_decoded.fetch_add(1, Ordering::SeqCst);
        Ok(self.pattern(time))
    }

    fn audio_range(
        &self,
        start: f64,
        duration: f64,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Option<AudioBuffer>> {
        if self.metadata.audio.is_none() {
            return Ok(None);
        }

        let end = (start + duration).min(self.metadata.duration);
        if start >= end {
            return Ok(Some(AudioBuffer::empty(sample_rate, channels)));
        }

        let frames = frames_for(sample_rate, end - start);
        let omega = 2.0 * std::f64::consts::PI * self.tone_hz as f64;
        let samples: Vec<f32> = (0..frames)
            .map(|i| {
                let t = start + i as f64 / sample_rate as f64;
                (0.5 * (omega * t).sin()) as f32
            })
            .collect();

        Ok(AudioBuffer::from_planar(
            sample_rate,
            vec![samples; channels.max(1) as usize],
        ))
    }
}

pub(crate) fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    [
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ]
}
