use serde::{Deserialize, Serialize};

/// Planar PCM audio: one `Vec<f32>` per channel, all the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Samples per channel in the range -1.0..=1.0
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build a buffer from planar channel data.
    ///
    /// Returns `None` when there are no channels or the channels differ in length.
    pub fn from_planar(sample_rate: u32, channels: Vec<Vec<f32>>) -> Option<Self> {
        let len = channels.first()?.len();
        if sample_rate == 0 || channels.iter().any(|c| c.len() != len) {
            return None;
        }
        Some(Self { sample_rate, channels })
    }

    /// Build a buffer from interleaved samples (`L R L R ...`).
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(sample_rate: u32, channel_count: u16, samples: &[f32]) -> Option<Self> {
        let count = channel_count as usize;
        if count == 0 {
            return None;
        }

        let frames = samples.len() / count;
        let mut channels = vec![Vec::with_capacity(frames); count];
        for frame in samples.chunks_exact(count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::from_planar(sample_rate, channels)
    }

    /// A zero-filled buffer of `frames` samples per channel
    pub fn silence(sample_rate: u32, channel_count: u16, frames: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; frames]; channel_count.max(1) as usize],
        }
    }

    /// A zero-length buffer with the given layout
    pub fn empty(sample_rate: u32, channel_count: u16) -> Self {
        Self::silence(sample_rate, channel_count, 0)
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Number of samples covering `seconds` at this buffer's rate
    pub fn frames_for(&self, seconds: f64) -> usize {
        frames_for(self.sample_rate, seconds)
    }

    /// Append another buffer with the same layout.
    ///
    /// Returns `false` (leaving `self` unchanged) when the layouts differ.
    pub fn append(&mut self, other: &AudioBuffer) -> bool {
        if other.sample_rate != self.sample_rate || other.channel_count() != self.channel_count() {
            return false;
        }
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            dst.extend_from_slice(src);
        }
        true
    }

    /// Truncate or zero-pad every channel to exactly `frames` samples
    pub fn fit_to_len(&mut self, frames: usize) {
        for channel in &mut self.channels {
            channel.resize(frames, 0.0);
        }
    }

    /// Copy of the samples in `start..start + frames`, clipped to the buffer
    pub fn slice(&self, start: usize, frames: usize) -> AudioBuffer {
        let start = start.min(self.len());
        let end = start.saturating_add(frames).min(self.len());
        AudioBuffer {
            sample_rate: self.sample_rate,
            channels: self.channels.iter().map(|c| c[start..end].to_vec()).collect(),
        }
    }

    /// Split into consecutive buffers of at most `frames_per_chunk` samples
    pub fn chunks(&self, frames_per_chunk: usize) -> impl Iterator<Item = AudioBuffer> + '_ {
        let step = frames_per_chunk.max(1);
        (0..self.len()).step_by(step).map(move |start| self.slice(start, step))
    }

    /// Interleaved copy (`L R L R ...`)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * self.channels.len());
        for i in 0..self.len() {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }

    /// Interleaved little-endian `f32le` bytes as consumed by ffmpeg
    pub fn to_f32le_bytes(&self) -> Vec<u8> {
        self.to_interleaved()
            .into_iter()
            .flat_map(f32::to_le_bytes)
            .collect()
    }
}

pub(crate) fn frames_for(sample_rate: u32, seconds: f64) -> usize {
    (seconds.max(0.0) * sample_rate as f64).round() as usize
}

/// Audio file format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    /// File extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Bit depth (16, 24, 32, etc.)
    pub bit_depth: Option<u16>,

    /// Compression type (if any)
    pub compression: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_conversion() {
        let buffer = AudioBuffer::from_interleaved(8_000, 2, &[0.1, -0.1, 0.2, -0.2, 0.3]).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.channel(0).unwrap(), &[0.1, 0.2]);
        assert_eq!(buffer.channel(1).unwrap(), &[-0.1, -0.2]);
        assert_eq!(buffer.to_interleaved(), vec![0.1, -0.1, 0.2, -0.2]);
    }

    #[test]
    fn test_mismatched_channels_rejected() {
        assert!(AudioBuffer::from_planar(44_100, vec![vec![0.0; 3], vec![0.0; 2]]).is_none());
        assert!(AudioBuffer::from_planar(44_100, vec![]).is_none());
    }

    #[test]
    fn test_chunks_cover_whole_buffer() {
        let buffer = AudioBuffer::silence(10, 1, 25);
        let lengths: Vec<usize> = buffer.chunks(10).map(|c| c.len()).collect();
        assert_eq!(lengths, vec![10, 10, 5]);
    }

    #[test]
    fn test_append_requires_same_layout() {
        let mut a = AudioBuffer::silence(48_000, 2, 4);
        assert!(!a.append(&AudioBuffer::silence(44_100, 2, 4)));
        assert!(a.append(&AudioBuffer::silence(48_000, 2, 4)));
        assert_eq!(a.len(), 8);
    }
}
