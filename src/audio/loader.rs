use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::audio::types::{AudioBuffer, AudioFormat};
use crate::error::{AudioError, Result};

/// A decoded audio file
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    pub buffer: AudioBuffer,
    pub format: AudioFormat,
    pub path: PathBuf,
}

impl LoadedAudio {
    pub fn duration(&self) -> f64 {
        self.buffer.duration()
    }
}

/// Audio file loader supporting multiple formats
pub struct AudioLoader;

impl AudioLoader {
    /// Load an audio file into a planar buffer
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<LoadedAudio> {
        let path = path.as_ref().to_path_buf();
        let extension = Self::detect_format(&path).unwrap_or_default();

        if !Self::is_format_supported(&extension) {
            return Err(AudioError::UnsupportedFormat { format: extension }.into());
        }

        let loaded = tokio::task::spawn_blocking(move || match extension.as_str() {
            "wav" => Self::load_wav(&path),
            _ => Self::load_with_symphonia(&path),
        })
        .await
        .map_err(|e| AudioError::ExtractionFailed {
            reason: format!("decoder task failed: {e}"),
        })??;

        debug!(
            "Loaded {}: {:.2}s, {} Hz, {} channels",
            loaded.path.display(),
            loaded.duration(),
            loaded.buffer.sample_rate,
            loaded.buffer.channel_count()
        );
        Ok(loaded)
    }

    /// Load WAV files using the hound crate
    fn load_wav(path: &Path) -> Result<LoadedAudio> {
        let load_failed = || AudioError::LoadFailed {
            path: path.display().to_string(),
        };

        let reader = hound::WavReader::open(path).map_err(|_| load_failed())?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| load_failed())?,
            hound::SampleFormat::Int => {
                let bit_depth = spec.bits_per_sample;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|sample| Self::int_to_float(sample, bit_depth)))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| load_failed())?
            }
        };

        let buffer = AudioBuffer::from_interleaved(spec.sample_rate, spec.channels, &samples)
            .ok_or_else(|| AudioError::InvalidParameters {
                details: format!("{} channels at {} Hz", spec.channels, spec.sample_rate),
            })?;

        Ok(LoadedAudio {
            buffer,
            format: AudioFormat {
                extension: "wav".to_string(),
                bit_depth: Some(spec.bits_per_sample),
                compression: None,
            },
            path: path.to_path_buf(),
        })
    }

    /// Load compressed formats using Symphonia
    fn load_with_symphonia(path: &Path) -> Result<LoadedAudio> {
        let load_failed = || AudioError::LoadFailed {
            path: path.display().to_string(),
        };

        let file = File::open(path).map_err(|_| load_failed())?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|_| load_failed())?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(load_failed)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params.sample_rate.ok_or_else(|| AudioError::InvalidParameters {
            details: "No sample rate found".to_string(),
        })?;
        let channels = codec_params
            .channels
            .ok_or_else(|| AudioError::InvalidParameters {
                details: "No channel information found".to_string(),
            })?
            .count() as u16;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|_| load_failed())?;

        let mut interleaved = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let buf = sample_buf.get_or_insert_with(|| {
                        SampleBuffer::new(decoded.capacity() as u64, *decoded.spec())
                    });
                    if buf.capacity() < decoded.capacity() * channels as usize {
                        *buf = SampleBuffer::new(decoded.capacity() as u64, *decoded.spec());
                    }
                    buf.copy_interleaved_ref(decoded);
                    interleaved.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable packet in {}: {}", path.display(), e);
                    continue;
                }
                Err(_) => break,
            }
        }

        let buffer = AudioBuffer::from_interleaved(sample_rate, channels, &interleaved)
            .ok_or_else(|| AudioError::InvalidParameters {
                details: format!("{channels} channels at {sample_rate} Hz"),
            })?;

        Ok(LoadedAudio {
            buffer,
            format: AudioFormat {
                extension: Self::detect_format(path).unwrap_or_else(|| "unknown".to_string()),
                bit_depth: codec_params.bits_per_sample.map(|b| b as u16),
                compression: Some(format!("{:?}", codec_params.codec)),
            },
            path: path.to_path_buf(),
        })
    }

    /// Convert integer sample to float (-1.0 to 1.0)
    fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
        match bit_depth {
            8 => (sample as f32 - 128.0) / 128.0,
            16 => sample as f32 / 32768.0,
            24 => sample as f32 / 8388608.0,
            32 => sample as f32 / 2147483648.0,
            _ => sample as f32 / 32768.0,
        }
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_format_support() {
        assert!(AudioLoader::is_format_supported("wav"));
        assert!(AudioLoader::is_format_supported("FLAC"));
        assert!(!AudioLoader::is_format_supported("mp4"));
        assert_eq!(AudioLoader::detect_format("track.MP3"), Some("mp3".to_string()));
        assert_eq!(AudioLoader::detect_format("track"), None);
    }

    #[test]
    fn test_int_to_float_conversion() {
        assert_eq!(AudioLoader::int_to_float(0, 16), 0.0);
        assert_eq!(AudioLoader::int_to_float(-32768, 16), -1.0);
        assert_eq!(AudioLoader::int_to_float(128, 8), 0.0);
    }

    #[tokio::test]
    async fn test_load_wav_is_planar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overlay.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..4_000 {
            writer.write_sample(16_384i16).unwrap();
            writer.write_sample(-16_384i16).unwrap();
        }
        writer.finalize().unwrap();

        let loaded = AudioLoader::load(&path).await.unwrap();
        assert_eq!(loaded.buffer.sample_rate, 8_000);
        assert_eq!(loaded.buffer.channel_count(), 2);
        assert_eq!(loaded.buffer.len(), 4_000);
        assert!((loaded.duration() - 0.5).abs() < 1e-9);
        assert_eq!(loaded.buffer.channel(0).unwrap()[10], 0.5);
        assert_eq!(loaded.buffer.channel(1).unwrap()[10], -0.5);
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.xyz");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"dummy content").unwrap();

        match AudioLoader::load(&file_path).await {
            Err(crate::error::CompositorError::Audio(AudioError::UnsupportedFormat { format })) => {
                assert_eq!(format, "xyz");
            }
            other => panic!("Expected UnsupportedFormat error, got {other:?}"),
        }
    }
}
