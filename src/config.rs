use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    export::ExportSettings,
    filters::NightVisionParams,
};

/// Main configuration for reel-composer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Export pipeline settings
    pub export: ExportConfig,

    /// Audio mixing settings
    pub audio: AudioConfig,

    /// Preview playback settings
    pub preview: PreviewConfig,

    /// Filter parameters
    pub filters: FilterConfig,

    /// Multi-cam composition settings
    pub composition: CompositionConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.export.validate()?;
        self.audio.validate()?;
        self.preview.validate()?;
        self.filters.validate()?;
        self.composition.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default user-facing settings (format, quality, frame rate)
    pub settings: ExportSettings,

    /// Frames submitted to the encoder per batch
    pub video_batch_frames: usize,

    /// Audio samples (per channel) submitted to the encoder per batch
    pub audio_batch_samples: usize,

    /// How long to wait for a source to report metadata (milliseconds)
    pub source_ready_timeout_ms: u64,

    /// Worker threads for per-frame pixel work
    pub processing_threads: usize,

    /// Path of the ffmpeg binary used for encoding and decoding
    pub ffmpeg_path: String,

    /// Path of the ffprobe binary used for probing sources
    pub ffprobe_path: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            settings: ExportSettings::default(),
            video_batch_frames: 32,
            audio_batch_samples: 44_100,
            source_ready_timeout_ms: 5_000,
            processing_threads: num_cpus::get(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<()> {
        if self.video_batch_frames == 0 {
            return Err(invalid("export.video_batch_frames", self.video_batch_frames).into());
        }

        if self.audio_batch_samples == 0 {
            return Err(invalid("export.audio_batch_samples", self.audio_batch_samples).into());
        }

        if self.processing_threads == 0 {
            return Err(invalid("export.processing_threads", self.processing_threads).into());
        }

        Ok(())
    }
}

/// Audio mixing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate used when no overlay track dictates one (Hz)
    pub default_sample_rate: u32,

    /// Channel count used when no overlay track dictates one
    pub default_channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            default_sample_rate: crate::audio::DEFAULT_SAMPLE_RATE,
            default_channels: 2,
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.default_sample_rate == 0 {
            return Err(invalid("audio.default_sample_rate", self.default_sample_rate).into());
        }

        if self.default_channels == 0 {
            return Err(invalid("audio.default_channels", self.default_channels).into());
        }

        Ok(())
    }
}

/// Preview playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Interval between progress ticks (milliseconds)
    pub tick_interval_ms: u64,

    /// Upper bound for any wait on a media handle (milliseconds)
    pub wait_timeout_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            wait_timeout_ms: 3_000,
        }
    }
}

impl PreviewConfig {
    fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(invalid("preview.tick_interval_ms", self.tick_interval_ms).into());
        }

        if self.wait_timeout_ms < self.tick_interval_ms {
            return Err(invalid(
                "preview.wait_timeout_ms",
                format!("{} < tick interval {}", self.wait_timeout_ms, self.tick_interval_ms),
            )
            .into());
        }

        Ok(())
    }
}

/// Filter parameter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Night vision tint and intensity
    pub night_vision: NightVisionParams,

    /// Draw scanlines and grain on top of the VHS colour grade
    pub vhs_overlay: bool,
}

impl FilterConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.night_vision.intensity) {
            return Err(invalid("filters.night_vision.intensity", self.night_vision.intensity).into());
        }

        Ok(())
    }
}

/// Multi-cam composition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Default length of each generated cut (seconds)
    pub cut_duration: f64,

    /// Shortest cut the composer will emit at the end of a clip (seconds)
    pub min_tail_duration: f64,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            cut_duration: 3.0,
            min_tail_duration: 0.1,
        }
    }
}

impl CompositionConfig {
    fn validate(&self) -> Result<()> {
        if self.cut_duration <= 0.0 {
            return Err(invalid("composition.cut_duration", self.cut_duration).into());
        }

        if self.min_tail_duration < 0.0 || self.min_tail_duration >= self.cut_duration {
            return Err(invalid("composition.min_tail_duration", self.min_tail_duration).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{ExportFormat, FrameRate};
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.export.settings.format = ExportFormat::WebM;
        original_config.export.settings.frame_rate = FrameRate::Fps60;
        original_config.filters.night_vision.intensity = 40.0;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.export.settings, original_config.export.settings);
        assert_eq!(loaded_config.audio.default_sample_rate, 44_100);
        assert_eq!(loaded_config.filters.night_vision.intensity, 40.0);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[composition]\ncut_duration = 2.5\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.composition.cut_duration, 2.5);
        assert_eq!(config.preview.tick_interval_ms, 50);
    }

    #[test]
    fn test_invalid_night_vision_intensity() {
        let mut config = Config::default();
        config.filters.night_vision.intensity = 150.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_batch_size() {
        let mut config = Config::default();
        config.export.video_batch_frames = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = Config::from_file(dir.path().join("missing.toml"));
        assert!(matches!(
            result,
            Err(crate::error::CompositorError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
