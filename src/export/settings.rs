use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// H.264 video, AAC audio
    #[default]
    Mp4,
    /// VP9 video, Opus audio
    WebM,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "mp4",
            ExportFormat::WebM => "webm",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "video/mp4",
            ExportFormat::WebM => "video/webm",
        }
    }

    pub fn video_codec(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "libx264",
            ExportFormat::WebM => "libvpx-vp9",
        }
    }

    pub fn audio_codec(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "aac",
            ExportFormat::WebM => "libopus",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(ExportFormat::Mp4),
            "webm" => Ok(ExportFormat::WebM),
            _ => Err(TimelineError::UnknownIdentifier {
                kind: "export format",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        })
    }
}

impl FromStr for Quality {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            _ => Err(TimelineError::UnknownIdentifier {
                kind: "quality",
                value: s.to_string(),
            }),
        }
    }
}

/// Output frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum FrameRate {
    Fps24,
    #[default]
    Fps30,
    Fps60,
}

impl FrameRate {
    pub fn fps(&self) -> u32 {
        match self {
            FrameRate::Fps24 => 24,
            FrameRate::Fps30 => 30,
            FrameRate::Fps60 => 60,
        }
    }

    /// Seconds between output frames
    pub fn interval(&self) -> f64 {
        1.0 / self.fps() as f64
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = TimelineError;

    fn try_from(fps: u32) -> Result<Self, Self::Error> {
        match fps {
            24 => Ok(FrameRate::Fps24),
            30 => Ok(FrameRate::Fps30),
            60 => Ok(FrameRate::Fps60),
            other => Err(TimelineError::UnknownIdentifier {
                kind: "frame rate",
                value: other.to_string(),
            }),
        }
    }
}

impl From<FrameRate> for u32 {
    fn from(rate: FrameRate) -> Self {
        rate.fps()
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fps())
    }
}

impl FromStr for FrameRate {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches("fps");
        let fps: u32 = trimmed.parse().map_err(|_| TimelineError::UnknownIdentifier {
            kind: "frame rate",
            value: s.to_string(),
        })?;
        Self::try_from(fps)
    }
}

/// User-facing export choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub format: ExportFormat,
    pub quality: Quality,
    pub frame_rate: FrameRate,
}

impl ExportSettings {
    /// Target video bitrate in kbps
    pub fn video_bitrate_kbps(&self) -> u32 {
        match (self.format, self.quality) {
            (ExportFormat::Mp4, Quality::Low) => 1_000,
            (ExportFormat::Mp4, Quality::Medium) => 2_500,
            (ExportFormat::Mp4, Quality::High) => 5_000,
            (ExportFormat::WebM, Quality::Low) => 800,
            (ExportFormat::WebM, Quality::Medium) => 2_000,
            (ExportFormat::WebM, Quality::High) => 4_000,
        }
    }

    /// Target audio bitrate in kbps
    pub fn audio_bitrate_kbps(&self) -> u32 {
        match self.quality {
            Quality::Low => 96,
            Quality::Medium => 128,
            Quality::High => 192,
        }
    }
}

impl fmt::Display for ExportSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ {}fps", self.format, self.quality, self.frame_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitrate_tiers() {
        let mut settings = ExportSettings::default();
        assert_eq!(settings.video_bitrate_kbps(), 2_500);
        assert_eq!(settings.audio_bitrate_kbps(), 128);

        settings.format = ExportFormat::WebM;
        settings.quality = Quality::High;
        assert_eq!(settings.video_bitrate_kbps(), 4_000);
        assert_eq!(settings.audio_bitrate_kbps(), 192);

        settings.quality = Quality::Low;
        assert_eq!(settings.video_bitrate_kbps(), 800);
    }

    #[test]
    fn test_frame_rate_parsing() {
        assert_eq!("60".parse::<FrameRate>().unwrap(), FrameRate::Fps60);
        assert_eq!("24fps".parse::<FrameRate>().unwrap(), FrameRate::Fps24);
        assert!("25".parse::<FrameRate>().is_err());
        assert!(serde_json::from_str::<FrameRate>("29").is_err());
        assert_eq!(serde_json::to_string(&FrameRate::Fps30).unwrap(), "30");
    }

    #[test]
    fn test_format_identifiers() {
        assert_eq!("WEBM".parse::<ExportFormat>().unwrap(), ExportFormat::WebM);
        assert_eq!(ExportFormat::Mp4.mime_type(), "video/mp4");
        assert_eq!(serde_json::to_string(&ExportFormat::WebM).unwrap(), r#""webm""#);
        assert!("avi".parse::<ExportFormat>().is_err());
    }
}
