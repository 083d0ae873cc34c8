use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Mutex;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    audio::AudioBuffer,
    config::ExportConfig,
    error::{AudioError, Result, VideoError},
    video::{
        source::{AudioStreamInfo, MediaSource, SourceMetadata},
        types::Frame,
    },
};

/// Largest forward jump served by reading through the open decoder before
/// restarting it with a fresh seek (seconds).
const MAX_SEQUENTIAL_SKIP: f64 = 2.0;

/// A source file decoded through the external `ffmpeg`/`ffprobe` tools.
///
/// Frames are streamed as raw RGB from one long-lived ffmpeg process, so the
/// monotonically increasing requests made by the export pipeline decode each
/// frame once. Backward or far-forward requests restart the process at the
/// requested position.
#[derive(Debug)]
pub struct FfmpegSource {
    path: PathBuf,
    name: String,
    metadata: SourceMetadata,
    ffmpeg: String,
    stream: Mutex<Option<FrameStream>>,
}

#[derive(Debug)]
struct FrameStream {
    child: Child,
    stdout: ChildStdout,
    start: f64,
    next_index: u64,
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl FfmpegSource {
    /// Probe `path` with ffprobe and return a ready source.
    pub async fn open<P: AsRef<Path>>(path: P, config: &ExportConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VideoError::LoadFailed {
                path: path.display().to_string(),
            }
            .into());
        }

        let output = tokio::process::Command::new(&config.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .output()
            .await
            .map_err(|e| VideoError::ProbeFailed {
                path: path.display().to_string(),
                reason: format!("failed to run {}: {}", config.ffprobe_path, e),
            })?;

        if !output.status.success() {
            return Err(VideoError::ProbeFailed {
                path: path.display().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let json = String::from_utf8_lossy(&output.stdout);
        let metadata = parse_probe_output(&json, path)?;

        info!(
            "Opened {}: {}x{} @ {:.2}fps, {:.2}s, audio: {}",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.duration,
            metadata.audio.is_some()
        );

        Ok(Self {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("source")
                .to_string(),
            metadata,
            ffmpeg: config.ffmpeg_path.clone(),
            stream: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn spawn_stream(&self, start: f64) -> Result<FrameStream> {
        debug!("Starting frame stream for {} at {:.3}s", self.name, start);

        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-ss", &format!("{start:.6}"), "-i"])
            .arg(&self.path)
            .args([
                "-an",
                "-vf",
                &format!("fps={}", self.metadata.fps),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VideoError::DecodeFailure {
                time: start,
                reason: format!("failed to spawn ffmpeg: {e}"),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| VideoError::DecodeFailure {
            time: start,
            reason: "ffmpeg stdout unavailable".to_string(),
        })?;

        Ok(FrameStream {
            child,
            stdout,
            start,
            next_index: 0,
        })
    }

    fn read_frame(&self, stream: &mut FrameStream, time: f64) -> Result<Frame> {
        let (width, height) = (self.metadata.width, self.metadata.height);
        let mut data = vec![0u8; width as usize * height as usize * 3];
        stream
            .stdout
            .read_exact(&mut data)
            .map_err(|e| VideoError::DecodeFailure {
                time,
                reason: format!("frame stream ended: {e}"),
            })?;
        stream.next_index += 1;

        Frame::from_rgb_bytes(width, height, data).ok_or_else(|| {
            VideoError::DecodeFailure {
                time,
                reason: "frame buffer size mismatch".to_string(),
            }
            .into()
        })
    }
}

impl MediaSource for FfmpegSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> Option<SourceMetadata> {
        Some(self.metadata)
    }

    fn frame_at(&self, time: f64) -> Result<Frame> {
        if time < 0.0 || time > self.metadata.duration {
            return Err(VideoError::DecodeFailure {
                time,
                reason: format!("outside source duration {:.3}s", self.metadata.duration),
            }
            .into());
        }

        let mut guard = self.stream.lock().map_err(|_| VideoError::FrameProcessingFailed {
            reason: format!("frame stream lock poisoned for {}", self.name),
        })?;

        let fps = self.metadata.fps;
        let reusable = guard.as_ref().and_then(|stream| {
            let index = ((time - stream.start) * fps).round();
            let ahead = index - stream.next_index as f64;
            (index >= 0.0 && ahead >= 0.0 && ahead <= MAX_SEQUENTIAL_SKIP * fps)
                .then_some(index as u64)
        });

        let target = match reusable {
            Some(index) => index,
            None => {
                *guard = Some(self.spawn_stream(time)?);
                0
            }
        };

        let Some(stream) = guard.as_mut() else {
            return Err(VideoError::DecodeFailure {
                time,
                reason: "frame stream unavailable".to_string(),
            }
            .into());
        };

        while stream.next_index < target {
            if let Err(e) = self.read_frame(stream, time) {
                *guard = None;
                return Err(e);
            }
        }

        match self.read_frame(stream, time) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                warn!("Decode failed for {} at {:.3}s: {}", self.name, time, e);
                *guard = None;
                Err(e)
            }
        }
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

        let output = Command::new(&self.ffmpeg)
            .args([
                "-v",
                "error",
                "-ss",
                &format!("{start:.6}"),
                "-t",
                &format!("{:.6}", end - start),
                "-i",
            ])
            .arg(&self.path)
            .args([
                "-vn",
                "-f",
                "f32le",
                "-ac",
                &channels.to_string(),
                "-ar",
                &sample_rate.to_string(),
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| AudioError::ExtractionFailed {
                reason: format!("failed to run ffmpeg: {e}"),
            })?;

        if !output.status.success() {
            return Err(AudioError::ExtractionFailed {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let samples: Vec<f32> = output
            .stdout
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Some(
            AudioBuffer::from_interleaved(sample_rate, channels, &samples)
                .unwrap_or_else(|| AudioBuffer::empty(sample_rate, channels)),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Turn `ffprobe -print_format json -show_streams -show_format` output into metadata
pub(crate) fn parse_probe_output(json: &str, path: &Path) -> Result<SourceMetadata> {
    let probe_failed = |reason: &str| VideoError::ProbeFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| probe_failed(&format!("invalid ffprobe json: {e}")))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| probe_failed("no video stream"))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(probe_failed("video dimensions missing").into()),
    };

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .ok_or_else(|| probe_failed("duration missing"))?;

    let audio = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .and_then(|s| {
            let sample_rate = s.sample_rate.as_deref()?.parse().ok()?;
            Some(AudioStreamInfo {
                sample_rate,
                channels: s.channels.unwrap_or(2),
            })
        });

    Ok(SourceMetadata {
        duration,
        width,
        height,
        fps,
        audio,
    })
}

/// Parse ffprobe rates such as `30000/1001` or `25`
fn parse_frame_rate(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "width": 1920, "height": 1080,
             "avg_frame_rate": "30000/1001", "r_frame_rate": "30000/1001", "duration": "12.012000"},
            {"codec_type": "audio", "sample_rate": "48000", "channels": 2}
        ],
        "format": {"duration": "12.034000"}
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let metadata = parse_probe_output(PROBE_JSON, Path::new("cam.mp4")).unwrap();
        assert_eq!((metadata.width, metadata.height), (1920, 1080));
        assert!((metadata.fps - 29.97).abs() < 0.01);
        assert_eq!(metadata.duration, 12.034);
        assert_eq!(
            metadata.audio,
            Some(AudioStreamInfo {
                sample_rate: 48_000,
                channels: 2
            })
        );
    }

    #[test]
    fn test_probe_without_video_is_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio", "sample_rate": "44100"}]}"#;
        assert!(parse_probe_output(json, Path::new("song.mp3")).is_err());
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("60/1"), Some(60.0));
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = FfmpegSource::open("/definitely/not/here.mp4", &ExportConfig::default()).await;
        assert!(matches!(
            result,
            Err(crate::error::CompositorError::Video(VideoError::LoadFailed { .. }))
        ));
    }
}
