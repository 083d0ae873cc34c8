use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::{
    audio::AudioBuffer,
    error::{ExportError, Result},
    export::{
        encoder::{EncodeParams, EncodedOutput, MediaEncoder},
        settings::ExportFormat,
    },
    video::types::Frame,
};

/// Encoder backed by the ffmpeg command line tool.
///
/// Encoding happens in two phases. Raw RGB frames are streamed to an ffmpeg
/// process that writes a video-only file while PCM is spooled to a scratch
/// file. `finish` then muxes both with `-c:v copy`, so the video is never
/// encoded twice. All scratch files live in a temp dir removed on drop.
#[derive(Debug)]
pub struct FfmpegEncoder {
    ffmpeg: String,
    session: Option<EncodeSession>,
}

#[derive(Debug)]
struct EncodeSession {
    params: EncodeParams,
    dir: TempDir,
    video_path: PathBuf,
    video_log: PathBuf,
    child: Child,
    stdin: Option<ChildStdin>,
    audio_path: PathBuf,
    audio: BufWriter<File>,
    frames: u64,
    audio_samples: usize,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            session: None,
        }
    }

    /// Whether the configured ffmpeg binary can be executed
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn session_mut(&mut self) -> Result<&mut EncodeSession> {
        self.session.as_mut().ok_or_else(|| {
            ExportError::SubmissionFailed {
                reason: "encoder used before begin".to_string(),
            }
            .into()
        })
    }

    fn video_args(params: &EncodeParams, output: &Path) -> Vec<String> {
        let format = params.settings.format;
        let bitrate = format!("{}k", params.settings.video_bitrate_kbps());

        let mut args: Vec<String> = [
            "-hide_banner", "-loglevel", "error", "-y",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.extend([
            "-s".to_string(),
            format!("{}x{}", params.canvas.width, params.canvas.height),
            "-r".to_string(),
            params.fps().to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-an".to_string(),
            "-c:v".to_string(),
            format.video_codec().to_string(),
            "-b:v".to_string(),
            bitrate,
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ]);

        if format == ExportFormat::WebM {
            args.extend(["-deadline", "good", "-cpu-used", "4", "-row-mt", "1"].map(String::from));
        }

        args.push(output.display().to_string());
        args
    }

    fn mux_args(params: &EncodeParams, video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        let format = params.settings.format;
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            video.display().to_string(),
            "-f".into(),
            "f32le".into(),
            "-ar".into(),
            params.audio_sample_rate.to_string(),
            "-ac".into(),
            params.audio_channels.to_string(),
            "-i".into(),
            audio.display().to_string(),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            format.audio_codec().into(),
            "-b:a".into(),
            format!("{}k", params.settings.audio_bitrate_kbps()),
        ];

        if format == ExportFormat::Mp4 {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.push(output.display().to_string());
        args
    }

    fn log_tail(path: &Path) -> String {
        let log = std::fs::read_to_string(path).unwrap_or_default();
        let lines: Vec<&str> = log.lines().rev().take(5).collect();
        lines.into_iter().rev().collect::<Vec<_>>().join(" | ")
    }
}

impl MediaEncoder for FfmpegEncoder {
    fn begin(&mut self, params: &EncodeParams) -> Result<()> {
        let init_failed = |reason: String| ExportError::EncoderInitFailure { reason };

        if self.session.is_some() {
            return Err(init_failed("encoder already started".to_string()).into());
        }

        let dir = tempfile::Builder::new()
            .prefix("reel-composer-")
            .tempdir()
            .map_err(|e| init_failed(format!("cannot create scratch dir: {e}")))?;

        let ext = params.settings.format.extension();
        let video_path = dir.path().join(format!("video.{ext}"));
        let video_log = dir.path().join("video.log");
        let audio_path = dir.path().join("audio.f32le");

        let log = File::create(&video_log).map_err(|e| init_failed(format!("cannot create log: {e}")))?;
        let audio = File::create(&audio_path)
            .map(BufWriter::new)
            .map_err(|e| init_failed(format!("cannot create audio spool: {e}")))?;

        let args = Self::video_args(params, &video_path);
        debug!("ffmpeg {}", args.join(" "));

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|e| init_failed(format!("failed to spawn {}: {e}", self.ffmpeg)))?;

        let stdin = child.stdin.take();
        if stdin.is_none() {
            let _ = child.kill();
            return Err(init_failed("ffmpeg stdin unavailable".to_string()).into());
        }

        info!(
            "Encoding {}x{} @ {}fps as {} ({} kbps video)",
            params.canvas.width,
            params.canvas.height,
            params.fps(),
            params.settings.format,
            params.settings.video_bitrate_kbps()
        );

        self.session = Some(EncodeSession {
            params: *params,
            dir,
            video_path,
            video_log,
            child,
            stdin,
            audio_path,
            audio,
            frames: 0,
            audio_samples: 0,
        });
        Ok(())
    }

    fn push_video(&mut self, frames: &[Frame]) -> Result<()> {
        let session = self.session_mut()?;
        let canvas = session.params.canvas;

        let Some(stdin) = session.stdin.as_mut() else {
            return Err(ExportError::SubmissionFailed {
                reason: "video stream already closed".to_string(),
            }
            .into());
        };

        for frame in frames {
            if frame.dimensions() != (canvas.width, canvas.height) {
                return Err(ExportError::SubmissionFailed {
                    reason: format!(
                        "frame is {}x{}, canvas is {}x{}",
                        frame.width(),
                        frame.height(),
                        canvas.width,
                        canvas.height
                    ),
                }
                .into());
            }

            if let Err(e) = stdin.write_all(frame.as_rgb_bytes()) {
                return Err(ExportError::SubmissionFailed {
                    reason: format!("ffmpeg rejected frame: {e}; {}", Self::log_tail(&session.video_log)),
                }
                .into());
            }
        }

        session.frames += frames.len() as u64;
        Ok(())
    }

    fn push_audio(&mut self, audio: &AudioBuffer) -> Result<()> {
        let session = self.session_mut()?;
        let params = session.params;

        if audio.sample_rate != params.audio_sample_rate || audio.channel_count() != params.audio_channels {
            return Err(ExportError::SubmissionFailed {
                reason: format!(
                    "audio layout {} Hz x{} does not match {} Hz x{}",
                    audio.sample_rate,
                    audio.channel_count(),
                    params.audio_sample_rate,
                    params.audio_channels
                ),
            }
            .into());
        }

        session
            .audio
            .write_all(&audio.to_f32le_bytes())
            .map_err(|e| ExportError::SubmissionFailed {
                reason: format!("cannot spool audio: {e}"),
            })?;
        session.audio_samples += audio.len();
        Ok(())
    }

    fn finish(&mut self) -> Result<EncodedOutput> {
        let mut session = self.session.take().ok_or_else(|| ExportError::MuxFinalizeFailure {
            reason: "encoder finished before begin".to_string(),
        })?;
        let finalize_failed = |reason: String| ExportError::MuxFinalizeFailure { reason };

        // closing stdin ends the video stream
        drop(session.stdin.take());
        let status = session
            .child
            .wait()
            .map_err(|e| finalize_failed(format!("ffmpeg did not exit: {e}")))?;
        if !status.success() {
            return Err(finalize_failed(format!(
                "video encode failed ({status}): {}",
                Self::log_tail(&session.video_log)
            ))
            .into());
        }

        session
            .audio
            .flush()
            .map_err(|e| finalize_failed(format!("cannot flush audio spool: {e}")))?;

        let params = session.params;
        let output_path = if session.audio_samples > 0 {
            let output = session
                .dir
                .path()
                .join(format!("output.{}", params.settings.format.extension()));
            let args = Self::mux_args(&params, &session.video_path, &session.audio_path, &output);
            debug!("ffmpeg {}", args.join(" "));

            let mux = Command::new(&self.ffmpeg)
                .args(&args)
                .stdin(Stdio::null())
                .output()
                .map_err(|e| finalize_failed(format!("failed to run mux: {e}")))?;

            if !mux.status.success() {
                return Err(finalize_failed(format!(
                    "mux failed: {}",
                    String::from_utf8_lossy(&mux.stderr).trim()
                ))
                .into());
            }
            output
        } else {
            warn!("No audio submitted; exporting video-only container");
            session.video_path.clone()
        };

        let bytes = std::fs::read(&output_path)
            .map_err(|e| finalize_failed(format!("cannot read {}: {e}", output_path.display())))?;

        info!(
            "Muxed {} frames and {} audio samples into {} bytes",
            session.frames,
            session.audio_samples,
            bytes.len()
        );

        Ok(EncodedOutput {
            bytes,
            video_frames: session.frames,
            audio_samples: session.audio_samples,
        })
    }

    fn abort(&mut self) {
        if let Some(mut session) = self.session.take() {
            drop(session.stdin.take());
            let _ = session.child.kill();
            let _ = session.child.wait();
            debug!("Encoder aborted; discarded {} frames", session.frames);
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.abort();
    }
}
