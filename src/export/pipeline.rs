use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    audio::{AudioBuffer, AudioMixer},
    config::{Config, ExportConfig, FilterConfig},
    error::{CompositorError, ExportError, Result, TimelineError, VideoError},
    export::{
        encoder::{EncodeParams, ExportArtifact, MediaEncoder},
        progress::ProgressTracker,
        settings::ExportSettings,
    },
    filters::FilterTransform,
    playback::wait::wait_until,
    timeline::{Clip, VideoSource},
    video::{
        compositor::{canvas_size, FrameCompositor, RenderOutcome},
        types::{CanvasSize, Frame},
    },
};

/// Shared flag that asks a running export to stop
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(ExportError::Cancelled.into());
        }
        Ok(())
    }
}

/// One export request
#[derive(Debug, Clone, Copy)]
pub struct ExportJob<'a> {
    pub clip: &'a Clip,
    pub sources: &'a [VideoSource],
    /// Replacement audio; when present the sources' own audio is not used
    pub overlay: Option<&'a AudioBuffer>,
    pub settings: ExportSettings,
}

#[derive(Debug, Default)]
struct RunStats {
    frames: u64,
    dropped: u64,
}

/// Offline renderer that feeds a clip through the compositor into an encoder
#[derive(Debug)]
pub struct ExportPipeline {
    config: ExportConfig,
    filters: FilterConfig,
    mixer: AudioMixer,
    compositor: FrameCompositor,
}

impl ExportPipeline {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            config: config.export.clone(),
            filters: config.filters.clone(),
            mixer: AudioMixer::from_config(&config.audio),
            compositor: FrameCompositor::new(config.export.processing_threads)?,
        })
    }

    /// Output canvas for a clip: first cut's source frame size, framed to the
    /// clip's aspect ratio
    pub fn canvas_for(clip: &Clip, sources: &[VideoSource]) -> Result<CanvasSize> {
        let first = clip.cuts().first().ok_or(TimelineError::EmptyComposite)?;
        let source = sources.get(first.source_index).ok_or(TimelineError::InvalidSourceIndex {
            index: first.source_index,
            source_count: sources.len(),
        })?;
        Ok(canvas_size(source.metadata().frame_size(), clip.aspect_ratio))
    }

    /// Render `job` into `encoder` and return the finished artifact.
    ///
    /// Undecodable frames are skipped and counted. Any other failure aborts
    /// the encoder, discards its output and is returned as
    /// [`ExportError::ExportFailed`]; cancellation returns
    /// [`ExportError::Cancelled`].
    pub async fn export<F>(
        &self,
        job: ExportJob<'_>,
        mut encoder: Box<dyn MediaEncoder>,
        cancel: &CancelFlag,
        on_progress: F,
    ) -> Result<ExportArtifact>
    where
        F: FnMut(u8),
    {
        let clip = job.clip;
        let mut progress = ProgressTracker::new(clip.total_duration(), on_progress);
        progress.start();

        let params = match self.prepare(&job).await {
            Ok(params) => params,
            Err(e) => return Err(e.into_export_failure()),
        };

        info!(
            "Exporting {} ({} cuts, {:.2}s) as {} at {}x{}",
            clip.id(),
            clip.cuts().len(),
            clip.total_duration(),
            job.settings,
            params.canvas.width,
            params.canvas.height
        );

        if let Err(e) = encoder.begin(&params) {
            encoder.abort();
            return Err(e.into_export_failure());
        }

        let stats = match self.run(&job, &params, encoder.as_mut(), cancel, &mut progress).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Export of {} stopped: {}", clip.id(), e);
                encoder.abort();
                return Err(e.into_export_failure());
            }
        };

        if let Err(e) = cancel.check() {
            encoder.abort();
            return Err(e);
        }

        let finished = tokio::task::spawn_blocking(move || {
            let result = encoder.finish();
            if result.is_err() {
                encoder.abort();
            }
            result
        })
        .await;
        let output = match finished {
            Ok(result) => result,
            Err(e) => Err(ExportError::MuxFinalizeFailure {
                reason: format!("finalize task failed: {e}"),
            }
            .into()),
        }
        .map_err(CompositorError::into_export_failure)?;

        progress.complete();

        let fps = params.fps() as f64;
        let artifact = ExportArtifact {
            bytes: output.bytes,
            format: job.settings.format,
            mime_type: job.settings.format.mime_type(),
            settings: job.settings,
            width: params.canvas.width,
            height: params.canvas.height,
            duration: stats.frames as f64 / fps,
            frame_count: stats.frames,
            dropped_frames: stats.dropped,
            audio_samples: output.audio_samples,
            created_at: Utc::now(),
        };

        info!(
            "Export of {} complete: {} frames ({} dropped), {:.2}s, {} bytes",
            clip.id(),
            artifact.frame_count,
            artifact.dropped_frames,
            artifact.duration,
            artifact.size_bytes()
        );
        Ok(artifact)
    }

    async fn prepare(&self, job: &ExportJob<'_>) -> Result<EncodeParams> {
        job.clip.validate(job.sources)?;

        let first = job.clip.cuts().first().ok_or(TimelineError::EmptyComposite)?;
        self.wait_for_source(job.sources, first.source_index).await?;
        let canvas = Self::canvas_for(job.clip, job.sources)?;

        let (audio_sample_rate, audio_channels) = match job.overlay {
            Some(overlay) => (overlay.sample_rate, overlay.channel_count()),
            None => (self.mixer.sample_rate, self.mixer.channels),
        };

        Ok(EncodeParams {
            canvas,
            settings: job.settings,
            audio_sample_rate,
            audio_channels,
        })
    }

    async fn wait_for_source(&self, sources: &[VideoSource], source_index: usize) -> Result<()> {
        let source = sources.get(source_index).ok_or(TimelineError::InvalidSourceIndex {
            index: source_index,
            source_count: sources.len(),
        })?;

        let timeout = Duration::from_millis(self.config.source_ready_timeout_ms);
        let handle = source.handle();
        if wait_until(|| handle.is_ready(), timeout, Duration::from_millis(10)).await {
            Ok(())
        } else {
            Err(VideoError::SourceNotReady {
                source_index,
                timeout_ms: self.config.source_ready_timeout_ms,
            }
            .into())
        }
    }

    async fn run<F: FnMut(u8)>(
        &self,
        job: &ExportJob<'_>,
        params: &EncodeParams,
        encoder: &mut dyn MediaEncoder,
        cancel: &CancelFlag,
        progress: &mut ProgressTracker<F>,
    ) -> Result<RunStats> {
        let clip = job.clip;
        let mixer = AudioMixer::new(params.audio_sample_rate, params.audio_channels);
        let batch_samples = self.config.audio_batch_samples;

        // Overlay (or silence for a muted clip) is one continuous track
        // submitted before any video
        if job.overlay.is_some() || clip.muted {
            let track = mixer.render_continuous_track(job.overlay, clip.total_duration());
            debug!("Submitting {:.2}s continuous audio track", track.duration());
            for chunk in track.chunks(batch_samples) {
                cancel.check()?;
                encoder.push_audio(&chunk)?;
            }
        }

        let transform = FilterTransform::for_set(&clip.filters, &self.filters);
        let fps = params.fps() as f64;
        let interval = params.settings.frame_rate.interval();
        let mut clip_offset = 0.0;
        let batch_frames = self.config.video_batch_frames.max(1);

        let mut stats = RunStats::default();
        let mut frame_index = 0u64;
        let mut batch: Vec<Frame> = Vec::with_capacity(batch_frames);

        for (cut_number, cut) in clip.cuts().iter().enumerate() {
            cancel.check()?;
            self.wait_for_source(job.sources, cut.source_index).await?;

            let source = &job.sources[cut.source_index];

            // Frame edges come from the clip's running time so rounding
            // never accumulates across cuts
            let cut_end = clip_offset + cut.duration();
            let first = (clip_offset * fps).round() as u64;
            let last = (cut_end * fps).round() as u64;
            debug!(
                "Cut {}: {} {:.3}s-{:.3}s, {} frames",
                cut_number,
                source.name(),
                cut.start,
                cut.end,
                last.saturating_sub(first)
            );

            for step in first..last {
                cancel.check()?;
                let time = (cut.start + (step as f64 / fps - clip_offset)).clamp(cut.start, cut.end);

                match self
                    .compositor
                    .render(source.handle().as_ref(), time, params.canvas, &transform, frame_index)
                {
                    RenderOutcome::Rendered(frame) => {
                        batch.push(frame);
                        stats.frames += 1;
                    }
                    RenderOutcome::Dropped { time, reason } => {
                        debug!("Dropped frame at {:.3}s of {}: {}", time, source.name(), reason);
                        stats.dropped += 1;
                    }
                }
                frame_index += 1;

                if batch.len() >= batch_frames {
                    encoder.push_video(&batch)?;
                    batch.clear();
                    tokio::task::yield_now().await;
                }
                progress.advance(interval);
            }

            if !batch.is_empty() {
                encoder.push_video(&batch)?;
                batch.clear();
            }

            if job.overlay.is_none() && !clip.muted {
                let audio = mixer.cut_audio(source.handle().as_ref(), cut.start, cut.duration());
                for chunk in audio.chunks(batch_samples) {
                    encoder.push_audio(&chunk)?;
                }
            }
            clip_offset = cut_end;
        }

        if stats.dropped > 0 {
            warn!("{} of {} frames could not be decoded and were skipped", stats.dropped, frame_index);
        }
        Ok(stats)
    }
}
