use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    audio::{AudioBuffer, AudioLoader, OverlayId, OverlayRegistry},
    composition::MultiCamComposer,
    config::Config,
    error::{CompositorError, ExportError, Result, TimelineError},
    export::{CancelFlag, ExportArtifact, ExportJob, ExportPipeline, ExportSettings, MediaEncoder},
    filters::FilterSet,
    playback::{HandleSet, MediaHandle, PlaybackPlan, PlaybackSequencer, VirtualHandle},
    timeline::types::{AspectRatio, Clip, ClipId, ClipTiming, VideoSource},
    video::source::MediaSource,
};

/// Marks an activity as running until dropped
#[derive(Debug)]
struct ActivityGuard(Arc<AtomicBool>);

impl ActivityGuard {
    fn acquire(flag: &Arc<AtomicBool>, activity: &'static str) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ExportError::Busy { activity })?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns everything one editing session works on: sources, clips, overlay
/// tracks and the preview/export activity.
///
/// Edits validate before they touch anything, so a rejected edit leaves the
/// session exactly as it was. At most one preview and one export run at a
/// time; starting an export stops the preview.
pub struct EditSession {
    config: Config,
    sources: Vec<VideoSource>,
    clips: Vec<Clip>,
    next_clip_id: u64,
    overlays: OverlayRegistry,
    preview: Mutex<Option<PlaybackSequencer>>,
    exporting: Arc<AtomicBool>,
    pipeline: ExportPipeline,
}

impl EditSession {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pipeline = ExportPipeline::new(&config)?;
        Ok(Self {
            config,
            sources: Vec::new(),
            clips: Vec::new(),
            next_clip_id: 0,
            overlays: OverlayRegistry::new(),
            preview: Mutex::new(None),
            exporting: Arc::new(AtomicBool::new(false)),
            pipeline,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ==========================================
    // SOURCES
    // ==========================================

    /// Add an opened source and return its index
    pub fn add_source(&mut self, source: VideoSource) -> usize {
        info!(
            "Added source {}: {} ({:.2}s, {}x{})",
            self.sources.len(),
            source.name(),
            source.duration(),
            source.metadata().width,
            source.metadata().height
        );
        self.sources.push(source);
        self.sources.len() - 1
    }

    /// Wait (bounded by `export.source_ready_timeout_ms`) for a handle to
    /// report metadata, then add it
    pub async fn open_source(&mut self, handle: Arc<dyn MediaSource>) -> Result<usize> {
        let timeout = Duration::from_millis(self.config.export.source_ready_timeout_ms);
        let index = self.sources.len();
        let source = VideoSource::open(handle, index, timeout).await?;
        Ok(self.add_source(source))
    }

    pub fn sources(&self) -> &[VideoSource] {
        &self.sources
    }

    pub fn source(&self, index: usize) -> Option<&VideoSource> {
        self.sources.get(index)
    }

    // ==========================================
    // CLIPS
    // ==========================================

    /// Validate `clip`, take its overlay reference and assign it an id
    pub fn add_clip(&mut self, mut clip: Clip) -> Result<ClipId> {
        clip.validate(&self.sources)?;
        if let Some(overlay) = clip.overlay {
            self.overlays.acquire(overlay)?;
        }

        self.next_clip_id += 1;
        clip.id = ClipId(self.next_clip_id);
        info!(
            "Added {} \"{}\": {} cut(s), {:.2}s",
            clip.id,
            clip.title,
            clip.cuts().len(),
            clip.total_duration()
        );

        let id = clip.id;
        self.clips.push(clip);
        Ok(id)
    }

    /// Remove a clip, releasing its overlay reference. A preview of the
    /// clip is stopped first.
    pub fn delete_clip(&mut self, id: ClipId) -> Result<Clip> {
        let position = self
            .clips
            .iter()
            .position(|c| c.id == id)
            .ok_or(TimelineError::ClipNotFound { id: id.0 })?;

        if self.previewing_clip()? == Some(id) {
            self.stop_preview()?;
        }

        let clip = self.clips.remove(position);
        if let Some(overlay) = clip.overlay {
            if self.overlays.release(overlay) {
                info!("Overlay {} no longer referenced, released", overlay);
            }
        }
        info!("Deleted {}", id);
        Ok(clip)
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    fn clip_mut(&mut self, id: ClipId) -> Result<&mut Clip> {
        self.clips
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| TimelineError::ClipNotFound { id: id.0 }.into())
    }

    pub fn set_clip_filters(&mut self, id: ClipId, filters: FilterSet) -> Result<()> {
        let clip = self.clip_mut(id)?;
        debug!("{} filters: {} -> {}", id, clip.filters, filters);
        clip.filters = filters;
        Ok(())
    }

    pub fn set_clip_aspect_ratio(&mut self, id: ClipId, aspect_ratio: AspectRatio) -> Result<()> {
        let clip = self.clip_mut(id)?;
        debug!("{} aspect ratio: {} -> {}", id, clip.aspect_ratio, aspect_ratio);
        clip.aspect_ratio = aspect_ratio;
        Ok(())
    }

    pub fn set_clip_muted(&mut self, id: ClipId, muted: bool) -> Result<()> {
        self.clip_mut(id)?.muted = muted;
        Ok(())
    }

    /// Replace a clip's cuts; the new timing must fit the loaded sources
    pub fn set_clip_timing(&mut self, id: ClipId, timing: ClipTiming) -> Result<()> {
        self.clip_mut(id)?;
        timing.validate(&self.sources)?;
        let clip = self.clip_mut(id)?;
        clip.set_timing(timing);
        debug!("{} retimed to {:.2}s", id, clip.total_duration());
        Ok(())
    }

    // ==========================================
    // OVERLAY AUDIO
    // ==========================================

    /// Store a decoded overlay track; clips reference it via [`Self::attach_overlay`]
    pub fn register_overlay(&mut self, name: impl Into<String>, buffer: AudioBuffer) -> OverlayId {
        self.overlays.register(name, buffer)
    }

    /// Load an audio file as an overlay track
    pub async fn load_overlay<P: AsRef<Path>>(&mut self, path: P) -> Result<OverlayId> {
        let loaded = AudioLoader::load(path.as_ref()).await?;
        let name = loaded
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| loaded.path.display().to_string());
        info!("Loaded overlay {} ({:.2}s)", name, loaded.duration());
        Ok(self.register_overlay(name, loaded.buffer))
    }

    /// Point a clip at `overlay` (or detach with `None`). The new reference is
    /// taken before the old one is released.
    pub fn attach_overlay(&mut self, id: ClipId, overlay: Option<OverlayId>) -> Result<()> {
        let previous = self.clip_mut(id)?.overlay;
        if previous == overlay {
            return Ok(());
        }

        if let Some(next) = overlay {
            self.overlays.acquire(next)?;
        }
        if let Some(previous) = previous {
            if self.overlays.release(previous) {
                info!("Overlay {} no longer referenced, released", previous);
            }
        }

        self.clip_mut(id)?.overlay = overlay;
        Ok(())
    }

    pub fn overlays(&self) -> &OverlayRegistry {
        &self.overlays
    }

    /// Generate an alternating multi-cam clip covering `overlay` and add it
    /// with the overlay attached
    pub fn add_multicam_clip(&mut self, title: impl Into<String>, overlay: OverlayId) -> Result<ClipId> {
        let track = self
            .overlays
            .get(overlay)
            .ok_or(TimelineError::OverlayNotFound { id: overlay.0 })?;

        let clip = MultiCamComposer::new(&self.config.composition)
            .compose(title, &self.sources, track.duration())?
            .with_overlay(overlay);
        self.add_clip(clip)
    }

    // ==========================================
    // PREVIEW
    // ==========================================

    /// Preview a clip on virtual handles backed by the session's sources
    pub fn start_preview(&self, id: ClipId) -> Result<()> {
        let clip = self.clip(id).ok_or(TimelineError::ClipNotFound { id: id.0 })?;

        let handles: Vec<Box<dyn MediaHandle>> = self
            .sources
            .iter()
            .map(|s| Box::new(VirtualHandle::for_source(Arc::clone(s.handle()), s.duration())) as Box<dyn MediaHandle>)
            .collect();
        let mut handles = HandleSet::new(handles);
        if let Some(overlay) = clip.overlay.and_then(|o| self.overlays.get(o)) {
            handles.set_overlay(Some(Box::new(VirtualHandle::new(overlay.duration()))));
        }

        self.start_preview_with(id, handles)
    }

    /// Preview a clip on caller-supplied handles, one per source
    pub fn start_preview_with(&self, id: ClipId, handles: HandleSet) -> Result<()> {
        if self.is_exporting() {
            return Err(ExportError::Busy { activity: "export" }.into());
        }
        let clip = self.clip(id).ok_or(TimelineError::ClipNotFound { id: id.0 })?;
        let plan = PlaybackPlan::from_clip(clip);

        let mut preview = self.lock_preview()?;
        if let Some(mut previous) = preview.take() {
            previous.stop()?;
        }

        let mut sequencer = PlaybackSequencer::new(handles);
        sequencer.start(plan)?;
        *preview = Some(sequencer);
        Ok(())
    }

    /// Stop the preview; every handle is paused before this returns
    pub fn stop_preview(&self) -> Result<()> {
        if let Some(mut sequencer) = self.lock_preview()?.take() {
            sequencer.stop()?;
            debug!("Preview stopped");
        }
        Ok(())
    }

    /// Seek the running preview. Without a preview this does nothing.
    pub fn seek_preview(&self, clip_time: f64) -> Result<()> {
        match self.lock_preview()?.as_mut() {
            Some(sequencer) => sequencer.seek(clip_time),
            None => Ok(()),
        }
    }

    /// Advance the preview by `elapsed` and return its progress, or `None`
    /// when nothing is playing. A preview that reaches its end is cleared.
    pub fn tick_preview(&self, elapsed: Duration) -> Result<Option<f64>> {
        let mut preview = self.lock_preview()?;
        let Some(sequencer) = preview.as_mut() else {
            return Ok(None);
        };

        let progress = sequencer.tick(elapsed)?;
        if sequencer.is_idle() {
            *preview = None;
        }
        Ok(Some(progress))
    }

    pub fn is_previewing(&self) -> bool {
        self.lock_preview().map(|p| p.is_some()).unwrap_or(false)
    }

    fn previewing_clip(&self) -> Result<Option<ClipId>> {
        Ok(self.lock_preview()?.as_ref().and_then(|s| s.active_clip()))
    }

    fn lock_preview(&self) -> Result<MutexGuard<'_, Option<PlaybackSequencer>>> {
        self.preview
            .lock()
            .map_err(|_| CompositorError::generic("preview lock poisoned"))
    }

    // ==========================================
    // EXPORT
    // ==========================================

    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::SeqCst)
    }

    /// Export a clip. Stops any running preview; a second export while one is
    /// in flight fails with [`ExportError::Busy`].
    pub async fn export<F>(
        &self,
        id: ClipId,
        settings: ExportSettings,
        encoder: Box<dyn MediaEncoder>,
        cancel: &CancelFlag,
        on_progress: F,
    ) -> Result<ExportArtifact>
    where
        F: FnMut(u8),
    {
        let _guard = ActivityGuard::acquire(&self.exporting, "export")?;

        if self.is_previewing() {
            info!("Stopping preview for export");
            self.stop_preview()?;
        }

        let clip = self.clip(id).ok_or(TimelineError::ClipNotFound { id: id.0 })?;
        let overlay = match clip.overlay {
            Some(overlay_id) => match self.overlays.get(overlay_id) {
                Some(overlay) => Some(overlay),
                None => {
                    warn!("{} references missing {}, exporting source audio", id, overlay_id);
                    None
                }
            },
            None => None,
        };

        let job = ExportJob {
            clip,
            sources: &self.sources,
            overlay: overlay.as_ref().map(|o| &o.buffer),
            settings,
        };
        self.pipeline.export(job, encoder, cancel, on_progress).await
    }
}

impl std::fmt::Debug for EditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSession")
            .field("sources", &self.sources.len())
            .field("clips", &self.clips.len())
            .field("overlays", &self.overlays.len())
            .field("exporting", &self.is_exporting())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::VideoError,
        export::InMemoryEncoder,
        filters::Filter,
        timeline::types::Cut,
        video::synthetic::SyntheticSource,
    };

    fn test_config() -> Config {
        let mut config = Config::default();
        config.export.processing_threads = 2;
        config.export.video_batch_frames = 8;
        config.export.source_ready_timeout_ms = 200;
        config.audio.default_sample_rate = 8_000;
        config
    }

    fn session_with_sources(durations: &[f64]) -> EditSession {
        let mut session = EditSession::new(test_config()).unwrap();
        for (i, &duration) in durations.iter().enumerate() {
            let handle: Arc<dyn MediaSource> =
                Arc::new(SyntheticSource::new(format!("cam-{i}"), duration, 16, 16));
            session.add_source(VideoSource::from_handle(handle).unwrap());
        }
        session
    }

    fn overlay(seconds: usize) -> AudioBuffer {
        AudioBuffer::silence(8_000, 2, 8_000 * seconds)
    }

    #[test]
    fn test_add_clip_validates_against_sources() {
        let mut session = session_with_sources(&[10.0]);

        let err = session
            .add_clip(Clip::simple("late", Cut::new(0, 8.0, 12.0).unwrap()))
            .unwrap_err();
        assert!(matches!(
            err,
            CompositorError::Timeline(TimelineError::OutOfSourceRange { .. })
        ));

        let err = session
            .add_clip(Clip::simple("ghost", Cut::new(3, 0.0, 1.0).unwrap()))
            .unwrap_err();
        assert!(matches!(
            err,
            CompositorError::Timeline(TimelineError::InvalidSourceIndex { index: 3, .. })
        ));
        assert!(session.clips().is_empty());

        let a = session.add_clip(Clip::simple("a", Cut::new(0, 0.0, 2.0).unwrap())).unwrap();
        let b = session.add_clip(Clip::simple("b", Cut::new(0, 2.0, 4.0).unwrap())).unwrap();
        assert_ne!(a, b);
        assert_eq!(session.clip(b).unwrap().title, "b");
    }

    #[test]
    fn test_rejected_retime_leaves_clip_unchanged() {
        let mut session = session_with_sources(&[10.0, 5.0]);
        let id = session.add_clip(Clip::simple("a", Cut::new(0, 1.0, 3.0).unwrap())).unwrap();

        let bad = ClipTiming::composite(vec![Cut::new(0, 0.0, 2.0).unwrap(), Cut::new(1, 4.0, 6.0).unwrap()]).unwrap();
        assert!(session.set_clip_timing(id, bad).is_err());
        assert_eq!(session.clip(id).unwrap().total_duration(), 2.0);
        assert!(!session.clip(id).unwrap().is_composite());

        let good = ClipTiming::composite(vec![Cut::new(0, 0.0, 2.0).unwrap(), Cut::new(1, 3.0, 5.0).unwrap()]).unwrap();
        session.set_clip_timing(id, good).unwrap();
        assert_eq!(session.clip(id).unwrap().total_duration(), 4.0);
    }

    #[test]
    fn test_attribute_edits() {
        let mut session = session_with_sources(&[10.0]);
        let id = session.add_clip(Clip::simple("a", Cut::new(0, 0.0, 2.0).unwrap())).unwrap();

        session.set_clip_filters(id, FilterSet::single(Filter::Vhs)).unwrap();
        session.set_clip_aspect_ratio(id, AspectRatio::Portrait).unwrap();
        session.set_clip_muted(id, true).unwrap();

        let clip = session.clip(id).unwrap();
        assert!(clip.filters.contains(Filter::Vhs));
        assert_eq!(clip.aspect_ratio, AspectRatio::Portrait);
        assert!(clip.muted);

        assert!(matches!(
            session.set_clip_muted(ClipId(99), false),
            Err(CompositorError::Timeline(TimelineError::ClipNotFound { id: 99 }))
        ));
    }

    #[test]
    fn test_overlay_released_after_last_clip() {
        let mut session = session_with_sources(&[10.0]);
        let song = session.register_overlay("song.wav", overlay(5));

        let a = session
            .add_clip(Clip::simple("a", Cut::new(0, 0.0, 2.0).unwrap()).with_overlay(song))
            .unwrap();
        let b = session
            .add_clip(Clip::simple("b", Cut::new(0, 2.0, 4.0).unwrap()).with_overlay(song))
            .unwrap();
        assert_eq!(session.overlays().references(song), 2);

        session.delete_clip(a).unwrap();
        assert!(session.overlays().contains(song));
        assert_eq!(session.overlays().released_count(), 0);

        session.delete_clip(b).unwrap();
        assert!(!session.overlays().contains(song));
        assert_eq!(session.overlays().released_count(), 1);

        assert!(session.delete_clip(b).is_err());
        assert_eq!(session.overlays().released_count(), 1);
    }

    #[test]
    fn test_attach_overlay_moves_reference() {
        let mut session = session_with_sources(&[10.0]);
        let first = session.register_overlay("one", overlay(1));
        let second = session.register_overlay("two", overlay(2));
        let id = session
            .add_clip(Clip::simple("a", Cut::new(0, 0.0, 2.0).unwrap()).with_overlay(first))
            .unwrap();

        assert!(session.attach_overlay(id, Some(OverlayId(42))).is_err());
        assert_eq!(session.clip(id).unwrap().overlay(), Some(first));

        session.attach_overlay(id, Some(second)).unwrap();
        assert!(!session.overlays().contains(first));
        assert_eq!(session.overlays().references(second), 1);

        session.attach_overlay(id, None).unwrap();
        assert!(!session.overlays().contains(second));
    }

    #[test]
    fn test_multicam_clip_covers_overlay() {
        let mut session = session_with_sources(&[12.0, 9.0]);
        let song = session.register_overlay("song", overlay(10));

        let id = session.add_multicam_clip("multicam", song).unwrap();
        let clip = session.clip(id).unwrap();
        assert_eq!(clip.cuts().len(), 4);
        assert!((clip.total_duration() - 10.0).abs() < 1e-9);
        assert_eq!(clip.overlay(), Some(song));
        assert_eq!(session.overlays().references(song), 1);
    }

    #[test]
    fn test_multicam_with_short_sources_adds_nothing() {
        let mut session = session_with_sources(&[2.0, 1.0]);
        let song = session.register_overlay("song", overlay(10));

        assert!(matches!(
            session.add_multicam_clip("multicam", song),
            Err(CompositorError::Timeline(TimelineError::UnsupportedSource { .. }))
        ));
        assert!(session.clips().is_empty());
        assert_eq!(session.overlays().references(song), 0);
    }

    #[test]
    fn test_unknown_overlay_rejects_add() {
        let mut session = session_with_sources(&[10.0]);
        let result = session.add_clip(Clip::simple("a", Cut::new(0, 0.0, 2.0).unwrap()).with_overlay(OverlayId(7)));
        assert!(result.is_err());
        assert!(session.clips().is_empty());
    }

    #[test]
    fn test_preview_ticks_and_finishes() {
        let mut session = session_with_sources(&[10.0, 10.0]);
        let id = session
            .add_clip(
                Clip::composite("ab", vec![Cut::new(0, 0.0, 1.0).unwrap(), Cut::new(1, 5.0, 6.0).unwrap()]).unwrap(),
            )
            .unwrap();

        session.start_preview(id).unwrap();
        assert!(session.is_previewing());

        let mut last = 0.0;
        for _ in 0..30 {
            match session.tick_preview(Duration::from_millis(100)).unwrap() {
                Some(progress) => {
                    assert!(progress >= last);
                    last = progress;
                }
                None => break,
            }
        }
        assert!((last - 2.0).abs() < 1e-9);
        assert!(!session.is_previewing());
        assert_eq!(session.tick_preview(Duration::from_millis(100)).unwrap(), None);
    }

    #[test]
    fn test_seek_rules_for_preview() {
        let mut session = session_with_sources(&[10.0]);
        let simple = session.add_clip(Clip::simple("a", Cut::new(0, 2.0, 6.0).unwrap())).unwrap();
        let composite = session
            .add_clip(
                Clip::composite("b", vec![Cut::new(0, 0.0, 1.0).unwrap(), Cut::new(0, 3.0, 4.0).unwrap()]).unwrap(),
            )
            .unwrap();

        // idle seek is a no-op
        session.seek_preview(1.0).unwrap();

        session.start_preview(simple).unwrap();
        session.seek_preview(1.5).unwrap();

        session.start_preview(composite).unwrap();
        assert!(matches!(
            session.seek_preview(0.5),
            Err(CompositorError::Playback(crate::error::PlaybackError::SeekUnsupported))
        ));
    }

    #[test]
    fn test_deleting_previewed_clip_stops_preview() {
        let mut session = session_with_sources(&[10.0]);
        let id = session.add_clip(Clip::simple("a", Cut::new(0, 0.0, 2.0).unwrap())).unwrap();
        session.start_preview(id).unwrap();
        session.delete_clip(id).unwrap();
        assert!(!session.is_previewing());
    }

    #[test]
    fn test_preview_with_missing_handle_fails() {
        let mut session = session_with_sources(&[10.0, 10.0]);
        let id = session
            .add_clip(
                Clip::composite("ab", vec![Cut::new(0, 0.0, 1.0).unwrap(), Cut::new(1, 0.0, 1.0).unwrap()]).unwrap(),
            )
            .unwrap();

        let handles = HandleSet::new(vec![Box::new(VirtualHandle::new(10.0)) as Box<dyn MediaHandle>]);
        assert!(session.start_preview_with(id, handles).is_err());
        assert!(!session.is_previewing());
    }

    #[tokio::test]
    async fn test_export_stops_preview() {
        let mut session = session_with_sources(&[10.0]);
        let id = session.add_clip(Clip::simple("a", Cut::new(0, 0.0, 1.0).unwrap())).unwrap();
        session.start_preview(id).unwrap();

        let artifact = session
            .export(id, ExportSettings::default(), Box::new(InMemoryEncoder::counting()), &CancelFlag::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(artifact.frame_count, 30);
        assert!(!session.is_previewing());
        assert!(!session.is_exporting());
    }

    #[tokio::test]
    async fn test_second_export_is_busy() {
        let mut session = session_with_sources(&[10.0]);
        let id = session.add_clip(Clip::simple("a", Cut::new(0, 0.0, 2.0).unwrap())).unwrap();
        let cancel = CancelFlag::new();

        let (first, second) = tokio::join!(
            session.export(id, ExportSettings::default(), Box::new(InMemoryEncoder::counting()), &cancel, |_| {}),
            session.export(id, ExportSettings::default(), Box::new(InMemoryEncoder::counting()), &cancel, |_| {}),
        );

        let busy = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(CompositorError::Export(ExportError::Busy { .. }))))
            .count();
        assert_eq!(busy, 1);
        assert!(first.is_ok() || second.is_ok());

        // the lock is released once the export is over
        assert!(!session.is_exporting());
        session
            .export(id, ExportSettings::default(), Box::new(InMemoryEncoder::counting()), &cancel, |_| {})
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failed_export_releases_lock() {
        let mut session = session_with_sources(&[10.0]);
        let id = session.add_clip(Clip::simple("a", Cut::new(0, 0.0, 1.0).unwrap())).unwrap();

        let result = session
            .export(
                id,
                ExportSettings::default(),
                Box::new(InMemoryEncoder::new().fail_on_begin()),
                &CancelFlag::new(),
                |_| {},
            )
            .await;
        assert!(matches!(
            result,
            Err(CompositorError::Export(ExportError::ExportFailed { .. }))
        ));
        assert!(!session.is_exporting());
    }

    #[tokio::test]
    async fn test_export_uses_session_overlay() {
        let mut session = session_with_sources(&[10.0]);
        let song = session.register_overlay("song", AudioBuffer::silence(22_050, 1, 22_050));
        let id = session
            .add_clip(Clip::simple("a", Cut::new(0, 0.0, 2.0).unwrap()).with_overlay(song))
            .unwrap();

        let encoder = InMemoryEncoder::counting();
        let recording = encoder.recording();
        session
            .export(id, ExportSettings::default(), Box::new(encoder), &CancelFlag::new(), |_| {})
            .await
            .unwrap();

        let r = recording.lock().unwrap();
        let audio = r.audio.as_ref().unwrap();
        assert_eq!(audio.sample_rate, 22_050);
        assert_eq!(audio.len(), 44_100);
    }

    #[tokio::test]
    async fn test_open_source_reports_its_index() {
        let mut session = session_with_sources(&[10.0]);
        let slow: Arc<dyn MediaSource> = Arc::new(SyntheticSource::new("slow", 5.0, 8, 8).ready_after(usize::MAX));

        match session.open_source(slow).await {
            Err(CompositorError::Video(VideoError::SourceNotReady { source_index, .. })) => {
                assert_eq!(source_index, 1)
            }
            other => panic!("Expected SourceNotReady, got {other:?}"),
        }
        assert_eq!(session.sources().len(), 1);

        let ready: Arc<dyn MediaSource> = Arc::new(SyntheticSource::new("ok", 5.0, 8, 8).ready_after(2));
        assert_eq!(session.open_source(ready).await.unwrap(), 1);
    }
}
