use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    error::{PlaybackError, Result},
    playback::{
        handle::{HandleSet, Presentation},
        state::{transition, Effect, PlaybackEvent, PlaybackPlan, PlaybackState},
    },
    timeline::ClipId,
};

/// Drives the preview state machine against a set of media handles.
///
/// Every entry point funnels through [`PlaybackSequencer::dispatch`], which
/// computes the transition first and only then applies its effects, so a
/// rejected event leaves both state and handles untouched.
#[derive(Debug)]
pub struct PlaybackSequencer {
    state: PlaybackState,
    handles: HandleSet,
    active_source: Option<usize>,
    progress: f64,
}

impl PlaybackSequencer {
    pub fn new(handles: HandleSet) -> Self {
        Self {
            state: PlaybackState::Idle,
            handles,
            active_source: None,
            progress: 0.0,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    pub fn active_clip(&self) -> Option<ClipId> {
        self.state.active_clip()
    }

    pub fn active_source(&self) -> Option<usize> {
        self.active_source
    }

    pub fn handles(&self) -> &HandleSet {
        &self.handles
    }

    pub fn handles_mut(&mut self) -> &mut HandleSet {
        &mut self.handles
    }

    /// Clip-relative position of the last tick (seconds)
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Start previewing `plan`, fully stopping any clip already playing
    pub fn start(&mut self, plan: PlaybackPlan) -> Result<()> {
        for cut in &plan.cuts {
            if !self.handles.contains(cut.source_index) {
                return Err(PlaybackError::MissingHandle {
                    source_index: cut.source_index,
                }
                .into());
            }
        }

        if let Some(previous) = self.state.active_clip() {
            debug!("Stopping {} before starting {}", previous, plan.clip);
        }

        info!(
            "Preview {} started: {} cuts, {:.2}s",
            plan.clip,
            plan.cuts.len(),
            plan.total_duration()
        );
        self.progress = 0.0;
        self.dispatch(PlaybackEvent::Start(Arc::new(plan)))
    }

    /// Stop the preview; every handle is paused before this returns
    pub fn stop(&mut self) -> Result<()> {
        self.dispatch(PlaybackEvent::Stop)
    }

    /// Seek within the playing clip. Only simple clips support this.
    pub fn seek(&mut self, clip_time: f64) -> Result<()> {
        self.dispatch(PlaybackEvent::Seek { clip_time })?;
        if !self.state.is_idle() {
            self.progress = clip_time;
        }
        Ok(())
    }

    /// Advance handles by `elapsed`, evaluate cut boundaries and return the
    /// clip-relative progress
    pub fn tick(&mut self, elapsed: Duration) -> Result<f64> {
        self.handles.advance_all(elapsed.as_secs_f64());

        if self.state.is_idle() {
            return Ok(self.progress);
        }

        let position = self.active_position()?;
        self.progress = self.progress.max(self.state.progress(position));

        let was = self.state.clone();
        self.dispatch(PlaybackEvent::Tick { position })?;

        // On a switch the new cut starts where the previous one ended
        if self.state != was && !self.state.is_idle() {
            let position = self.active_position()?;
            self.progress = self.progress.max(self.state.progress(position));
        }

        Ok(self.progress)
    }

    /// Tick on a tokio interval until the preview goes idle.
    ///
    /// The interval lives inside this future; dropping the future releases it.
    pub async fn run_until_idle<F>(&mut self, tick_interval: Duration, mut on_progress: F) -> Result<()>
    where
        F: FnMut(f64),
    {
        let mut ticker = time::interval(tick_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();

        while !self.state.is_idle() {
            ticker.tick().await;
            let now = Instant::now();
            let progress = self.tick(now - last)?;
            last = now;
            on_progress(progress);
        }
        Ok(())
    }

    pub fn dispatch(&mut self, event: PlaybackEvent) -> Result<()> {
        let next = transition(&self.state, &event)?;
        for effect in next.effects {
            self.apply(effect)?;
        }
        self.state = next.state;
        Ok(())
    }

    fn active_position(&self) -> Result<f64> {
        let source_index = self.active_source.ok_or(PlaybackError::MissingHandle { source_index: 0 })?;
        Ok(self.handles.source(source_index)?.position())
    }

    fn apply(&mut self, effect: Effect) -> Result<()> {
        match effect {
            Effect::PauseAll => self.handles.pause_all(),
            Effect::Pause { source_index } => self.handles.source_mut(source_index)?.pause(),
            Effect::Activate { source_index } => {
                self.handles.source(source_index)?;
                self.active_source = Some(source_index);
            }
            Effect::Seek { source_index, time } => self.handles.source_mut(source_index)?.seek(time),
            Effect::Present {
                source_index,
                muted,
                filters,
                aspect_ratio,
            } => self.handles.source_mut(source_index)?.present(Presentation {
                muted,
                filters,
                aspect_ratio,
            }),
            Effect::Play { source_index } => self.handles.source_mut(source_index)?.play(),
            Effect::StartOverlay { offset } => match self.handles.overlay_mut() {
                Some(overlay) => {
                    overlay.seek(offset);
                    overlay.play();
                }
                None => warn!("Clip references overlay audio but no overlay handle is attached"),
            },
            Effect::SeekOverlay { offset } => {
                if let Some(overlay) = self.handles.overlay_mut() {
                    overlay.seek(offset);
                }
            }
            Effect::StopOverlay => {
                if let Some(overlay) = self.handles.overlay_mut() {
                    overlay.pause();
                }
            }
            Effect::Finished { clip } => {
                info!("Preview {} finished at {:.2}s", clip, self.progress);
                self.active_source = None;
            }
        }
        Ok(())
    }
}
