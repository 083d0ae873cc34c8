//! Pure preview state machine.
//!
//! [`transition`] maps `(state, event)` to the next state and the effects the
//! driver must apply to the media handles. It never touches a handle itself,
//! which keeps every switching rule testable without media.

use std::sync::Arc;

use crate::{
    audio::OverlayId,
    error::PlaybackError,
    filters::FilterSet,
    timeline::{AspectRatio, Clip, ClipId, Cut},
};

/// Tolerance when comparing a handle position against a cut end (seconds)
const END_EPSILON: f64 = 1e-6;

/// Everything the state machine needs to know about the clip being previewed
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPlan {
    pub clip: ClipId,
    pub cuts: Vec<Cut>,
    pub composite: bool,
    pub muted: bool,
    pub filters: FilterSet,
    pub aspect_ratio: AspectRatio,
    pub overlay: Option<OverlayId>,
}

impl PlaybackPlan {
    pub fn from_clip(clip: &Clip) -> Self {
        Self {
            clip: clip.id(),
            cuts: clip.cuts().to_vec(),
            composite: clip.is_composite(),
            muted: clip.muted,
            filters: clip.filters.clone(),
            aspect_ratio: clip.aspect_ratio,
            overlay: clip.overlay(),
        }
    }

    pub fn total_duration(&self) -> f64 {
        self.cuts.iter().map(Cut::duration).sum()
    }

    pub fn cut_offset(&self, index: usize) -> f64 {
        self.cuts.iter().take(index).map(Cut::duration).sum()
    }

    /// Source audio is silenced when the clip is muted or an overlay replaces it
    pub fn source_muted(&self) -> bool {
        self.muted || self.overlay.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing {
        plan: Arc<PlaybackPlan>,
        cut_index: usize,
    },
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackState::Idle)
    }

    pub fn active_clip(&self) -> Option<ClipId> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Playing { plan, .. } => Some(plan.clip),
        }
    }

    pub fn current_cut(&self) -> Option<&Cut> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Playing { plan, cut_index } => plan.cuts.get(*cut_index),
        }
    }

    /// Clip-relative progress given the active handle position: prior cut
    /// durations plus the time elapsed in the current cut, clamped to the cut.
    pub fn progress(&self, position: f64) -> f64 {
        match self {
            PlaybackState::Idle => 0.0,
            PlaybackState::Playing { plan, cut_index } => match plan.cuts.get(*cut_index) {
                Some(cut) => plan.cut_offset(*cut_index) + (position - cut.start).clamp(0.0, cut.duration()),
                None => plan.total_duration(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Begin previewing a clip, stopping whatever was playing
    Start(Arc<PlaybackPlan>),
    /// Periodic check with the active handle's current position
    Tick { position: f64 },
    /// Move to a clip-relative time
    Seek { clip_time: f64 },
    Stop,
}

/// Side effects the driver applies, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PauseAll,
    Pause { source_index: usize },
    Activate { source_index: usize },
    Seek { source_index: usize, time: f64 },
    Present {
        source_index: usize,
        muted: bool,
        filters: FilterSet,
        aspect_ratio: AspectRatio,
    },
    Play { source_index: usize },
    StartOverlay { offset: f64 },
    SeekOverlay { offset: f64 },
    StopOverlay,
    Finished { clip: ClipId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: PlaybackState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: &PlaybackState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }
}

/// Activate `cut` with its handle `offset` seconds past the cut start
fn enter_cut(plan: &PlaybackPlan, cut: &Cut, offset: f64, effects: &mut Vec<Effect>) {
    effects.push(Effect::Activate {
        source_index: cut.source_index,
    });
    effects.push(Effect::Seek {
        source_index: cut.source_index,
        time: cut.start + offset,
    });
    effects.push(Effect::Present {
        source_index: cut.source_index,
        muted: plan.source_muted(),
        filters: plan.filters.clone(),
        aspect_ratio: plan.aspect_ratio,
    });
    effects.push(Effect::Play {
        source_index: cut.source_index,
    });
}

/// Compute the next state and the effects that realise it
pub fn transition(state: &PlaybackState, event: &PlaybackEvent) -> Result<Transition, PlaybackError> {
    match (state, event) {
        (_, PlaybackEvent::Start(plan)) => {
            let Some(first) = plan.cuts.first() else {
                return Ok(Transition {
                    state: PlaybackState::Idle,
                    effects: vec![Effect::PauseAll, Effect::StopOverlay],
                });
            };

            let mut effects = vec![Effect::PauseAll, Effect::StopOverlay];
            enter_cut(plan, first, 0.0, &mut effects);
            if plan.overlay.is_some() {
                effects.push(Effect::StartOverlay { offset: 0.0 });
            }

            Ok(Transition {
                state: PlaybackState::Playing {
                    plan: Arc::clone(plan),
                    cut_index: 0,
                },
                effects,
            })
        }

        (PlaybackState::Idle, PlaybackEvent::Tick { .. }) => Ok(Transition::stay(state)),

        (PlaybackState::Playing { plan, cut_index }, PlaybackEvent::Tick { position }) => {
            let Some(cut) = plan.cuts.get(*cut_index) else {
                return Ok(finish(plan));
            };

            if *position + END_EPSILON < cut.end {
                return Ok(Transition::stay(state));
            }

            // Time played past the cut end belongs to the following cuts,
            // which keeps the video in step with the overlay clock
            let mut overshoot = (*position - cut.end).max(0.0);
            let mut next_index = cut_index + 1;
            while let Some(skipped) = plan.cuts.get(next_index) {
                if overshoot + END_EPSILON < skipped.duration() {
                    break;
                }
                overshoot -= skipped.duration();
                next_index += 1;
            }

            match plan.cuts.get(next_index) {
                Some(next) => {
                    let mut effects = Vec::new();
                    if next.source_index != cut.source_index {
                        effects.push(Effect::Pause {
                            source_index: cut.source_index,
                        });
                    }
                    enter_cut(plan, next, overshoot.max(0.0), &mut effects);

                    Ok(Transition {
                        state: PlaybackState::Playing {
                            plan: Arc::clone(plan),
                            cut_index: next_index,
                        },
                        effects,
                    })
                }
                None => Ok(finish(plan)),
            }
        }

        (PlaybackState::Idle, PlaybackEvent::Seek { .. }) => Ok(Transition::stay(state)),

        (PlaybackState::Playing { plan, .. }, PlaybackEvent::Seek { clip_time }) => {
            if plan.composite {
                return Err(PlaybackError::SeekUnsupported);
            }

            let duration = plan.total_duration();
            if !(0.0..=duration).contains(clip_time) {
                return Err(PlaybackError::SeekOutOfRange {
                    target: *clip_time,
                    duration,
                });
            }

            let Some(cut) = plan.cuts.first() else {
                return Ok(Transition::stay(state));
            };

            let mut effects = vec![Effect::Seek {
                source_index: cut.source_index,
                time: cut.start + clip_time,
            }];
            if plan.overlay.is_some() {
                effects.push(Effect::SeekOverlay { offset: *clip_time });
            }

            Ok(Transition {
                state: state.clone(),
                effects,
            })
        }

        (_, PlaybackEvent::Stop) => Ok(Transition {
            state: PlaybackState::Idle,
            effects: vec![Effect::PauseAll, Effect::StopOverlay],
        }),
    }
}

fn finish(plan: &PlaybackPlan) -> Transition {
    Transition {
        state: PlaybackState::Idle,
        effects: vec![
            Effect::PauseAll,
            Effect::StopOverlay,
            Effect::Finished { clip: plan.clip },
        ],
    }
}
