//! Playback state machine
//!
//! A pure state machine sequencing media across one or more stories
//! for a single viewing session. Inputs are user actions, timer ticks
//! and media-resource events; every step returns the ordered list of
//! side effects for the driver to apply. No timers, no I/O, no clocks
//! live here, which keeps every transition testable in isolation.
//!
//! The machine owns a snapshot of the stories taken at session start.
//! Deletion or expiration of a story while the session is open does
//! not interrupt it; the session finishes against its snapshot.

use crate::store::types::{MediaKind, Story};
use thiserror::Error;
use uuid::Uuid;

/// Default polling interval driving progress, in milliseconds
pub const DEFAULT_TICK_MS: u64 = 50;

/// Default display duration for photos, in milliseconds
pub const DEFAULT_PHOTO_DURATION_MS: u64 = 5000;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Constructed but not started
    Idle,
    /// Timer running, progress accumulating
    Playing,
    /// Timer frozen at the current progress
    Paused,
    /// Momentary state between finishing one item and entering the next
    Transitioning,
    /// Session over; terminal
    Closed,
}

/// Inputs fed into the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackInput {
    /// Begin the session at the configured starting position
    Start,
    /// One timer tick elapsed
    Tick,
    /// User paused
    Pause,
    /// User resumed
    Resume,
    /// User skipped forward
    Advance,
    /// User skipped backward
    Retreat,
    /// User jumped to another story in the session
    JumpToStory(usize),
    /// Host reports the current media resource finished loading
    MediaReady,
    /// Host reports the underlying media resource paused itself
    MediaPaused,
    /// Host reports the underlying media resource resumed
    MediaResumed,
    /// End the session
    Close,
}

/// Side effects the driver must apply after a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Record a view for (story, media index) by the session viewer
    RecordView { story_id: Uuid, media_index: usize },
    /// Cancel any prior timer and arm a fresh one for the current item
    ArmTimer,
    /// Cancel the timer without re-arming
    CancelTimer,
    /// Pause the active media resource (video)
    PauseMedia,
    /// Resume the active media resource (video)
    ResumeMedia,
    /// Release the active media resource
    ReleaseMedia,
    /// The session closed; notify the host navigation layer
    NotifyClosed,
}

/// Timing parameters for a session
#[derive(Debug, Clone, Copy)]
pub struct MachineConfig {
    /// Tick interval in milliseconds
    pub tick_ms: u64,
    /// Photo display duration in milliseconds
    pub photo_duration_ms: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            photo_duration_ms: DEFAULT_PHOTO_DURATION_MS,
        }
    }
}

/// Errors constructing a playback machine
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("No stories in session")]
    EmptyStories,

    #[error("Story index {0} out of range")]
    StoryIndexOutOfRange(usize),

    #[error("Media index {media} out of range for story index {story}")]
    MediaIndexOutOfRange { story: usize, media: usize },
}

/// Timer-driven playback state machine over a story snapshot
pub struct PlaybackMachine {
    stories: Vec<Story>,
    story_index: usize,
    media_index: usize,
    /// Fraction of the current item's duration elapsed, 0..=100
    progress: f64,
    state: PlaybackState,
    /// Video items wait for a MediaReady signal before the timer arms
    awaiting_ready: bool,
    config: MachineConfig,
}

impl PlaybackMachine {
    /// Build a machine over a story snapshot, starting at the given
    /// (story, media) position. The snapshot must be non-empty and the
    /// position in range.
    pub fn new(
        stories: Vec<Story>,
        story_index: usize,
        media_index: usize,
        config: MachineConfig,
    ) -> Result<Self, PlaybackError> {
        if stories.is_empty() {
            return Err(PlaybackError::EmptyStories);
        }
        let story = stories
            .get(story_index)
            .ok_or(PlaybackError::StoryIndexOutOfRange(story_index))?;
        if media_index >= story.media.len() {
            return Err(PlaybackError::MediaIndexOutOfRange {
                story: story_index,
                media: media_index,
            });
        }

        Ok(Self {
            stories,
            story_index,
            media_index,
            progress: 0.0,
            state: PlaybackState::Idle,
            awaiting_ready: false,
            config,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn story_index(&self) -> usize {
        self.story_index
    }

    pub fn media_index(&self) -> usize {
        self.media_index
    }

    pub fn current_story(&self) -> &Story {
        &self.stories[self.story_index]
    }

    pub fn current_media(&self) -> &crate::store::types::MediaItem {
        &self.current_story().media[self.media_index]
    }

    /// Whether the machine is waiting for a MediaReady signal
    pub fn awaiting_ready(&self) -> bool {
        self.awaiting_ready
    }

    /// Display duration of the current item in milliseconds
    pub fn current_duration_ms(&self) -> u64 {
        let media = self.current_media();
        match media.kind {
            MediaKind::Photo => self.config.photo_duration_ms,
            MediaKind::Video => media
                .duration_secs
                .map(|d| (d * 1000.0) as u64)
                .unwrap_or(self.config.photo_duration_ms),
        }
    }

    /// Apply one input and return the side effects, in order
    pub fn handle(&mut self, input: PlaybackInput) -> Vec<Effect> {
        let mut effects = Vec::new();

        match (self.state, input) {
            (PlaybackState::Idle, PlaybackInput::Start) => {
                self.state = PlaybackState::Playing;
                self.enter_item(true, &mut effects);
            }

            (PlaybackState::Playing, PlaybackInput::Tick) => {
                if !self.awaiting_ready {
                    self.tick(&mut effects);
                }
            }

            (PlaybackState::Playing, PlaybackInput::Pause) => {
                self.state = PlaybackState::Paused;
                effects.push(Effect::CancelTimer);
                if self.current_media().kind == MediaKind::Video {
                    effects.push(Effect::PauseMedia);
                }
            }

            (PlaybackState::Paused, PlaybackInput::Resume) => {
                self.state = PlaybackState::Playing;
                if self.current_media().kind == MediaKind::Video {
                    effects.push(Effect::ResumeMedia);
                }
                // Resume from the paused progress, never from zero
                if !self.awaiting_ready {
                    effects.push(Effect::ArmTimer);
                }
            }

            // Two-way sync with the media resource: if it reports
            // paused, our timer must freeze too.
            (PlaybackState::Playing, PlaybackInput::MediaPaused) => {
                self.state = PlaybackState::Paused;
                effects.push(Effect::CancelTimer);
            }

            (PlaybackState::Paused, PlaybackInput::MediaResumed) => {
                self.state = PlaybackState::Playing;
                if !self.awaiting_ready {
                    effects.push(Effect::ArmTimer);
                }
            }

            (PlaybackState::Playing | PlaybackState::Paused, PlaybackInput::MediaReady) => {
                if self.awaiting_ready {
                    self.awaiting_ready = false;
                    if self.state == PlaybackState::Playing {
                        effects.push(Effect::ArmTimer);
                    }
                }
            }

            (PlaybackState::Playing | PlaybackState::Paused, PlaybackInput::Advance) => {
                self.state = PlaybackState::Transitioning;
                self.leave_item(&mut effects);
                self.do_advance(&mut effects);
            }

            (PlaybackState::Playing | PlaybackState::Paused, PlaybackInput::Retreat) => {
                self.do_retreat(&mut effects);
            }

            (
                PlaybackState::Playing | PlaybackState::Paused,
                PlaybackInput::JumpToStory(index),
            ) => {
                if index < self.stories.len() {
                    self.leave_item(&mut effects);
                    self.story_index = index;
                    self.media_index = 0;
                    self.state = PlaybackState::Playing;
                    self.enter_item(true, &mut effects);
                } else {
                    tracing::warn!(index, "Ignoring jump to out-of-range story");
                }
            }

            (PlaybackState::Closed, PlaybackInput::Close) => {
                // Idempotent: second close emits nothing
            }

            (_, PlaybackInput::Close) => {
                self.do_close(&mut effects);
            }

            // Everything else is a no-op in the current state
            _ => {}
        }

        effects
    }

    /// Accumulate progress for one tick; at 100, transition and advance
    fn tick(&mut self, effects: &mut Vec<Effect>) {
        let duration = self.current_duration_ms() as f64;
        let delta = self.config.tick_ms as f64 / duration * 100.0;
        self.progress = (self.progress + delta).min(100.0);

        if self.progress >= 100.0 {
            self.progress = 100.0;
            self.state = PlaybackState::Transitioning;
            self.leave_item(effects);
            self.do_advance(effects);
        }
    }

    /// Move to the next media item, the next story, or close
    fn do_advance(&mut self, effects: &mut Vec<Effect>) {
        let story_len = self.current_story().media.len();

        if self.media_index + 1 < story_len {
            self.media_index += 1;
        } else if self.story_index + 1 < self.stories.len() {
            self.story_index += 1;
            self.media_index = 0;
        } else {
            // Last media of the last story: the only advance path to Closed
            self.do_close(effects);
            return;
        }

        self.state = PlaybackState::Playing;
        self.enter_item(true, effects);
    }

    /// Step back one media item, or to the previous story's last item
    fn do_retreat(&mut self, effects: &mut Vec<Effect>) {
        if self.media_index == 0 && self.story_index == 0 {
            // Already at the very first item
            return;
        }

        self.leave_item(effects);
        if self.media_index > 0 {
            self.media_index -= 1;
        } else {
            self.story_index -= 1;
            self.media_index = self.current_story().media.len() - 1;
        }

        self.state = PlaybackState::Playing;
        self.enter_item(false, effects);
    }

    /// Effects for entering the current item: progress reset, view
    /// recording, timer arming (deferred for videos until MediaReady).
    fn enter_item(&mut self, record_view: bool, effects: &mut Vec<Effect>) {
        self.progress = 0.0;

        if record_view {
            effects.push(Effect::RecordView {
                story_id: self.current_story().id,
                media_index: self.media_index,
            });
        }

        if self.current_media().kind == MediaKind::Video {
            // Progress start is deferred until the host signals the
            // resource ready; a suspension, not a failure.
            self.awaiting_ready = true;
            effects.push(Effect::CancelTimer);
        } else {
            self.awaiting_ready = false;
            effects.push(Effect::ArmTimer);
        }
    }

    /// Effects for leaving the current item
    fn leave_item(&mut self, effects: &mut Vec<Effect>) {
        if self.current_media().kind == MediaKind::Video {
            effects.push(Effect::ReleaseMedia);
        }
        self.awaiting_ready = false;
    }

    /// Terminal transition; cancels the timer and releases the resource
    fn do_close(&mut self, effects: &mut Vec<Effect>) {
        self.state = PlaybackState::Closed;
        self.awaiting_ready = false;
        effects.push(Effect::CancelTimer);
        effects.push(Effect::ReleaseMedia);
        effects.push(Effect::NotifyClosed);
    }
}
