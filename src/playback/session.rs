//! Playback session driver
//!
//! Wraps the pure [`PlaybackMachine`] with the runtime it deliberately
//! lacks: one tokio timer task feeding ticks, view recording, the host
//! media resource and navigation callbacks. Each session owns exactly
//! one active timer handle at a time; arming always aborts the prior
//! handle first. `close()` is the sole cancellation entry point and is
//! safe to call repeatedly.

use crate::host::Navigator;
use crate::playback::machine::{
    Effect, MachineConfig, PlaybackError, PlaybackInput, PlaybackMachine, PlaybackState,
};
use crate::store::types::{Story, UserId};
use crate::views::ViewTracker;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

/// Control surface for the single active media-playback resource
///
/// Supplied by the host rendering layer. The driver forwards the
/// machine's PauseMedia/ResumeMedia/ReleaseMedia effects here; the
/// host reports resource-initiated pauses back through
/// [`PlaybackSession::media_paused`].
pub trait MediaController: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn release(&self);
}

/// Media controller that ignores all calls (photo-only hosts, tests)
pub struct NullMediaController;

impl MediaController for NullMediaController {
    fn pause(&self) {}
    fn resume(&self) {}
    fn release(&self) {}
}

/// Configuration for a playback session
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub machine: MachineConfig,
    /// Skip an item whose media never becomes ready after this many
    /// milliseconds; None disables the guard
    pub stall_grace_ms: Option<u64>,
}

struct SessionInner {
    machine: Mutex<PlaybackMachine>,
    views: Arc<ViewTracker>,
    navigator: Arc<dyn Navigator>,
    media: Arc<dyn MediaController>,
    viewer: UserId,
    config: SessionConfig,
    /// The single active timer handle; also aborted on drop
    timer: StdMutex<Option<JoinHandle<()>>>,
    /// Bumped on every arm/cancel; stale timer tasks observe it and stop
    timer_generation: AtomicU64,
    /// Guard task skipping items that never report ready
    stall_guard: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionInner {
    /// Feed one input through the machine and apply its effects
    async fn dispatch(self: &Arc<Self>, input: PlaybackInput) {
        let effects = {
            let mut machine = self.machine.lock().await;
            machine.handle(input)
        };
        self.apply_effects(effects).await;
        self.update_stall_guard().await;
    }

    async fn apply_effects(self: &Arc<Self>, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RecordView {
                    story_id,
                    media_index,
                } => {
                    // View recording must never take down playback
                    if let Err(e) = self
                        .views
                        .record_view(&self.viewer, story_id, media_index)
                        .await
                    {
                        tracing::warn!(story_id = %story_id, "Failed to record view: {}", e);
                    }
                }
                Effect::ArmTimer => self.arm_timer(),
                Effect::CancelTimer => self.cancel_timer(),
                Effect::PauseMedia => self.media.pause(),
                Effect::ResumeMedia => self.media.resume(),
                Effect::ReleaseMedia => self.media.release(),
                Effect::NotifyClosed => self.navigator.closed(),
            }
        }
    }

    /// Abort the prior timer handle and arm a fresh one
    fn arm_timer(self: &Arc<Self>) {
        let generation = self.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let tick = Duration::from_millis(self.config.machine.tick_ms);
        let inner = Arc::clone(self);

        let task: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            let mut ticker = interval(tick);
            // The first interval tick completes immediately; consume it
            // so real ticks land one interval apart.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if inner.timer_generation.load(Ordering::SeqCst) != generation {
                    break;
                }

                let effects = {
                    let mut machine = inner.machine.lock().await;
                    machine.handle(PlaybackInput::Tick)
                };
                if effects.is_empty() {
                    continue;
                }

                // A new item re-arms (replacing this task); a close or
                // suspension cancels. Either way this task is done.
                let done = effects
                    .iter()
                    .any(|e| matches!(e, Effect::ArmTimer | Effect::CancelTimer));
                inner.apply_effects(effects).await;
                inner.update_stall_guard().await;
                if done {
                    break;
                }
            }
        });

        let handle = tokio::spawn(task);
        let mut slot = self.timer.lock().unwrap();
        if let Some(old) = slot.replace(handle) {
            // A re-arm from inside the timer task must not abort the
            // caller's own post-effect work; the stale generation
            // already ends that task at its next tick.
            if tokio::task::try_id() != Some(old.id()) {
                old.abort();
            }
        }
    }

    fn cancel_timer(&self) {
        self.timer_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.timer.lock().unwrap().take() {
            if tokio::task::try_id() != Some(handle.id()) {
                handle.abort();
            }
        }
    }

    /// Start or clear the stall guard depending on whether the machine
    /// is waiting for a MediaReady signal
    async fn update_stall_guard(self: &Arc<Self>) {
        let Some(grace_ms) = self.config.stall_grace_ms else {
            return;
        };

        let (awaiting, position) = {
            let machine = self.machine.lock().await;
            (
                machine.awaiting_ready(),
                (machine.story_index(), machine.media_index()),
            )
        };

        let old = {
            let mut slot = self.stall_guard.lock().unwrap();
            slot.take()
        };
        if let Some(handle) = old {
            handle.abort();
        }
        if !awaiting {
            return;
        }

        let inner = Arc::clone(self);
        // Drives the machine directly rather than through dispatch,
        // which would re-arm this guard from inside itself. Looping
        // here also covers consecutive never-ready items.
        let task: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            let mut position = position;
            loop {
                tokio::time::sleep(Duration::from_millis(grace_ms)).await;

                let effects = {
                    let mut machine = inner.machine.lock().await;
                    let stalled = machine.awaiting_ready()
                        && (machine.story_index(), machine.media_index()) == position;
                    if !stalled {
                        break;
                    }
                    tracing::warn!(
                        story_index = position.0,
                        media_index = position.1,
                        "Media never became ready; skipping item"
                    );
                    machine.handle(PlaybackInput::Advance)
                };
                inner.apply_effects(effects).await;

                let machine = inner.machine.lock().await;
                if !machine.awaiting_ready() {
                    break;
                }
                position = (machine.story_index(), machine.media_index());
            }
        });

        let handle = tokio::spawn(task);
        *self.stall_guard.lock().unwrap() = Some(handle);
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.stall_guard.lock().unwrap().take() {
            handle.abort();
        }
    }
}

/// One viewing session over a story snapshot
pub struct PlaybackSession {
    inner: Arc<SessionInner>,
}

impl PlaybackSession {
    /// Start a session for `viewer` over a story snapshot
    ///
    /// The snapshot is owned by the session; stories deleted or expired
    /// afterwards do not interrupt it.
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        stories: Vec<Story>,
        story_index: usize,
        media_index: usize,
        viewer: impl Into<UserId>,
        views: Arc<ViewTracker>,
        navigator: Arc<dyn Navigator>,
        media: Arc<dyn MediaController>,
        config: SessionConfig,
    ) -> Result<Self, PlaybackError> {
        let machine = PlaybackMachine::new(stories, story_index, media_index, config.machine)?;

        let inner = Arc::new(SessionInner {
            machine: Mutex::new(machine),
            views,
            navigator,
            media,
            viewer: viewer.into(),
            config,
            timer: StdMutex::new(None),
            timer_generation: AtomicU64::new(0),
            stall_guard: StdMutex::new(None),
        });

        inner.dispatch(PlaybackInput::Start).await;
        Ok(Self { inner })
    }

    pub async fn pause(&self) {
        self.inner.dispatch(PlaybackInput::Pause).await;
    }

    pub async fn resume(&self) {
        self.inner.dispatch(PlaybackInput::Resume).await;
    }

    pub async fn advance(&self) {
        self.inner.dispatch(PlaybackInput::Advance).await;
    }

    pub async fn retreat(&self) {
        self.inner.dispatch(PlaybackInput::Retreat).await;
    }

    pub async fn jump_to_story(&self, index: usize) {
        self.inner.dispatch(PlaybackInput::JumpToStory(index)).await;
    }

    /// Host signal: the current media resource finished loading
    pub async fn media_ready(&self) {
        self.inner.dispatch(PlaybackInput::MediaReady).await;
    }

    /// Host signal: the media resource paused itself
    pub async fn media_paused(&self) {
        self.inner.dispatch(PlaybackInput::MediaPaused).await;
    }

    /// Host signal: the media resource resumed
    pub async fn media_resumed(&self) {
        self.inner.dispatch(PlaybackInput::MediaResumed).await;
    }

    /// End the session; idempotent
    pub async fn close(&self) {
        self.inner.dispatch(PlaybackInput::Close).await;
    }

    pub async fn state(&self) -> PlaybackState {
        self.inner.machine.lock().await.state()
    }

    pub async fn progress(&self) -> f64 {
        self.inner.machine.lock().await.progress()
    }

    /// Current (story index, media index)
    pub async fn position(&self) -> (usize, usize) {
        let machine = self.inner.machine.lock().await;
        (machine.story_index(), machine.media_index())
    }

    pub async fn is_closed(&self) -> bool {
        self.state().await == PlaybackState::Closed
    }

    /// How many times a timer has been armed or cancelled; each new
    /// media item bumps this exactly once
    pub fn timer_generation(&self) -> u64 {
        self.inner.timer_generation.load(Ordering::SeqCst)
    }

    /// Whether a timer task is currently held
    pub fn has_active_timer(&self) -> bool {
        self.inner
            .timer
            .lock()
            .unwrap()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticIdentity;
    use crate::store::kv::MemoryKv;
    use crate::store::types::MediaItem;
    use crate::store::{StoreConfig, StoryStore};
    use std::sync::atomic::AtomicUsize;

    struct CountingNavigator {
        closed: AtomicUsize,
    }

    impl CountingNavigator {
        fn new() -> Self {
            Self {
                closed: AtomicUsize::new(0),
            }
        }

        fn closed_count(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl Navigator for CountingNavigator {
        fn open_stories(&self, _author_id: &str) {}
        fn closed(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct RecordingMedia {
        pauses: AtomicUsize,
        resumes: AtomicUsize,
        releases: AtomicUsize,
    }

    impl RecordingMedia {
        fn new() -> Self {
            Self {
                pauses: AtomicUsize::new(0),
                resumes: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            }
        }
    }

    impl MediaController for RecordingMedia {
        fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
        fn resume(&self) {
            self.resumes.fetch_add(1, Ordering::SeqCst);
        }
        fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        store: Arc<StoryStore>,
        views: Arc<ViewTracker>,
        identity: Arc<StaticIdentity>,
        navigator: Arc<CountingNavigator>,
        media: Arc<RecordingMedia>,
    }

    async fn fixture() -> Fixture {
        let kv: Arc<MemoryKv> = Arc::new(MemoryKv::new());
        let identity = Arc::new(StaticIdentity::signed_in("alice"));
        let store = Arc::new(
            StoryStore::open(kv.clone(), identity.clone(), StoreConfig::default())
                .await
                .unwrap(),
        );
        let views = Arc::new(
            ViewTracker::open(kv, store.clone(), identity.clone())
                .await
                .unwrap(),
        );
        Fixture {
            store,
            views,
            identity,
            navigator: Arc::new(CountingNavigator::new()),
            media: Arc::new(RecordingMedia::new()),
        }
    }

    impl Fixture {
        async fn session(
            &self,
            stories: Vec<Story>,
            viewer: &str,
            config: SessionConfig,
        ) -> PlaybackSession {
            self.identity.set_user(Some(viewer.to_string()));
            PlaybackSession::start(
                stories,
                0,
                0,
                viewer,
                self.views.clone(),
                self.navigator.clone(),
                self.media.clone(),
                config,
            )
            .await
            .unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_photo_story_runs_to_closed() {
        let fx = fixture().await;
        let story = fx
            .store
            .create("alice", vec![MediaItem::photo("p")])
            .await
            .unwrap();

        let session = fx
            .session(vec![story.clone()], "bob", SessionConfig::default())
            .await;
        assert_eq!(session.state().await, PlaybackState::Playing);

        // 5s photo plus slack; the paused clock fires ticks virtually
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(session.is_closed().await);
        assert_eq!(fx.navigator.closed_count(), 1);

        // The start-of-item view was recorded for the viewer
        let stored = fx.store.get(story.id).await.unwrap();
        assert!(stored.viewed_by.contains("bob"));
        assert_eq!(fx.views.get("bob", story.id).await.unwrap().media_index, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_progress_across_wall_clock() {
        let fx = fixture().await;
        let story = fx
            .store
            .create("alice", vec![MediaItem::photo("p")])
            .await
            .unwrap();
        let session = fx
            .session(vec![story], "bob", SessionConfig::default())
            .await;

        tokio::time::sleep(Duration::from_millis(1000)).await;
        session.pause().await;
        let at_pause = session.progress().await;
        assert!(at_pause > 0.0 && at_pause < 100.0);

        // Wall-clock time while paused must not advance progress
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(session.progress().await, at_pause);
        assert_eq!(session.state().await, PlaybackState::Paused);

        session.resume().await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(session.progress().await > at_pause);
        assert!(!session.is_closed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_timer_handle_per_item() {
        let fx = fixture().await;
        let story = fx
            .store
            .create(
                "alice",
                vec![
                    MediaItem::photo("a"),
                    MediaItem::photo("b"),
                    MediaItem::photo("c"),
                ],
            )
            .await
            .unwrap();
        let session = fx
            .session(vec![story], "bob", SessionConfig::default())
            .await;

        assert!(session.has_active_timer());
        let after_start = session.timer_generation();
        assert_eq!(after_start, 1);

        // Each user advance cancels the prior timer and arms one new one
        session.advance().await;
        assert_eq!(session.timer_generation(), 2);
        assert!(session.has_active_timer());

        session.advance().await;
        assert_eq!(session.timer_generation(), 3);

        session.close().await;
        assert!(!session.has_active_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_reentrant_and_releases() {
        let fx = fixture().await;
        let story = fx
            .store
            .create("alice", vec![MediaItem::video("v", "t", 10.0)])
            .await
            .unwrap();
        let session = fx
            .session(vec![story], "bob", SessionConfig::default())
            .await;

        session.close().await;
        session.close().await;

        assert!(session.is_closed().await);
        assert_eq!(fx.navigator.closed_count(), 1);
        assert_eq!(fx.media.releases.load(Ordering::SeqCst), 1);
        assert!(!session.has_active_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_waits_for_ready_signal() {
        let fx = fixture().await;
        let story = fx
            .store
            .create("alice", vec![MediaItem::video("v", "t", 2.0)])
            .await
            .unwrap();
        let session = fx
            .session(vec![story], "bob", SessionConfig::default())
            .await;

        // No ready signal: progress stays parked
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(session.progress().await, 0.0);
        assert!(!session.is_closed().await);

        session.media_ready().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(session.is_closed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_grace_skips_stuck_item() {
        let fx = fixture().await;
        let story = fx
            .store
            .create(
                "alice",
                vec![MediaItem::video("v", "t", 10.0), MediaItem::photo("p")],
            )
            .await
            .unwrap();

        let config = SessionConfig {
            stall_grace_ms: Some(500),
            ..Default::default()
        };
        let session = fx.session(vec![story], "bob", config).await;
        assert_eq!(session.position().await, (0, 0));

        // Never send media_ready; the guard skips to the photo
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(session.position().await, (0, 1));
        assert_eq!(session.state().await, PlaybackState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_guard_covers_tick_entered_items() {
        let fx = fixture().await;
        let story = fx
            .store
            .create(
                "alice",
                vec![
                    MediaItem::photo("p"),
                    MediaItem::video("v1", "t1", 10.0),
                    MediaItem::video("v2", "t2", 10.0),
                ],
            )
            .await
            .unwrap();

        let config = SessionConfig {
            stall_grace_ms: Some(500),
            ..Default::default()
        };
        let session = fx.session(vec![story], "bob", config).await;

        // The photo finishes by ticks; the timer task itself enters
        // the first video and arms the guard
        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert_eq!(session.position().await, (0, 1));
        assert_eq!(session.progress().await, 0.0);

        // Neither video ever reports ready: the guard skips the first...
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(session.position().await, (0, 2));

        // ...and then the second, which ends the session
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(session.is_closed().await);
        assert_eq!(fx.navigator.closed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_while_stalled_stops_guard() {
        let fx = fixture().await;
        let story = fx
            .store
            .create(
                "alice",
                vec![MediaItem::video("v", "t", 10.0), MediaItem::photo("p")],
            )
            .await
            .unwrap();

        let config = SessionConfig {
            stall_grace_ms: Some(500),
            ..Default::default()
        };
        let session = fx.session(vec![story], "bob", config).await;

        session.close().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        // No skip fires after close; the session stays where it ended
        assert!(session.is_closed().await);
        assert_eq!(session.position().await, (0, 0));
        assert_eq!(fx.navigator.closed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_pause_resume_controls_resource() {
        let fx = fixture().await;
        let story = fx
            .store
            .create("alice", vec![MediaItem::video("v", "t", 10.0)])
            .await
            .unwrap();
        let session = fx
            .session(vec![story], "bob", SessionConfig::default())
            .await;
        session.media_ready().await;

        session.pause().await;
        assert_eq!(fx.media.pauses.load(Ordering::SeqCst), 1);

        session.resume().await;
        assert_eq!(fx.media.resumes.load(Ordering::SeqCst), 1);

        // Resource-initiated pause syncs the timer without echoing a
        // pause back to the resource
        session.media_paused().await;
        assert_eq!(session.state().await, PlaybackState::Paused);
        assert_eq!(fx.media.pauses.load(Ordering::SeqCst), 1);

        session.media_resumed().await;
        assert_eq!(session.state().await, PlaybackState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_survives_story_deletion() {
        let fx = fixture().await;
        let story = fx
            .store
            .create("alice", vec![MediaItem::photo("a"), MediaItem::photo("b")])
            .await
            .unwrap();
        let session = fx
            .session(vec![story.clone()], "bob", SessionConfig::default())
            .await;

        // Author deletes the story while bob is watching
        fx.identity.set_user(Some("alice".to_string()));
        fx.store.delete(story.id, "alice").await.unwrap();
        fx.identity.set_user(Some("bob".to_string()));

        // The session continues against its snapshot
        session.advance().await;
        assert_eq!(session.position().await, (0, 1));
        assert!(!session.is_closed().await);

        session.advance().await;
        assert!(session.is_closed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jump_between_stories() {
        let fx = fixture().await;
        let s1 = fx
            .store
            .create("alice", vec![MediaItem::photo("a")])
            .await
            .unwrap();
        fx.identity.set_user(Some("carol".to_string()));
        let s2 = fx
            .store
            .create("carol", vec![MediaItem::photo("b")])
            .await
            .unwrap();

        let session = fx.session(vec![s1, s2.clone()], "bob", SessionConfig::default()).await;
        session.jump_to_story(1).await;

        assert_eq!(session.position().await, (1, 0));
        let stored = fx.store.get(s2.id).await.unwrap();
        assert!(stored.viewed_by.contains("bob"));
    }
}
