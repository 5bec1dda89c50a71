//! Integration tests for the media session
//!
//! This test suite verifies:
//! - Request handling against a recording provider
//! - Request/event matching through the request queue
//! - Reset boundaries (source change, provider detach)
//! - Loop, replay and autoplay flows
//! - Idle, waiting and seeking timers under a paused clock

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, FullscreenAdapter, MediaErrorDetail, MediaProvider, MediaSource,
    OrientationLockType, ProviderEvent, ProviderEventKind, ProviderKind,
    ScreenOrientationAdapter, TimeRanges,
};
use core_async::sync::mpsc;
use core_playback::{MediaSession, PlaybackConfig, PlaybackError};
use core_runtime::config::CoreConfig;
use core_runtime::events::{
    EventStream, FullscreenTarget, MediaEvent, MediaEventDetail, RequestCategory, RequestEvent,
    RequestKind, RequestOrigin, UserInputKind,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

// ============================================================================
// Recording provider
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Play,
    Pause,
    SetCurrentTime(f64),
    SetVolume(f64),
    SetMuted(bool),
}

#[derive(Default)]
struct FakeProvider {
    calls: Mutex<Vec<Call>>,
    reject_play: AtomicBool,
    reject_pause: AtomicBool,
    fullscreen: Option<Arc<FakeFullscreen>>,
    derives_can_play: bool,
    /// `play()` settles only once notified.
    gate: Option<Arc<Notify>>,
}

impl FakeProvider {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl MediaProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Video
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record(Call::Play);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.reject_play.load(Ordering::SeqCst) {
            return Err(BridgeError::Rejected("NotAllowedError".to_string()));
        }
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record(Call::Pause);
        if self.reject_pause.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("pause interrupted".to_string()));
        }
        Ok(())
    }

    fn set_current_time(&self, time: f64) {
        self.record(Call::SetCurrentTime(time));
    }

    fn set_volume(&self, volume: f64) {
        self.record(Call::SetVolume(volume));
    }

    fn set_muted(&self, muted: bool) {
        self.record(Call::SetMuted(muted));
    }

    fn fullscreen(&self) -> Option<Arc<dyn FullscreenAdapter>> {
        self.fullscreen
            .clone()
            .map(|adapter| adapter as Arc<dyn FullscreenAdapter>)
    }

    fn emits_can_play(&self) -> bool {
        !self.derives_can_play
    }
}

// ============================================================================
// Fullscreen and orientation fakes
// ============================================================================

#[derive(Default)]
struct FakeFullscreen {
    supported: bool,
    reject: bool,
    active: AtomicBool,
    /// `enter()` settles only once notified.
    gate: Option<Arc<Notify>>,
}

impl FakeFullscreen {
    fn supported() -> Arc<Self> {
        Arc::new(Self {
            supported: true,
            ..Self::default()
        })
    }
}

#[async_trait]
impl FullscreenAdapter for FakeFullscreen {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> BridgeResult<()> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.reject {
            return Err(BridgeError::Rejected("no user gesture".to_string()));
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn exit(&self) -> BridgeResult<()> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FakeOrientation {
    locked: AtomicBool,
}

#[async_trait]
impl ScreenOrientationAdapter for FakeOrientation {
    fn is_supported(&self) -> bool {
        true
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    async fn lock(&self, _lock_type: OrientationLockType) -> BridgeResult<()> {
        self.locked.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unlock(&self) -> BridgeResult<()> {
        self.locked.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn core_config() -> CoreConfig {
    CoreConfig::builder().event_buffer_size(256).build().unwrap()
}

fn attached_with(
    config: PlaybackConfig,
    core_config: CoreConfig,
    provider: FakeProvider,
) -> (MediaSession, Arc<FakeProvider>) {
    let session = MediaSession::new(config, core_config).unwrap();
    let provider = Arc::new(provider);
    session.attach_provider(provider.clone());
    (session, provider)
}

fn attached() -> (MediaSession, Arc<FakeProvider>) {
    attached_with(
        PlaybackConfig::default(),
        core_config(),
        FakeProvider::default(),
    )
}

/// Drives the engine's loading sequence up to `can-play` (duration 10s).
fn load(session: &MediaSession) {
    session.dispatch(ProviderEvent::CanLoad);
    session.dispatch(ProviderEvent::SourceChange(Some(MediaSource::new("movie.mp4"))));
    session.dispatch(ProviderEvent::LoadStart);
    session.dispatch(ProviderEvent::DurationChange(10.0));
    session.dispatch(ProviderEvent::LoadedMetadata);
    session.dispatch(ProviderEvent::LoadedData);
    session.dispatch(ProviderEvent::CanPlay { duration: 10.0 });
}

fn ready() -> (MediaSession, Arc<FakeProvider>) {
    let (session, provider) = attached();
    load(&session);
    (session, provider)
}

fn drain(events: &mut EventStream) -> Vec<Arc<MediaEvent>> {
    let mut drained = Vec::new();
    while let Some(Ok(event)) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn names(events: &[Arc<MediaEvent>]) -> Vec<String> {
    events.iter().map(|event| event.name().to_string()).collect()
}

/// Yields until a spawned request has parked itself in `category`'s slot.
async fn until_pending(session: &MediaSession, category: RequestCategory) {
    while session.pending(category).is_none() {
        tokio::task::yield_now().await;
    }
}

fn find<'a>(events: &'a [Arc<MediaEvent>], name: &str) -> &'a Arc<MediaEvent> {
    events
        .iter()
        .find(|event| event.name() == name)
        .unwrap_or_else(|| panic!("no {name} event in {:?}", names(events)))
}

// ============================================================================
// Session construction
// ============================================================================

#[test]
fn test_invalid_config_is_rejected() {
    let config = PlaybackConfig {
        unmute_volume: 0.0,
        ..PlaybackConfig::default()
    };
    let result = MediaSession::new(config, core_config());
    assert!(matches!(result, Err(PlaybackError::Config(_))));
}

#[test]
fn test_session_starts_paused_with_preferences() {
    let config = PlaybackConfig {
        loop_playback: true,
        ..PlaybackConfig::default()
    };
    let session = MediaSession::new(config, core_config()).unwrap();

    let state = session.state();
    assert!(state.paused);
    assert!(!state.can_play);
    assert!(state.loop_playback);
}

// ============================================================================
// Play / Pause
// ============================================================================

#[tokio::test]
async fn test_play_before_ready_publishes_play_fail() {
    let (session, provider) = attached();
    let mut events = session.subscribe();

    let result = session.requests().play().await;

    assert!(matches!(result, Err(PlaybackError::NotReady(_))));
    let events = drain(&mut events);
    assert_eq!(names(&events), vec!["play-fail"]);
    assert!(events[0].request.is_some());
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_play_request_is_served_by_engine_play() {
    let (session, provider) = ready();
    let mut events = session.subscribe();

    let request = RequestEvent::user(RequestKind::Play).with_label("play-button");
    let request_id = request.id;
    session.request(request).await.unwrap();

    assert_eq!(provider.calls(), vec![Call::Play]);
    assert!(session.pending(RequestCategory::Play).is_some());

    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);

    let events = drain(&mut events);
    assert_eq!(names(&events), vec!["play", "playing", "started"]);
    assert_eq!(events[0].request.as_ref().map(|r| r.id), Some(request_id));
    assert_eq!(
        events[0].request.as_ref().map(|r| r.origin),
        Some(RequestOrigin::User)
    );
    assert!(session.pending(RequestCategory::Play).is_none());

    let state = session.state();
    assert!(state.playing);
    assert!(!state.paused);
    assert!(state.started);
}

#[tokio::test]
async fn test_redundant_play_does_not_call_provider() {
    let (session, provider) = ready();
    session.requests().play().await.unwrap();
    session.dispatch(ProviderEvent::Play);

    session.requests().play().await.unwrap();

    assert_eq!(provider.calls(), vec![Call::Play]);
}

#[tokio::test]
async fn test_rejected_play_surfaces_failure() {
    let (session, provider) = ready();
    provider.reject_play.store(true, Ordering::SeqCst);
    let mut events = session.subscribe();

    let result = session.requests().play().await;

    match result {
        Err(PlaybackError::Playback { cause, autoplay }) => {
            assert!(cause.message.contains("NotAllowedError"));
            assert!(!autoplay);
        }
        other => panic!("expected playback error, got {other:?}"),
    }
    let events = drain(&mut events);
    assert_eq!(names(&events), vec!["play-fail"]);
    assert!(events[0].request.is_some());
    assert!(session.pending(RequestCategory::Play).is_none());
    assert!(session.state().paused);
}

#[tokio::test]
async fn test_pause_failure_is_absorbed() {
    let (session, provider) = ready();
    session.dispatch(ProviderEvent::Play);
    provider.reject_pause.store(true, Ordering::SeqCst);
    let mut events = session.subscribe();

    session.requests().pause().await.unwrap();

    assert!(session.pending(RequestCategory::Pause).is_none());
    assert!(drain(&mut events).is_empty());
    assert_eq!(session.queue_stats().deleted, 1);
}

#[tokio::test]
async fn test_pause_before_ready_is_silent() {
    let (session, provider) = attached();
    let mut events = session.subscribe();

    let result = session.requests().pause().await;

    assert!(matches!(result, Err(PlaybackError::NotReady(_))));
    assert!(drain(&mut events).is_empty());
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_one_pending_record_per_category() {
    let (session, _provider) = ready();
    session.dispatch(ProviderEvent::Play);

    let first = RequestEvent::new(RequestKind::Pause);
    let second = RequestEvent::new(RequestKind::Pause);
    let second_id = second.id;
    session.request(first).await.unwrap();
    session.request(second).await.unwrap();

    assert_eq!(
        session.pending(RequestCategory::Pause).map(|r| r.id),
        Some(second_id)
    );
    assert_eq!(session.queue_stats().superseded, 1);
}

// ============================================================================
// Seeking
// ============================================================================

#[tokio::test]
async fn test_seek_near_end_snaps_to_duration() {
    let (session, provider) = ready();

    session.requests().seek(9.9).await.unwrap();
    session.requests().seek(5.0).await.unwrap();

    assert_eq!(
        provider.calls(),
        vec![Call::SetCurrentTime(10.0), Call::SetCurrentTime(5.0)]
    );
    let pending = session.pending(RequestCategory::Seeked).unwrap();
    assert_eq!(pending.kind, RequestKind::Seek(5.0));
}

#[tokio::test]
async fn test_non_finite_seek_is_invalid() {
    let (session, provider) = ready();
    let result = session.requests().seek(f64::NAN).await;
    assert!(matches!(result, Err(PlaybackError::InvalidRequest(_))));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_scrub_suppresses_seeked_until_commit() {
    let (session, provider) = ready();
    let mut events = session.subscribe();

    session.requests().seeking(3.0).await.unwrap();
    assert!(session.flags().seeking);
    assert!(session.state().seeking);
    assert!(provider.calls().is_empty());

    session.dispatch(ProviderEvent::Seeked(3.0));
    assert!(drain(&mut events).is_empty());

    session.requests().seek(3.0).await.unwrap();
    assert!(!session.flags().seeking);
    session.dispatch(ProviderEvent::Seeking(3.0));
    session.dispatch(ProviderEvent::Seeked(3.0));

    let events = drain(&mut events);
    let seeked = find(&events, "seeked");
    assert_eq!(
        seeked.request.as_ref().map(|r| r.kind.clone()),
        Some(RequestKind::Seek(3.0))
    );
    assert!(seeked.is_triggered_by(ProviderEventKind::Seeking));
    assert!(!session.state().seeking);
    assert_eq!(session.state().current_time, 3.0);
}

#[tokio::test]
async fn test_seek_after_end_replays() {
    let (session, _provider) = ready();
    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);
    session.dispatch(ProviderEvent::Pause);
    session.dispatch(ProviderEvent::Ended);
    assert!(session.state().ended);

    session.requests().seek(0.0).await.unwrap();
    assert!(session.flags().replaying);
    session.dispatch(ProviderEvent::Seeking(0.0));
    session.dispatch(ProviderEvent::Seeked(0.0));
    assert!(!session.state().ended);

    let mut events = session.subscribe();
    session.requests().play().await.unwrap();
    session.dispatch(ProviderEvent::Play);

    assert_eq!(names(&drain(&mut events)), vec!["play", "replay"]);
    assert!(!session.flags().replaying);
}

#[tokio::test(start_paused = true)]
async fn test_seeking_events_are_throttled() {
    let (session, _provider) = ready();
    let mut events = session.subscribe();

    session.dispatch(ProviderEvent::Seeking(1.0));
    session.dispatch(ProviderEvent::Seeking(2.0));
    sleep(Duration::from_millis(150)).await;
    session.dispatch(ProviderEvent::Seeking(3.0));

    assert_eq!(names(&drain(&mut events)), vec!["seeking", "seeking"]);
    assert_eq!(session.state().current_time, 3.0);
}

// ============================================================================
// Volume
// ============================================================================

#[tokio::test]
async fn test_mute_at_zero_volume_restores_audible_volume() {
    let (session, provider) = ready();
    session.dispatch(ProviderEvent::VolumeChange {
        volume: 0.0,
        muted: false,
    });

    session.requests().mute().await.unwrap();

    let stats = session.queue_stats();
    assert_eq!(stats.enqueued, 2);
    assert_eq!(stats.superseded, 1);
    assert_eq!(
        provider.calls(),
        vec![Call::SetMuted(true), Call::SetVolume(0.25)]
    );

    session.dispatch(ProviderEvent::VolumeChange {
        volume: 0.0,
        muted: true,
    });
    session.dispatch(ProviderEvent::VolumeChange {
        volume: 0.25,
        muted: true,
    });

    let state = session.state();
    assert!(state.muted);
    assert_eq!(state.volume, 0.25);
    assert!(session.pending(RequestCategory::Volume).is_none());
}

#[tokio::test]
async fn test_volume_change_clamps_and_unmutes() {
    let (session, provider) = ready();
    session.dispatch(ProviderEvent::VolumeChange {
        volume: 0.5,
        muted: true,
    });

    session.requests().set_volume(1.5).await.unwrap();

    assert_eq!(
        provider.calls(),
        vec![Call::SetVolume(1.0), Call::SetMuted(false)]
    );
}

#[tokio::test]
async fn test_unchanged_volume_is_noop() {
    let (session, provider) = ready();
    session.requests().set_volume(1.0).await.unwrap();
    session.requests().unmute().await.unwrap();
    assert!(provider.calls().is_empty());
    assert_eq!(session.queue_stats().enqueued, 0);
}

// ============================================================================
// Loading and readiness
// ============================================================================

#[tokio::test]
async fn test_start_loading_is_served_by_can_load() {
    let (session, _provider) = attached();
    let mut events = session.subscribe();

    session.requests().start_loading().await.unwrap();
    session.requests().start_loading().await.unwrap();

    let events = drain(&mut events);
    assert_eq!(names(&events), vec!["can-load"]);
    assert!(events[0].request.is_some());
    assert!(session.state().can_load);
}

#[tokio::test]
async fn test_engine_without_can_play_is_ready_after_metadata() {
    let (session, _provider) = attached_with(
        PlaybackConfig::default(),
        core_config(),
        FakeProvider {
            derives_can_play: true,
            ..FakeProvider::default()
        },
    );
    let mut events = session.subscribe();

    session.dispatch(ProviderEvent::CanLoad);
    session.dispatch(ProviderEvent::LoadStart);
    session.dispatch(ProviderEvent::DurationChange(30.0));
    session.dispatch(ProviderEvent::LoadedMetadata);

    let events = drain(&mut events);
    let can_play = find(&events, "can-play");
    assert!(can_play.is_triggered_by(ProviderEventKind::LoadedMetadata));
    assert!(session.state().can_play);
    assert_eq!(session.state().duration, 30.0);
}

#[tokio::test]
async fn test_trigger_chain_reaches_source_change() {
    let (session, _provider) = attached();
    let mut events = session.subscribe();
    load(&session);

    let events = drain(&mut events);
    let can_play = find(&events, "can-play");
    assert_eq!(can_play.origin().name(), "source-change");
}

// ============================================================================
// Reset boundaries
// ============================================================================

#[tokio::test]
async fn test_source_change_resets_media_state() {
    let (session, _provider) = ready();
    session.dispatch(ProviderEvent::VolumeChange {
        volume: 0.5,
        muted: false,
    });
    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);
    session.dispatch(ProviderEvent::TimeUpdate {
        current_time: 4.0,
        played: TimeRanges::from_ranges([(0.0, 4.0)]),
    });

    session.dispatch(ProviderEvent::SourceChange(Some(MediaSource::new("next.mp4"))));

    let state = session.state();
    assert!(state.paused);
    assert!(!state.playing);
    assert!(!state.started);
    assert!(!state.can_play);
    assert_eq!(state.current_time, 0.0);
    assert!(state.played.is_empty());
    assert_eq!(state.volume, 0.5);
    assert_eq!(state.source, Some(MediaSource::new("next.mp4")));

    let result = session.requests().play().await;
    assert!(matches!(result, Err(PlaybackError::NotReady(_))));
}

#[tokio::test]
async fn test_detach_drains_pending_requests() {
    let (session, _provider) = ready();
    session.requests().play().await.unwrap();
    assert!(session.pending(RequestCategory::Play).is_some());

    session.detach_provider();

    assert!(session.pending(RequestCategory::Play).is_none());
    assert!(!session.state().can_play);
    assert!(!session.state().can_load);
    let result = session.requests().seek(1.0).await;
    assert!(matches!(result, Err(PlaybackError::NotReady(_))));
}

#[tokio::test]
async fn test_play_rejected_after_source_change_leaves_no_stale_request() {
    let gate = Arc::new(Notify::new());
    let provider = FakeProvider {
        reject_play: AtomicBool::new(true),
        gate: Some(gate.clone()),
        ..FakeProvider::default()
    };
    let (session, _provider) = attached_with(PlaybackConfig::default(), core_config(), provider);
    load(&session);
    let mut events = session.subscribe();

    let request = RequestEvent::new(RequestKind::Play);
    let request_id = request.id;
    let play = tokio::spawn({
        let session = session.clone();
        async move { session.request(request).await }
    });
    until_pending(&session, RequestCategory::Play).await;

    session.dispatch(ProviderEvent::SourceChange(Some(MediaSource::new("next.mp4"))));
    gate.notify_one();

    let result = play.await.unwrap();
    assert!(matches!(
        result,
        Err(PlaybackError::Playback {
            autoplay: false,
            ..
        })
    ));
    assert!(session.pending(RequestCategory::Play).is_none());

    let published = drain(&mut events);
    assert_eq!(names(&published), vec!["source-change", "play-fail"]);
    let failure = find(&published, "play-fail");
    assert_eq!(failure.request.as_ref().map(|r| r.id), Some(request_id));

    session.dispatch(ProviderEvent::LoadStart);
    session.dispatch(ProviderEvent::LoadedData);
    session.dispatch(ProviderEvent::CanPlay { duration: 5.0 });
    session.dispatch(ProviderEvent::Play);

    let published = drain(&mut events);
    assert!(find(&published, "play").request.is_none());
    assert!(!session.state().paused);
}

#[tokio::test]
async fn test_play_rejected_after_detach_is_still_surfaced() {
    let gate = Arc::new(Notify::new());
    let provider = FakeProvider {
        reject_play: AtomicBool::new(true),
        gate: Some(gate.clone()),
        ..FakeProvider::default()
    };
    let (session, _provider) = attached_with(PlaybackConfig::default(), core_config(), provider);
    load(&session);
    let mut events = session.subscribe();

    let play = tokio::spawn({
        let session = session.clone();
        async move { session.requests().play().await }
    });
    until_pending(&session, RequestCategory::Play).await;

    session.detach_provider();
    gate.notify_one();

    assert!(play.await.unwrap().is_err());
    assert!(session.pending(RequestCategory::Play).is_none());
    let published = drain(&mut events);
    assert_eq!(names(&published), vec!["play-fail"]);
    assert!(published[0].request.is_some());
}

// ============================================================================
// Loop / Autoplay
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_loop_restarts_without_second_start() {
    let config = PlaybackConfig {
        loop_playback: true,
        ..PlaybackConfig::default()
    };
    let (session, provider) = attached_with(config, core_config(), FakeProvider::default());
    load(&session);
    let mut events = session.subscribe();

    session.requests().play().await.unwrap();
    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);
    session.dispatch(ProviderEvent::Pause);
    session.dispatch(ProviderEvent::Ended);
    assert!(!session.state().ended);

    session.tick().await;

    assert!(session.flags().looping);
    assert_eq!(
        provider.calls(),
        vec![Call::Play, Call::SetCurrentTime(0.0), Call::Play]
    );

    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);

    let events = drain(&mut events);
    assert_eq!(
        names(&events),
        vec!["play", "playing", "started", "pause", "playing", "replay"]
    );
    assert!(!session.flags().looping);
    assert!(!session.flags().replaying);
    assert!(session.state().playing);
}

#[tokio::test(start_paused = true)]
async fn test_loop_aborts_after_source_change() {
    let (session, provider) = ready();
    let loop_request = tokio::spawn({
        let session = session.clone();
        async move { session.requests().request_loop().await }
    });
    tokio::task::yield_now().await;

    session.dispatch(ProviderEvent::SourceChange(Some(MediaSource::new("next.mp4"))));
    loop_request.await.unwrap().unwrap();

    assert!(provider.calls().is_empty());
    assert!(!session.flags().looping);
}

#[tokio::test]
async fn test_autoplay_success() {
    let config = PlaybackConfig {
        autoplay: true,
        ..PlaybackConfig::default()
    };
    let (session, provider) = attached_with(config, core_config(), FakeProvider::default());
    load(&session);
    let mut events = session.subscribe();

    session.tick().await;
    assert_eq!(provider.calls(), vec![Call::Play]);
    assert!(session.state().attempting_autoplay);

    session.dispatch(ProviderEvent::Play);

    let events = drain(&mut events);
    assert_eq!(names(&events), vec!["play", "autoplay"]);
    assert!(events[0].autoplay);
    assert_eq!(
        events[0].request.as_ref().map(|r| r.origin),
        Some(RequestOrigin::Internal)
    );
    assert!(!session.state().attempting_autoplay);
}

#[tokio::test]
async fn test_autoplay_failure_is_recorded() {
    let config = PlaybackConfig {
        autoplay: true,
        ..PlaybackConfig::default()
    };
    let provider = FakeProvider::default();
    provider.reject_play.store(true, Ordering::SeqCst);
    let (session, _provider) = attached_with(config, core_config(), provider);
    load(&session);
    let mut events = session.subscribe();

    session.tick().await;

    let events = drain(&mut events);
    assert_eq!(names(&events), vec!["play-fail", "autoplay-fail"]);
    let state = session.state();
    assert!(!state.attempting_autoplay);
    assert!(state.autoplay_error.is_some());
    assert!(state.paused);
}

// ============================================================================
// Waiting debounce
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_seek_during_waiting_debounce_drops_waiting() {
    let (session, _provider) = ready();
    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);
    let mut events = session.subscribe();

    session.dispatch(ProviderEvent::Waiting);
    sleep(Duration::from_millis(100)).await;
    session.requests().seek(5.0).await.unwrap();
    sleep(Duration::from_millis(250)).await;

    assert!(session.pending(RequestCategory::Seeked).is_some());
    assert!(drain(&mut events).is_empty());
    let state = session.state();
    assert!(!state.waiting);
    assert!(state.playing);
}

#[tokio::test(start_paused = true)]
async fn test_scrub_during_waiting_debounce_drops_waiting() {
    let (session, _provider) = ready();
    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);
    let mut events = session.subscribe();

    session.dispatch(ProviderEvent::Waiting);
    sleep(Duration::from_millis(100)).await;
    session.requests().seeking(3.0).await.unwrap();
    sleep(Duration::from_millis(250)).await;

    assert!(names(&drain(&mut events)).iter().all(|name| name != "waiting"));
    assert!(!session.state().waiting);
}

#[tokio::test(start_paused = true)]
async fn test_waiting_is_debounced() {
    let (session, _provider) = ready();
    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);
    let mut events = session.subscribe();

    session.dispatch(ProviderEvent::Waiting);
    sleep(Duration::from_millis(299)).await;
    assert!(drain(&mut events).is_empty());

    sleep(Duration::from_millis(2)).await;
    assert_eq!(names(&drain(&mut events)), vec!["waiting"]);
    let state = session.state();
    assert!(state.waiting);
    assert!(!state.playing);
}

#[tokio::test(start_paused = true)]
async fn test_short_stall_never_publishes_waiting() {
    let (session, _provider) = ready();
    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);
    let mut events = session.subscribe();

    session.dispatch(ProviderEvent::Waiting);
    sleep(Duration::from_millis(100)).await;
    session.dispatch(ProviderEvent::Playing);
    sleep(Duration::from_millis(500)).await;

    assert_eq!(names(&drain(&mut events)), vec!["playing"]);
    assert!(!session.state().waiting);
}

// ============================================================================
// Idle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_after_exact_delay() {
    let (session, _provider) = ready();
    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);
    let mut events = session.subscribe();

    session.handle_user_input(UserInputKind::PointerMove);
    assert!(!session.idle_state().idling);

    sleep(Duration::from_millis(1999)).await;
    assert!(!session.idle_state().idling);

    sleep(Duration::from_millis(2)).await;
    assert!(session.idle_state().idling);

    let events = drain(&mut events);
    let changes: Vec<_> = events
        .iter()
        .filter_map(|event| match &event.detail {
            MediaEventDetail::UserIdleChange { idle } => Some(*idle),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![false, true]);
    assert_eq!(events[0].origin().name(), "pointer-move");
}

#[tokio::test(start_paused = true)]
async fn test_pause_forces_idle_immediately() {
    let (session, _provider) = ready();
    session.dispatch(ProviderEvent::Play);
    session.dispatch(ProviderEvent::Playing);
    session.handle_user_input(UserInputKind::KeyDown);
    sleep(Duration::from_millis(500)).await;
    assert!(!session.idle_state().idling);

    session.dispatch(ProviderEvent::Pause);

    assert!(session.idle_state().idling);
}

#[tokio::test(start_paused = true)]
async fn test_paused_tracking_ignores_input() {
    let (session, _provider) = ready();
    session.handle_user_input(UserInputKind::Focus);
    assert!(!session.idle_state().idling);
    let mut events = session.subscribe();

    session.requests().pause_user_idle().await.unwrap();
    let change = drain(&mut events);
    assert_eq!(names(&change), vec!["user-idle-change"]);
    assert_eq!(
        change[0].request.as_ref().map(|r| r.kind.clone()),
        Some(RequestKind::PauseUserIdle)
    );

    session.handle_user_input(UserInputKind::PointerDown);
    assert!(session.idle_state().idling);
    assert!(session.idle_state().paused_tracking);

    session.requests().resume_user_idle().await.unwrap();
    assert!(!session.idle_state().paused_tracking);
    assert!(session.pending(RequestCategory::UserIdle).is_none());
}

// ============================================================================
// Fullscreen
// ============================================================================

#[tokio::test]
async fn test_fullscreen_without_surface_is_unsupported() {
    let (session, _provider) = ready();
    let mut events = session.subscribe();

    let result = session
        .requests()
        .enter_fullscreen(FullscreenTarget::PreferMedia)
        .await;

    assert!(matches!(
        result,
        Err(PlaybackError::FullscreenUnsupported(FullscreenTarget::PreferMedia))
    ));
    assert_eq!(names(&drain(&mut events)), vec!["fullscreen-error"]);
}

#[tokio::test]
async fn test_fullscreen_round_trip_locks_orientation() {
    let surface = FakeFullscreen::supported();
    let orientation = Arc::new(FakeOrientation::default());
    let core_config = CoreConfig::builder()
        .fullscreen(surface.clone())
        .orientation(orientation.clone())
        .build()
        .unwrap();
    let config = PlaybackConfig {
        orientation_lock: Some(OrientationLockType::Landscape),
        ..PlaybackConfig::default()
    };
    let (session, _provider) = attached_with(config, core_config, FakeProvider::default());
    load(&session);
    assert!(session.state().can_fullscreen);
    let mut events = session.subscribe();

    session
        .requests()
        .enter_fullscreen(FullscreenTarget::Media)
        .await
        .unwrap();

    assert!(surface.is_active());
    assert!(orientation.is_locked());
    assert!(session.state().fullscreen);
    let events = drain(&mut events);
    assert!(find(&events, "fullscreen-change").request.is_some());

    session
        .requests()
        .exit_fullscreen(FullscreenTarget::Media)
        .await
        .unwrap();

    assert!(!surface.is_active());
    assert!(!orientation.is_locked());
    assert!(!session.state().fullscreen);
}

#[tokio::test]
async fn test_rejected_fullscreen_clears_slot() {
    let provider = FakeProvider {
        fullscreen: Some(Arc::new(FakeFullscreen {
            supported: true,
            reject: true,
            ..FakeFullscreen::default()
        })),
        ..FakeProvider::default()
    };
    let (session, _provider) = attached_with(PlaybackConfig::default(), core_config(), provider);
    let mut events = session.subscribe();

    let result = session
        .requests()
        .enter_fullscreen(FullscreenTarget::PreferMedia)
        .await;

    assert!(matches!(result, Err(PlaybackError::Fullscreen(_))));
    assert!(session.pending(RequestCategory::Fullscreen).is_none());
    let events = drain(&mut events);
    match &events[0].detail {
        MediaEventDetail::FullscreenError { message } => {
            assert!(message.contains("no user gesture"))
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_fullscreen_rejected_after_source_change_clears_slot() {
    let gate = Arc::new(Notify::new());
    let surface = Arc::new(FakeFullscreen {
        supported: true,
        reject: true,
        gate: Some(gate.clone()),
        ..FakeFullscreen::default()
    });
    let provider = FakeProvider {
        fullscreen: Some(surface),
        ..FakeProvider::default()
    };
    let (session, _provider) = attached_with(PlaybackConfig::default(), core_config(), provider);
    load(&session);
    let mut events = session.subscribe();

    let enter = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .requests()
                .enter_fullscreen(FullscreenTarget::PreferMedia)
                .await
        }
    });
    until_pending(&session, RequestCategory::Fullscreen).await;

    session.dispatch(ProviderEvent::SourceChange(Some(MediaSource::new("next.mp4"))));
    gate.notify_one();

    assert!(matches!(
        enter.await.unwrap(),
        Err(PlaybackError::Fullscreen(_))
    ));
    assert!(session.pending(RequestCategory::Fullscreen).is_none());
    assert_eq!(
        names(&drain(&mut events)),
        vec!["source-change", "fullscreen-error"]
    );

    session.dispatch(ProviderEvent::FullscreenChange(true));
    let published = drain(&mut events);
    assert!(find(&published, "fullscreen-change").request.is_none());
}

#[tokio::test]
async fn test_fullscreen_rejected_after_detach_leaves_queue_empty() {
    let gate = Arc::new(Notify::new());
    let surface = Arc::new(FakeFullscreen {
        supported: true,
        reject: true,
        gate: Some(gate.clone()),
        ..FakeFullscreen::default()
    });
    let provider = FakeProvider {
        fullscreen: Some(surface),
        ..FakeProvider::default()
    };
    let (session, _provider) = attached_with(PlaybackConfig::default(), core_config(), provider);
    load(&session);

    let enter = tokio::spawn({
        let session = session.clone();
        async move {
            session
                .requests()
                .enter_fullscreen(FullscreenTarget::PreferMedia)
                .await
        }
    });
    until_pending(&session, RequestCategory::Fullscreen).await;

    session.detach_provider();
    gate.notify_one();

    assert!(enter.await.unwrap().is_err());
    assert!(session.pending(RequestCategory::Fullscreen).is_none());
    assert_eq!(session.queue_stats().deleted, 0);
}

// ============================================================================
// Provider call contract
// ============================================================================

mockall::mock! {
    Provider {}

    #[async_trait]
    impl MediaProvider for Provider {
        fn kind(&self) -> ProviderKind;
        async fn play(&self) -> BridgeResult<()>;
        async fn pause(&self) -> BridgeResult<()>;
        fn set_current_time(&self, time: f64);
        fn set_volume(&self, volume: f64);
        fn set_muted(&self, muted: bool);
        fn fullscreen(&self) -> Option<Arc<dyn FullscreenAdapter>>;
        fn emits_can_play(&self) -> bool;
    }
}

#[tokio::test]
async fn test_paused_media_never_calls_pause() {
    let mut provider = MockProvider::new();
    provider.expect_kind().return_const(ProviderKind::Hls);
    provider.expect_fullscreen().returning(|| None);
    provider.expect_emits_can_play().return_const(true);
    provider.expect_pause().never();
    provider.expect_play().times(1).returning(|| Ok(()));

    let session = MediaSession::new(PlaybackConfig::default(), core_config()).unwrap();
    session.attach_provider(Arc::new(provider));
    load(&session);

    session.requests().pause().await.unwrap();
    session.requests().play().await.unwrap();

    assert!(session.pending(RequestCategory::Pause).is_none());
    assert!(session.pending(RequestCategory::Play).is_some());
}

// ============================================================================
// Poster / state surface / event loop
// ============================================================================

#[tokio::test]
async fn test_poster_visibility() {
    let (session, _provider) = ready();
    let version = session.state_version();

    session.requests().hide_poster().await.unwrap();
    assert!(session.state().poster_hidden);
    session.requests().hide_poster().await.unwrap();
    assert_eq!(session.state_version(), version + 1);

    session.requests().show_poster().await.unwrap();
    assert!(!session.state().poster_hidden);
}

#[tokio::test]
async fn test_watch_state_sees_new_snapshots() {
    let (session, _provider) = ready();
    let mut state = session.watch_state();
    let _ = state.borrow_and_update();

    session.dispatch(ProviderEvent::Play);

    assert!(state.has_changed().unwrap());
    assert!(!state.borrow_and_update().paused);
}

#[tokio::test]
async fn test_run_dispatches_channel_events() {
    let (session, _provider) = attached();
    let (tx, rx) = mpsc::channel(16);
    let runner = tokio::spawn({
        let session = session.clone();
        async move { session.run(rx).await }
    });

    for event in [
        ProviderEvent::CanLoad,
        ProviderEvent::LoadStart,
        ProviderEvent::LoadedData,
        ProviderEvent::CanPlay { duration: 8.0 },
        ProviderEvent::Play,
        ProviderEvent::PlayFail(MediaErrorDetail::new(0, "decode")),
    ] {
        tx.send(event).await.unwrap();
    }
    drop(tx);
    runner.await.unwrap();

    let state = session.state();
    assert!(state.can_play);
    assert_eq!(state.duration, 8.0);
    assert!(state.paused);
}
