//! # Session Core
//!
//! Mutable heart of a [`MediaSession`](crate::MediaSession). Everything that
//! changes state lives in [`SessionCore`] behind one `parking_lot` mutex owned
//! by [`SessionShared`]. Components never call each other through the
//! session's public surface: the state manager returns [`Reaction`]s and the
//! core routes them to the idle detector and the ad controller.
//!
//! Published events are collected in an outbox while the lock is held and
//! flushed to the [`EventBus`] by [`SessionShared::with_core`], together with
//! a state snapshot when the store version moved. Provider calls are always
//! made after the lock is released.

use std::sync::Arc;

use bridge_traits::{
    FullscreenAdapter, MediaErrorDetail, MediaProvider, ProviderEvent, ScreenOrientationAdapter,
};
use core_async::sync::watch;
use core_runtime::config::CoreConfig;
use core_runtime::events::{
    EventBus, FullscreenTarget, MediaEvent, MediaEventDetail, RequestCategory, RequestEvent,
    UserInputKind,
};
use parking_lot::Mutex;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::ads::AdSessionController;
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::idle::{IdleDetector, IdleTimerCommand, IdleUpdate};
use crate::queue::RequestQueue;
use crate::state::{MediaState, SessionFlags, StateStore};
use crate::state_manager::{ListenerTier, Reaction, StateManager, TrackerContext};
use crate::timers::{Debounce, DeferredQueue, TimerHook, TimerKind};

// ============================================================================
// Shared session
// ============================================================================

pub(crate) struct SessionShared {
    pub id: Uuid,
    pub config: PlaybackConfig,
    core: Mutex<SessionCore>,
    bus: EventBus,
    state_tx: watch::Sender<MediaState>,
}

impl SessionShared {
    pub fn new(id: Uuid, config: PlaybackConfig, core: SessionCore, bus: EventBus) -> Self {
        let (state_tx, _) = watch::channel(core.store.snapshot());
        Self {
            id,
            config,
            core: Mutex::new(core),
            bus,
            state_tx,
        }
    }

    /// Runs `f` under the lock, then flushes the outbox and the state
    /// snapshot. Never call this from inside `f`.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut SessionCore) -> R) -> R {
        let mut core = self.core.lock();
        let result = f(&mut core);
        self.commit(&mut core);
        result
    }

    /// Read-only access; nothing is published.
    pub fn read<R>(&self, f: impl FnOnce(&SessionCore) -> R) -> R {
        let core = self.core.lock();
        f(&core)
    }

    pub fn on_timer(&self, kind: TimerKind, generation: u64) {
        self.with_core(|core| core.on_timer(kind, generation));
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn watch_state(&self) -> watch::Receiver<MediaState> {
        self.state_tx.subscribe()
    }

    fn commit(&self, core: &mut SessionCore) {
        let version = core.store.version();
        if version != core.published_version {
            core.published_version = version;
            self.state_tx.send_replace(core.store.snapshot());
        }

        for event in core.outbox.drain(..) {
            trace!(session_id = %self.id, event = event.name(), "Publishing event");
            // No subscribers is not an error.
            let _ = self.bus.emit(event);
        }
    }
}

// ============================================================================
// Session core
// ============================================================================

pub(crate) struct SessionCore {
    pub provider: Option<Arc<dyn MediaProvider>>,
    media_fullscreen: Option<Arc<dyn FullscreenAdapter>>,
    pub orientation: Option<Arc<dyn ScreenOrientationAdapter>>,
    pub store: StateStore,
    pub queue: RequestQueue,
    pub flags: SessionFlags,
    pub tracker: StateManager,
    pub idle: IdleDetector,
    idle_timer: Debounce,
    idle_enabled: bool,
    last_input: Option<Arc<MediaEvent>>,
    pub deferred: DeferredQueue,
    pub ads: AdSessionController,
    outbox: Vec<Arc<MediaEvent>>,
    /// Bumped on every reset boundary; frame-deferred work compares it.
    pub loop_epoch: u64,
    published_version: u64,
    hook: TimerHook,
}

impl SessionCore {
    pub fn new(config: &PlaybackConfig, core_config: &CoreConfig, hook: TimerHook) -> Self {
        let media_fullscreen = core_config.fullscreen.clone();
        let mut store = StateStore::new();
        store.set_autoplay(config.autoplay);
        store.set_loop(config.loop_playback);
        store.set_can_fullscreen(media_fullscreen.as_ref().is_some_and(|a| a.is_supported()));

        Self {
            provider: None,
            media_fullscreen,
            orientation: core_config.orientation.clone(),
            published_version: store.version(),
            store,
            queue: RequestQueue::new(),
            flags: SessionFlags::default(),
            tracker: StateManager::new(config),
            idle: IdleDetector::new(config.idle_delay),
            idle_timer: Debounce::new(TimerKind::Idle, config.idle_delay),
            idle_enabled: core_config.features.enable_idle_tracking,
            last_input: None,
            deferred: DeferredQueue::new(),
            ads: AdSessionController::new(
                config.ads.clone(),
                core_config.ads_loader.clone(),
                core_config.features.enable_ads,
            ),
            outbox: Vec::new(),
            loop_epoch: 0,
            hook,
        }
    }

    // ========================================================================
    // Provider lifecycle
    // ========================================================================

    pub fn attach_provider(&mut self, provider: Arc<dyn MediaProvider>) {
        self.reset();
        info!(provider = ?provider.kind(), "Provider attached");
        self.provider = Some(provider);
        let can_fullscreen = self.fullscreen_adapter(FullscreenTarget::PreferMedia).is_some();
        self.store.set_can_fullscreen(can_fullscreen);
    }

    pub fn detach_provider(&mut self) {
        if self.provider.is_none() {
            return;
        }
        self.reset();
        info!("Provider detached");
        self.provider = None;
        let can_fullscreen = self.fullscreen_adapter(FullscreenTarget::PreferMedia).is_some();
        self.store.set_can_fullscreen(can_fullscreen);
    }

    /// Full reset boundary: provider attach or detach.
    fn reset(&mut self) {
        self.queue.reset();
        self.tracker.reset();
        self.flags.clear();
        self.deferred.clear();
        self.last_input = None;
        self.idle_timer.cancel();
        if self.idle_enabled {
            let update = self.idle.reset();
            self.apply_idle(update, None, None);
        }
        self.ads.teardown(&mut self.store);
        self.store.soft_reset();
        self.store.set_can_load(false);
        self.store.set_can_load_poster(false);
        self.loop_epoch = self.loop_epoch.wrapping_add(1);
    }

    /// Provider attached, error otherwise.
    pub fn attached_provider(&self) -> Result<Arc<dyn MediaProvider>> {
        self.provider
            .clone()
            .ok_or_else(|| PlaybackError::NotReady("no provider attached".to_string()))
    }

    /// Provider attached and media able to play, error otherwise.
    pub fn ready_provider(&self) -> Result<Arc<dyn MediaProvider>> {
        let provider = self.attached_provider()?;
        if !self.store.state().can_play {
            return Err(PlaybackError::NotReady("media cannot play yet".to_string()));
        }
        Ok(provider)
    }

    /// Resolves the fullscreen surface for `target`. Only surfaces that
    /// support fullscreen are returned.
    pub fn fullscreen_adapter(&self, target: FullscreenTarget) -> Option<Arc<dyn FullscreenAdapter>> {
        let media = self
            .media_fullscreen
            .clone()
            .filter(|adapter| adapter.is_supported());
        let provider = self
            .provider
            .as_ref()
            .and_then(|provider| provider.fullscreen())
            .filter(|adapter| adapter.is_supported());

        match target {
            FullscreenTarget::PreferMedia => media.or(provider),
            FullscreenTarget::Media => media,
            FullscreenTarget::Provider => provider,
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn dispatch(&mut self, event: ProviderEvent) {
        self.process(MediaEvent::provider(event));
    }

    /// Runs an event through the state manager and routes its reactions.
    pub fn process(&mut self, event: MediaEvent) {
        let (tracker, mut ctx) = self.tracker_context();
        let reactions = tracker.handle(&mut ctx, event);
        for reaction in reactions {
            self.react(reaction);
        }
    }

    /// Surfaces a `play()` rejection for `request` and returns whether it was
    /// an autoplay attempt.
    ///
    /// When the source was replaced while the call was in flight the playback
    /// listeners are gone, so the failure is published directly and the
    /// request is withdrawn from its slot.
    pub fn reject_play(&mut self, request: &Arc<RequestEvent>, cause: MediaErrorDetail) -> bool {
        let autoplay = self.store.state().attempting_autoplay;
        if self.tracker.tiers().is_attached(ListenerTier::CanPlay) {
            self.dispatch(ProviderEvent::PlayFail(cause));
            return autoplay;
        }

        debug!(request_id = %request.id, "Play rejected after its media was reset");
        self.queue.withdraw(RequestCategory::Play, request);
        self.publish(
            MediaEvent::provider(ProviderEvent::PlayFail(cause))
                .with_request(request.clone())
                .with_autoplay(autoplay),
        );
        autoplay
    }

    /// Publishes `event` without state tracking.
    pub fn publish(&mut self, event: MediaEvent) -> Arc<MediaEvent> {
        let event = Arc::new(event);
        self.outbox.push(event.clone());
        event
    }

    fn tracker_context(&mut self) -> (&mut StateManager, TrackerContext<'_>) {
        let emits_can_play = self
            .provider
            .as_ref()
            .map_or(true, |provider| provider.emits_can_play());
        (
            &mut self.tracker,
            TrackerContext {
                store: &mut self.store,
                queue: &mut self.queue,
                flags: &mut self.flags,
                deferred: &mut self.deferred,
                outbox: &mut self.outbox,
                hook: &self.hook,
                emits_can_play,
            },
        )
    }

    /// Forced idle transitions carry no trigger.
    fn react(&mut self, reaction: Reaction) {
        match reaction {
            Reaction::MediaPaused => self.update_idle(None, |idle| idle.on_media_paused()),
            Reaction::PlaybackStarted => self.update_idle(None, |idle| idle.on_media_playing()),
            Reaction::ContentEnded => self.ads.on_content_ended(),
            Reaction::FullscreenChanged => {
                let (width, height) = self.ads.size();
                let fullscreen = self.store.state().fullscreen;
                self.ads.resize(width, height, fullscreen);
            }
            Reaction::SourceReset => {
                self.deferred.clear();
                self.loop_epoch = self.loop_epoch.wrapping_add(1);
                self.update_idle(None, |idle| idle.reset());
            }
        }
    }

    pub fn on_timer(&mut self, kind: TimerKind, generation: u64) {
        match kind {
            TimerKind::Waiting => {
                let (tracker, mut ctx) = self.tracker_context();
                tracker.fire_waiting(&mut ctx, generation);
            }
            TimerKind::Idle => {
                if !self.idle_timer.complete(generation) {
                    return;
                }
                let paused = self.store.state().paused;
                let trigger = self.last_input.clone();
                self.update_idle(trigger, |idle| idle.on_timeout(paused));
            }
        }
    }

    // ========================================================================
    // Idle
    // ========================================================================

    pub fn handle_user_input(&mut self, kind: UserInputKind) {
        let input = Arc::new(MediaEvent::new(MediaEventDetail::UserInput(kind)));
        self.last_input = Some(input.clone());
        let paused = self.store.state().paused;
        self.update_idle(Some(input), |idle| idle.on_input(paused));
    }

    /// Pauses or resumes idle tracking on behalf of `request`.
    pub fn set_idle_tracking_paused(&mut self, paused: bool, request: Arc<RequestEvent>) {
        if !self.idle_enabled {
            debug!("Idle tracking disabled, request ignored");
            return;
        }

        self.queue.enqueue(RequestCategory::UserIdle, request);
        let Some(update) = self.idle.pause_tracking(paused) else {
            self.queue.delete(RequestCategory::UserIdle);
            return;
        };
        let served = self.queue.serve(RequestCategory::UserIdle, |request| request);
        self.apply_idle(update, None, served);
    }

    pub fn set_idle_delay(&mut self, delay: std::time::Duration) {
        self.idle.set_delay(delay);
        self.idle_timer.set_delay(delay);
    }

    fn update_idle(
        &mut self,
        trigger: Option<Arc<MediaEvent>>,
        input: impl FnOnce(&mut IdleDetector) -> IdleUpdate,
    ) {
        if !self.idle_enabled {
            return;
        }
        let update = input(&mut self.idle);
        self.apply_idle(update, trigger, None);
    }

    fn apply_idle(
        &mut self,
        update: IdleUpdate,
        trigger: Option<Arc<MediaEvent>>,
        request: Option<Arc<RequestEvent>>,
    ) {
        match update.timer {
            IdleTimerCommand::Restart => {
                self.idle_timer.set_delay(self.idle.delay());
                self.idle_timer.schedule(&self.hook);
            }
            IdleTimerCommand::Cancel => self.idle_timer.cancel(),
            IdleTimerCommand::Keep => {}
        }

        if let Some(idle) = update.transition {
            debug!(idle, "User idle changed");
            let mut event = MediaEvent::new(MediaEventDetail::UserIdleChange { idle });
            if let Some(trigger) = trigger {
                event.append_trigger(trigger);
            }
            event.request = request;
            self.publish(event);
        }
    }
}
