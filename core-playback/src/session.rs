//! # Media Session
//!
//! Public handle over one reconciled media session. Cloning the handle is
//! cheap; every clone drives the same session.
//!
//! ## Driving a session
//!
//! The host attaches a provider, forwards the provider's raw events with
//! [`MediaSession::dispatch`] and calls [`MediaSession::tick`] once per batch
//! so deferred work (tracking reset, autoplay, loop restart) runs. Hosts with
//! an event channel can hand it to [`MediaSession::run`] instead.
//!
//! ```ignore
//! let session = MediaSession::new(PlaybackConfig::default(), CoreConfig::builder().build()?)?;
//! session.attach_provider(provider);
//!
//! let mut events = session.subscribe();
//! tokio::spawn({
//!     let session = session.clone();
//!     async move { session.run(provider_events).await }
//! });
//!
//! session.requests().play().await?;
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use bridge_traits::{AdSdkEvent, MediaProvider, ProviderEvent};
use core_async::sync::{mpsc, watch};
use core_runtime::config::CoreConfig;
use core_runtime::events::{
    EventBus, EventStream, MediaEvent, RequestCategory, RequestEvent, RequestKind, RequestOrigin,
    UserInputKind,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ads::{AdEffect, AdLoadPlan, AdPhase};
use crate::config::PlaybackConfig;
use crate::engine::{SessionCore, SessionShared};
use crate::error::{PlaybackError, Result};
use crate::idle::IdleState;
use crate::queue::QueueStats;
use crate::request_manager::RequestManager;
use crate::state::{MediaState, SessionFlags};
use crate::timers::{DeferredAction, TimerHook};

/// A media session: state store, request queue, state manager, idle
/// detector and ad controller around one provider at a time.
#[derive(Clone)]
pub struct MediaSession {
    shared: Arc<SessionShared>,
}

impl std::fmt::Debug for MediaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSession")
            .field("id", &self.shared.id)
            .finish()
    }
}

impl MediaSession {
    /// Creates a session. Both configurations are validated first.
    pub fn new(config: PlaybackConfig, core_config: CoreConfig) -> Result<Self> {
        config.validate()?;
        core_config
            .validate()
            .map_err(|error| PlaybackError::Config(error.to_string()))?;

        let id = Uuid::new_v4();
        let bus = EventBus::new(core_config.event_buffer_size);
        let shared = Arc::new_cyclic(|weak: &Weak<SessionShared>| {
            let weak = weak.clone();
            let hook = TimerHook::new(move |kind, generation| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_timer(kind, generation);
                }
            });
            let core = SessionCore::new(&config, &core_config, hook);
            SessionShared::new(id, config, core, bus)
        });

        info!(session_id = %id, "Media session created");
        Ok(Self { shared })
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.shared.config
    }

    // ========================================================================
    // Provider
    // ========================================================================

    /// Attaches `provider`, resetting everything tied to the previous one.
    pub fn attach_provider(&self, provider: Arc<dyn MediaProvider>) {
        self.shared.with_core(|core| core.attach_provider(provider));
    }

    pub fn detach_provider(&self) {
        self.shared.with_core(|core| core.detach_provider());
    }

    /// Feeds one raw provider event to the state manager.
    pub fn dispatch(&self, event: ProviderEvent) {
        self.shared.with_core(|core| core.dispatch(event));
    }

    /// Runs the work deferred by the events dispatched so far.
    pub async fn tick(&self) {
        let actions = self.shared.with_core(|core| core.deferred.drain());

        for action in actions {
            match action {
                DeferredAction::ResetTracking => {
                    self.shared.with_core(|core| core.tracker.reset_tracking());
                }
                DeferredAction::AttemptAutoplay => self.attempt_autoplay().await,
                DeferredAction::RequestLoop => {
                    let request = RequestEvent::internal(RequestKind::Loop);
                    if let Err(error) = self.request(request).await {
                        warn!(error = %error, "Loop restart failed");
                    }
                }
            }
        }
    }

    /// Dispatches every event from `events`, ticking after each batch.
    /// Returns when the channel closes.
    pub async fn run(&self, mut events: mpsc::Receiver<ProviderEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event);
            while let Ok(event) = events.try_recv() {
                self.dispatch(event);
            }
            self.tick().await;
        }
        debug!(session_id = %self.shared.id, "Provider event stream closed");
    }

    async fn attempt_autoplay(&self) {
        let attempt = self.shared.with_core(|core| {
            let state = core.store.state();
            if state.started || state.attempting_autoplay || !state.can_play || !state.paused {
                return false;
            }
            core.store.set_attempting_autoplay(true);
            true
        });
        if !attempt {
            return;
        }

        let request = RequestEvent::internal(RequestKind::Play).with_label("autoplay");
        if let Err(error) = self.request(request).await {
            debug!(error = %error, "Autoplay attempt failed");
            self.shared
                .with_core(|core| core.store.set_attempting_autoplay(false));
        }
    }

    // ========================================================================
    // Requests and input
    // ========================================================================

    pub fn requests(&self) -> RequestManager {
        RequestManager::new(self.shared.clone())
    }

    pub async fn request(&self, request: RequestEvent) -> Result<()> {
        self.requests().handle(request).await
    }

    pub fn handle_user_input(&self, kind: UserInputKind) {
        self.shared.with_core(|core| core.handle_user_input(kind));
    }

    pub fn idle_state(&self) -> IdleState {
        self.shared.read(|core| core.idle.state())
    }

    pub fn set_idle_delay(&self, delay: Duration) {
        self.shared.with_core(|core| core.set_idle_delay(delay));
    }

    pub fn set_loop(&self, enabled: bool) {
        self.shared.with_core(|core| core.store.set_loop(enabled));
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn state(&self) -> MediaState {
        self.shared.read(|core| core.store.snapshot())
    }

    pub fn state_version(&self) -> u64 {
        self.shared.read(|core| core.store.version())
    }

    /// Receiver that sees a new snapshot whenever the state changed.
    pub fn watch_state(&self) -> watch::Receiver<MediaState> {
        self.shared.watch_state()
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.shared.bus().subscribe())
    }

    pub fn flags(&self) -> SessionFlags {
        self.shared.read(|core| core.flags)
    }

    /// Request waiting in `category`'s slot.
    pub fn pending(&self, category: RequestCategory) -> Option<Arc<RequestEvent>> {
        self.shared.read(|core| core.queue.peek(category).cloned())
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.shared.read(|core| core.queue.stats())
    }

    pub fn ad_phase(&self) -> AdPhase {
        self.shared.read(|core| core.ads.phase())
    }

    // ========================================================================
    // Ads
    // ========================================================================

    /// Requests ads for the attached provider.
    ///
    /// Returns `Ok(false)` when ads do not apply or the load was cancelled by
    /// a teardown, and [`PlaybackError::AdLoad`] when the SDK reported a fatal
    /// error while loading.
    pub async fn start_ads(&self) -> Result<bool> {
        let plan = self.shared.with_core(|core| {
            let kind = core.attached_provider()?.kind();
            core.ads.begin_load(kind)
        })?;

        let Some(AdLoadPlan {
            loader,
            request,
            token,
        }) = plan
        else {
            return Ok(false);
        };

        let result = tokio::select! {
            _ = token.cancelled() => {
                debug!("Ad load cancelled");
                self.shared.with_core(|core| core.ads.take_load_error())?;
                return Ok(false);
            }
            result = loader.request_ads(request) => result,
        };

        self.shared
            .with_core(|core| core.ads.finish_load(result, &mut core.store))?;
        Ok(true)
    }

    /// Handles one ad SDK notification.
    pub async fn handle_ad_event(&self, event: AdSdkEvent) {
        let requests = self.shared.with_core(|core| {
            let effects = core.ads.handle_event(&event, &mut core.store);
            let mut notice: Option<Arc<MediaEvent>> = None;
            let mut requests = Vec::new();

            for effect in effects {
                match effect {
                    AdEffect::Notify(event) => {
                        let published = core.publish(event);
                        notice.get_or_insert(published);
                    }
                    AdEffect::Forge(raw) => {
                        let mut forged = MediaEvent::provider(raw);
                        if let Some(notice) = &notice {
                            forged.append_trigger(notice.clone());
                        }
                        core.process(forged);
                    }
                    AdEffect::RequestPause => requests.push(RequestKind::Pause),
                    AdEffect::RequestPlay => requests.push(RequestKind::Play),
                }
            }
            requests
        });

        for kind in requests {
            let request = RequestEvent::new(kind).with_origin(RequestOrigin::AdSdk);
            if let Err(error) = self.request(request).await {
                warn!(error = %error, "Content request from ad SDK failed");
            }
        }
    }

    /// Resizes the ad surface.
    pub fn resize(&self, width: u32, height: u32) {
        self.shared.with_core(|core| {
            let fullscreen = core.store.state().fullscreen;
            core.ads.resize(width, height, fullscreen);
        });
    }

    pub fn teardown_ads(&self) {
        self.shared
            .with_core(|core| core.ads.teardown(&mut core.store));
    }
}
