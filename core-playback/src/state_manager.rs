//! # State Manager
//!
//! Turns the raw provider event stream into canonical state and
//! notifications. For every event it:
//!
//! 1. links the event to the antecedent event that caused it (trigger chain),
//! 2. updates [`MediaState`](crate::state::MediaState) through the store's
//!    setters,
//! 3. serves the request category the event satisfies, attaching the
//!    request to the event,
//! 4. publishes the event, or suppresses it when it is redundant.
//!
//! Listeners are attached in tiers: `can-load` unlocks the loading events,
//! `load-start` the readiness events and `can-play` the playback events.
//! Events of a tier that is not attached yet are ignored.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{ProviderEvent, ProviderEventKind};
use core_runtime::events::{MediaEvent, MediaEventDetail, RequestCategory};
use tracing::{debug, trace};

use crate::config::PlaybackConfig;
use crate::queue::RequestQueue;
use crate::state::{SessionFlags, StateStore};
use crate::timers::{Debounce, DeferredAction, DeferredQueue, Throttle, TimerHook, TimerKind};

// ============================================================================
// Listener tiers
// ============================================================================

/// Lifecycle milestone that must be reached before an event is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerTier {
    Always,
    CanLoad,
    LoadStart,
    CanPlay,
}

impl ListenerTier {
    pub fn of(kind: ProviderEventKind) -> Self {
        match kind {
            ProviderEventKind::CanLoad
            | ProviderEventKind::SourcesChange
            | ProviderEventKind::SourceChange
            | ProviderEventKind::ViewTypeChange
            | ProviderEventKind::FullscreenChange => ListenerTier::Always,
            ProviderEventKind::MediaTypeChange
            | ProviderEventKind::LoadStart
            | ProviderEventKind::Abort
            | ProviderEventKind::Error => ListenerTier::CanLoad,
            ProviderEventKind::LoadedMetadata
            | ProviderEventKind::LoadedData
            | ProviderEventKind::CanPlay
            | ProviderEventKind::CanPlayThrough
            | ProviderEventKind::DurationChange
            | ProviderEventKind::Progress => ListenerTier::LoadStart,
            ProviderEventKind::Autoplay
            | ProviderEventKind::AutoplayFail
            | ProviderEventKind::Play
            | ProviderEventKind::PlayFail
            | ProviderEventKind::Playing
            | ProviderEventKind::Pause
            | ProviderEventKind::TimeUpdate
            | ProviderEventKind::VolumeChange
            | ProviderEventKind::Seeking
            | ProviderEventKind::Seeked
            | ProviderEventKind::Waiting
            | ProviderEventKind::Ended => ListenerTier::CanPlay,
        }
    }
}

/// Which tiers are currently attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerTiers {
    can_load: bool,
    load_start: bool,
    can_play: bool,
}

impl ListenerTiers {
    pub fn is_attached(&self, tier: ListenerTier) -> bool {
        match tier {
            ListenerTier::Always => true,
            ListenerTier::CanLoad => self.can_load,
            ListenerTier::LoadStart => self.load_start,
            ListenerTier::CanPlay => self.can_play,
        }
    }

    pub fn attach(&mut self, tier: ListenerTier) {
        self.set(tier, true);
    }

    pub fn dispose(&mut self, tier: ListenerTier) {
        self.set(tier, false);
    }

    pub fn dispose_all(&mut self) {
        *self = Self::default();
    }

    fn set(&mut self, tier: ListenerTier, attached: bool) {
        match tier {
            ListenerTier::Always => {}
            ListenerTier::CanLoad => self.can_load = attached,
            ListenerTier::LoadStart => self.load_start = attached,
            ListenerTier::CanPlay => self.can_play = attached,
        }
    }
}

// ============================================================================
// Context and reactions
// ============================================================================

/// Session parts the state manager mutates while handling one event.
pub struct TrackerContext<'a> {
    pub store: &'a mut StateStore,
    pub queue: &'a mut RequestQueue,
    pub flags: &'a mut SessionFlags,
    pub deferred: &'a mut DeferredQueue,
    pub outbox: &'a mut Vec<Arc<MediaEvent>>,
    pub hook: &'a TimerHook,
    /// The engine reports readiness itself.
    pub emits_can_play: bool,
}

/// Follow-ups for the other session components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Media paused or ended: force idle.
    MediaPaused,
    /// Playback is running: the idle countdown may start.
    PlaybackStarted,
    /// Content reached its end: tell the ad SDK.
    ContentEnded,
    /// Fullscreen toggled: resize the ad surface.
    FullscreenChanged,
    /// A later source replaced the current one.
    SourceReset,
}

// ============================================================================
// State manager
// ============================================================================

#[derive(Debug)]
pub struct StateManager {
    /// Latest published event per kind, for trigger chains only.
    tracked: HashMap<ProviderEventKind, Arc<MediaEvent>>,
    tiers: ListenerTiers,
    /// A source was set since the provider attached.
    source_seen: bool,
    seeking_throttle: Throttle,
    waiting: Debounce,
    waiting_event: Option<MediaEvent>,
}

impl StateManager {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            tracked: HashMap::new(),
            tiers: ListenerTiers::default(),
            source_seen: false,
            seeking_throttle: Throttle::new(config.seeking_throttle),
            waiting: Debounce::new(TimerKind::Waiting, config.waiting_debounce),
            waiting_event: None,
        }
    }

    pub fn tracked(&self, kind: ProviderEventKind) -> Option<&Arc<MediaEvent>> {
        self.tracked.get(&kind)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn tiers(&self) -> ListenerTiers {
        self.tiers
    }

    pub fn is_waiting_pending(&self) -> bool {
        self.waiting.is_pending()
    }

    /// Clears the causality cache.
    pub fn reset_tracking(&mut self) {
        if !self.tracked.is_empty() {
            trace!(tracked = self.tracked.len(), "Tracking reset");
        }
        self.tracked.clear();
    }

    /// Forgets everything about the current provider.
    pub fn reset(&mut self) {
        self.reset_tracking();
        self.cancel_waiting();
        self.seeking_throttle.reset();
        self.tiers.dispose_all();
        self.source_seen = false;
    }

    /// Handles one event and returns the follow-ups for other components.
    pub fn handle(&mut self, ctx: &mut TrackerContext<'_>, event: MediaEvent) -> Vec<Reaction> {
        let mut reactions = Vec::new();
        self.process(ctx, event, &mut reactions);
        reactions
    }

    /// Publishes the debounced `waiting` event if `generation` is current.
    pub fn fire_waiting(&mut self, ctx: &mut TrackerContext<'_>, generation: u64) {
        if !self.waiting.complete(generation) {
            return;
        }
        let Some(event) = self.waiting_event.take() else {
            return;
        };
        if ctx.flags.seeking || ctx.queue.has(RequestCategory::Seeked) {
            trace!("Waiting dropped, a seek started meanwhile");
            return;
        }

        ctx.store.set_waiting(true);
        self.publish(ctx, event);
    }

    fn process(
        &mut self,
        ctx: &mut TrackerContext<'_>,
        mut event: MediaEvent,
        reactions: &mut Vec<Reaction>,
    ) {
        let raw = match &event.detail {
            MediaEventDetail::Provider(raw) => raw.clone(),
            _ => {
                self.publish(ctx, event);
                return;
            }
        };

        let kind = raw.kind();
        if !self.tiers.is_attached(ListenerTier::of(kind)) {
            trace!(event = kind.name(), "Event ignored before its listener tier");
            return;
        }

        match raw {
            ProviderEvent::MediaTypeChange(media_type) => {
                ctx.store.set_media_type(media_type);
                self.publish(ctx, event);
            }
            ProviderEvent::ViewTypeChange(view_type) => {
                ctx.store.set_view_type(view_type);
                self.publish(ctx, event);
            }
            ProviderEvent::CanLoad => {
                ctx.store.set_can_load(true);
                ctx.store.set_can_load_poster(true);
                self.tiers.attach(ListenerTier::CanLoad);
                serve(ctx, RequestCategory::Load, &mut event);
                self.publish(ctx, event);
            }
            ProviderEvent::SourcesChange(sources) => {
                ctx.store.set_sources(sources);
                self.publish(ctx, event);
            }
            ProviderEvent::SourceChange(source) => {
                if self.source_seen {
                    self.reset_source(ctx);
                    reactions.push(Reaction::SourceReset);
                } else {
                    self.source_seen = true;
                }
                ctx.store.set_source(source);
                self.publish(ctx, event);
            }
            ProviderEvent::LoadStart => {
                self.link(&mut event, ProviderEventKind::SourceChange);
                ctx.store.set_error(None);
                self.tiers.attach(ListenerTier::LoadStart);
                self.publish(ctx, event);
            }
            ProviderEvent::LoadedMetadata => {
                self.link(&mut event, ProviderEventKind::LoadStart);
                let metadata = self.publish(ctx, event);

                if !ctx.emits_can_play {
                    let duration = ctx.store.state().duration;
                    let can_play = MediaEvent::provider(ProviderEvent::CanPlay { duration })
                        .with_trigger(metadata);
                    self.process(ctx, can_play, reactions);
                }
            }
            ProviderEvent::LoadedData => {
                self.link(&mut event, ProviderEventKind::LoadStart);
                self.publish(ctx, event);
            }
            ProviderEvent::CanPlay { duration } => {
                if ctx.store.state().can_play {
                    trace!("Duplicate can-play ignored");
                    return;
                }
                if !event.is_triggered_by(ProviderEventKind::LoadedMetadata) {
                    self.link(&mut event, ProviderEventKind::LoadedData);
                }

                ctx.store.set_duration(duration);
                ctx.store.set_can_play(true);
                self.tiers.attach(ListenerTier::CanPlay);
                self.publish(ctx, event);

                let state = ctx.store.state();
                if state.autoplay && !state.started && !state.attempting_autoplay {
                    ctx.deferred.push(DeferredAction::AttemptAutoplay);
                }
            }
            ProviderEvent::CanPlayThrough { duration } => {
                self.link(&mut event, ProviderEventKind::CanPlay);
                ctx.store.set_duration(duration);
                ctx.store.set_can_play(true);
                self.publish(ctx, event);
            }
            ProviderEvent::DurationChange(duration) => {
                self.link(&mut event, ProviderEventKind::LoadedMetadata);
                ctx.store.set_duration(duration);
                self.publish(ctx, event);
            }
            ProviderEvent::Progress { buffered, seekable } => {
                ctx.store.set_buffered(buffered);
                ctx.store.set_seekable(seekable);
                self.publish(ctx, event);
            }
            ProviderEvent::Autoplay => {
                self.link(&mut event, ProviderEventKind::Play);
                event.autoplay = true;
                ctx.store.set_attempting_autoplay(false);
                ctx.store.set_autoplay_error(None);
                self.publish(ctx, event);
            }
            ProviderEvent::AutoplayFail(error) => {
                self.link(&mut event, ProviderEventKind::PlayFail);
                event.autoplay = true;
                ctx.store.set_attempting_autoplay(false);
                ctx.store.set_autoplay_error(Some(error));
                self.publish(ctx, event);
                self.reset_tracking();
            }
            ProviderEvent::Play => self.on_play(ctx, event, reactions),
            ProviderEvent::PlayFail(error) => {
                let autoplay = ctx.store.state().attempting_autoplay;
                event.autoplay = autoplay;
                self.link(&mut event, ProviderEventKind::Play);
                serve(ctx, RequestCategory::Play, &mut event);
                self.cancel_waiting();
                ctx.store.set_paused(true);
                let failure = self.publish(ctx, event);

                if autoplay {
                    let notice = MediaEvent::provider(ProviderEvent::AutoplayFail(error))
                        .with_trigger(failure);
                    self.process(ctx, notice, reactions);
                }
                reactions.push(Reaction::MediaPaused);
                self.reset_tracking();
            }
            ProviderEvent::Playing => self.on_playing(ctx, event, reactions),
            ProviderEvent::Pause => {
                if ctx.flags.looping {
                    debug!("Pause suppressed during loop restart");
                    return;
                }
                self.link(&mut event, ProviderEventKind::Play);
                serve(ctx, RequestCategory::Pause, &mut event);
                self.cancel_waiting();
                ctx.store.set_paused(true);
                ctx.store.set_waiting(false);
                self.publish(ctx, event);
                reactions.push(Reaction::MediaPaused);
            }
            ProviderEvent::TimeUpdate {
                current_time,
                played,
            } => {
                ctx.store.set_current_time(current_time);
                ctx.store.set_played(played);
                self.publish(ctx, event);
            }
            ProviderEvent::VolumeChange { volume, muted } => {
                ctx.store.set_volume(volume, muted);
                serve(ctx, RequestCategory::Volume, &mut event);
                self.publish(ctx, event);
            }
            ProviderEvent::Seeking(time) => {
                if !self.seeking_throttle.try_acquire() {
                    trace!(time, "Seeking throttled");
                    return;
                }
                ctx.store.set_seeking(true);
                ctx.store.set_current_time(time);
                serve(ctx, RequestCategory::Seeking, &mut event);
                self.publish(ctx, event);
            }
            ProviderEvent::Seeked(time) => self.on_seeked(ctx, event, time),
            ProviderEvent::Waiting => {
                if ctx.flags.seeking || ctx.queue.has(RequestCategory::Seeked) {
                    trace!("Waiting suppressed during seek");
                    return;
                }
                self.waiting_event = Some(event);
                self.waiting.schedule(ctx.hook);
            }
            ProviderEvent::Ended => {
                if ctx.flags.looping {
                    debug!("Ended suppressed during loop restart");
                    return;
                }
                if ctx.store.state().loop_playback {
                    debug!("Ended swallowed, scheduling loop");
                    ctx.deferred.push(DeferredAction::RequestLoop);
                    return;
                }
                self.cancel_waiting();
                ctx.store.set_ended(true);
                self.publish(ctx, event);
                reactions.push(Reaction::MediaPaused);
                reactions.push(Reaction::ContentEnded);
                self.reset_tracking();
            }
            ProviderEvent::Abort => {
                self.link(&mut event, ProviderEventKind::LoadStart);
                self.publish(ctx, event);
            }
            ProviderEvent::Error(error) => {
                self.link(&mut event, ProviderEventKind::Abort);
                ctx.store.set_error(Some(error));
                self.publish(ctx, event);
            }
            ProviderEvent::FullscreenChange(active) => {
                ctx.store.set_fullscreen(active);
                serve(ctx, RequestCategory::Fullscreen, &mut event);
                self.publish(ctx, event);
                reactions.push(Reaction::FullscreenChanged);
            }
        }
    }

    fn on_play(
        &mut self,
        ctx: &mut TrackerContext<'_>,
        mut event: MediaEvent,
        reactions: &mut Vec<Reaction>,
    ) {
        if ctx.flags.looping {
            debug!("Play suppressed during loop restart");
            return;
        }
        if !ctx.store.state().paused {
            trace!("Play suppressed, already playing");
            return;
        }

        let autoplay = ctx.store.state().attempting_autoplay;
        let replay = ctx.store.state().ended || ctx.flags.replaying;
        event.autoplay = autoplay;
        self.link(&mut event, ProviderEventKind::Waiting);
        serve(ctx, RequestCategory::Play, &mut event);

        if replay {
            ctx.flags.replaying = false;
            ctx.store.set_ended(false);
        }
        ctx.store.set_paused(false);
        ctx.store.set_autoplay_error(None);
        let play = self.publish(ctx, event);

        if autoplay {
            let notice = MediaEvent::provider(ProviderEvent::Autoplay).with_trigger(play.clone());
            self.process(ctx, notice, reactions);
        }
        if replay {
            self.publish(ctx, MediaEvent::new(MediaEventDetail::Replay).with_trigger(play));
        }
    }

    fn on_playing(
        &mut self,
        ctx: &mut TrackerContext<'_>,
        mut event: MediaEvent,
        reactions: &mut Vec<Reaction>,
    ) {
        self.link(&mut event, ProviderEventKind::Waiting);
        self.link(&mut event, ProviderEventKind::Play);
        self.cancel_waiting();
        serve(ctx, RequestCategory::Play, &mut event);

        let looped = ctx.flags.looping;
        if looped {
            ctx.flags.looping = false;
            ctx.flags.replaying = false;
        }
        let first_start = !ctx.store.state().started;
        ctx.store.set_playing(true);
        ctx.store.set_started(true);
        let playing = self.publish(ctx, event);

        if first_start {
            self.publish(
                ctx,
                MediaEvent::new(MediaEventDetail::Started).with_trigger(playing.clone()),
            );
        }
        if looped {
            self.publish(ctx, MediaEvent::new(MediaEventDetail::Replay).with_trigger(playing));
        }

        reactions.push(Reaction::PlaybackStarted);
        ctx.deferred.push(DeferredAction::ResetTracking);
    }

    fn on_seeked(&mut self, ctx: &mut TrackerContext<'_>, mut event: MediaEvent, time: f64) {
        if ctx.flags.seeking {
            ctx.store.set_seeking(true);
            debug!(time, "Seeked suppressed, scrub still pending");
            return;
        }

        if ctx.store.state().seeking {
            self.link(&mut event, ProviderEventKind::Seeking);
            ctx.store.set_seeking(false);
            if time != ctx.store.state().duration {
                ctx.store.set_ended(false);
            }
        }
        ctx.store.set_current_time(time);
        serve(ctx, RequestCategory::Seeked, &mut event);
        serve(ctx, RequestCategory::Seeking, &mut event);
        self.publish(ctx, event);
    }

    /// Every source after the first one starts a new epoch.
    fn reset_source(&mut self, ctx: &mut TrackerContext<'_>) {
        debug!("Source changed, soft-resetting media state");
        self.reset_tracking();
        self.cancel_waiting();
        self.seeking_throttle.reset();
        self.tiers.dispose(ListenerTier::LoadStart);
        self.tiers.dispose(ListenerTier::CanPlay);
        ctx.flags.clear();
        ctx.store.soft_reset();
    }

    fn cancel_waiting(&mut self) {
        self.waiting.cancel();
        self.waiting_event = None;
    }

    fn link(&self, event: &mut MediaEvent, kind: ProviderEventKind) {
        if let Some(trigger) = self.tracked.get(&kind) {
            event.append_trigger(trigger.clone());
        }
    }

    fn publish(&mut self, ctx: &mut TrackerContext<'_>, event: MediaEvent) -> Arc<MediaEvent> {
        let event = Arc::new(event);
        if let Some(kind) = event.provider_kind() {
            self.tracked.insert(kind, event.clone());
        }
        ctx.outbox.push(event.clone());
        event
    }
}

/// Attaches the pending request of `category` to `event`.
fn serve(ctx: &mut TrackerContext<'_>, category: RequestCategory, event: &mut MediaEvent) {
    if let Some(request) = ctx.queue.serve(category, |request| request) {
        if event.request.is_none() {
            event.request = Some(request);
        }
    }
}
