//! # Timers and Deferred Actions
//!
//! The only sources of deferred re-entry into a session:
//!
//! - [`Debounce`]: a cancelable one-shot timer (waiting debounce, idle delay).
//!   Each schedule spawns a task that sleeps and then fires the session's
//!   [`TimerHook`]. Firings carry a generation number so a timer that was
//!   cancelled (or rescheduled) after it woke up is recognized as stale.
//! - [`Throttle`]: leading-edge rate limiter (seeking).
//! - [`DeferredQueue`]: actions postponed to the end of the current tick,
//!   drained by [`crate::MediaSession::tick`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use core_async::runtime;
use core_async::task::{self, JoinHandle};
use core_async::time::{sleep, Instant};
use tracing::{debug, trace};

/// Which session timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Debounced `waiting` publication.
    Waiting,
    /// User idle delay.
    Idle,
}

type TimerCallback = dyn Fn(TimerKind, u64) + Send + Sync;

/// Re-entry point a fired timer calls with its kind and generation.
#[derive(Clone)]
pub struct TimerHook(Arc<TimerCallback>);

impl TimerHook {
    pub fn new(callback: impl Fn(TimerKind, u64) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    /// Hook that ignores every firing.
    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    pub fn fire(&self, kind: TimerKind, generation: u64) {
        (self.0)(kind, generation)
    }
}

impl fmt::Debug for TimerHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TimerHook")
    }
}

// ============================================================================
// Debounce
// ============================================================================

/// Cancelable one-shot timer.
#[derive(Debug)]
pub struct Debounce {
    kind: TimerKind,
    delay: Duration,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl Debounce {
    pub fn new(kind: TimerKind, delay: Duration) -> Self {
        Self {
            kind,
            delay,
            generation: 0,
            handle: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// (Re)starts the timer. A pending firing is cancelled first.
    ///
    /// Without a runtime nothing is spawned and the timer stays idle.
    pub fn schedule(&mut self, hook: &TimerHook) {
        self.cancel();

        if !runtime::has_runtime() {
            debug!(timer = ?self.kind, "No runtime, timer not scheduled");
            return;
        }

        let hook = hook.clone();
        let kind = self.kind;
        let delay = self.delay;
        let generation = self.generation;
        trace!(timer = ?kind, generation, delay_ms = delay.as_millis() as u64, "Timer scheduled");

        self.handle = Some(task::spawn(async move {
            sleep(delay).await;
            hook.fire(kind, generation);
        }));
    }

    /// Cancels a pending firing. Firings already past their sleep become stale.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    /// Accepts a firing if `generation` is the one currently scheduled.
    ///
    /// Returns `false` for stale firings.
    pub fn complete(&mut self, generation: u64) -> bool {
        if self.handle.is_some() && self.generation == generation {
            self.handle = None;
            true
        } else {
            trace!(timer = ?self.kind, generation, current = self.generation, "Stale timer firing");
            false
        }
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// ============================================================================
// Throttle
// ============================================================================

/// Leading-edge throttle: the first call passes, later calls within
/// `interval` of the last accepted one are dropped.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

// ============================================================================
// Deferred actions
// ============================================================================

/// Work postponed until every event of the current tick has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Clear the causality cache once same-tick triggers had a chance to link.
    ResetTracking,
    /// Try to start playback on behalf of the autoplay preference.
    AttemptAutoplay,
    /// Restart playback after content ended with looping enabled.
    RequestLoop,
}

#[derive(Debug, Default)]
pub struct DeferredQueue {
    actions: VecDeque<DeferredAction>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: DeferredAction) {
        trace!(action = ?action, "Action deferred");
        self.actions.push_back(action);
    }

    /// Takes every queued action, oldest first.
    pub fn drain(&mut self) -> Vec<DeferredAction> {
        self.actions.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn contains(&self, action: DeferredAction) -> bool {
        self.actions.contains(&action)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
