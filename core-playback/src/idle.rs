//! # Idle Detector
//!
//! Pure state machine behind the `user-idle-change` notification. It owns no
//! timer: every input returns an [`IdleUpdate`] telling the session whether
//! idleness flipped and what to do with the idle delay timer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Readable idle surface of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleState {
    pub idling: bool,
    pub paused_tracking: bool,
    pub delay_ms: u64,
}

/// What the session should do with the idle delay timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTimerCommand {
    Restart,
    Cancel,
    Keep,
}

/// Outcome of feeding one input to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleUpdate {
    /// New `idling` value when it changed.
    pub transition: Option<bool>,
    pub timer: IdleTimerCommand,
}

impl IdleUpdate {
    fn keep() -> Self {
        Self {
            transition: None,
            timer: IdleTimerCommand::Keep,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdleDetector {
    idling: bool,
    paused_tracking: bool,
    delay: Duration,
}

impl IdleDetector {
    pub fn new(delay: Duration) -> Self {
        Self {
            idling: false,
            paused_tracking: false,
            delay,
        }
    }

    pub fn state(&self) -> IdleState {
        IdleState {
            idling: self.idling,
            paused_tracking: self.paused_tracking,
            delay_ms: self.delay.as_millis() as u64,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.idling
    }

    pub fn is_tracking_paused(&self) -> bool {
        self.paused_tracking
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// A qualifying input (pointer, focus, key) arrived.
    pub fn on_input(&mut self, media_paused: bool) -> IdleUpdate {
        if self.paused_tracking {
            return IdleUpdate::keep();
        }

        let transition = self.set_idle(false);
        let timer = if media_paused {
            IdleTimerCommand::Cancel
        } else {
            IdleTimerCommand::Restart
        };

        IdleUpdate { transition, timer }
    }

    /// The idle delay elapsed without input.
    pub fn on_timeout(&mut self, media_paused: bool) -> IdleUpdate {
        if self.paused_tracking || media_paused {
            return IdleUpdate::keep();
        }

        IdleUpdate {
            transition: self.set_idle(true),
            timer: IdleTimerCommand::Keep,
        }
    }

    /// The media paused (or ended): idle immediately.
    pub fn on_media_paused(&mut self) -> IdleUpdate {
        IdleUpdate {
            transition: self.set_idle(true),
            timer: IdleTimerCommand::Cancel,
        }
    }

    /// Playback (re)started: an active user starts counting down.
    pub fn on_media_playing(&mut self) -> IdleUpdate {
        if self.paused_tracking || self.idling {
            return IdleUpdate::keep();
        }

        IdleUpdate {
            transition: None,
            timer: IdleTimerCommand::Restart,
        }
    }

    /// Pauses or resumes tracking. Pausing forces idle.
    ///
    /// Returns `None` when tracking already is in the requested state.
    pub fn pause_tracking(&mut self, paused: bool) -> Option<IdleUpdate> {
        if self.paused_tracking == paused {
            return None;
        }
        self.paused_tracking = paused;

        if paused {
            Some(IdleUpdate {
                transition: self.set_idle(true),
                timer: IdleTimerCommand::Cancel,
            })
        } else {
            Some(IdleUpdate::keep())
        }
    }

    /// Source or provider changed; the media is paused again.
    pub fn reset(&mut self) -> IdleUpdate {
        self.on_media_paused()
    }

    fn set_idle(&mut self, idling: bool) -> Option<bool> {
        if self.idling == idling {
            None
        } else {
            self.idling = idling;
            Some(idling)
        }
    }
}
