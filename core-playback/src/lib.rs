//! # Media Session Engine
//!
//! Reconciles what callers ask a media player to do with what the underlying
//! playback engine actually reports.
//!
//! ## Overview
//!
//! Engines emit raw events that may lag, arrive out of order, duplicate or
//! never come at all. Callers issue requests (play, seek, mute, enter
//! fullscreen) that the engine may honor late or reject. A
//! [`MediaSession`] sits between them:
//!
//! - **Requests** go through the [`RequestManager`], which parks each one in
//!   the [`RequestQueue`](queue::RequestQueue) slot of its category and calls
//!   the provider.
//! - **Engine events** go through the [`StateManager`](state_manager::StateManager),
//!   which links every event to its cause, updates [`MediaState`], attaches
//!   the request it satisfied and publishes the canonical notification.
//! - **User idleness** is tracked by the [`IdleDetector`](idle::IdleDetector).
//! - **Ads** are bridged by the [`AdSessionController`](ads::AdSessionController).
//!
//! Notifications are broadcast on an
//! [`EventBus`](core_runtime::events::EventBus); state snapshots on a `watch`
//! channel.
//!
//! ## Modules
//!
//! - `session`: public session handle and event loop
//! - `request_manager`: request handling and provider calls
//! - `state_manager`: raw event reconciliation
//! - `state`: canonical state and its versioned store
//! - `queue`: one pending request per category
//! - `idle`: user idle state machine
//! - `timers`: debounce, throttle and deferred actions
//! - `ads`: ad SDK integration
//! - `config`: tunables
//! - `error`: error types

pub mod ads;
pub mod config;
mod engine;
pub mod error;
pub mod idle;
pub mod queue;
pub mod request_manager;
pub mod session;
pub mod state;
pub mod state_manager;
pub mod timers;

pub use ads::{AdEffect, AdPhase, AdSession, AdSessionController};
pub use config::{AdsConfig, PlaybackConfig};
pub use error::{PlaybackError, Result};
pub use idle::{IdleDetector, IdleState};
pub use queue::{QueueStats, RequestQueue};
pub use request_manager::RequestManager;
pub use session::MediaSession;
pub use state::{MediaState, SessionFlags, StateStore};
pub use state_manager::{ListenerTier, Reaction, StateManager};
pub use timers::{DeferredAction, TimerKind};
