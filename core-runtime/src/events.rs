//! # Event Bus System
//!
//! Notification vocabulary of a media session and the broadcast bus that
//! carries it, built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Requests**: [`RequestEvent`] describes something a caller asked for
//!   (play, seek, enter fullscreen). Each request kind belongs to at most one
//!   [`RequestCategory`], the slot it occupies in the request queue.
//! - **Notifications**: [`MediaEvent`] is a canonical event published by the
//!   session. It carries its trigger chain (the antecedent events that caused
//!   it) and, when an engine event satisfied a pending request, that request.
//! - **EventBus**: Central broadcast channel for publishing notifications
//! - **EventStream**: Wrapper for consuming notifications with filtering
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use bridge_traits::ProviderEvent;
//! use core_runtime::events::{EventBus, MediaEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! let can_play = Arc::new(MediaEvent::provider(ProviderEvent::CanPlay { duration: 10.0 }));
//! event_bus.emit(can_play).ok();
//!
//! let received = subscriber.recv().await.unwrap();
//! assert_eq!(received.name(), "can-play");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped (session gone).

use bridge_traits::{AdInfo, ProviderEvent, ProviderEventKind};
use chrono::{DateTime, Utc};
use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

// Re-export commonly used types
pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Requests
// ============================================================================

/// Request queue slot. At most one pending request exists per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestCategory {
    Load,
    Play,
    Pause,
    Volume,
    Fullscreen,
    Seeking,
    Seeked,
    UserIdle,
}

impl RequestCategory {
    pub const ALL: [RequestCategory; 8] = [
        RequestCategory::Load,
        RequestCategory::Play,
        RequestCategory::Pause,
        RequestCategory::Volume,
        RequestCategory::Fullscreen,
        RequestCategory::Seeking,
        RequestCategory::Seeked,
        RequestCategory::UserIdle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RequestCategory::Load => "load",
            RequestCategory::Play => "play",
            RequestCategory::Pause => "pause",
            RequestCategory::Volume => "volume",
            RequestCategory::Fullscreen => "fullscreen",
            RequestCategory::Seeking => "seeking",
            RequestCategory::Seeked => "seeked",
            RequestCategory::UserIdle => "user-idle",
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which surface a fullscreen request addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FullscreenTarget {
    /// The session-level surface when it supports fullscreen, else the provider.
    #[default]
    PreferMedia,
    /// Only the session-level surface.
    Media,
    /// Only the provider's own surface.
    Provider,
}

/// What a caller asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "kebab-case")]
pub enum RequestKind {
    StartLoading,
    Mute,
    Unmute,
    Play,
    Pause,
    /// Live scrubbing to a time, before the seek is committed.
    Seeking(f64),
    Seek(f64),
    VolumeChange(f64),
    EnterFullscreen(FullscreenTarget),
    ExitFullscreen(FullscreenTarget),
    ResumeUserIdle,
    PauseUserIdle,
    ShowPoster,
    HidePoster,
    Loop,
}

impl RequestKind {
    /// Queue slot used by this request, if it waits for an engine event.
    pub fn category(&self) -> Option<RequestCategory> {
        match self {
            RequestKind::StartLoading => Some(RequestCategory::Load),
            RequestKind::Mute | RequestKind::Unmute | RequestKind::VolumeChange(_) => {
                Some(RequestCategory::Volume)
            }
            RequestKind::Play => Some(RequestCategory::Play),
            RequestKind::Pause => Some(RequestCategory::Pause),
            RequestKind::Seeking(_) => Some(RequestCategory::Seeking),
            RequestKind::Seek(_) => Some(RequestCategory::Seeked),
            RequestKind::EnterFullscreen(_) | RequestKind::ExitFullscreen(_) => {
                Some(RequestCategory::Fullscreen)
            }
            RequestKind::ResumeUserIdle | RequestKind::PauseUserIdle => {
                Some(RequestCategory::UserIdle)
            }
            RequestKind::ShowPoster | RequestKind::HidePoster | RequestKind::Loop => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::StartLoading => "start-loading",
            RequestKind::Mute => "mute",
            RequestKind::Unmute => "unmute",
            RequestKind::Play => "play",
            RequestKind::Pause => "pause",
            RequestKind::Seeking(_) => "seeking",
            RequestKind::Seek(_) => "seek",
            RequestKind::VolumeChange(_) => "volume-change",
            RequestKind::EnterFullscreen(_) => "enter-fullscreen",
            RequestKind::ExitFullscreen(_) => "exit-fullscreen",
            RequestKind::ResumeUserIdle => "resume-user-idle",
            RequestKind::PauseUserIdle => "pause-user-idle",
            RequestKind::ShowPoster => "show-poster",
            RequestKind::HidePoster => "hide-poster",
            RequestKind::Loop => "loop",
        }
    }
}

/// Who issued a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestOrigin {
    /// A UI control.
    User,
    /// The public API.
    #[default]
    Api,
    /// The ad SDK asking to pause or resume content.
    AdSdk,
    /// The session itself (autoplay, loop).
    Internal,
}

/// A request together with its origin metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub id: Uuid,
    pub kind: RequestKind,
    pub origin: RequestOrigin,
    /// Free-form caller label (control name, API method).
    pub label: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RequestEvent {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            origin: RequestOrigin::default(),
            label: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(kind: RequestKind) -> Self {
        Self::new(kind).with_origin(RequestOrigin::User)
    }

    pub fn internal(kind: RequestKind) -> Self {
        Self::new(kind).with_origin(RequestOrigin::Internal)
    }

    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Same request, re-targeted at another kind (mute issuing its volume reset).
    pub fn derive(&self, kind: RequestKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            origin: self.origin,
            label: self.label.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn category(&self) -> Option<RequestCategory> {
        self.kind.category()
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// User activity that counts against the idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserInputKind {
    PointerDown,
    PointerMove,
    Focus,
    KeyDown,
}

impl UserInputKind {
    pub fn name(&self) -> &'static str {
        match self {
            UserInputKind::PointerDown => "pointer-down",
            UserInputKind::PointerMove => "pointer-move",
            UserInputKind::Focus => "focus",
            UserInputKind::KeyDown => "key-down",
        }
    }
}

/// Payload of a [`MediaEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "kebab-case")]
pub enum MediaEventDetail {
    /// Canonical form of a raw provider event.
    Provider(ProviderEvent),
    /// Playback restarted after ending (or through a loop).
    Replay,
    /// First playback of the current source.
    Started,
    UserIdleChange { idle: bool },
    /// Only ever seen as the trigger of an idle transition.
    UserInput(UserInputKind),
    FullscreenError { message: String },
    /// Ad-prefixed SDK event (`ad-started`, `ad-break-ready`, `ad-ended`, ...).
    Ad { name: String, ad: Option<AdInfo> },
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

/// A canonical notification published by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEvent {
    pub id: Uuid,
    pub detail: MediaEventDetail,
    /// Antecedent events, in the order they were attached.
    pub triggers: Vec<Arc<MediaEvent>>,
    /// Request this event satisfied, if any.
    pub request: Option<Arc<RequestEvent>>,
    /// Raised while an autoplay attempt is in flight.
    pub autoplay: bool,
    pub timestamp: DateTime<Utc>,
}

impl MediaEvent {
    pub fn new(detail: MediaEventDetail) -> Self {
        Self {
            id: Uuid::new_v4(),
            detail,
            triggers: Vec::new(),
            request: None,
            autoplay: false,
            timestamp: Utc::now(),
        }
    }

    pub fn provider(event: ProviderEvent) -> Self {
        Self::new(MediaEventDetail::Provider(event))
    }

    pub fn ad(name: impl Into<String>, ad: Option<AdInfo>) -> Self {
        Self::new(MediaEventDetail::Ad {
            name: name.into(),
            ad,
        })
    }

    pub fn with_trigger(mut self, trigger: Arc<MediaEvent>) -> Self {
        self.append_trigger(trigger);
        self
    }

    pub fn with_request(mut self, request: Arc<RequestEvent>) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    /// Records `trigger` as a cause of this event. Self-links are ignored.
    pub fn append_trigger(&mut self, trigger: Arc<MediaEvent>) {
        if trigger.id != self.id && !self.triggers.iter().any(|t| t.id == trigger.id) {
            self.triggers.push(trigger);
        }
    }

    /// Kebab-case notification name.
    pub fn name(&self) -> &str {
        match &self.detail {
            MediaEventDetail::Provider(event) => event.kind().name(),
            MediaEventDetail::Replay => "replay",
            MediaEventDetail::Started => "started",
            MediaEventDetail::UserIdleChange { .. } => "user-idle-change",
            MediaEventDetail::UserInput(input) => input.name(),
            MediaEventDetail::FullscreenError { .. } => "fullscreen-error",
            MediaEventDetail::Ad { name, .. } => name,
        }
    }

    pub fn provider_kind(&self) -> Option<ProviderEventKind> {
        match &self.detail {
            MediaEventDetail::Provider(event) => Some(event.kind()),
            _ => None,
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match &self.detail {
            MediaEventDetail::Provider(
                ProviderEvent::PlayFail(_) | ProviderEvent::AutoplayFail(_) | ProviderEvent::Error(_),
            )
            | MediaEventDetail::FullscreenError { .. } => EventSeverity::Error,
            MediaEventDetail::Ad { name, .. } if name == "ad-error" => EventSeverity::Warning,
            MediaEventDetail::Provider(ProviderEvent::Ended | ProviderEvent::Abort)
            | MediaEventDetail::Started
            | MediaEventDetail::Replay => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Root of the trigger chain (the event itself when it has no trigger).
    pub fn origin(&self) -> &MediaEvent {
        let mut current = self;
        while let Some(next) = current.triggers.first() {
            current = next;
        }
        current
    }

    /// Whether an event of `kind` appears anywhere in the trigger chain.
    pub fn has_trigger(&self, kind: ProviderEventKind) -> bool {
        self.triggers
            .iter()
            .any(|t| t.provider_kind() == Some(kind) || t.has_trigger(kind))
    }

    /// Whether the direct (first) trigger is of `kind`.
    pub fn is_triggered_by(&self, kind: ProviderEventKind) -> bool {
        self.triggers
            .first()
            .is_some_and(|t| t.provider_kind() == Some(kind))
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting session notifications.
///
/// Events are shared as `Arc<MediaEvent>` since trigger chains already hold
/// them by reference.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<MediaEvent>>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: Arc<MediaEvent>) -> Result<usize, SendError<Arc<MediaEvent>>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<Arc<MediaEvent>> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&MediaEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventSeverity, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let errors = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.severity() >= EventSeverity::Error);
/// ```
pub struct EventStream {
    receiver: Receiver<Arc<MediaEvent>>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<Arc<MediaEvent>>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events that match `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&MediaEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &MediaEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<Arc<MediaEvent>, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<Arc<MediaEvent>, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
