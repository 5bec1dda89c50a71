//! Provider bridge traits and the raw media vocabulary.
//!
//! A *provider* adapts one concrete playback engine (native `<video>`, an HLS
//! library, an embedded iframe player, ...) to a uniform surface: a handful of
//! imperative controls plus a raw [`ProviderEvent`] stream describing what the
//! engine actually did. The session core never trusts that stream blindly;
//! it reconciles it against the requests it issued.
//!
//! Fullscreen and screen-orientation capabilities are separate adapters so a
//! host can offer a session-level fullscreen surface (the player container)
//! next to the provider's own.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// Time ranges
// ============================================================================

/// Ordered, non-overlapping `[start, end]` ranges in seconds.
///
/// Used for buffered, seekable and played ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRanges(Vec<(f64, f64)>);

impl TimeRanges {
    /// Empty range set.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from raw `(start, end)` pairs. Pairs are sorted by start and
    /// overlapping pairs are merged; inverted pairs are dropped.
    pub fn from_ranges(ranges: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut pairs: Vec<(f64, f64)> = ranges
            .into_iter()
            .filter(|(start, end)| start <= end)
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut merged: Vec<(f64, f64)> = Vec::with_capacity(pairs.len());
        for (start, end) in pairs {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        Self(merged)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn start(&self, index: usize) -> Option<f64> {
        self.0.get(index).map(|(start, _)| *start)
    }

    pub fn end(&self, index: usize) -> Option<f64> {
        self.0.get(index).map(|(_, end)| *end)
    }

    /// End of the last range, or `0.0` when empty.
    pub fn last_end(&self) -> f64 {
        self.0.last().map(|(_, end)| *end).unwrap_or(0.0)
    }

    /// Returns `true` if `time` falls inside any range.
    pub fn contains(&self, time: f64) -> bool {
        self.0.iter().any(|(start, end)| *start <= time && time <= *end)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.0.iter()
    }
}

// ============================================================================
// Media descriptors
// ============================================================================

/// Kind of media currently loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Unknown,
    Audio,
    Video,
}

/// How the media is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    #[default]
    Unknown,
    Audio,
    Video,
}

/// The concrete engine family behind a provider.
///
/// Only used for capability decisions (ad insertion, can-play quirks); the
/// core never branches on it for ordinary playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Audio,
    Video,
    Hls,
    Dash,
    /// Third-party embed (iframe) player.
    Embed,
    /// Remote playback device (cast receiver).
    Remote,
}

impl ProviderKind {
    /// Content types a client-side ad SDK can insert into.
    pub fn supports_ad_insertion(&self) -> bool {
        matches!(self, ProviderKind::Video | ProviderKind::Hls | ProviderKind::Dash)
    }
}

/// One candidate media resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Resource URL.
    pub src: String,
    /// MIME type, when known (e.g. `video/mp4`, `application/x-mpegurl`).
    pub mime_type: Option<String>,
}

impl MediaSource {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Error reported by a provider, either as an `error` event or as the cause of
/// a rejected `play`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaErrorDetail {
    /// Engine error code (`MediaError.code` for native engines, 0 if unknown).
    pub code: u16,
    /// Human-readable message.
    pub message: String,
}

impl MediaErrorDetail {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for MediaErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl From<&crate::BridgeError> for MediaErrorDetail {
    fn from(error: &crate::BridgeError) -> Self {
        Self::new(0, error.to_string())
    }
}

/// Screen orientation a fullscreen session may lock to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrientationLockType {
    Any,
    Natural,
    Landscape,
    Portrait,
    LandscapePrimary,
    LandscapeSecondary,
    PortraitPrimary,
    PortraitSecondary,
}

// ============================================================================
// Raw provider events
// ============================================================================

/// Raw event emitted by a provider (or a fullscreen adapter).
///
/// Engines may lag, reorder, drop or duplicate these; the session core is
/// responsible for turning them into consistent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "kebab-case")]
pub enum ProviderEvent {
    MediaTypeChange(MediaType),
    ViewTypeChange(ViewType),
    CanLoad,
    SourcesChange(Vec<MediaSource>),
    SourceChange(Option<MediaSource>),
    LoadStart,
    LoadedMetadata,
    LoadedData,
    CanPlay { duration: f64 },
    CanPlayThrough { duration: f64 },
    DurationChange(f64),
    Progress { buffered: TimeRanges, seekable: TimeRanges },
    Autoplay,
    AutoplayFail(MediaErrorDetail),
    Play,
    PlayFail(MediaErrorDetail),
    Playing,
    Pause,
    TimeUpdate { current_time: f64, played: TimeRanges },
    VolumeChange { volume: f64, muted: bool },
    Seeking(f64),
    Seeked(f64),
    Waiting,
    Ended,
    Abort,
    Error(MediaErrorDetail),
    /// Reported by fullscreen adapters rather than the engine itself.
    FullscreenChange(bool),
}

/// Field-less discriminant of [`ProviderEvent`], used as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderEventKind {
    MediaTypeChange,
    ViewTypeChange,
    CanLoad,
    SourcesChange,
    SourceChange,
    LoadStart,
    LoadedMetadata,
    LoadedData,
    CanPlay,
    CanPlayThrough,
    DurationChange,
    Progress,
    Autoplay,
    AutoplayFail,
    Play,
    PlayFail,
    Playing,
    Pause,
    TimeUpdate,
    VolumeChange,
    Seeking,
    Seeked,
    Waiting,
    Ended,
    Abort,
    Error,
    FullscreenChange,
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            ProviderEvent::MediaTypeChange(_) => ProviderEventKind::MediaTypeChange,
            ProviderEvent::ViewTypeChange(_) => ProviderEventKind::ViewTypeChange,
            ProviderEvent::CanLoad => ProviderEventKind::CanLoad,
            ProviderEvent::SourcesChange(_) => ProviderEventKind::SourcesChange,
            ProviderEvent::SourceChange(_) => ProviderEventKind::SourceChange,
            ProviderEvent::LoadStart => ProviderEventKind::LoadStart,
            ProviderEvent::LoadedMetadata => ProviderEventKind::LoadedMetadata,
            ProviderEvent::LoadedData => ProviderEventKind::LoadedData,
            ProviderEvent::CanPlay { .. } => ProviderEventKind::CanPlay,
            ProviderEvent::CanPlayThrough { .. } => ProviderEventKind::CanPlayThrough,
            ProviderEvent::DurationChange(_) => ProviderEventKind::DurationChange,
            ProviderEvent::Progress { .. } => ProviderEventKind::Progress,
            ProviderEvent::Autoplay => ProviderEventKind::Autoplay,
            ProviderEvent::AutoplayFail(_) => ProviderEventKind::AutoplayFail,
            ProviderEvent::Play => ProviderEventKind::Play,
            ProviderEvent::PlayFail(_) => ProviderEventKind::PlayFail,
            ProviderEvent::Playing => ProviderEventKind::Playing,
            ProviderEvent::Pause => ProviderEventKind::Pause,
            ProviderEvent::TimeUpdate { .. } => ProviderEventKind::TimeUpdate,
            ProviderEvent::VolumeChange { .. } => ProviderEventKind::VolumeChange,
            ProviderEvent::Seeking(_) => ProviderEventKind::Seeking,
            ProviderEvent::Seeked(_) => ProviderEventKind::Seeked,
            ProviderEvent::Waiting => ProviderEventKind::Waiting,
            ProviderEvent::Ended => ProviderEventKind::Ended,
            ProviderEvent::Abort => ProviderEventKind::Abort,
            ProviderEvent::Error(_) => ProviderEventKind::Error,
            ProviderEvent::FullscreenChange(_) => ProviderEventKind::FullscreenChange,
        }
    }
}

impl ProviderEventKind {
    /// Kebab-case event name (`can-play-through`, `time-update`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            ProviderEventKind::MediaTypeChange => "media-type-change",
            ProviderEventKind::ViewTypeChange => "view-type-change",
            ProviderEventKind::CanLoad => "can-load",
            ProviderEventKind::SourcesChange => "sources-change",
            ProviderEventKind::SourceChange => "source-change",
            ProviderEventKind::LoadStart => "load-start",
            ProviderEventKind::LoadedMetadata => "loaded-metadata",
            ProviderEventKind::LoadedData => "loaded-data",
            ProviderEventKind::CanPlay => "can-play",
            ProviderEventKind::CanPlayThrough => "can-play-through",
            ProviderEventKind::DurationChange => "duration-change",
            ProviderEventKind::Progress => "progress",
            ProviderEventKind::Autoplay => "autoplay",
            ProviderEventKind::AutoplayFail => "autoplay-fail",
            ProviderEventKind::Play => "play",
            ProviderEventKind::PlayFail => "play-fail",
            ProviderEventKind::Playing => "playing",
            ProviderEventKind::Pause => "pause",
            ProviderEventKind::TimeUpdate => "time-update",
            ProviderEventKind::VolumeChange => "volume-change",
            ProviderEventKind::Seeking => "seeking",
            ProviderEventKind::Seeked => "seeked",
            ProviderEventKind::Waiting => "waiting",
            ProviderEventKind::Ended => "ended",
            ProviderEventKind::Abort => "abort",
            ProviderEventKind::Error => "error",
            ProviderEventKind::FullscreenChange => "fullscreen-change",
        }
    }
}

impl fmt::Display for ProviderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Fullscreen capability of a surface (the player container or the provider).
#[async_trait::async_trait]
pub trait FullscreenAdapter: Send + Sync {
    /// Whether this surface can enter fullscreen at all.
    fn is_supported(&self) -> bool;

    /// Whether this surface is currently fullscreen.
    fn is_active(&self) -> bool;

    async fn enter(&self) -> Result<()>;

    async fn exit(&self) -> Result<()>;
}

/// Screen orientation locking, applied around fullscreen sessions.
#[async_trait::async_trait]
pub trait ScreenOrientationAdapter: Send + Sync {
    fn is_supported(&self) -> bool;

    fn is_locked(&self) -> bool;

    async fn lock(&self, lock_type: OrientationLockType) -> Result<()>;

    async fn unlock(&self) -> Result<()>;
}

/// Uniform control surface over a concrete playback engine.
///
/// Setters are fire-and-forget: the engine confirms them (or not) through the
/// event stream. `play` and `pause` are asynchronous and may be rejected.
#[async_trait::async_trait]
pub trait MediaProvider: Send + Sync {
    /// Engine family behind this provider.
    fn kind(&self) -> ProviderKind;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    fn set_current_time(&self, time: f64);

    fn set_volume(&self, volume: f64);

    fn set_muted(&self, muted: bool);

    /// The provider's own fullscreen surface, if it has one.
    fn fullscreen(&self) -> Option<Arc<dyn FullscreenAdapter>>;

    /// Whether the engine emits `can-play`/`can-play-through` on its own.
    ///
    /// Engines that never do have readiness derived from `loaded-metadata`.
    fn emits_can_play(&self) -> bool {
        true
    }
}
