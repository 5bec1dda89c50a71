//! # Host Bridge Traits
//!
//! Contracts between the media session core and the host platform.
//!
//! ## Overview
//!
//! The session core never talks to a media engine, a fullscreen API or an ad
//! SDK directly. Each host (desktop shell, mobile webview, browser) provides
//! adapters for these traits and forwards the raw events its engine emits.
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaProvider`](media::MediaProvider) - Playback engine commands (play, pause, seek, volume)
//! - [`FullscreenAdapter`](media::FullscreenAdapter) - Enter/exit fullscreen for the player or the engine
//! - [`ScreenOrientationAdapter`](media::ScreenOrientationAdapter) - Orientation lock while fullscreen
//!
//! ### Ads
//! - [`AdsLoader`](ads::AdsLoader) - Turns an ad tag into an [`AdsManager`](ads::AdsManager)
//! - [`AdsManager`](ads::AdsManager) - Renders ad breaks over the content
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Events
//!
//! Engines report what happened through [`ProviderEvent`](media::ProviderEvent);
//! ad SDKs through [`AdSdkEvent`](ads::AdSdkEvent). Neither is assumed to be
//! ordered or deduplicated.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Hosts should map
//! policy refusals (autoplay blocked, no user gesture) to
//! [`BridgeError::Rejected`] so the core can tell them apart from failures.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so adapters can be shared between the
//! session and its timer tasks.

pub mod ads;
pub mod error;
pub mod logging;
pub mod media;

pub use error::BridgeError;

// Re-export commonly used types
pub use ads::{
    AdErrorInfo, AdErrorSource, AdInfo, AdSdkEvent, AdViewMode, AdsLoader, AdsManager, AdsRequest,
};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{
    FullscreenAdapter, MediaErrorDetail, MediaProvider, MediaSource, MediaType,
    OrientationLockType, ProviderEvent, ProviderEventKind, ProviderKind,
    ScreenOrientationAdapter, TimeRanges, ViewType,
};
