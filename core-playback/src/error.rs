//! # Playback Error Types
//!
//! Failures of the media session reconciliation engine.
//!
//! Errors that only affect the caller's own in-flight operation are returned
//! to that caller and, where [`PlaybackError::is_surfaced`] says so, also
//! published as a notification. Failures in best-effort subsystems (pause,
//! ads) are absorbed by the session and never interrupt content playback.

use bridge_traits::{BridgeError, MediaErrorDetail};
use core_runtime::events::FullscreenTarget;
use thiserror::Error;

/// Errors that can occur while driving a media session.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Readiness Errors
    // ========================================================================
    /// Operation attempted before a provider is attached or ready to play.
    #[error("Media not ready: {0}")]
    NotReady(String),

    // ========================================================================
    // Provider Errors
    // ========================================================================
    /// Provider rejected `play`.
    #[error("Playback failed: {cause}")]
    Playback {
        cause: MediaErrorDetail,
        /// The rejected call was an autoplay attempt.
        autoplay: bool,
    },

    /// Provider rejected `pause`. Recovered locally.
    #[error("Pause failed: {0}")]
    Pause(String),

    // ========================================================================
    // Fullscreen Errors
    // ========================================================================
    /// The resolved fullscreen surface lacks fullscreen capability.
    #[error("Fullscreen not supported by target {0:?}")]
    FullscreenUnsupported(FullscreenTarget),

    /// Fullscreen enter/exit was rejected.
    #[error("Fullscreen request failed: {0}")]
    Fullscreen(String),

    // ========================================================================
    // Ad Errors
    // ========================================================================
    /// The ad SDK failed to load or manage ads.
    #[error("Ad load failed: {0}")]
    AdLoad(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Malformed request payload (non-finite time or volume).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid playback configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error reported by a bridge collaborator.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if the session absorbs this failure without affecting
    /// content playback.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlaybackError::Pause(_) | PlaybackError::AdLoad(_))
    }

    /// Returns `true` if this failure is also published as a notification
    /// (`play-fail`, `fullscreen-error`).
    pub fn is_surfaced(&self) -> bool {
        matches!(
            self,
            PlaybackError::Playback { .. }
                | PlaybackError::FullscreenUnsupported(_)
                | PlaybackError::Fullscreen(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(PlaybackError::Pause("rejected".into()).is_recoverable());
        assert!(PlaybackError::AdLoad("timeout".into()).is_recoverable());
        assert!(!PlaybackError::NotReady("no provider".into()).is_recoverable());

        let playback = PlaybackError::Playback {
            cause: MediaErrorDetail::new(0, "NotAllowedError"),
            autoplay: true,
        };
        assert!(playback.is_surfaced());
        assert!(PlaybackError::FullscreenUnsupported(FullscreenTarget::Media).is_surfaced());
        assert!(!PlaybackError::Pause("rejected".into()).is_surfaced());
    }

    #[test]
    fn test_error_display() {
        let error = PlaybackError::Playback {
            cause: MediaErrorDetail::new(20, "aborted"),
            autoplay: false,
        };
        assert_eq!(error.to_string(), "Playback failed: aborted (code 20)");

        let error: PlaybackError = BridgeError::Rejected("no gesture".into()).into();
        assert!(matches!(error, PlaybackError::Bridge(_)));
    }
}
