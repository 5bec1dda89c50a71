//! # Playback Configuration
//!
//! Tuning knobs of a media session: timer intervals, seek and volume
//! constants, playback preferences and the ad session settings.

use bridge_traits::OrientationLockType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PlaybackError, Result};

/// Media session configuration.
///
/// Every field has a serde default, so a partial (or empty) document
/// deserializes to a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Silence after the last qualifying input before the user counts as idle.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_idle_delay")]
    pub idle_delay: Duration,

    /// Engine `waiting` signals are only published after this long without
    /// being cancelled by playback resuming or pausing.
    ///
    /// Default: 300 ms.
    #[serde(default = "default_waiting_debounce")]
    pub waiting_debounce: Duration,

    /// Minimum spacing between forwarded engine `seeking` signals.
    ///
    /// Default: 150 ms.
    #[serde(default = "default_seeking_throttle")]
    pub seeking_throttle: Duration,

    /// Seeks landing within this many seconds of the end are snapped to the
    /// duration.
    ///
    /// Default: 0.25 s.
    #[serde(default = "default_seek_end_tolerance")]
    pub seek_end_tolerance: f64,

    /// Volume forced when muting/unmuting at volume 0 so unmuting is audible.
    ///
    /// Default: 0.25.
    #[serde(default = "default_unmute_volume")]
    pub unmute_volume: f64,

    /// Attempt playback as soon as a source can play.
    ///
    /// Default: false.
    #[serde(default)]
    pub autoplay: bool,

    /// Restart playback when the content ends.
    ///
    /// Default: false.
    #[serde(default)]
    pub loop_playback: bool,

    /// Orientation locked while fullscreen, if any.
    #[serde(default)]
    pub orientation_lock: Option<OrientationLockType>,

    /// Ad session settings.
    #[serde(default)]
    pub ads: AdsConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            idle_delay: default_idle_delay(),
            waiting_debounce: default_waiting_debounce(),
            seeking_throttle: default_seeking_throttle(),
            seek_end_tolerance: default_seek_end_tolerance(),
            unmute_volume: default_unmute_volume(),
            autoplay: false,
            loop_playback: false,
            orientation_lock: None,
            ads: AdsConfig::default(),
        }
    }
}

/// Ad session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdsConfig {
    /// VAST/VMAP tag. Ads never load without one.
    #[serde(default)]
    pub ad_tag_url: Option<String>,

    /// Space kept free under non-linear ads for the control bar, in pixels.
    ///
    /// Default: 80.
    #[serde(default = "default_nonlinear_bottom_margin")]
    pub nonlinear_bottom_margin: u32,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            ad_tag_url: None,
            nonlinear_bottom_margin: default_nonlinear_bottom_margin(),
        }
    }
}

impl PlaybackConfig {
    /// Configuration serving ads from `ad_tag_url`.
    pub fn with_ad_tag(mut self, ad_tag_url: impl Into<String>) -> Self {
        self.ads.ad_tag_url = Some(ad_tag_url.into());
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.idle_delay.is_zero() {
            return Err(PlaybackError::Config("idle_delay must be > 0".to_string()));
        }

        if self.waiting_debounce.is_zero() {
            return Err(PlaybackError::Config(
                "waiting_debounce must be > 0".to_string(),
            ));
        }

        if self.seeking_throttle.is_zero() {
            return Err(PlaybackError::Config(
                "seeking_throttle must be > 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.seek_end_tolerance) {
            return Err(PlaybackError::Config(
                "seek_end_tolerance must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.unmute_volume) || self.unmute_volume == 0.0 {
            return Err(PlaybackError::Config(
                "unmute_volume must be in (0.0, 1.0]".to_string(),
            ));
        }

        if let Some(url) = &self.ads.ad_tag_url {
            if url.trim().is_empty() {
                return Err(PlaybackError::Config(
                    "ads.ad_tag_url must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_idle_delay() -> Duration {
    Duration::from_millis(2000)
}

fn default_waiting_debounce() -> Duration {
    Duration::from_millis(300)
}

fn default_seeking_throttle() -> Duration {
    Duration::from_millis(150)
}

fn default_seek_end_tolerance() -> f64 {
    0.25
}

fn default_unmute_volume() -> f64 {
    0.25
}

fn default_nonlinear_bottom_margin() -> u32 {
    80
}
