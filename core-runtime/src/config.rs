//! # Core Configuration Module
//!
//! Provides configuration management for the media session core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the host adapters a session may call into, plus the
//! feature flags that decide which optional subsystems run. It enforces
//! fail-fast validation so a session never starts with a feature enabled but
//! the adapter it needs missing.
//!
//! ## Optional Adapters
//!
//! - `FullscreenAdapter` - Session-level fullscreen surface (the player
//!   container). Without it only the provider's own fullscreen can be used.
//! - `ScreenOrientationAdapter` - Orientation lock while fullscreen
//! - `AdsLoader` - Ad SDK entry point (required when `enable_ads` is set)
//! - `LoggerSink` - Host log forwarding
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .fullscreen(Arc::new(MyContainerFullscreen))
//!     .ads_loader(Arc::new(MyAdsLoader))
//!     .enable_ads(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Ads need an AdsLoader
//! let config = CoreConfig::builder()
//!     .enable_ads(true)
//!     .build()
//!     .expect("Should fail - missing ads loader");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use bridge_traits::{AdsLoader, FullscreenAdapter, LoggerSink, ScreenOrientationAdapter};
use std::sync::Arc;

/// Core configuration for a media session.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Fullscreen surface for the whole player (optional)
    pub fullscreen: Option<Arc<dyn FullscreenAdapter>>,

    /// Screen orientation adapter (optional)
    pub orientation: Option<Arc<dyn ScreenOrientationAdapter>>,

    /// Ad SDK loader (required when ads are enabled)
    pub ads_loader: Option<Arc<dyn AdsLoader>>,

    /// Host logger (optional)
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Capacity of the notification bus
    pub event_buffer_size: usize,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field(
                "fullscreen",
                &self.fullscreen.as_ref().map(|_| "FullscreenAdapter { ... }"),
            )
            .field(
                "orientation",
                &self
                    .orientation
                    .as_ref()
                    .map(|_| "ScreenOrientationAdapter { ... }"),
            )
            .field(
                "ads_loader",
                &self.ads_loader.as_ref().map(|_| "AdsLoader { ... }"),
            )
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Run the ad session controller (requires AdsLoader)
    pub enable_ads: bool,

    /// Track user activity and publish idle transitions
    pub enable_idle_tracking: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_ads: false,
            enable_idle_tracking: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The event buffer can hold at least one event
    /// - Feature flags are consistent with available adapters
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.features.enable_ads && self.ads_loader.is_none() {
            return Err(ads_loader_missing_error());
        }

        Ok(())
    }

    /// Logging configuration that forwards to this config's host sink.
    pub fn logging_config(&self) -> LoggingConfig {
        match &self.logger_sink {
            Some(sink) => LoggingConfig::default().with_logger_sink(Arc::clone(sink)),
            None => LoggingConfig::default(),
        }
    }
}

fn ads_loader_missing_error() -> Error {
    Error::capability_missing(
        "AdsLoader",
        "Ads are enabled but no AdsLoader was provided. \
         Disable the feature or inject the host's ad SDK bridge.",
    )
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the final
/// config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    fullscreen: Option<Arc<dyn FullscreenAdapter>>,
    orientation: Option<Arc<dyn ScreenOrientationAdapter>>,
    ads_loader: Option<Arc<dyn AdsLoader>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the session-level fullscreen adapter.
    pub fn fullscreen(mut self, adapter: Arc<dyn FullscreenAdapter>) -> Self {
        self.fullscreen = Some(adapter);
        self
    }

    /// Sets the screen orientation adapter.
    pub fn orientation(mut self, adapter: Arc<dyn ScreenOrientationAdapter>) -> Self {
        self.orientation = Some(adapter);
        self
    }

    /// Sets the ad SDK loader.
    pub fn ads_loader(mut self, loader: Arc<dyn AdsLoader>) -> Self {
        self.ads_loader = Some(loader);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Sets the notification bus capacity.
    ///
    /// Default: 100 events
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Enables or disables the ad session controller.
    ///
    /// Requires an `AdsLoader` to be provided.
    ///
    /// Default: false
    pub fn enable_ads(mut self, enabled: bool) -> Self {
        self.features.enable_ads = enabled;
        self
    }

    /// Enables or disables user idle tracking.
    ///
    /// Default: true
    pub fn enable_idle_tracking(mut self, enabled: bool) -> Self {
        self.features.enable_idle_tracking = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns an error if:
    /// - The event buffer size is zero
    /// - Ads are enabled without an `AdsLoader`
    pub fn build(self) -> Result<CoreConfig> {
        let config = CoreConfig {
            fullscreen: self.fullscreen,
            orientation: self.orientation,
            ads_loader: self.ads_loader,
            logger_sink: self.logger_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
