//! # Ad Session Controller
//!
//! Bridges a client-side ad SDK into the session. Loading is split in two so
//! the session never holds its lock across the SDK call:
//! [`AdSessionController::begin_load`] decides whether ads apply and hands back
//! an [`AdLoadPlan`]; the session awaits the loader and passes the result to
//! [`AdSessionController::finish_load`].
//!
//! While a linear ad plays, the content's position, played ranges and
//! duration are snapshotted. Ad progress is forged into content
//! `duration-change`/`time-update` events, and the snapshot is forged back
//! when the ad completes or is skipped.

use std::sync::Arc;

use bridge_traits::{
    AdErrorSource, AdSdkEvent, AdViewMode, AdsLoader, AdsManager, AdsRequest, BridgeError,
    ProviderEvent, ProviderKind, TimeRanges,
};
use core_async::sync::CancellationToken;
use core_runtime::events::MediaEvent;
use core_runtime::logging::redact_url;
use tracing::{debug, info, warn};

use crate::config::AdsConfig;
use crate::error::{PlaybackError, Result};
use crate::state::StateStore;

const DEFAULT_AD_WIDTH: u32 = 640;
const DEFAULT_AD_HEIGHT: u32 = 360;

/// Lifecycle of the ad integration for the current provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdPhase {
    #[default]
    Inactive,
    Loading,
    Ready,
    PlayingLinear,
    PlayingNonLinear,
    /// Every scheduled break has played.
    Complete,
}

/// Content snapshot and flags of the ad currently on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdSession {
    pub playing_non_linear: bool,
    pub ad_started: bool,
    pub previous_position: f64,
    pub previous_played: Option<TimeRanges>,
    pub previous_duration: f64,
}

/// What the session must do in response to an SDK event.
#[derive(Debug, Clone, PartialEq)]
pub enum AdEffect {
    /// Publish an ad-prefixed notification.
    Notify(MediaEvent),
    /// Feed a synthetic provider event through the state manager.
    Forge(ProviderEvent),
    /// Pause content for an ad break.
    RequestPause,
    /// Resume content after an ad break.
    RequestPlay,
}

/// Everything the session needs to request ads outside its lock.
pub struct AdLoadPlan {
    pub loader: Arc<dyn AdsLoader>,
    pub request: AdsRequest,
    pub token: CancellationToken,
}

/// Maps an SDK event name onto the session's `ad-` notification name.
///
/// `started` becomes `ad-started`, `ad_break_ready` becomes `ad-break-ready`.
pub fn notification_name(event: &AdSdkEvent) -> String {
    let name = event.sdk_name();
    let name = name.strip_prefix("ad_").unwrap_or(name);
    format!("ad-{}", name.replace('_', "-"))
}

pub struct AdSessionController {
    config: AdsConfig,
    enabled: bool,
    loader: Option<Arc<dyn AdsLoader>>,
    manager: Option<Arc<dyn AdsManager>>,
    phase: AdPhase,
    session: AdSession,
    cancel: Option<CancellationToken>,
    /// Fatal SDK error that cancelled the pending load.
    load_error: Option<String>,
    size: (u32, u32),
}

impl std::fmt::Debug for AdSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdSessionController")
            .field("enabled", &self.enabled)
            .field("loader", &self.loader.as_ref().map(|_| "AdsLoader { ... }"))
            .field("manager", &self.manager.as_ref().map(|_| "AdsManager { ... }"))
            .field("phase", &self.phase)
            .field("session", &self.session)
            .field("size", &self.size)
            .finish()
    }
}

impl AdSessionController {
    pub fn new(config: AdsConfig, loader: Option<Arc<dyn AdsLoader>>, enabled: bool) -> Self {
        Self {
            config,
            enabled,
            loader,
            manager: None,
            phase: AdPhase::Inactive,
            session: AdSession::default(),
            cancel: None,
            load_error: None,
            size: (DEFAULT_AD_WIDTH, DEFAULT_AD_HEIGHT),
        }
    }

    pub fn phase(&self) -> AdPhase {
        self.phase
    }

    pub fn session(&self) -> &AdSession {
        &self.session
    }

    /// Ad surface size as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn is_playing_ad(&self) -> bool {
        self.session.ad_started || self.session.playing_non_linear
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Decides whether ads apply to a provider of `kind`.
    ///
    /// Returns `Ok(None)` when ads are disabled, unconfigured, unsupported by
    /// the provider or already loading/loaded.
    pub fn begin_load(&mut self, kind: ProviderKind) -> Result<Option<AdLoadPlan>> {
        if !self.enabled {
            debug!("Ads disabled, skipping ad load");
            return Ok(None);
        }
        let Some(ad_tag_url) = self.config.ad_tag_url.clone() else {
            debug!("No ad tag configured");
            return Ok(None);
        };
        if !kind.supports_ad_insertion() {
            debug!(provider = ?kind, "Provider does not support ad insertion");
            return Ok(None);
        }
        if self.phase != AdPhase::Inactive {
            debug!(phase = ?self.phase, "Ads already requested");
            return Ok(None);
        }
        let Some(loader) = self.loader.clone() else {
            return Err(PlaybackError::AdLoad("no ads loader available".to_string()));
        };

        let (width, height) = self.size;
        let request = AdsRequest {
            ad_tag_url,
            linear_width: width,
            linear_height: height,
            nonlinear_width: width,
            nonlinear_height: self.nonlinear_height(height),
        };
        info!(ad_tag = %redact_url(&request.ad_tag_url), "Requesting ads");

        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        self.load_error = None;
        self.phase = AdPhase::Loading;

        Ok(Some(AdLoadPlan {
            loader,
            request,
            token,
        }))
    }

    /// Completes a load started by [`begin_load`](Self::begin_load).
    ///
    /// A result arriving after a teardown is discarded.
    pub fn finish_load(
        &mut self,
        result: std::result::Result<Arc<dyn AdsManager>, BridgeError>,
        store: &mut StateStore,
    ) -> Result<()> {
        if self.phase != AdPhase::Loading {
            debug!(phase = ?self.phase, "Discarding stale ad load result");
            if let Ok(manager) = result {
                manager.destroy();
            }
            return self.take_load_error();
        }
        self.cancel = None;

        let manager = match result {
            Ok(manager) => manager,
            Err(error) => {
                self.phase = AdPhase::Inactive;
                warn!(error = %error, "Ad request failed");
                return Err(PlaybackError::AdLoad(error.to_string()));
            }
        };

        let (width, height) = self.size;
        let mode = view_mode(store.state().fullscreen);
        if let Err(error) = manager.init(width, height, mode).and_then(|_| manager.start()) {
            manager.destroy();
            self.phase = AdPhase::Inactive;
            warn!(error = %error, "Ads manager failed to start");
            return Err(PlaybackError::AdLoad(error.to_string()));
        }

        let cue_points = manager.cue_points();
        info!(cue_points = cue_points.len(), "Ads loaded");
        store.set_ads_loaded(true, cue_points);
        self.manager = Some(manager);
        self.phase = AdPhase::Ready;
        Ok(())
    }

    // ========================================================================
    // SDK events
    // ========================================================================

    /// Translates one SDK event into session effects. The first effect is
    /// always the `ad-` notification.
    pub fn handle_event(&mut self, event: &AdSdkEvent, store: &mut StateStore) -> Vec<AdEffect> {
        if self.phase == AdPhase::Inactive {
            debug!(event = event.sdk_name(), "Ad event without active ad session");
            return Vec::new();
        }

        let mut effects = vec![AdEffect::Notify(MediaEvent::ad(
            notification_name(event),
            event.ad().cloned(),
        ))];

        match event {
            AdSdkEvent::Started(ad) if ad.linear => {
                let state = store.state();
                self.session.previous_position = state.current_time;
                self.session.previous_played = Some(state.played.clone());
                self.session.previous_duration = state.duration;
                self.session.ad_started = true;
                store.set_ad_started(true);
                self.phase = AdPhase::PlayingLinear;

                effects.push(AdEffect::Forge(ProviderEvent::DurationChange(ad.duration)));
                effects.push(AdEffect::Forge(ProviderEvent::Play));
            }
            AdSdkEvent::Started(_) => {
                self.session.playing_non_linear = true;
                self.phase = AdPhase::PlayingNonLinear;
            }
            AdSdkEvent::AdProgress { current_time, .. } if self.session.ad_started => {
                effects.push(AdEffect::Forge(ProviderEvent::TimeUpdate {
                    current_time: *current_time,
                    played: TimeRanges::from_ranges([(0.0, *current_time)]),
                }));
            }
            AdSdkEvent::ContentPauseRequested => effects.push(AdEffect::RequestPause),
            AdSdkEvent::ContentResumeRequested => {
                if store.state().ended {
                    debug!("Content ended, not resuming after ad break");
                } else {
                    effects.push(AdEffect::RequestPlay);
                }
            }
            AdSdkEvent::Complete(ad) | AdSdkEvent::Skipped(ad) => {
                if self.session.ad_started {
                    effects.extend(self.restore_content());
                }
                effects.push(AdEffect::Notify(MediaEvent::ad("ad-ended", Some(ad.clone()))));

                self.session.ad_started = false;
                self.session.playing_non_linear = false;
                store.set_ad_started(false);
                if ad.time_offset == 0.0 {
                    store.set_played_preroll(true);
                }
                self.phase = AdPhase::Ready;
            }
            AdSdkEvent::AllAdsCompleted => {
                debug!("All ads completed");
                self.phase = AdPhase::Complete;
            }
            AdSdkEvent::AdError(error) if error.fatal => {
                warn!(code = error.code, message = %error.message, source = ?error.source, "Fatal ad error");
                if self.session.ad_started {
                    effects.extend(self.restore_content());
                }
                if error.source == AdErrorSource::Loader {
                    if let Some(loader) = self.loader.take() {
                        loader.destroy();
                    }
                }
                let loading = self.phase == AdPhase::Loading;
                self.teardown(store);
                if loading {
                    self.load_error = Some(format!("{} (code {})", error.message, error.code));
                }
            }
            AdSdkEvent::AdError(error) => {
                warn!(code = error.code, message = %error.message, "Ad error, skipping ad");
            }
            _ => {}
        }

        effects
    }

    fn restore_content(&self) -> Vec<AdEffect> {
        vec![
            AdEffect::Forge(ProviderEvent::DurationChange(
                self.session.previous_duration,
            )),
            AdEffect::Forge(ProviderEvent::TimeUpdate {
                current_time: self.session.previous_position,
                played: self.session.previous_played.clone().unwrap_or_default(),
            }),
            // Content stayed paused under the ad.
            AdEffect::Forge(ProviderEvent::Pause),
        ]
    }

    // ========================================================================
    // Content and surface
    // ========================================================================

    /// Content finished: lets the SDK play post-rolls.
    pub fn on_content_ended(&self) {
        if self.phase == AdPhase::Inactive {
            return;
        }
        if let Some(loader) = &self.loader {
            debug!("Signalling content complete to ad SDK");
            loader.content_complete();
        }
    }

    pub fn resize(&mut self, width: u32, height: u32, fullscreen: bool) {
        self.size = (width, height);
        if let Some(manager) = &self.manager {
            let height = if self.session.playing_non_linear {
                self.nonlinear_height(height)
            } else {
                height
            };
            manager.resize(width, height, view_mode(fullscreen));
        }
    }

    /// Cancels a pending load and destroys the manager.
    pub fn teardown(&mut self, store: &mut StateStore) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if let Some(manager) = self.manager.take() {
            manager.destroy();
        }
        if self.phase != AdPhase::Inactive {
            debug!(phase = ?self.phase, "Ad session torn down");
        }
        self.phase = AdPhase::Inactive;
        self.session = AdSession::default();
        store.set_ad_started(false);
        store.set_ads_loaded(false, Vec::new());
    }

    /// Fails with the fatal error that cancelled the last load, if any.
    pub fn take_load_error(&mut self) -> Result<()> {
        match self.load_error.take() {
            Some(message) => Err(PlaybackError::AdLoad(message)),
            None => Ok(()),
        }
    }

    fn nonlinear_height(&self, height: u32) -> u32 {
        height.saturating_sub(self.config.nonlinear_bottom_margin)
    }
}

fn view_mode(fullscreen: bool) -> AdViewMode {
    if fullscreen {
        AdViewMode::Fullscreen
    } else {
        AdViewMode::Normal
    }
}
