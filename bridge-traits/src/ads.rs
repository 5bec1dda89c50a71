//! Ad-serving SDK bridge.
//!
//! Models a client-side ad SDK with the usual loader/manager split: the
//! loader turns an ad-tag request into a manager, the manager renders ad breaks
//! on a surface laid over the content. SDK notifications arrive as
//! [`AdSdkEvent`]s which the host forwards to the session core.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Request handed to [`AdsLoader::request_ads`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdsRequest {
    /// VAST/VMAP ad tag.
    pub ad_tag_url: String,
    /// Slot size for linear ads.
    pub linear_width: u32,
    pub linear_height: u32,
    /// Slot size for non-linear (overlay) ads.
    pub nonlinear_width: u32,
    pub nonlinear_height: u32,
}

/// Surface presentation mode passed to the manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdViewMode {
    #[default]
    Normal,
    Fullscreen,
}

/// Description of the ad an SDK event refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdInfo {
    pub ad_id: String,
    /// Linear ads take over the surface; non-linear ads overlay the content.
    pub linear: bool,
    /// Ad duration in seconds (`-1.0` when unknown).
    pub duration: f64,
    pub skippable: bool,
    /// Offset of the ad break in the content (`0` preroll, `-1` postroll).
    pub time_offset: f64,
}

/// Which SDK object reported an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdErrorSource {
    Loader,
    Manager,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdErrorInfo {
    pub code: u32,
    pub message: String,
    pub source: AdErrorSource,
    /// Fatal errors end the ad session; others only skip the failing ad.
    pub fatal: bool,
}

/// Notification emitted by the ad SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum AdSdkEvent {
    AdBreakReady,
    AdMetadata,
    Loaded(AdInfo),
    Started(AdInfo),
    Impression,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    AdProgress { current_time: f64, duration: f64 },
    AdBuffering,
    Paused,
    Resumed,
    Click,
    Interaction,
    VolumeChanged,
    VolumeMuted,
    LinearChanged(bool),
    SkippableStateChanged,
    DurationChange(f64),
    UserClose,
    Complete(AdInfo),
    /// Skipped ads do not get a separate `Complete`, so a skip ends the ad
    /// the same way a completion does: content is restored and `ad-ended`
    /// follows the `ad-skipped` notification.
    Skipped(AdInfo),
    AllAdsCompleted,
    ContentPauseRequested,
    ContentResumeRequested,
    Log,
    AdError(AdErrorInfo),
}

impl AdSdkEvent {
    /// The SDK's own (snake_case) event name.
    pub fn sdk_name(&self) -> &'static str {
        match self {
            AdSdkEvent::AdBreakReady => "ad_break_ready",
            AdSdkEvent::AdMetadata => "ad_metadata",
            AdSdkEvent::Loaded(_) => "loaded",
            AdSdkEvent::Started(_) => "started",
            AdSdkEvent::Impression => "impression",
            AdSdkEvent::FirstQuartile => "first_quartile",
            AdSdkEvent::Midpoint => "midpoint",
            AdSdkEvent::ThirdQuartile => "third_quartile",
            AdSdkEvent::AdProgress { .. } => "ad_progress",
            AdSdkEvent::AdBuffering => "ad_buffering",
            AdSdkEvent::Paused => "paused",
            AdSdkEvent::Resumed => "resumed",
            AdSdkEvent::Click => "click",
            AdSdkEvent::Interaction => "interaction",
            AdSdkEvent::VolumeChanged => "volume_changed",
            AdSdkEvent::VolumeMuted => "volume_muted",
            AdSdkEvent::LinearChanged(_) => "linear_changed",
            AdSdkEvent::SkippableStateChanged => "skippable_state_changed",
            AdSdkEvent::DurationChange(_) => "duration_change",
            AdSdkEvent::UserClose => "user_close",
            AdSdkEvent::Complete(_) => "complete",
            AdSdkEvent::Skipped(_) => "skipped",
            AdSdkEvent::AllAdsCompleted => "all_ads_completed",
            AdSdkEvent::ContentPauseRequested => "content_pause_requested",
            AdSdkEvent::ContentResumeRequested => "content_resume_requested",
            AdSdkEvent::Log => "log",
            AdSdkEvent::AdError(_) => "ad_error",
        }
    }

    /// The ad this event refers to, when the SDK provides one.
    pub fn ad(&self) -> Option<&AdInfo> {
        match self {
            AdSdkEvent::Loaded(ad)
            | AdSdkEvent::Started(ad)
            | AdSdkEvent::Complete(ad)
            | AdSdkEvent::Skipped(ad) => Some(ad),
            _ => None,
        }
    }
}

/// Renders ad breaks for one loaded ad response.
pub trait AdsManager: Send + Sync {
    /// Content times (seconds) at which ad breaks are scheduled.
    fn cue_points(&self) -> Vec<f64>;

    fn init(&self, width: u32, height: u32, mode: AdViewMode) -> Result<()>;

    fn start(&self) -> Result<()>;

    fn resize(&self, width: u32, height: u32, mode: AdViewMode);

    fn destroy(&self);
}

/// Entry point of the ad SDK.
#[async_trait::async_trait]
pub trait AdsLoader: Send + Sync {
    /// Request ads for a tag; resolves once the manager is loaded.
    async fn request_ads(&self, request: AdsRequest) -> Result<Arc<dyn AdsManager>>;

    /// Tell the SDK the content finished so it can play post-rolls and stop
    /// expecting more content.
    fn content_complete(&self);

    fn destroy(&self);
}
