//! # Request Manager
//!
//! Turns caller requests into provider calls. Requests that wait for an
//! engine confirmation are parked in the [`RequestQueue`](crate::queue) under
//! their category first; the state manager attaches them to the engine event
//! that satisfies them.
//!
//! All session state is read and written under the session lock, while
//! provider, fullscreen and orientation calls happen after it is released.
//!
//! ## Failure policy
//!
//! - `play` failures are returned to the caller and published as `play-fail`.
//! - `pause` failures are logged and absorbed.
//! - Fullscreen failures are returned and published as `fullscreen-error`.
//! - Orientation lock failures are logged and absorbed.

use std::sync::Arc;

use bridge_traits::{MediaErrorDetail, MediaProvider, ProviderEvent};
use core_async::time::next_frame;
use core_runtime::events::{
    FullscreenTarget, MediaEvent, MediaEventDetail, RequestCategory, RequestEvent, RequestKind,
};
use tracing::{debug, instrument, trace, warn};

use crate::engine::SessionShared;
use crate::error::{PlaybackError, Result};

/// Handle for issuing requests against a session. Cheap to clone.
#[derive(Clone)]
pub struct RequestManager {
    shared: Arc<SessionShared>,
}

impl std::fmt::Debug for RequestManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestManager")
            .field("session_id", &self.shared.id)
            .finish()
    }
}

impl RequestManager {
    pub(crate) fn new(shared: Arc<SessionShared>) -> Self {
        Self { shared }
    }

    /// Handles one request.
    #[instrument(
        skip(self, request),
        fields(session_id = %self.shared.id, request = request.kind.name(), origin = ?request.origin)
    )]
    pub async fn handle(&self, request: RequestEvent) -> Result<()> {
        let kind = request.kind.clone();
        let request = Arc::new(request);

        match kind {
            RequestKind::StartLoading => self.handle_start_loading(request),
            RequestKind::Play => self.handle_play(request).await,
            RequestKind::Pause => self.handle_pause(request).await,
            RequestKind::Seeking(time) => self.handle_seeking(request, time),
            RequestKind::Seek(time) => self.handle_seek(request, time),
            RequestKind::VolumeChange(volume) => self.handle_volume_change(request, volume),
            RequestKind::Mute => self.handle_muted(request, true),
            RequestKind::Unmute => self.handle_muted(request, false),
            RequestKind::EnterFullscreen(target) => {
                self.handle_enter_fullscreen(request, target).await
            }
            RequestKind::ExitFullscreen(target) => {
                self.handle_exit_fullscreen(request, target).await
            }
            RequestKind::PauseUserIdle => {
                self.shared
                    .with_core(|core| core.set_idle_tracking_paused(true, request));
                Ok(())
            }
            RequestKind::ResumeUserIdle => {
                self.shared
                    .with_core(|core| core.set_idle_tracking_paused(false, request));
                Ok(())
            }
            RequestKind::ShowPoster => self.handle_poster(false),
            RequestKind::HidePoster => self.handle_poster(true),
            RequestKind::Loop => self.handle_loop(request).await,
        }
    }

    // ========================================================================
    // Convenience API
    // ========================================================================

    pub async fn start_loading(&self) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::StartLoading)).await
    }

    pub async fn play(&self) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::Play)).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::Pause)).await
    }

    /// Live scrub to `time` without committing the seek.
    pub async fn seeking(&self, time: f64) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::Seeking(time))).await
    }

    pub async fn seek(&self, time: f64) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::Seek(time))).await
    }

    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::VolumeChange(volume)))
            .await
    }

    pub async fn mute(&self) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::Mute)).await
    }

    pub async fn unmute(&self) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::Unmute)).await
    }

    pub async fn enter_fullscreen(&self, target: FullscreenTarget) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::EnterFullscreen(target)))
            .await
    }

    pub async fn exit_fullscreen(&self, target: FullscreenTarget) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::ExitFullscreen(target)))
            .await
    }

    pub async fn pause_user_idle(&self) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::PauseUserIdle))
            .await
    }

    pub async fn resume_user_idle(&self) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::ResumeUserIdle))
            .await
    }

    pub async fn show_poster(&self) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::ShowPoster)).await
    }

    pub async fn hide_poster(&self) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::HidePoster)).await
    }

    /// Restarts playback from the beginning on the next frame.
    pub async fn request_loop(&self) -> Result<()> {
        self.handle(RequestEvent::new(RequestKind::Loop)).await
    }

    // ========================================================================
    // Loading
    // ========================================================================

    fn handle_start_loading(&self, request: Arc<RequestEvent>) -> Result<()> {
        self.shared.with_core(|core| {
            core.attached_provider()?;
            if core.store.state().can_load {
                trace!("Media already loading");
                return Ok(());
            }
            core.queue.enqueue(RequestCategory::Load, request);
            core.dispatch(ProviderEvent::CanLoad);
            Ok::<_, PlaybackError>(())
        })
    }

    // ========================================================================
    // Play / Pause
    // ========================================================================

    async fn handle_play(&self, request: Arc<RequestEvent>) -> Result<()> {
        let provider = self.shared.with_core(|core| {
            let provider = match core.ready_provider() {
                Ok(provider) => provider,
                Err(error) => {
                    let detail = MediaErrorDetail::new(0, error.to_string());
                    let autoplay = core.store.state().attempting_autoplay;
                    core.publish(
                        MediaEvent::provider(ProviderEvent::PlayFail(detail))
                            .with_request(request.clone())
                            .with_autoplay(autoplay),
                    );
                    return Err(error);
                }
            };
            if !core.store.state().paused {
                trace!("Already playing");
                return Ok(None);
            }
            core.queue.enqueue(RequestCategory::Play, request.clone());
            Ok(Some(provider))
        })?;

        let Some(provider) = provider else {
            return Ok(());
        };

        if let Err(error) = provider.play().await {
            let cause = MediaErrorDetail::from(&error);
            let autoplay = self
                .shared
                .with_core(|core| core.reject_play(&request, cause.clone()));
            warn!(error = %cause, autoplay, "Play rejected by provider");
            return Err(PlaybackError::Playback { cause, autoplay });
        }

        Ok(())
    }

    async fn handle_pause(&self, request: Arc<RequestEvent>) -> Result<()> {
        let provider = self.shared.with_core(|core| {
            let provider = core.ready_provider()?;
            if core.store.state().paused {
                trace!("Already paused");
                return Ok(None);
            }
            core.queue.enqueue(RequestCategory::Pause, request);
            Ok::<_, PlaybackError>(Some(provider))
        })?;

        let Some(provider) = provider else {
            return Ok(());
        };

        if let Err(error) = provider.pause().await {
            self.shared.with_core(|core| {
                core.queue.delete(RequestCategory::Pause);
            });
            let error = PlaybackError::Pause(error.to_string());
            warn!(error = %error, "Pause failed, ignoring");
        }

        Ok(())
    }

    // ========================================================================
    // Seeking
    // ========================================================================

    fn handle_seeking(&self, request: Arc<RequestEvent>, time: f64) -> Result<()> {
        ensure_finite("seeking time", time)?;

        self.shared.with_core(|core| {
            core.attached_provider()?;
            core.queue.enqueue(RequestCategory::Seeking, request);
            core.flags.seeking = true;
            core.store.set_seeking(true);
            Ok::<_, PlaybackError>(())
        })
    }

    fn handle_seek(&self, request: Arc<RequestEvent>, time: f64) -> Result<()> {
        ensure_finite("seek time", time)?;
        let tolerance = self.shared.config.seek_end_tolerance;

        let (provider, target) = self.shared.with_core(|core| {
            let provider = core.attached_provider()?;
            let ended = core.store.state().ended;
            let duration = core.store.state().duration;

            if ended {
                core.flags.replaying = true;
            }
            core.flags.seeking = false;

            let target = clamp_seek(time, duration, tolerance);
            if target != time {
                debug!(requested = time, target, "Seek target clamped");
            }

            let mut seek = (*request).clone();
            seek.kind = RequestKind::Seek(target);
            core.queue.enqueue(RequestCategory::Seeked, Arc::new(seek));
            Ok::<_, PlaybackError>((provider, target))
        })?;

        provider.set_current_time(target);
        Ok(())
    }

    // ========================================================================
    // Volume
    // ========================================================================

    fn handle_volume_change(&self, request: Arc<RequestEvent>, volume: f64) -> Result<()> {
        ensure_finite("volume", volume)?;
        let volume = volume.clamp(0.0, 1.0);

        let plan = self.shared.with_core(|core| {
            let provider = core.attached_provider()?;
            let state = core.store.state();
            if state.volume == volume {
                trace!(volume, "Volume unchanged");
                return Ok(None);
            }
            let unmute = volume > 0.0 && state.muted;

            core.queue.enqueue(RequestCategory::Volume, request.clone());
            if unmute {
                core.queue.enqueue(
                    RequestCategory::Volume,
                    Arc::new(request.derive(RequestKind::Unmute)),
                );
            }
            Ok::<_, PlaybackError>(Some((provider, unmute)))
        })?;

        if let Some((provider, unmute)) = plan {
            provider.set_volume(volume);
            if unmute {
                provider.set_muted(false);
            }
        }
        Ok(())
    }

    fn handle_muted(&self, request: Arc<RequestEvent>, muted: bool) -> Result<()> {
        let unmute_volume = self.shared.config.unmute_volume;

        let plan = self.shared.with_core(|core| {
            let provider = core.attached_provider()?;
            let state = core.store.state();
            if state.muted == muted {
                trace!(muted, "Mute state unchanged");
                return Ok(None);
            }
            let restore_volume = state.volume == 0.0;

            core.queue.enqueue(RequestCategory::Volume, request.clone());
            if restore_volume {
                core.queue.enqueue(
                    RequestCategory::Volume,
                    Arc::new(request.derive(RequestKind::VolumeChange(unmute_volume))),
                );
            }
            Ok::<_, PlaybackError>(Some((provider, restore_volume)))
        })?;

        if let Some((provider, restore_volume)) = plan {
            provider.set_muted(muted);
            if restore_volume {
                provider.set_volume(unmute_volume);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Fullscreen
    // ========================================================================

    async fn handle_enter_fullscreen(
        &self,
        request: Arc<RequestEvent>,
        target: FullscreenTarget,
    ) -> Result<()> {
        let plan = self.shared.with_core(|core| {
            let Some(adapter) = core.fullscreen_adapter(target) else {
                let error = PlaybackError::FullscreenUnsupported(target);
                publish_fullscreen_error(core, &error, &request);
                return Err(error);
            };
            if adapter.is_active() {
                trace!("Already fullscreen");
                return Ok(None);
            }
            core.queue.enqueue(RequestCategory::Fullscreen, request.clone());
            Ok(Some((adapter, core.orientation.clone())))
        })?;

        let Some((adapter, orientation)) = plan else {
            return Ok(());
        };

        if let Err(error) = adapter.enter().await {
            let error = PlaybackError::Fullscreen(error.to_string());
            self.shared.with_core(|core| {
                core.queue.withdraw(RequestCategory::Fullscreen, &request);
                publish_fullscreen_error(core, &error, &request);
            });
            warn!(error = %error, "Enter fullscreen failed");
            return Err(error);
        }

        self.confirm_fullscreen(true);

        if let (Some(lock_type), Some(orientation)) =
            (self.shared.config.orientation_lock, orientation)
        {
            if orientation.is_supported() && !orientation.is_locked() {
                if let Err(error) = orientation.lock(lock_type).await {
                    warn!(error = %error, lock = ?lock_type, "Screen orientation lock failed");
                }
            }
        }

        Ok(())
    }

    async fn handle_exit_fullscreen(
        &self,
        request: Arc<RequestEvent>,
        target: FullscreenTarget,
    ) -> Result<()> {
        let plan = self.shared.with_core(|core| {
            let Some(adapter) = core.fullscreen_adapter(target) else {
                let error = PlaybackError::FullscreenUnsupported(target);
                publish_fullscreen_error(core, &error, &request);
                return Err(error);
            };
            if !adapter.is_active() {
                trace!("Not fullscreen");
                return Ok(None);
            }
            core.queue.enqueue(RequestCategory::Fullscreen, request.clone());
            Ok(Some((adapter, core.orientation.clone())))
        })?;

        let Some((adapter, orientation)) = plan else {
            return Ok(());
        };

        if let Some(orientation) = orientation.filter(|o| o.is_locked()) {
            if let Err(error) = orientation.unlock().await {
                warn!(error = %error, "Screen orientation unlock failed");
            }
        }

        if let Err(error) = adapter.exit().await {
            let error = PlaybackError::Fullscreen(error.to_string());
            self.shared.with_core(|core| {
                core.queue.withdraw(RequestCategory::Fullscreen, &request);
                publish_fullscreen_error(core, &error, &request);
            });
            warn!(error = %error, "Exit fullscreen failed");
            return Err(error);
        }

        self.confirm_fullscreen(false);
        Ok(())
    }

    /// Surfaces without their own change event are confirmed here. A change
    /// event the surface already dispatched makes this a no-op.
    fn confirm_fullscreen(&self, active: bool) {
        self.shared.with_core(|core| {
            if core.store.state().fullscreen != active {
                core.dispatch(ProviderEvent::FullscreenChange(active));
            }
        });
    }

    // ========================================================================
    // Poster / Loop
    // ========================================================================

    fn handle_poster(&self, hidden: bool) -> Result<()> {
        self.shared.with_core(|core| {
            if core.store.state().poster_hidden != hidden {
                core.store.set_poster_hidden(hidden);
            }
        });
        Ok(())
    }

    /// Waits one frame, then restarts from zero. Aborts quietly if the
    /// source or provider changed meanwhile.
    async fn handle_loop(&self, request: Arc<RequestEvent>) -> Result<()> {
        let epoch = self.shared.read(|core| core.loop_epoch);
        next_frame().await;

        let plan = self.shared.with_core(|core| {
            if core.loop_epoch != epoch {
                debug!("Loop aborted, media was reset");
                return Ok(None);
            }
            let provider: Arc<dyn MediaProvider> = core.attached_provider()?;
            let paused = core.store.state().paused;
            if paused {
                core.flags.looping = true;
                core.flags.replaying = true;
            }
            Ok::<_, PlaybackError>(Some((provider, paused)))
        })?;

        let Some((provider, paused)) = plan else {
            return Ok(());
        };

        provider.set_current_time(0.0);
        if !paused {
            return Ok(());
        }

        let mut play = (*request).clone();
        play.kind = RequestKind::Play;
        if let Err(error) = self.handle_play(Arc::new(play)).await {
            self.shared.with_core(|core| {
                core.flags.looping = false;
                core.flags.replaying = false;
            });
            return Err(error);
        }
        Ok(())
    }
}

fn publish_fullscreen_error(
    core: &mut crate::engine::SessionCore,
    error: &PlaybackError,
    request: &Arc<RequestEvent>,
) {
    core.publish(
        MediaEvent::new(MediaEventDetail::FullscreenError {
            message: error.to_string(),
        })
        .with_request(request.clone()),
    );
}

fn ensure_finite(what: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PlaybackError::InvalidRequest(format!(
            "{what} must be finite, got {value}"
        )))
    }
}

/// Seeks close to the end snap to the duration so `ended` can fire.
pub(crate) fn clamp_seek(time: f64, duration: f64, tolerance: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 && duration - time < tolerance {
        duration
    } else {
        time.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_seek_snaps_to_end() {
        assert_eq!(clamp_seek(9.9, 10.0, 0.25), 10.0);
        assert_eq!(clamp_seek(12.0, 10.0, 0.25), 10.0);
        assert_eq!(clamp_seek(9.7, 10.0, 0.25), 9.7);
    }

    #[test]
    fn test_clamp_seek_floors_at_zero() {
        assert_eq!(clamp_seek(-3.0, 10.0, 0.25), 0.0);
    }

    #[test]
    fn test_clamp_seek_without_duration() {
        assert_eq!(clamp_seek(5.0, 0.0, 0.25), 5.0);
        assert_eq!(clamp_seek(5.0, f64::INFINITY, 0.25), 5.0);
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite("volume", 0.5).is_ok());
        assert!(matches!(
            ensure_finite("volume", f64::NAN),
            Err(PlaybackError::InvalidRequest(_))
        ));
    }
}
