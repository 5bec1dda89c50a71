//! # Media Session Example
//!
//! Drives a session against an in-memory provider that confirms every
//! command through its event channel, then prints the reconciled
//! notifications with the request each one satisfied.
//!
//! Run with: `cargo run --example session_demo --package core-playback`

use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{FullscreenAdapter, MediaProvider, MediaSource, ProviderEvent, ProviderKind};
use core_async::sync::mpsc;
use core_playback::{MediaSession, PlaybackConfig, Result};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

// ============================================================================
// Echo provider (for demonstration)
// ============================================================================

/// Confirms each command immediately, like a well-behaved engine would.
struct EchoProvider {
    events: mpsc::UnboundedSender<ProviderEvent>,
}

impl EchoProvider {
    fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl MediaProvider for EchoProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Video
    }

    async fn play(&self) -> BridgeResult<()> {
        self.emit(ProviderEvent::Play);
        self.emit(ProviderEvent::Playing);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.emit(ProviderEvent::Pause);
        Ok(())
    }

    fn set_current_time(&self, time: f64) {
        self.emit(ProviderEvent::Seeking(time));
        self.emit(ProviderEvent::Seeked(time));
    }

    fn set_volume(&self, volume: f64) {
        self.emit(ProviderEvent::VolumeChange {
            volume,
            muted: false,
        });
    }

    fn set_muted(&self, muted: bool) {
        self.emit(ProviderEvent::VolumeChange { volume: 1.0, muted });
    }

    fn fullscreen(&self) -> Option<Arc<dyn FullscreenAdapter>> {
        None
    }
}

/// Feeds everything the provider emitted back into the session.
async fn pump(session: &MediaSession, events: &mut mpsc::UnboundedReceiver<ProviderEvent>) {
    while let Ok(event) = events.try_recv() {
        session.dispatch(event);
    }
    session.tick().await;
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let _ = init_logging(LoggingConfig::default().with_format(LogFormat::Compact));

    let core_config = CoreConfig::builder()
        .build()
        .map_err(|e| core_playback::PlaybackError::Config(e.to_string()))?;
    let session = MediaSession::new(PlaybackConfig::default(), core_config)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.attach_provider(Arc::new(EchoProvider { events: tx }));
    let mut notifications = session.subscribe();

    for event in [
        ProviderEvent::CanLoad,
        ProviderEvent::SourceChange(Some(MediaSource::new("https://cdn.example.com/film.mp4"))),
        ProviderEvent::LoadStart,
        ProviderEvent::DurationChange(596.0),
        ProviderEvent::LoadedMetadata,
        ProviderEvent::LoadedData,
        ProviderEvent::CanPlay { duration: 596.0 },
    ] {
        session.dispatch(event);
    }

    session.requests().play().await?;
    pump(&session, &mut rx).await;
    session.requests().seek(120.0).await?;
    pump(&session, &mut rx).await;
    session.requests().pause().await?;
    pump(&session, &mut rx).await;

    println!("Notifications:");
    while let Some(Ok(event)) = notifications.try_recv() {
        let request = event
            .request
            .as_ref()
            .map(|r| format!(" <- {}", r.kind.name()))
            .unwrap_or_default();
        println!("  {:<16} origin={}{}", event.name(), event.origin().name(), request);
    }

    let state = session.state();
    println!(
        "\nFinal state: paused={} time={:.1}/{:.1} started={}",
        state.paused, state.current_time, state.duration, state.started
    );

    Ok(())
}
