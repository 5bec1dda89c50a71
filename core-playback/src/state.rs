//! # Media State
//!
//! The canonical snapshot a session publishes, and the versioned store that
//! owns it.
//!
//! Fields are only mutated through the named setters of [`StateStore`]. Each
//! setter that changes a value bumps the store version; the session publishes
//! a new snapshot whenever the version moved. Setters also keep the playback
//! invariants:
//!
//! - `playing` and `paused` are never both true
//! - `ended` implies `paused && !playing`

use bridge_traits::{MediaErrorDetail, MediaSource, MediaType, TimeRanges, ViewType};
use serde::{Deserialize, Serialize};

/// Flat snapshot of a media session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaState {
    // Playback
    pub paused: bool,
    pub playing: bool,
    pub seeking: bool,
    pub waiting: bool,
    pub ended: bool,
    /// Playback began at least once for the current source.
    pub started: bool,
    pub current_time: f64,
    pub duration: f64,
    /// Duration is not finite.
    pub live: bool,

    // Audio
    pub volume: f64,
    pub muted: bool,

    // Ranges
    pub buffered: TimeRanges,
    pub buffered_amount: f64,
    pub seekable: TimeRanges,
    pub seekable_amount: f64,
    pub played: TimeRanges,

    // Capabilities
    pub can_load: bool,
    pub can_load_poster: bool,
    pub can_fullscreen: bool,
    pub can_play: bool,
    pub fullscreen: bool,

    // Media description
    pub view_type: ViewType,
    pub media_type: MediaType,
    pub source: Option<MediaSource>,
    pub sources: Vec<MediaSource>,
    pub error: Option<MediaErrorDetail>,

    // Preferences
    pub autoplay: bool,
    pub attempting_autoplay: bool,
    pub autoplay_error: Option<MediaErrorDetail>,
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    pub poster_hidden: bool,

    // Ads
    pub ad_started: bool,
    pub ads_loaded: bool,
    pub ad_cue_points: Vec<f64>,
    pub played_preroll: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            paused: true,
            playing: false,
            seeking: false,
            waiting: false,
            ended: false,
            started: false,
            current_time: 0.0,
            duration: 0.0,
            live: false,
            volume: 1.0,
            muted: false,
            buffered: TimeRanges::new(),
            buffered_amount: 0.0,
            seekable: TimeRanges::new(),
            seekable_amount: 0.0,
            played: TimeRanges::new(),
            can_load: false,
            can_load_poster: false,
            can_fullscreen: false,
            can_play: false,
            fullscreen: false,
            view_type: ViewType::Unknown,
            media_type: MediaType::Unknown,
            source: None,
            sources: Vec::new(),
            error: None,
            autoplay: false,
            attempting_autoplay: false,
            autoplay_error: None,
            loop_playback: false,
            poster_hidden: false,
            ad_started: false,
            ads_loaded: false,
            ad_cue_points: Vec::new(),
            played_preroll: false,
        }
    }
}

/// Transient flags shared by the request manager and the state manager.
///
/// Cleared on every reset boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFlags {
    /// A loop restart is in flight.
    pub looping: bool,
    /// The next genuine play is a replay.
    pub replaying: bool,
    /// A live-scrub (`seeking` request) has not been committed yet.
    pub seeking: bool,
}

impl SessionFlags {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn assign<T: PartialEq>(field: &mut T, value: T, version: &mut u64) {
    if *field != value {
        *field = value;
        *version += 1;
    }
}

/// Owner of the session's [`MediaState`].
#[derive(Debug, Default)]
pub struct StateStore {
    state: MediaState,
    version: u64,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &MediaState {
        &self.state
    }

    /// Increases every time a setter changes a field.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn snapshot(&self) -> MediaState {
        self.state.clone()
    }

    // ------------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------------

    pub fn set_paused(&mut self, paused: bool) {
        assign(&mut self.state.paused, paused, &mut self.version);
        if paused {
            assign(&mut self.state.playing, false, &mut self.version);
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        assign(&mut self.state.playing, playing, &mut self.version);
        if playing {
            assign(&mut self.state.paused, false, &mut self.version);
            assign(&mut self.state.waiting, false, &mut self.version);
            assign(&mut self.state.ended, false, &mut self.version);
        }
    }

    pub fn set_seeking(&mut self, seeking: bool) {
        assign(&mut self.state.seeking, seeking, &mut self.version);
    }

    /// Buffering stalls playback.
    pub fn set_waiting(&mut self, waiting: bool) {
        assign(&mut self.state.waiting, waiting, &mut self.version);
        if waiting {
            assign(&mut self.state.playing, false, &mut self.version);
        }
    }

    pub fn set_ended(&mut self, ended: bool) {
        assign(&mut self.state.ended, ended, &mut self.version);
        if ended {
            assign(&mut self.state.paused, true, &mut self.version);
            assign(&mut self.state.playing, false, &mut self.version);
            assign(&mut self.state.waiting, false, &mut self.version);
        }
    }

    pub fn set_started(&mut self, started: bool) {
        assign(&mut self.state.started, started, &mut self.version);
    }

    pub fn set_current_time(&mut self, time: f64) {
        assign(&mut self.state.current_time, time, &mut self.version);
    }

    /// Also derives `live` from a non-finite duration.
    pub fn set_duration(&mut self, duration: f64) {
        assign(&mut self.state.duration, duration, &mut self.version);
        assign(&mut self.state.live, !duration.is_finite(), &mut self.version);
    }

    pub fn set_volume(&mut self, volume: f64, muted: bool) {
        assign(&mut self.state.volume, volume, &mut self.version);
        assign(&mut self.state.muted, muted, &mut self.version);
    }

    // ------------------------------------------------------------------------
    // Ranges
    // ------------------------------------------------------------------------

    pub fn set_buffered(&mut self, buffered: TimeRanges) {
        let amount = buffered.last_end();
        assign(&mut self.state.buffered, buffered, &mut self.version);
        assign(&mut self.state.buffered_amount, amount, &mut self.version);
    }

    pub fn set_seekable(&mut self, seekable: TimeRanges) {
        let amount = seekable.last_end();
        assign(&mut self.state.seekable, seekable, &mut self.version);
        assign(&mut self.state.seekable_amount, amount, &mut self.version);
    }

    pub fn set_played(&mut self, played: TimeRanges) {
        assign(&mut self.state.played, played, &mut self.version);
    }

    // ------------------------------------------------------------------------
    // Capabilities and description
    // ------------------------------------------------------------------------

    pub fn set_can_load(&mut self, can_load: bool) {
        assign(&mut self.state.can_load, can_load, &mut self.version);
    }

    pub fn set_can_load_poster(&mut self, can_load_poster: bool) {
        assign(&mut self.state.can_load_poster, can_load_poster, &mut self.version);
    }

    pub fn set_can_fullscreen(&mut self, can_fullscreen: bool) {
        assign(&mut self.state.can_fullscreen, can_fullscreen, &mut self.version);
    }

    pub fn set_can_play(&mut self, can_play: bool) {
        assign(&mut self.state.can_play, can_play, &mut self.version);
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        assign(&mut self.state.fullscreen, fullscreen, &mut self.version);
    }

    pub fn set_view_type(&mut self, view_type: ViewType) {
        assign(&mut self.state.view_type, view_type, &mut self.version);
    }

    pub fn set_media_type(&mut self, media_type: MediaType) {
        assign(&mut self.state.media_type, media_type, &mut self.version);
    }

    pub fn set_source(&mut self, source: Option<MediaSource>) {
        assign(&mut self.state.source, source, &mut self.version);
    }

    pub fn set_sources(&mut self, sources: Vec<MediaSource>) {
        assign(&mut self.state.sources, sources, &mut self.version);
    }

    pub fn set_error(&mut self, error: Option<MediaErrorDetail>) {
        assign(&mut self.state.error, error, &mut self.version);
    }

    // ------------------------------------------------------------------------
    // Preferences
    // ------------------------------------------------------------------------

    pub fn set_autoplay(&mut self, autoplay: bool) {
        assign(&mut self.state.autoplay, autoplay, &mut self.version);
    }

    pub fn set_attempting_autoplay(&mut self, attempting: bool) {
        assign(&mut self.state.attempting_autoplay, attempting, &mut self.version);
    }

    pub fn set_autoplay_error(&mut self, error: Option<MediaErrorDetail>) {
        assign(&mut self.state.autoplay_error, error, &mut self.version);
    }

    pub fn set_loop(&mut self, enabled: bool) {
        assign(&mut self.state.loop_playback, enabled, &mut self.version);
    }

    pub fn set_poster_hidden(&mut self, hidden: bool) {
        assign(&mut self.state.poster_hidden, hidden, &mut self.version);
    }

    // ------------------------------------------------------------------------
    // Ads
    // ------------------------------------------------------------------------

    pub fn set_ad_started(&mut self, started: bool) {
        assign(&mut self.state.ad_started, started, &mut self.version);
    }

    pub fn set_ads_loaded(&mut self, loaded: bool, cue_points: Vec<f64>) {
        assign(&mut self.state.ads_loaded, loaded, &mut self.version);
        assign(&mut self.state.ad_cue_points, cue_points, &mut self.version);
    }

    pub fn set_played_preroll(&mut self, played: bool) {
        assign(&mut self.state.played_preroll, played, &mut self.version);
    }

    // ------------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------------

    /// Zeroes per-source fields.
    ///
    /// Kept: volume and muted, load/fullscreen capabilities, view type,
    /// fullscreen, preferences (autoplay, loop, poster visibility), the source
    /// descriptors and the loaded ad schedule.
    pub fn soft_reset(&mut self) {
        let previous = &self.state;
        let next = MediaState {
            volume: previous.volume,
            muted: previous.muted,
            can_load: previous.can_load,
            can_load_poster: previous.can_load_poster,
            can_fullscreen: previous.can_fullscreen,
            fullscreen: previous.fullscreen,
            view_type: previous.view_type,
            source: previous.source.clone(),
            sources: previous.sources.clone(),
            autoplay: previous.autoplay,
            loop_playback: previous.loop_playback,
            poster_hidden: previous.poster_hidden,
            ads_loaded: previous.ads_loaded,
            ad_cue_points: previous.ad_cue_points.clone(),
            ..MediaState::default()
        };

        if next != self.state {
            self.state = next;
            self.version += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let store = StateStore::new();
        let state = store.state();
        assert!(state.paused);
        assert!(!state.playing);
        assert_eq!(state.volume, 1.0);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_playing_and_paused_are_exclusive() {
        let mut store = StateStore::new();
        store.set_playing(true);
        assert!(store.state().playing);
        assert!(!store.state().paused);

        store.set_paused(true);
        assert!(store.state().paused);
        assert!(!store.state().playing);
    }

    #[test]
    fn test_ended_implies_paused() {
        let mut store = StateStore::new();
        store.set_playing(true);
        store.set_ended(true);

        let state = store.state();
        assert!(state.ended && state.paused && !state.playing);

        store.set_playing(true);
        assert!(!store.state().ended);
    }

    #[test]
    fn test_version_only_moves_on_change() {
        let mut store = StateStore::new();
        store.set_current_time(4.0);
        let version = store.version();

        store.set_current_time(4.0);
        assert_eq!(store.version(), version);

        store.set_current_time(5.0);
        assert!(store.version() > version);
    }

    #[test]
    fn test_duration_derives_live() {
        let mut store = StateStore::new();
        store.set_duration(f64::INFINITY);
        assert!(store.state().live);
        store.set_duration(30.0);
        assert!(!store.state().live);
    }

    #[test]
    fn test_ranges_derive_amounts() {
        let mut store = StateStore::new();
        store.set_buffered(TimeRanges::from_ranges([(0.0, 8.0), (10.0, 12.5)]));
        assert_eq!(store.state().buffered_amount, 12.5);
        store.set_seekable(TimeRanges::from_ranges([(0.0, 30.0)]));
        assert_eq!(store.state().seekable_amount, 30.0);
    }

    #[test]
    fn test_soft_reset_preserves_preferences() {
        let mut store = StateStore::new();
        store.set_volume(0.4, true);
        store.set_can_load(true);
        store.set_loop(true);
        store.set_playing(true);
        store.set_started(true);
        store.set_current_time(42.0);
        store.set_duration(60.0);
        store.set_can_play(true);

        store.soft_reset();
        let state = store.state();

        assert_eq!(state.volume, 0.4);
        assert!(state.muted);
        assert!(state.can_load);
        assert!(state.loop_playback);
        assert!(state.paused);
        assert!(!state.playing);
        assert!(!state.started);
        assert!(!state.can_play);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(state.duration, 0.0);
    }

    #[test]
    fn test_state_serializes_loop_field() {
        let mut store = StateStore::new();
        store.set_loop(true);
        let json = serde_json::to_string(store.state()).unwrap();
        assert!(json.contains("\"loop\":true"));
    }
}
