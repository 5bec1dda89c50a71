//! Workspace placeholder crate.
//!
//! This crate exists to expose a single feature (`engine`) that pulls in the
//! media session engine (`core-playback`) together with its runtime
//! (`core-runtime`). Host applications can depend on `media-session-workspace`
//! and enable the feature without wiring each crate individually.

#[cfg(feature = "engine")]
pub use core_playback as playback;

#[cfg(feature = "engine")]
pub use core_runtime as runtime;
