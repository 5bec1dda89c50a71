//! Synchronization primitives.
//!
//! Channels used by the engine: `broadcast` for notifications, `watch` for
//! state snapshots, `mpsc` for the provider event stream, and the
//! `CancellationToken` that aborts a pending ad load.

pub use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, Notify};
pub use tokio_util::sync::CancellationToken;
