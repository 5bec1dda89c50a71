//! Time-related abstractions.
//!
//! `Instant` is re-exported from `tokio::time` rather than `std::time` so that
//! throttles comparing instants observe the same (possibly paused) clock as the
//! sleeping debouncers.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(150)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(150));
//! }
//! ```

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};
pub use tokio::time::{interval, sleep, sleep_until, timeout, Instant, Interval, Sleep, Timeout};

/// Interval used to emulate a display refresh (one frame at 60 Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Resolves on the next emulated animation frame.
///
/// Work scheduled with `next_frame().await` runs after every event already
/// queued for the current frame, which is the ordering the loop request
/// relies on.
pub async fn next_frame() {
    sleep(FRAME_INTERVAL).await
}
