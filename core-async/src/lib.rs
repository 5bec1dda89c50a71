//! Runtime abstraction layer for the media session core.
//!
//! The engine crates never name Tokio directly for tasks and timers; they go
//! through this crate so that every deferred re-entry (idle delay, waiting
//! debounce, seeking throttle, frame-deferred loop) shares one clock. The
//! clock is Tokio's, which means `tokio::time::pause()` in tests drives all of
//! them deterministically.
//!
//! # Modules
//!
//! - `task`: Task spawning and cancellation
//! - `time`: Sleep, instants and the animation-frame emulation
//! - `sync`: Channels and the cancellation token
//! - `runtime`: Blocking entry point for synchronous hosts
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(300)).await;
//!         "debounced"
//!     });
//!     handle.abort();
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{next_frame, sleep, Duration, Instant};
