//! Runtime utilities that abstract over the underlying async executor.
//!
//! Downstream crates use these wrappers so that hosts without their own Tokio
//! runtime (for example a synchronous UI thread) can still drive a session.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a fresh current-thread runtime.
///
/// Returns an I/O error if the runtime cannot be built.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

/// Returns `true` when called from inside a Tokio runtime.
///
/// Timer-owning components check this before spawning so that purely
/// synchronous use (unit tests of state transitions) never panics.
pub fn has_runtime() -> bool {
    Handle::try_current().is_ok()
}
