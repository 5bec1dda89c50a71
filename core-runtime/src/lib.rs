//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the media session core:
//! - Logging and tracing infrastructure
//! - Configuration management (host adapters and feature flags)
//! - The notification vocabulary and its broadcast event bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the engine depends on. It
//! establishes the logging conventions, the fail-fast configuration builder
//! and the event types every session publishes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
