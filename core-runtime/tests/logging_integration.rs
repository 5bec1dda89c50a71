//! Integration tests for the logging system.
//!
//! `init_logging` installs a global subscriber, so only one test in this
//! binary may call it.

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::{LogEntry, LogLevel, LoggerSink};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, redact_url, LogFormat, LoggingConfig};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for RecordingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

#[test]
fn test_init_logging_forwards_to_config_sink() {
    let sink = Arc::new(RecordingSink::default());
    let config = CoreConfig::builder()
        .logger_sink(sink.clone())
        .build()
        .unwrap();

    let logging = config
        .logging_config()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);
    init_logging(logging).unwrap();

    tracing::debug!(target: "core_playback::state_manager", event = "waiting", "suppressed");
    tracing::trace!(target: "core_playback::state_manager", "below sink level");

    let entries = sink.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "suppressed");
    assert_eq!(entries[0].fields.get("event"), Some(&"waiting".to_string()));

    // A second initialization is rejected.
    assert!(init_logging(LoggingConfig::default()).is_err());
}

#[test]
fn test_redact_url_keeps_origin_and_path() {
    let redacted = redact_url("https://pubads.example.com/gampad/ads?sz=640x480&iu=/124319096");
    assert_eq!(redacted, "https://pubads.example.com/gampad/ads?[REDACTED]");
    assert!(!redacted.contains("iu="));
}
