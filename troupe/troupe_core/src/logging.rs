//! Log events understood by the logging actor.
//!
//! Actors do not write logs themselves. They send a [`FileEventMessage`]
//! to the logging actor, which turns each one into a [`LogRecord`] and hands
//! it to its sink in mailbox order.

use crate::id::Tracking;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// Debug information.
    Debug,

    /// Informational messages.
    Info,

    /// Warning messages.
    Warn,

    /// Error messages.
    Error,
}

impl EventType {
    /// Upper-case name used in formatted output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "err" => Ok(Self::Error),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

/// A log event sent to the logging actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEventMessage {
    /// Name of the actor reporting the event.
    pub actor: String,

    /// The file the event is about.
    pub source_file: String,

    /// Severity.
    pub event_type: EventType,

    /// Human readable text.
    pub message: String,
}

impl FileEventMessage {
    /// Create a new event.
    pub fn new(
        event_type: EventType,
        actor: impl Into<String>,
        source_file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            source_file: source_file.into(),
            event_type,
            message: message.into(),
        }
    }

    /// Shorthand for an `INFO` event.
    pub fn info(
        actor: impl Into<String>,
        source_file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EventType::Info, actor, source_file, message)
    }

    /// Shorthand for a `WARN` event.
    pub fn warn(
        actor: impl Into<String>,
        source_file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EventType::Warn, actor, source_file, message)
    }

    /// Shorthand for an `ERROR` event.
    pub fn error(
        actor: impl Into<String>,
        source_file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EventType::Error, actor, source_file, message)
    }
}

/// A log event stamped with the time it was written and its conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the logging actor processed the event.
    pub timestamp: DateTime<Utc>,

    /// Tracking token of the message that carried the event.
    pub tracking: Tracking,

    /// The event itself.
    pub event: FileEventMessage,
}

impl LogRecord {
    /// Stamp an event with the current time.
    pub fn new(event: FileEventMessage, tracking: Tracking) -> Self {
        Self {
            timestamp: Utc::now(),
            tracking,
            event,
        }
    }

    /// One-line rendering used by the text sinks.
    pub fn format(&self) -> String {
        format!(
            "{} [{}] {} ({}): {} [tracking={}]",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.event.event_type,
            self.event.actor,
            self.event.source_file,
            self.event.message,
            self.tracking
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parse() {
        assert_eq!(EventType::from_str("info").unwrap(), EventType::Info);
        assert_eq!(EventType::from_str("WARNING").unwrap(), EventType::Warn);
        assert!(EventType::from_str("loud").is_err());
        assert_eq!(EventType::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_record_format() {
        let tracking = Tracking::new();
        let record = LogRecord::new(
            FileEventMessage::info("checker", "a.mp3", "metadata is complete"),
            tracking,
        );
        let line = record.format();
        assert!(line.contains("[INFO] checker (a.mp3): metadata is complete"));
        assert!(line.ends_with(&format!("[tracking={tracking}]")));
    }
}
