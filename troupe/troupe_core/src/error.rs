//! Error types for the Troupe actor runtime.
//!
//! Only a handful of operations report failures synchronously: creating an
//! actor, waiting on an `ask`, and loading configuration. Everything that
//! happens across a mailbox boundary is reported through reply messages or
//! the dead-letter sink instead, so it has no error type here.
//!
//! The root error type, `Error`, wraps the subsystem errors for callers that
//! want a single type at the top level.

use crate::id::ActorId;
use std::time::Duration;
use thiserror::Error;

/// Root error type for Troupe.
#[derive(Debug, Error)]
pub enum Error {
    /// Actor lifecycle errors
    #[error("Actor error: {0}")]
    Actor(#[from] ActorError),

    /// Request/response errors
    #[error("Ask error: {0}")]
    Ask(#[from] AskError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to actor lifecycle operations.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The factory or `pre_setup` failed; the actor was never registered
    #[error("failed to create actor {name}: {reason}")]
    CreationFailed {
        /// Name the actor was being created under
        name: String,

        /// What went wrong
        reason: String,
    },

    /// No live actor is registered under this id
    #[error("actor not found: {0}")]
    NotFound(ActorId),

    /// The actor system has been shut down
    #[error("actor system is shut down")]
    SystemShutdown,

    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

/// Errors surfaced to the caller of `ask`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AskError {
    /// No reply arrived before the deadline
    #[error("no reply received within {0:?}")]
    Timeout(Duration),

    /// The actor system was shut down before a reply arrived
    #[error("actor system is shut down")]
    SystemShutdown,
}

/// Errors related to configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but holds unusable values
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout Troupe.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err: Error = ActorError::NotFound(ActorId::NOBODY).into();
        assert!(matches!(err, Error::Actor(ActorError::NotFound(_))));

        let err: Error = AskError::Timeout(Duration::from_millis(10)).into();
        assert_eq!(err.to_string(), "Ask error: no reply received within 10ms");
    }

    #[test]
    fn test_creation_error_message() {
        let err = ActorError::CreationFailed {
            name: "checker".to_string(),
            reason: "reader unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to create actor checker: reader unavailable"
        );
    }
}
