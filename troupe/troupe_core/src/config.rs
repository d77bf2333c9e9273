//! Configuration for the actor system.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! name = "tagger"
//! worker_threads = 4
//! throughput = 10
//! mailbox_capacity = 1000
//!
//! [supervisor]
//! strategy = "restart"
//! max_restarts = 3
//! restart_window_ms = 60000
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What happens to an actor whose `receive` failed or panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisionStrategy {
    /// Keep the actor registered but dead-letter everything sent to it
    /// until it is restarted or stopped.
    #[default]
    MarkFailed,

    /// Replace the actor with a fresh instance from its factory.
    Restart,

    /// Stop the actor.
    Stop,
}

/// Configuration for a supervisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Strategy to use when an actor fails
    pub strategy: SupervisionStrategy,

    /// Maximum number of restarts within the window
    pub max_restarts: usize,

    /// Window for counting restarts, in milliseconds
    pub restart_window_ms: u64,
}

impl SupervisorConfig {
    /// The restart window as a `Duration`.
    pub fn restart_window(&self) -> Duration {
        Duration::from_millis(self.restart_window_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            strategy: SupervisionStrategy::MarkFailed,
            max_restarts: 3,
            restart_window_ms: 60_000,
        }
    }
}

/// Configuration for the actor system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorSystemConfig {
    /// System name, used in logs and worker thread names
    pub name: String,

    /// Number of threads draining mailboxes
    pub worker_threads: usize,

    /// Messages one actor may process before yielding its worker
    pub throughput: usize,

    /// Per-actor mailbox bound; `None` means unbounded
    pub mailbox_capacity: Option<usize>,

    /// Number of dead letters retained for inspection
    pub dead_letter_capacity: usize,

    /// Default `ask` timeout, in milliseconds
    pub ask_timeout_ms: u64,

    /// Failure handling
    pub supervisor: SupervisorConfig,
}

impl Default for ActorSystemConfig {
    fn default() -> Self {
        Self {
            name: "troupe".to_string(),
            worker_threads: num_cpus::get(),
            throughput: 10,
            mailbox_capacity: None,
            dead_letter_capacity: 512,
            ask_timeout_ms: 5_000,
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl ActorSystemConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".into()));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.throughput == 0 {
            return Err(ConfigError::Invalid("throughput must be at least 1".into()));
        }
        if self.mailbox_capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "mailbox_capacity must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }

    /// The default `ask` timeout as a `Duration`.
    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ActorSystemConfig::default();
        assert_eq!(config.throughput, 10);
        assert_eq!(config.mailbox_capacity, None);
        assert_eq!(config.supervisor.strategy, SupervisionStrategy::MarkFailed);
        assert_eq!(config.ask_timeout(), Duration::from_secs(5));
        assert!(config.worker_threads >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_document() {
        let config = ActorSystemConfig::from_toml_str(
            r#"
            name = "tagger"
            worker_threads = 2
            mailbox_capacity = 64

            [supervisor]
            strategy = "restart"
            max_restarts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "tagger");
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.mailbox_capacity, Some(64));
        assert_eq!(config.throughput, 10);
        assert_eq!(config.supervisor.strategy, SupervisionStrategy::Restart);
        assert_eq!(config.supervisor.max_restarts, 5);
        assert_eq!(config.supervisor.restart_window(), Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let result = ActorSystemConfig::from_toml_str("worker_threads = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = ActorSystemConfig::from_toml_str("throughput = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = ActorSystemConfig::from_toml_str("worker_threads = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "throughput = 3").unwrap();
        writeln!(file, "[supervisor]").unwrap();
        writeln!(file, "strategy = \"stop\"").unwrap();

        let config = ActorSystemConfig::from_file(file.path()).unwrap();
        assert_eq!(config.throughput, 3);
        assert_eq!(config.supervisor.strategy, SupervisionStrategy::Stop);

        let missing = ActorSystemConfig::from_file("/definitely/not/here.toml");
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
