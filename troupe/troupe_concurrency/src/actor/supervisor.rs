//! Actor supervision and failure recovery.
//!
//! When `receive` returns an error or panics, the scheduler asks the
//! system's supervisor what to do with the actor. The message that caused
//! the failure is never retried.

use log::{error, warn};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use troupe_core::ActorId;

pub use troupe_core::config::{SupervisionStrategy, SupervisorConfig};

use super::reference::ActorRef;

/// Interface for supervising actors
pub trait Supervisor: Send + Sync {
    /// Decide what happens to an actor whose handler failed
    fn handle_failure(&self, actor: ActorRef, name: &str, reason: &str) -> SupervisionStrategy;

    /// Drop any bookkeeping for an actor that has stopped
    fn forget(&self, _actor: ActorRef) {}

    /// Get the supervisor configuration
    fn config(&self) -> &SupervisorConfig;
}

/// Applies the configured strategy, bounding restarts per time window
pub struct BasicSupervisor {
    config: SupervisorConfig,
    restarts: Mutex<HashMap<ActorId, VecDeque<Instant>>>,
}

impl BasicSupervisor {
    /// Create a new basic supervisor
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            restarts: Mutex::new(HashMap::new()),
        }
    }

    /// Restarts recorded for an actor within the current window
    pub fn recent_restarts(&self, actor: ActorRef) -> usize {
        let window = self.config.restart_window();
        self.restarts
            .lock()
            .get(&actor.id())
            .map(|history| history.iter().filter(|at| at.elapsed() < window).count())
            .unwrap_or(0)
    }
}

impl Supervisor for BasicSupervisor {
    fn handle_failure(&self, actor: ActorRef, name: &str, reason: &str) -> SupervisionStrategy {
        error!("Actor failure: {} ({}) - Error: {}", name, actor, reason);

        match self.config.strategy {
            SupervisionStrategy::Restart => {
                let window = self.config.restart_window();
                let mut restarts = self.restarts.lock();
                let history = restarts.entry(actor.id()).or_default();
                while history.front().is_some_and(|at| at.elapsed() >= window) {
                    history.pop_front();
                }

                if history.len() >= self.config.max_restarts {
                    warn!(
                        "Actor {} ({}) exceeded {} restarts within {:?}; marking it failed",
                        name, actor, self.config.max_restarts, window
                    );
                    SupervisionStrategy::MarkFailed
                } else {
                    history.push_back(Instant::now());
                    SupervisionStrategy::Restart
                }
            }
            strategy => strategy,
        }
    }

    fn forget(&self, actor: ActorRef) {
        self.restarts.lock().remove(&actor.id());
    }

    fn config(&self) -> &SupervisorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> ActorRef {
        ActorRef::new(ActorId::next())
    }

    #[test]
    fn test_default_marks_failed() {
        let supervisor = BasicSupervisor::new(SupervisorConfig::default());
        let strategy = supervisor.handle_failure(actor(), "worker", "boom");
        assert_eq!(strategy, SupervisionStrategy::MarkFailed);
    }

    #[test]
    fn test_restart_budget() {
        let supervisor = BasicSupervisor::new(SupervisorConfig {
            strategy: SupervisionStrategy::Restart,
            max_restarts: 2,
            restart_window_ms: 60_000,
        });
        let target = actor();

        assert_eq!(
            supervisor.handle_failure(target, "worker", "boom"),
            SupervisionStrategy::Restart
        );
        assert_eq!(
            supervisor.handle_failure(target, "worker", "boom"),
            SupervisionStrategy::Restart
        );
        assert_eq!(supervisor.recent_restarts(target), 2);
        assert_eq!(
            supervisor.handle_failure(target, "worker", "boom"),
            SupervisionStrategy::MarkFailed
        );

        // Other actors have their own budget.
        assert_eq!(
            supervisor.handle_failure(actor(), "other", "boom"),
            SupervisionStrategy::Restart
        );

        supervisor.forget(target);
        assert_eq!(supervisor.recent_restarts(target), 0);
    }

    #[test]
    fn test_stop_strategy() {
        let supervisor = BasicSupervisor::new(SupervisorConfig {
            strategy: SupervisionStrategy::Stop,
            ..Default::default()
        });
        assert_eq!(
            supervisor.handle_failure(actor(), "worker", "boom"),
            SupervisionStrategy::Stop
        );
    }
}
