//! The worker pool that runs mailbox slices.

pub mod thread;

pub use thread::{PoolConfig, PoolError, PoolStats, WorkerPool};
