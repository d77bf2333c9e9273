#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Troupe Concurrency
//!
//! The actor runtime of Troupe.
//!
//! This crate provides:
//!
//! - An [`ActorSystem`] generic over one payload type, with a registry of
//!   live actors addressed by copyable [`ActorRef`]s
//! - Fire-and-forget `tell` and a timed `ask` built on it
//! - A fixed pool of worker threads draining mailboxes with a per-turn
//!   throughput budget, so one busy actor cannot starve the rest
//! - A dead-letter sink that receives every undeliverable message
//! - A logging actor writing to a pluggable [`LogSink`]
//! - Supervision of actors whose handlers fail
//!
//! ## Example
//!
//! ```rust,ignore
//! let system = ActorSystem::<Command>::new()?;
//! let echo = system.create_actor("echo", || Ok(Echo))?;
//! let reply = system.ask(echo, Command::Ping, Duration::from_secs(1))?.wait()?;
//! system.shutdown();
//! ```

/// Actors, mailboxes, routing and supervision
pub mod actor;

/// Worker threads that execute mailbox slices
pub mod pool;

pub use actor::{
    Actor, ActorContext, ActorRef, ActorStatus, ActorSystem, DeadLetter, DeadLetterReason,
    FacadeSink, LogSink, MemorySink, PendingReply, StopHandle, WriterSink,
};
pub use pool::WorkerPool;
