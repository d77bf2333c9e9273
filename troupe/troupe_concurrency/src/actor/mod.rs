//! Actor-based concurrency with mailboxes, dead-letter routing and
//! supervision.
//!
//! This module provides the actor model implementation for Troupe:
//!
//! - The [`Actor`] trait and the per-call [`ActorContext`]
//! - Mailboxes drained by a shared worker pool, one slice at a time
//! - The dead-letter sink and the logging actor, both built in
//! - Supervision of failed actors, and `ask` on top of one-way sends

pub mod ask;
mod cell;
pub mod context;
pub mod dead_letter;
pub mod logger;
pub mod mailbox;
pub mod reference;
pub mod supervisor;
pub mod system;

pub use ask::PendingReply;
pub use context::{Actor, ActorContext};
pub use dead_letter::{DeadLetter, DeadLetterReason, DEAD_LETTERS_NAME};
pub use logger::{FacadeSink, LogSink, LoggerActor, MemorySink, WriterSink, EVENT_TARGET, LOGGER_NAME};
pub use mailbox::{Mailbox, MailboxError};
pub use reference::ActorRef;
pub use supervisor::{BasicSupervisor, SupervisionStrategy, Supervisor, SupervisorConfig};
pub use system::{ActorStatus, ActorSystem, StopHandle};
