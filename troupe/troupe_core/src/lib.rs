//! # Troupe Core
//!
//! `troupe_core` provides the shared vocabulary of the Troupe actor runtime:
//! error types, identifiers, the immutable message envelope, the log event
//! contract understood by the logging actor, and system configuration.
//!
//! ## Core Principles
//!
//! 1. **Messages are values**: a [`Message`] is never mutated after it is
//!    built. Actors answer by producing new messages, usually through
//!    [`Message::reply`], which keeps the [`Tracking`] token of the request so
//!    a multi-hop conversation can be followed in the logs.
//!
//! 2. **Closed payload sets**: every actor system is parameterised by one
//!    payload type implementing [`Payload`], normally an enum. Handlers match
//!    over it exhaustively and forward what they do not understand to the
//!    dead-letter sink.
//!
//! 3. **Errors stay typed**: routing failures never surface as errors to the
//!    sender; the errors in [`error`] describe the few operations that do
//!    report synchronously (creation, ask, configuration).
//!
//! ## Crate Structure
//!
//! - **config**: `ActorSystemConfig` and supervision settings, loadable from TOML
//! - **error**: Error types shared by the runtime crates
//! - **id**: `ActorId` and `Tracking`
//! - **logging**: `EventType`, `FileEventMessage` and formatted `LogRecord`s
//! - **message**: the `Message` envelope and the `Payload` trait

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod id;
pub mod logging;
pub mod message;

pub use config::{ActorSystemConfig, SupervisionStrategy, SupervisorConfig};
pub use error::{ActorError, AskError, ConfigError, Error, Result};
pub use id::{ActorId, Tracking};
pub use logging::{EventType, FileEventMessage, LogRecord};
pub use message::{Message, Payload};
