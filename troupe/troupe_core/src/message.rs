//! The message envelope exchanged between actors.

use crate::id::Tracking;
use crate::logging::FileEventMessage;
use std::fmt;

/// The closed set of payload variants an actor system exchanges.
///
/// Implementations are normally enums. The runtime only needs to know how
/// to wrap a [`FileEventMessage`] for the logging actor and how to find one
/// again; everything else is opaque to it.
pub trait Payload: Clone + fmt::Debug + Send + 'static {
    /// Wrap a log event so it can be sent to the logging actor.
    fn from_file_event(event: FileEventMessage) -> Self;

    /// The log event carried by this payload, if it is one.
    fn as_file_event(&self) -> Option<&FileEventMessage>;

    /// Short variant name, used in runtime logs and dead-letter reports.
    fn kind(&self) -> &'static str;
}

/// Immutable envelope around a payload and its correlation token.
///
/// There is no way to mutate a message once built; handlers produce new
/// messages instead.
#[derive(Clone, Debug, PartialEq)]
pub struct Message<M> {
    payload: M,
    tracking: Tracking,
}

impl<M> Message<M> {
    /// Start a new conversation with a fresh [`Tracking`] token.
    pub fn new(payload: M) -> Self {
        Self {
            payload,
            tracking: Tracking::new(),
        }
    }

    /// Continue an existing conversation.
    pub fn with_tracking(payload: M, tracking: Tracking) -> Self {
        Self { payload, tracking }
    }

    /// Build a follow-up message that keeps this message's tracking token.
    pub fn reply<N>(&self, payload: N) -> Message<N> {
        Message {
            payload,
            tracking: self.tracking,
        }
    }

    /// The payload.
    pub fn payload(&self) -> &M {
        &self.payload
    }

    /// The correlation token.
    pub fn tracking(&self) -> Tracking {
        self.tracking
    }

    /// Take the payload out of the envelope.
    pub fn into_payload(self) -> M {
        self.payload
    }

    /// Split the envelope into payload and tracking token.
    pub fn into_parts(self) -> (M, Tracking) {
        (self.payload, self.tracking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_keeps_tracking() {
        let request = Message::new("ping");
        let reply = request.reply(42u32);
        assert_eq!(reply.tracking(), request.tracking());
        assert_eq!(*reply.payload(), 42);

        let other = Message::new("ping");
        assert_ne!(other.tracking(), request.tracking());
    }

    #[test]
    fn test_into_parts() {
        let tracking = Tracking::new();
        let message = Message::with_tracking(String::from("hello"), tracking);
        let (payload, carried) = message.into_parts();
        assert_eq!(payload, "hello");
        assert_eq!(carried, tracking);
    }
}
