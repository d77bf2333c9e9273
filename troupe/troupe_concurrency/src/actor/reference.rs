//! Actor addresses.

use std::fmt;
use troupe_core::ActorId;

/// Copyable, non-owning address of an actor.
///
/// Holding a reference never keeps an actor alive. Sending to a reference
/// whose actor has stopped routes the message to the dead-letter sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorRef {
    id: ActorId,
}

impl ActorRef {
    pub(crate) fn new(id: ActorId) -> Self {
        Self { id }
    }

    /// Address used as the sender of messages that come from outside any
    /// actor. Replies to it are dead-lettered.
    pub fn nobody() -> Self {
        Self {
            id: ActorId::NOBODY,
        }
    }

    /// The actor's id.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Whether this is [`ActorRef::nobody`].
    pub fn is_nobody(&self) -> bool {
        self.id.is_nobody()
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
