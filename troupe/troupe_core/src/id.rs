//! Identifiers used by the actor runtime.
//!
//! [`ActorId`] is a process-unique integer handed out when an actor is
//! created. [`Tracking`] is a UUID correlation token carried by every
//! message and copied onto replies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an actor.
///
/// Ids are never reused within a process, so a stale id can only ever
/// resolve to "not found", never to a different actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(u64);

impl ActorId {
    /// Reserved id that never names a live actor.
    pub const NOBODY: ActorId = ActorId(0);

    /// Allocate the next unused id.
    pub fn next() -> Self {
        Self(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Whether this is the reserved [`ActorId::NOBODY`].
    pub fn is_nobody(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nobody() {
            write!(f, "nobody")
        } else {
            write!(f, "actor-{}", self.0)
        }
    }
}

/// Correlation token propagated unchanged through a causal chain of messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tracking(Uuid);

impl Tracking {
    /// Start a new conversation.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap a known UUID, e.g. one received from outside the process.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for Tracking {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Tracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Tracking {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_ids_are_unique() {
        let a = ActorId::next();
        let b = ActorId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert!(!a.is_nobody());
    }

    #[test]
    fn test_actor_id_display() {
        assert_eq!(ActorId::NOBODY.to_string(), "nobody");
        let id = ActorId::next();
        assert_eq!(id.to_string(), format!("actor-{}", id.as_u64()));
    }

    #[test]
    fn test_tracking_parse() {
        let text = "550e8400-e29b-41d4-a716-446655440000";
        let tracking = Tracking::from_str(text).unwrap();
        assert_eq!(tracking.to_string(), text);
        assert!(Tracking::from_str("not-a-uuid").is_err());
        assert_ne!(Tracking::new(), Tracking::new());
    }
}
