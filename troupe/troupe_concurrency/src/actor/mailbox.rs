//! Actor mailbox implementation for message passing.
//!
//! A mailbox is a multi-producer, single-consumer FIFO owned by one actor.
//! Besides the queue it carries the actor's scheduling flag: whoever flips
//! the flag from idle to scheduled owns the right to drain the mailbox until
//! it releases the flag again. That flag is what keeps two workers from ever
//! running the same actor at once.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use troupe_core::ActorId;

/// Error when enqueueing into a mailbox. The rejected item is handed back.
#[derive(Error)]
pub enum MailboxError<T> {
    /// The mailbox is full (bounded capacity reached)
    #[error("mailbox is full")]
    Full(T),
    /// The mailbox has been closed because its actor is stopping
    #[error("mailbox is closed")]
    Closed(T),
}

impl<T> MailboxError<T> {
    /// Recover the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }
}

impl<T> fmt::Debug for MailboxError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

/// FIFO queue of items for one actor
pub struct Mailbox<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    capacity: Option<usize>,
    owner: ActorId,
    scheduled: AtomicBool,
    closed: AtomicBool,
}

impl<T> Mailbox<T> {
    /// Create a mailbox; `None` capacity means unbounded
    pub fn new(capacity: Option<usize>, owner: ActorId) -> Self {
        let (sender, receiver) = match capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        Self {
            sender,
            receiver,
            capacity,
            owner,
            scheduled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Append an item without blocking
    pub fn enqueue(&self, item: T) -> Result<(), MailboxError<T>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MailboxError::Closed(item));
        }
        self.sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => MailboxError::Full(item),
            TrySendError::Disconnected(item) => MailboxError::Closed(item),
        })
    }

    /// Pop the oldest item
    pub fn dequeue(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Remove every queued item, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Refuse further items. Items already queued stay queued.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Claim the right to drain this mailbox. Returns `false` if another
    /// worker already holds it.
    pub fn try_schedule(&self) -> bool {
        !self.scheduled.swap(true, Ordering::SeqCst)
    }

    /// Give up the right to drain this mailbox
    pub fn release(&self) {
        self.scheduled.store(false, Ordering::SeqCst);
    }

    /// Whether a worker currently holds this mailbox
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Configured bound, if any
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// The actor this mailbox belongs to
    pub fn owner(&self) -> ActorId {
        self.owner
    }
}

impl<T> fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("owner", &self.owner)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("scheduled", &self.is_scheduled())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_fifo() {
        let mailbox = Mailbox::new(None, ActorId::next());
        for i in 0..5 {
            mailbox.enqueue(i).unwrap();
        }
        assert_eq!(mailbox.len(), 5);
        assert_eq!(mailbox.dequeue(), Some(0));
        assert_eq!(mailbox.drain(), vec![1, 2, 3, 4]);
        assert!(mailbox.is_empty());
        assert_eq!(mailbox.dequeue(), None);
    }

    #[test]
    fn test_mailbox_capacity_returns_item() {
        let mailbox = Mailbox::new(Some(2), ActorId::next());
        assert!(mailbox.enqueue(1).is_ok());
        assert!(mailbox.enqueue(2).is_ok());

        let result = mailbox.enqueue(3);
        assert!(matches!(result, Err(MailboxError::Full(3))));
        assert_eq!(mailbox.capacity(), Some(2));
    }

    #[test]
    fn test_mailbox_closed_keeps_queued_items() {
        let mailbox = Mailbox::new(None, ActorId::next());
        mailbox.enqueue("queued").unwrap();
        mailbox.close();

        let rejected = mailbox.enqueue("late").unwrap_err();
        assert!(matches!(rejected, MailboxError::Closed(_)));
        assert_eq!(rejected.into_inner(), "late");
        assert_eq!(mailbox.drain(), vec!["queued"]);
    }

    #[test]
    fn test_schedule_flag_is_exclusive() {
        let mailbox: Mailbox<u8> = Mailbox::new(None, ActorId::next());
        assert!(mailbox.try_schedule());
        assert!(!mailbox.try_schedule());
        assert!(mailbox.is_scheduled());
        mailbox.release();
        assert!(mailbox.try_schedule());
    }
}
