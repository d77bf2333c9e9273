//! Dead-letter routing.
//!
//! Every message that no live actor claimed ends up here: sends to unknown
//! or stopped actors, payloads an actor did not recognize, messages queued
//! for an actor that failed or stopped, and overflow of bounded mailboxes.
//! The office is itself an actor with a well-known address and a mailbox
//! drained by the worker pool, so reporting is asynchronous and ordered.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::warn;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use troupe_core::{ActorId, FileEventMessage, Message, Payload};

use super::mailbox::Mailbox;
use super::reference::ActorRef;
use super::system::SystemCore;

/// Name the office reports under.
pub const DEAD_LETTERS_NAME: &str = "dead-letters";

/// Why a message became a dead letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadLetterReason {
    /// The recipient is unknown or already removed from the registry
    UnknownRecipient,
    /// The recipient did not recognize the payload
    Unhandled,
    /// The recipient is in the failed state
    ActorFailed,
    /// The recipient was stopped with the message still queued
    ActorStopped,
    /// The recipient's bounded mailbox was full
    MailboxFull,
    /// The message was sent to the dead-letter address itself
    DirectSend,
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnknownRecipient => "unknown recipient",
            Self::Unhandled => "unhandled message",
            Self::ActorFailed => "recipient failed",
            Self::ActorStopped => "recipient stopped",
            Self::MailboxFull => "mailbox full",
            Self::DirectSend => "sent to dead letters",
        };
        f.write_str(text)
    }
}

/// A message nobody claimed, with where it was going and why it stopped.
#[derive(Debug, Clone)]
pub struct DeadLetter<M> {
    /// The original, untouched message
    pub message: Message<M>,
    /// Who sent it
    pub sender: ActorRef,
    /// Who it was addressed to
    pub recipient: ActorRef,
    /// Why it was not delivered
    pub reason: DeadLetterReason,
}

pub(crate) struct DeadLetterOffice<M: Payload> {
    actor_ref: ActorRef,
    mailbox: Mailbox<DeadLetter<M>>,
    retained: Mutex<VecDeque<DeadLetter<M>>>,
    capacity: usize,
    subscribers: Mutex<Vec<Sender<DeadLetter<M>>>>,
    total: AtomicU64,
}

impl<M: Payload> DeadLetterOffice<M> {
    pub(crate) fn new(capacity: usize) -> Self {
        let id = ActorId::next();
        Self {
            actor_ref: ActorRef::new(id),
            mailbox: Mailbox::new(None, id),
            retained: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
            subscribers: Mutex::new(Vec::new()),
            total: AtomicU64::new(0),
        }
    }

    pub(crate) fn actor_ref(&self) -> ActorRef {
        self.actor_ref
    }

    pub(crate) fn mailbox(&self) -> &Mailbox<DeadLetter<M>> {
        &self.mailbox
    }

    /// Queue a letter. Fails only once the office has been closed.
    pub(crate) fn post(&self, letter: DeadLetter<M>) -> Result<(), DeadLetter<M>> {
        self.mailbox.enqueue(letter).map_err(|e| e.into_inner())
    }

    /// Refuse further letters. Letters already queued can still be drained.
    pub(crate) fn close(&self) {
        self.mailbox.close();
    }

    /// Process up to `budget` letters, then release the mailbox. Returns
    /// whether letters are still waiting.
    pub(crate) fn run(&self, core: &Arc<SystemCore<M>>, budget: usize) -> bool {
        for _ in 0..budget {
            match self.mailbox.dequeue() {
                Some(letter) => self.handle(core, letter),
                None => break,
            }
        }
        self.mailbox.release();
        !self.mailbox.is_empty()
    }

    /// Process everything queued on the calling thread.
    pub(crate) fn run_inline(&self, core: &Arc<SystemCore<M>>) {
        while let Some(letter) = self.mailbox.dequeue() {
            self.handle(core, letter);
        }
        self.mailbox.release();
    }

    fn handle(&self, core: &Arc<SystemCore<M>>, letter: DeadLetter<M>) {
        self.total.fetch_add(1, Ordering::Relaxed);

        let text = format!(
            "marooned {} message from {} to {}: {}",
            letter.message.payload().kind(),
            letter.sender,
            letter.recipient,
            letter.reason
        );
        let tracking = letter.message.tracking();

        // A letter that was headed for the logger must not be reported to
        // the logger again.
        let logger = core
            .logger_ref()
            .filter(|logger| *logger != letter.recipient && core.is_accepting(*logger));
        match logger {
            Some(logger) => {
                let event = FileEventMessage::warn(DEAD_LETTERS_NAME, "-", text);
                core.tell(
                    logger,
                    Message::with_tracking(M::from_file_event(event), tracking),
                    self.actor_ref,
                );
            }
            None => warn!(target: "troupe::dead_letters", "{} [tracking={}]", text, tracking),
        }

        if self.capacity > 0 {
            let mut retained = self.retained.lock();
            if retained.len() == self.capacity {
                retained.pop_front();
            }
            retained.push_back(letter.clone());
        }

        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(letter.clone()).is_ok());
    }

    pub(crate) fn subscribe(&self) -> Receiver<DeadLetter<M>> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub(crate) fn retained(&self) -> Vec<DeadLetter<M>> {
        self.retained.lock().iter().cloned().collect()
    }

    pub(crate) fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
