//! Request/response on top of one-way messages.
//!
//! `ask` creates a short-lived reply actor, sends the request with that
//! actor as the sender, and hands back a [`PendingReply`]. The first reply
//! wins; anything arriving after it, or after the caller gave up, is
//! dead-lettered with the reply actor as the recipient.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::trace;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use troupe_core::{AskError, Message, Payload, Tracking};

use super::context::{Actor, ActorContext};
use super::reference::ActorRef;
use super::system::ActorSystem;

/// Shared between the reply actor and the waiter; whoever takes the sender
/// first decides the outcome.
type ReplySlot<M> = Arc<Mutex<Option<Sender<Message<M>>>>>;

struct ReplyActor<M: Payload> {
    slot: ReplySlot<M>,
}

impl<M: Payload> Actor<M> for ReplyActor<M> {
    fn receive(&mut self, ctx: &ActorContext<'_, M>, message: Message<M>) -> anyhow::Result<()> {
        let mut slot = self.slot.lock();
        match slot.take() {
            Some(tx) => {
                // Capacity one and used once: never blocks.
                let _ = tx.send(message);
                drop(slot);
                ctx.stop_self();
            }
            None => {
                drop(slot);
                self.notify_marooned_message(ctx, message);
            }
        }
        Ok(())
    }

    fn post_stop(&mut self, _ctx: &ActorContext<'_, M>) {
        // Wakes a waiter whose reply actor was stopped from outside.
        self.slot.lock().take();
    }
}

/// A reply that may still be on its way.
///
/// Dropping the handle abandons the request and stops the reply actor.
pub struct PendingReply<M: Payload> {
    system: ActorSystem<M>,
    reply_to: ActorRef,
    slot: ReplySlot<M>,
    receiver: Receiver<Message<M>>,
    tracking: Tracking,
    timeout: Duration,
    // `None` when the timeout is too large to express as an instant.
    deadline: Option<Instant>,
    finished: bool,
}

impl<M: Payload> PendingReply<M> {
    pub(crate) fn start(
        system: ActorSystem<M>,
        target: ActorRef,
        request: Message<M>,
        timeout: Duration,
    ) -> Result<Self, AskError> {
        let deadline = Instant::now().checked_add(timeout);
        let (tx, receiver) = bounded(1);
        let slot: ReplySlot<M> = Arc::new(Mutex::new(Some(tx)));

        let factory_slot = Arc::clone(&slot);
        let name = format!("$ask-{}", system.next_ask_id());
        let reply_to = system
            .create_actor(name, move || {
                Ok(ReplyActor {
                    slot: Arc::clone(&factory_slot),
                })
            })
            .map_err(|_| AskError::SystemShutdown)?;

        let tracking = request.tracking();
        trace!("Asking {} via {} [tracking={}]", target, reply_to, tracking);
        system.tell(target, request, reply_to);

        Ok(Self {
            system,
            reply_to,
            slot,
            receiver,
            tracking,
            timeout,
            deadline,
            finished: false,
        })
    }

    /// Address replies are expected at.
    pub fn reply_to(&self) -> ActorRef {
        self.reply_to
    }

    /// Tracking token of the request.
    pub fn tracking(&self) -> Tracking {
        self.tracking
    }

    /// Block until the first reply arrives or the timeout passes.
    pub fn wait(mut self) -> Result<Message<M>, AskError> {
        let received = match self.deadline {
            Some(deadline) => self
                .receiver
                .recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => self
                .receiver
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        let outcome = match received {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Timeout) => self.expire().ok_or(AskError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(AskError::SystemShutdown),
        };
        self.finish();
        outcome
    }

    /// The reply, if it has already arrived. Does not consume the handle.
    pub fn try_take(&mut self) -> Option<Message<M>> {
        let reply = self.receiver.try_recv().ok();
        if reply.is_some() {
            self.finish();
        }
        reply
    }

    // Racing with the reply actor: if it already took the sender, the reply
    // is in the channel.
    fn expire(&mut self) -> Option<Message<M>> {
        let mut slot = self.slot.lock();
        if slot.take().is_some() {
            return None;
        }
        drop(slot);
        self.receiver.try_recv().ok()
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.slot.lock().take();
        let _ = self.system.stop(self.reply_to);
    }
}

impl<M: Payload> Drop for PendingReply<M> {
    fn drop(&mut self) {
        self.finish();
    }
}
