//! The actor contract and the context handed to every handler call.

use std::sync::Arc;

use troupe_core::{ActorError, EventType, FileEventMessage, Message, Payload, Tracking};

use super::dead_letter::DeadLetterReason;
use super::reference::ActorRef;
use super::system::{ActorSystem, StopHandle, SystemCore};

/// A unit of sequential computation that communicates only by messages.
///
/// The runtime guarantees that at most one of these methods runs at a time
/// for a given actor, so implementations need no internal locking.
///
/// # Example
///
/// ```rust,ignore
/// impl Actor<Command> for Echo {
///     fn receive(
///         &mut self,
///         ctx: &ActorContext<'_, Command>,
///         message: Message<Command>,
///     ) -> anyhow::Result<()> {
///         match message.payload() {
///             Command::Ping => ctx.reply(Command::Pong),
///             _ => self.notify_marooned_message(ctx, message),
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Actor<M: Payload>: Send + 'static {
    /// One-time initialization, run before the actor is registered and again
    /// after every restart. An error aborts creation.
    fn pre_setup(&mut self, _ctx: &ActorContext<'_, M>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle one message.
    ///
    /// Implementations match over the payload's variants and must pass
    /// every variant they do not handle to
    /// [`notify_marooned_message`](Actor::notify_marooned_message). An `Err`
    /// or a panic marks the actor as failed; expected per-request failures
    /// belong in reply payloads instead.
    fn receive(&mut self, ctx: &ActorContext<'_, M>, message: Message<M>) -> anyhow::Result<()>;

    /// Route a message this actor does not understand to the dead-letter
    /// sink. Overrides may add diagnostics but must still forward.
    fn notify_marooned_message(&mut self, ctx: &ActorContext<'_, M>, message: Message<M>) {
        ctx.notify_marooned_message(message);
    }

    /// Called once after the actor has been stopped and its mailbox drained.
    fn post_stop(&mut self, _ctx: &ActorContext<'_, M>) {}
}

/// Per-call view of the system: who am I, who sent this, where do I log.
///
/// A context only lives for the duration of one handler call. Outside
/// `receive` (in `pre_setup` and `post_stop`) the sender is
/// [`ActorRef::nobody`].
pub struct ActorContext<'a, M: Payload> {
    core: &'a Arc<SystemCore<M>>,
    self_ref: ActorRef,
    name: &'a str,
    sender: ActorRef,
    tracking: Option<Tracking>,
}

impl<'a, M: Payload> ActorContext<'a, M> {
    pub(crate) fn for_message(
        core: &'a Arc<SystemCore<M>>,
        self_ref: ActorRef,
        name: &'a str,
        sender: ActorRef,
        tracking: Tracking,
    ) -> Self {
        Self {
            core,
            self_ref,
            name,
            sender,
            tracking: Some(tracking),
        }
    }

    pub(crate) fn for_lifecycle(
        core: &'a Arc<SystemCore<M>>,
        self_ref: ActorRef,
        name: &'a str,
    ) -> Self {
        Self {
            core,
            self_ref,
            name,
            sender: ActorRef::nobody(),
            tracking: None,
        }
    }

    /// This actor's own address.
    pub fn self_ref(&self) -> ActorRef {
        self.self_ref
    }

    /// Name the actor was created under.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Sender of the message being processed.
    pub fn sender(&self) -> ActorRef {
        self.sender
    }

    /// Tracking token of the message being processed.
    pub fn tracking(&self) -> Option<Tracking> {
        self.tracking
    }

    /// Address of the system's logging actor.
    pub fn logger(&self) -> ActorRef {
        self.core.logger_ref().unwrap_or_else(ActorRef::nobody)
    }

    /// Address of the system's dead-letter sink.
    pub fn dead_letters(&self) -> ActorRef {
        self.core.dead_letters_ref()
    }

    /// Send a message with this actor as the sender.
    pub fn tell(&self, target: ActorRef, message: Message<M>) {
        self.core.tell(target, message, self.self_ref);
    }

    /// Send `payload` to `target` as part of the current conversation.
    pub fn tell_payload(&self, target: ActorRef, payload: M) {
        self.tell(target, self.follow_up(payload));
    }

    /// Answer the sender of the current message, keeping its tracking token.
    pub fn reply(&self, payload: M) {
        self.tell(self.sender, self.follow_up(payload));
    }

    /// Send a log event to the logging actor.
    pub fn log(&self, event_type: EventType, source_file: &str, text: impl Into<String>) {
        let event = FileEventMessage::new(event_type, self.name, source_file, text);
        self.tell(self.logger(), self.follow_up(M::from_file_event(event)));
    }

    /// Hand a message this actor does not recognize to the dead-letter sink,
    /// tagged with this actor as the original recipient.
    pub fn notify_marooned_message(&self, message: Message<M>) {
        self.core
            .dead_letter(message, self.sender, self.self_ref, DeadLetterReason::Unhandled);
    }

    /// Create a child or peer actor.
    pub fn create_actor<A, F>(&self, name: impl Into<String>, factory: F) -> Result<ActorRef, ActorError>
    where
        A: Actor<M>,
        F: Fn() -> anyhow::Result<A> + Send + Sync + 'static,
    {
        self.system().create_actor(name, factory)
    }

    /// Stop this actor once the current call returns. Messages still queued
    /// are dead-lettered.
    pub fn stop_self(&self) -> Option<StopHandle> {
        self.core.stop(self.self_ref).ok()
    }

    /// A handle to the owning system.
    pub fn system(&self) -> ActorSystem<M> {
        ActorSystem::from_core(Arc::clone(self.core))
    }

    fn follow_up(&self, payload: M) -> Message<M> {
        match self.tracking {
            Some(tracking) => Message::with_tracking(payload, tracking),
            None => Message::new(payload),
        }
    }
}
