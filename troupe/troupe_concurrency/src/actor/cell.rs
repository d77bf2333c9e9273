//! Per-actor runtime state and the mailbox drain loop.

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, trace};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use troupe_core::{FileEventMessage, Message, Payload, SupervisionStrategy};

use super::context::{Actor, ActorContext};
use super::dead_letter::DeadLetterReason;
use super::mailbox::Mailbox;
use super::reference::ActorRef;
use super::system::{ActorStatus, SystemCore};

/// Builds a fresh actor instance, at creation and on every restart.
pub(crate) type ActorFactory<M> =
    Box<dyn Fn() -> anyhow::Result<Box<dyn Actor<M>>> + Send + Sync + 'static>;

/// A queued message together with its sender.
pub(crate) struct Envelope<M> {
    pub(crate) message: Message<M>,
    pub(crate) sender: ActorRef,
}

pub(crate) struct ActorCell<M: Payload> {
    actor_ref: ActorRef,
    name: String,
    mailbox: Mailbox<Envelope<M>>,
    status: AtomicU8,
    restart_requested: AtomicBool,
    actor: Mutex<Option<Box<dyn Actor<M>>>>,
    factory: ActorFactory<M>,
    // Dropped once the actor has fully stopped; waiters see the disconnect.
    terminated: Mutex<Option<Sender<()>>>,
    terminated_rx: Receiver<()>,
}

impl<M: Payload> ActorCell<M> {
    pub(crate) fn new(
        actor_ref: ActorRef,
        name: String,
        capacity: Option<usize>,
        factory: ActorFactory<M>,
        actor: Box<dyn Actor<M>>,
    ) -> Self {
        let (terminated, terminated_rx) = bounded(1);
        Self {
            actor_ref,
            name,
            mailbox: Mailbox::new(capacity, actor_ref.id()),
            status: AtomicU8::new(ActorStatus::Running as u8),
            restart_requested: AtomicBool::new(false),
            actor: Mutex::new(Some(actor)),
            factory,
            terminated: Mutex::new(Some(terminated)),
            terminated_rx,
        }
    }

    pub(crate) fn actor_ref(&self) -> ActorRef {
        self.actor_ref
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn mailbox(&self) -> &Mailbox<Envelope<M>> {
        &self.mailbox
    }

    pub(crate) fn status(&self) -> ActorStatus {
        ActorStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub(crate) fn set_status(&self, status: ActorStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    fn transition(&self, from: ActorStatus, to: ActorStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn termination(&self) -> Receiver<()> {
        self.terminated_rx.clone()
    }

    /// Ask the worker to replace the instance before its next message.
    pub(crate) fn request_restart(&self) {
        // The flag goes first so a worker that sees `Starting` also sees it.
        self.restart_requested.store(true, Ordering::SeqCst);
        self.transition(ActorStatus::Failed, ActorStatus::Starting);
    }

    fn has_pending_work(&self) -> bool {
        self.status() == ActorStatus::Stopping
            || self.restart_requested.load(Ordering::SeqCst)
            || !self.mailbox.is_empty()
    }

    /// One scheduling slice. The caller must hold the mailbox's schedule flag.
    pub(crate) fn run(self: &Arc<Self>, core: &Arc<SystemCore<M>>) {
        let budget = core.config().throughput.max(1);
        let mut processed = 0;

        while processed < budget {
            if self.status() == ActorStatus::Stopping {
                // The schedule flag is never released, so nothing runs after this.
                self.finish(core);
                return;
            }
            if self.restart_requested.swap(false, Ordering::SeqCst) {
                self.rebuild(core);
                continue;
            }

            let Some(envelope) = self.mailbox.dequeue() else {
                break;
            };
            processed += 1;
            self.dispatch(core, envelope);
        }

        self.mailbox.release();
        if self.has_pending_work() {
            core.schedule(self);
        }
    }

    fn dispatch(self: &Arc<Self>, core: &Arc<SystemCore<M>>, envelope: Envelope<M>) {
        let mut status = self.status();
        if status == ActorStatus::Starting && self.restart_requested.swap(false, Ordering::SeqCst) {
            self.rebuild(core);
            status = self.status();
        }

        let Envelope { message, sender } = envelope;
        match status {
            ActorStatus::Running => self.process(core, message, sender),
            ActorStatus::Stopping | ActorStatus::Stopped => {
                core.dead_letter(message, sender, self.actor_ref, DeadLetterReason::ActorStopped)
            }
            ActorStatus::Failed | ActorStatus::Starting => {
                core.dead_letter(message, sender, self.actor_ref, DeadLetterReason::ActorFailed)
            }
        }
    }

    fn process(self: &Arc<Self>, core: &Arc<SystemCore<M>>, message: Message<M>, sender: ActorRef) {
        let taken = self.actor.lock().take();
        let Some(mut actor) = taken else {
            core.dead_letter(message, sender, self.actor_ref, DeadLetterReason::ActorFailed);
            return;
        };

        let tracking = message.tracking();
        let kind = message.payload().kind();
        let ctx = ActorContext::for_message(core, self.actor_ref, &self.name, sender, tracking);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| actor.receive(&ctx, message)));
        *self.actor.lock() = Some(actor);

        match outcome {
            Ok(Ok(())) => trace!("Actor {} ({}) handled {}", self.name, self.actor_ref, kind),
            Ok(Err(err)) => self.fail(core, format!("{err:#}"), kind),
            Err(panic) => self.fail(core, panic_message(panic.as_ref()), kind),
        }
    }

    fn fail(self: &Arc<Self>, core: &Arc<SystemCore<M>>, reason: String, kind: &str) {
        let strategy = core
            .supervisor()
            .handle_failure(self.actor_ref, &self.name, &reason);

        match strategy {
            SupervisionStrategy::MarkFailed => {
                self.transition(ActorStatus::Running, ActorStatus::Failed);
            }
            SupervisionStrategy::Restart => self.rebuild(core),
            SupervisionStrategy::Stop => {
                let _ = core.stop(self.actor_ref);
            }
        }

        core.report(FileEventMessage::error(
            self.name.as_str(),
            "-",
            format!("failed while handling {kind}: {reason} ({strategy:?})"),
        ));
    }

    fn rebuild(self: &Arc<Self>, core: &Arc<SystemCore<M>>) {
        // `request_restart` may move Failed to Starting between our read and
        // the swap, so re-read until we own the Starting state.
        loop {
            match self.status() {
                ActorStatus::Stopping | ActorStatus::Stopped => return,
                ActorStatus::Starting => break,
                current => {
                    if self.transition(current, ActorStatus::Starting) {
                        break;
                    }
                }
            }
        }

        let outgoing = self.actor.lock().take();
        if let Some(actor) = outgoing {
            self.retire(core, actor);
        }

        match instantiate(core, self.actor_ref, &self.name, &self.factory) {
            Ok(actor) => {
                *self.actor.lock() = Some(actor);
                self.transition(ActorStatus::Starting, ActorStatus::Running);
                info!("Restarted actor {} ({})", self.name, self.actor_ref);
            }
            Err(reason) => {
                self.actor.lock().take();
                self.transition(ActorStatus::Starting, ActorStatus::Failed);
                error!(
                    "Restart of actor {} ({}) failed: {}",
                    self.name, self.actor_ref, reason
                );
                core.report(FileEventMessage::error(
                    self.name.as_str(),
                    "-",
                    format!("restart failed: {reason}"),
                ));
            }
        }
    }

    fn finish(self: &Arc<Self>, core: &Arc<SystemCore<M>>) {
        for envelope in self.mailbox.drain() {
            core.dead_letter(
                envelope.message,
                envelope.sender,
                self.actor_ref,
                DeadLetterReason::ActorStopped,
            );
        }

        let actor = self.actor.lock().take();
        if let Some(actor) = actor {
            self.retire(core, actor);
        }

        core.supervisor().forget(self.actor_ref);
        self.set_status(ActorStatus::Stopped);
        self.terminated.lock().take();
        debug!("Actor stopped: {} ({})", self.name, self.actor_ref);
    }

    /// Run `post_stop` on an instance that is being discarded.
    fn retire(&self, core: &Arc<SystemCore<M>>, mut actor: Box<dyn Actor<M>>) {
        let ctx = ActorContext::for_lifecycle(core, self.actor_ref, &self.name);
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| actor.post_stop(&ctx))) {
            error!(
                "post_stop of actor {} ({}) panicked: {}",
                self.name,
                self.actor_ref,
                panic_message(panic.as_ref())
            );
        }
    }
}

/// Build an actor and run its `pre_setup`, turning errors and panics into a
/// description.
pub(crate) fn instantiate<M: Payload>(
    core: &Arc<SystemCore<M>>,
    actor_ref: ActorRef,
    name: &str,
    factory: &ActorFactory<M>,
) -> Result<Box<dyn Actor<M>>, String> {
    let mut actor = match panic::catch_unwind(AssertUnwindSafe(|| factory())) {
        Ok(Ok(actor)) => actor,
        Ok(Err(err)) => return Err(format!("{err:#}")),
        Err(panic) => return Err(format!("factory panicked: {}", panic_message(panic.as_ref()))),
    };

    let ctx = ActorContext::for_lifecycle(core, actor_ref, name);
    match panic::catch_unwind(AssertUnwindSafe(|| actor.pre_setup(&ctx))) {
        Ok(Ok(())) => Ok(actor),
        Ok(Err(err)) => Err(format!("pre_setup failed: {err:#}")),
        Err(panic) => Err(format!(
            "pre_setup panicked: {}",
            panic_message(panic.as_ref())
        )),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "<unknown panic>".to_string()
    }
}
