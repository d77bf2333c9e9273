//! The actor system: registry, routing, scheduling and lifecycle.
//!
//! Sends never block the caller beyond enqueueing. Each actor's mailbox is
//! drained by the worker pool one slice at a time, and a mailbox is claimed
//! by at most one worker at once, so an actor's handlers never overlap while
//! different actors run in parallel.
//!
//! Registry changes (create, stop) take the registry's write lock and every
//! send holds the read lock while it enqueues, so a message is either in
//! the mailbox before the actor is removed (and is drained to the
//! dead-letter sink on stop) or it sees the actor gone.

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use log::{debug, info, log, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use troupe_core::{
    ActorError, ActorId, ActorSystemConfig, AskError, FileEventMessage, Message, Payload,
};

use super::ask::PendingReply;
use super::cell::{instantiate, ActorCell, ActorFactory, Envelope};
use super::context::Actor;
use super::dead_letter::{DeadLetter, DeadLetterOffice, DeadLetterReason};
use super::logger::{level_for, FacadeSink, LogSink, LoggerActor, LOGGER_NAME};
use super::mailbox::MailboxError;
use super::reference::ActorRef;
use super::supervisor::{BasicSupervisor, Supervisor};
use crate::pool::{PoolConfig, PoolStats, WorkerPool};

/// How long shutdown waits for each group of actors to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle state of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActorStatus {
    /// Being (re)built; messages queue up
    Starting = 0,
    /// Processing messages
    Running = 1,
    /// A handler failed; messages are dead-lettered until restart or stop
    Failed = 2,
    /// Stop requested; draining
    Stopping = 3,
    /// Fully stopped and removed
    Stopped = 4,
}

impl ActorStatus {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Failed,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Completion handle returned by [`ActorSystem::stop`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    actor: ActorRef,
    terminated: Receiver<()>,
}

impl StopHandle {
    fn new(actor: ActorRef, terminated: Receiver<()>) -> Self {
        Self { actor, terminated }
    }

    /// The actor being stopped.
    pub fn actor(&self) -> ActorRef {
        self.actor
    }

    /// Wait until the actor has run `post_stop`. Returns `false` on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        !matches!(
            self.terminated.recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        )
    }

    /// Whether the actor has fully stopped.
    pub fn is_stopped(&self) -> bool {
        matches!(self.terminated.try_recv(), Err(TryRecvError::Disconnected))
    }
}

enum Delivery<M: Payload> {
    Queued(Arc<ActorCell<M>>),
    Rejected(Envelope<M>, DeadLetterReason),
}

pub(crate) struct SystemCore<M: Payload> {
    config: ActorSystemConfig,
    registry: RwLock<HashMap<ActorId, Arc<ActorCell<M>>>>,
    dead_letters: DeadLetterOffice<M>,
    logger: OnceLock<ActorRef>,
    supervisor: Arc<dyn Supervisor>,
    pool: WorkerPool,
    shutting_down: AtomicBool,
    ask_counter: AtomicU64,
}

impl<M: Payload> SystemCore<M> {
    pub(crate) fn config(&self) -> &ActorSystemConfig {
        &self.config
    }

    pub(crate) fn supervisor(&self) -> &dyn Supervisor {
        self.supervisor.as_ref()
    }

    pub(crate) fn logger_ref(&self) -> Option<ActorRef> {
        self.logger.get().copied()
    }

    pub(crate) fn dead_letters_ref(&self) -> ActorRef {
        self.dead_letters.actor_ref()
    }

    pub(crate) fn next_ask_id(&self) -> u64 {
        self.ask_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Whether `target` is registered and will process what it is sent.
    pub(crate) fn is_accepting(&self, target: ActorRef) -> bool {
        self.registry
            .read()
            .get(&target.id())
            .is_some_and(|cell| {
                matches!(cell.status(), ActorStatus::Running | ActorStatus::Starting)
            })
    }

    fn status(&self, target: ActorRef) -> Option<ActorStatus> {
        self.registry.read().get(&target.id()).map(|cell| cell.status())
    }

    pub(crate) fn tell(self: &Arc<Self>, target: ActorRef, message: Message<M>, sender: ActorRef) {
        if self.is_shutting_down() {
            warn!(
                "Actor system {} is shut down; dropping {} message to {}",
                self.config.name,
                message.payload().kind(),
                target
            );
            return;
        }
        if target == self.dead_letters.actor_ref() {
            self.dead_letter(message, sender, target, DeadLetterReason::DirectSend);
            return;
        }

        let envelope = Envelope { message, sender };
        let delivery = {
            let registry = self.registry.read();
            match registry.get(&target.id()) {
                None => Delivery::Rejected(envelope, DeadLetterReason::UnknownRecipient),
                Some(cell) if cell.status() == ActorStatus::Failed => {
                    Delivery::Rejected(envelope, DeadLetterReason::ActorFailed)
                }
                Some(cell) => match cell.mailbox().enqueue(envelope) {
                    Ok(()) => Delivery::Queued(Arc::clone(cell)),
                    Err(MailboxError::Full(envelope)) => {
                        Delivery::Rejected(envelope, DeadLetterReason::MailboxFull)
                    }
                    Err(MailboxError::Closed(envelope)) => {
                        Delivery::Rejected(envelope, DeadLetterReason::ActorStopped)
                    }
                },
            }
        };

        match delivery {
            Delivery::Queued(cell) => self.schedule(&cell),
            Delivery::Rejected(envelope, reason) => {
                self.dead_letter(envelope.message, envelope.sender, target, reason)
            }
        }
    }

    pub(crate) fn dead_letter(
        self: &Arc<Self>,
        message: Message<M>,
        sender: ActorRef,
        recipient: ActorRef,
        reason: DeadLetterReason,
    ) {
        let letter = DeadLetter {
            message,
            sender,
            recipient,
            reason,
        };
        match self.dead_letters.post(letter) {
            Ok(()) => self.schedule_dead_letters(),
            Err(letter) => warn!(
                target: "troupe::dead_letters",
                "dead-letter office closed; dropping {} message to {}: {}",
                letter.message.payload().kind(),
                letter.recipient,
                letter.reason
            ),
        }
    }

    /// Hand a slice of `cell` to the pool unless one is already pending.
    pub(crate) fn schedule(self: &Arc<Self>, cell: &Arc<ActorCell<M>>) {
        if !cell.mailbox().try_schedule() {
            return;
        }
        let core = Arc::clone(self);
        let job_cell = Arc::clone(cell);
        if self.pool.execute(move || job_cell.run(&core)).is_err() {
            // Pool is gone; finish the slice here so stops still complete.
            cell.run(self);
        }
    }

    fn schedule_dead_letters(self: &Arc<Self>) {
        if !self.dead_letters.mailbox().try_schedule() {
            return;
        }
        let core = Arc::clone(self);
        let budget = self.config.throughput;
        let submitted = self.pool.execute(move || {
            if core.dead_letters.run(&core, budget) {
                core.schedule_dead_letters();
            }
        });
        if submitted.is_err() {
            self.dead_letters.run_inline(self);
        }
    }

    fn spawn(self: &Arc<Self>, name: String, factory: ActorFactory<M>) -> Result<ActorRef, ActorError> {
        if self.is_shutting_down() {
            return Err(ActorError::SystemShutdown);
        }

        let actor_ref = ActorRef::new(ActorId::next());
        let actor = instantiate(self, actor_ref, &name, &factory).map_err(|reason| {
            warn!("Failed to create actor {}: {}", name, reason);
            ActorError::CreationFailed {
                name: name.clone(),
                reason,
            }
        })?;

        let cell = Arc::new(ActorCell::new(
            actor_ref,
            name,
            self.config.mailbox_capacity,
            factory,
            actor,
        ));
        {
            let mut registry = self.registry.write();
            if self.is_shutting_down() {
                return Err(ActorError::SystemShutdown);
            }
            registry.insert(actor_ref.id(), Arc::clone(&cell));
        }

        debug!("Registered actor: {} ({})", cell.name(), actor_ref);
        Ok(actor_ref)
    }

    pub(crate) fn stop(self: &Arc<Self>, target: ActorRef) -> Result<StopHandle, ActorError> {
        let cell = {
            let mut registry = self.registry.write();
            let cell = registry
                .remove(&target.id())
                .ok_or(ActorError::NotFound(target.id()))?;
            cell.mailbox().close();
            cell.set_status(ActorStatus::Stopping);
            cell
        };

        debug!("Stopping actor: {} ({})", cell.name(), target);
        let handle = StopHandle::new(target, cell.termination());
        self.schedule(&cell);
        Ok(handle)
    }

    fn restart(self: &Arc<Self>, target: ActorRef) -> Result<(), ActorError> {
        let cell = self
            .registry
            .read()
            .get(&target.id())
            .cloned()
            .ok_or(ActorError::NotFound(target.id()))?;

        info!("Restart requested for actor {} ({})", cell.name(), target);
        cell.request_restart();
        self.schedule(&cell);
        Ok(())
    }

    /// Report a runtime event through the logging actor, or straight to the
    /// log facade when the logger cannot take it.
    pub(crate) fn report(self: &Arc<Self>, event: FileEventMessage) {
        let logger = self
            .logger_ref()
            .filter(|logger| !self.is_shutting_down() && self.is_accepting(*logger));
        match logger {
            Some(logger) => self.tell(
                logger,
                Message::new(M::from_file_event(event)),
                ActorRef::nobody(),
            ),
            None => log!(
                level_for(event.event_type),
                "{} ({}): {}",
                event.actor,
                event.source_file,
                event.message
            ),
        }
    }

    fn shutdown(self: &Arc<Self>) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down actor system {}", self.config.name);

        let cells: Vec<_> = self.registry.write().drain().map(|(_, cell)| cell).collect();
        let logger = self.logger_ref();
        let (loggers, actors): (Vec<_>, Vec<_>) = cells
            .into_iter()
            .partition(|cell| Some(cell.actor_ref()) == logger);

        // A worker cannot wait for itself, so only an outside caller waits.
        let can_wait = !WorkerPool::is_worker_thread();
        for group in [actors, loggers] {
            for cell in &group {
                cell.mailbox().close();
                cell.set_status(ActorStatus::Stopping);
                self.schedule(cell);
            }
            if can_wait {
                for cell in &group {
                    let handle = StopHandle::new(cell.actor_ref(), cell.termination());
                    if !handle.wait(SHUTDOWN_GRACE) {
                        warn!(
                            "Actor {} ({}) did not stop within {:?}",
                            cell.name(),
                            cell.actor_ref(),
                            SHUTDOWN_GRACE
                        );
                    }
                }
            }
        }

        if can_wait {
            let mailbox = self.dead_letters.mailbox();
            let deadline = Instant::now() + SHUTDOWN_GRACE;
            while (!mailbox.is_empty() || mailbox.is_scheduled()) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
        }

        self.pool.shutdown();
        self.dead_letters.close();
        if self.dead_letters.mailbox().try_schedule() {
            self.dead_letters.run_inline(self);
        }
        info!("Actor system {} shut down", self.config.name);
    }
}

/// Handle to a running actor system. Cloning is cheap and every clone
/// addresses the same system.
pub struct ActorSystem<M: Payload> {
    core: Arc<SystemCore<M>>,
}

impl<M: Payload> Clone for ActorSystem<M> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<M: Payload> ActorSystem<M> {
    /// Create a system with the default configuration, logging through the
    /// `log` facade.
    pub fn new() -> troupe_core::Result<Self> {
        Self::with_config(ActorSystemConfig::default())
    }

    /// Create a system logging through the `log` facade.
    pub fn with_config(config: ActorSystemConfig) -> troupe_core::Result<Self> {
        Self::with_sink(config, Arc::new(FacadeSink::new()))
    }

    /// Create a system whose logging actor writes to `sink`.
    pub fn with_sink(config: ActorSystemConfig, sink: Arc<dyn LogSink>) -> troupe_core::Result<Self> {
        let supervisor = Arc::new(BasicSupervisor::new(config.supervisor.clone()));
        Self::with_parts(config, sink, supervisor)
    }

    /// Create a system with a custom supervisor.
    pub fn with_parts(
        config: ActorSystemConfig,
        sink: Arc<dyn LogSink>,
        supervisor: Arc<dyn Supervisor>,
    ) -> troupe_core::Result<Self> {
        config.validate()?;

        let pool = WorkerPool::with_config(PoolConfig {
            threads: config.worker_threads,
            thread_name_prefix: format!("{}-worker", config.name),
        })
        .map_err(|e| ActorError::WorkerSpawn(e.to_string()))?;

        info!(
            "Creating actor system {} with {} worker threads",
            config.name, config.worker_threads
        );

        let core = Arc::new(SystemCore {
            dead_letters: DeadLetterOffice::new(config.dead_letter_capacity),
            registry: RwLock::new(HashMap::new()),
            logger: OnceLock::new(),
            supervisor,
            pool,
            shutting_down: AtomicBool::new(false),
            ask_counter: AtomicU64::new(0),
            config,
        });
        let system = Self { core };

        let logger = system.create_actor(LOGGER_NAME, move || Ok(LoggerActor::new(Arc::clone(&sink))))?;
        let _ = system.core.logger.set(logger);
        Ok(system)
    }

    pub(crate) fn from_core(core: Arc<SystemCore<M>>) -> Self {
        Self { core }
    }

    pub(crate) fn next_ask_id(&self) -> u64 {
        self.core.next_ask_id()
    }

    /// The configuration the system was built with.
    pub fn config(&self) -> &ActorSystemConfig {
        self.core.config()
    }

    /// Create an actor from `factory`.
    ///
    /// The factory is kept and called again when the actor is restarted.
    /// It runs, followed by the actor's `pre_setup`, before this returns; if
    /// either fails or panics nothing is registered.
    pub fn create_actor<A, F>(&self, name: impl Into<String>, factory: F) -> Result<ActorRef, ActorError>
    where
        A: Actor<M>,
        F: Fn() -> anyhow::Result<A> + Send + Sync + 'static,
    {
        let factory: ActorFactory<M> =
            Box::new(move || factory().map(|actor| Box::new(actor) as Box<dyn Actor<M>>));
        self.core.spawn(name.into(), factory)
    }

    /// Send a message. Never blocks beyond enqueueing and never fails:
    /// undeliverable messages go to the dead-letter sink.
    pub fn tell(&self, target: ActorRef, message: Message<M>, sender: ActorRef) {
        self.core.tell(target, message, sender);
    }

    /// Send `payload` from outside any actor.
    pub fn tell_payload(&self, target: ActorRef, payload: M) {
        self.tell(target, Message::new(payload), ActorRef::nobody());
    }

    /// Send `payload` and return a handle to wait for the first reply.
    pub fn ask(&self, target: ActorRef, payload: M, timeout: Duration) -> Result<PendingReply<M>, AskError> {
        PendingReply::start(self.clone(), target, Message::new(payload), timeout)
    }

    /// [`ask`](Self::ask) with the configured default timeout.
    pub fn ask_default(&self, target: ActorRef, payload: M) -> Result<PendingReply<M>, AskError> {
        self.ask(target, payload, self.core.config.ask_timeout())
    }

    /// Stop an actor. Queued messages are dead-lettered and `post_stop` runs
    /// on a worker; the handle reports when that has happened.
    pub fn stop(&self, target: ActorRef) -> Result<StopHandle, ActorError> {
        self.core.stop(target)
    }

    /// Replace a (typically failed) actor's instance with a fresh one from
    /// its factory, keeping its address and queued messages.
    pub fn restart(&self, target: ActorRef) -> Result<(), ActorError> {
        self.core.restart(target)
    }

    /// Current lifecycle state, or `None` for an unknown or removed actor.
    pub fn status(&self, target: ActorRef) -> Option<ActorStatus> {
        self.core.status(target)
    }

    /// Address of the logging actor.
    pub fn logger(&self) -> ActorRef {
        self.core.logger_ref().unwrap_or_else(ActorRef::nobody)
    }

    /// Address of the dead-letter sink.
    pub fn dead_letters(&self) -> ActorRef {
        self.core.dead_letters_ref()
    }

    /// Receive every dead letter processed from now on.
    pub fn subscribe_dead_letters(&self) -> Receiver<DeadLetter<M>> {
        self.core.dead_letters.subscribe()
    }

    /// The most recent dead letters, oldest first.
    pub fn retained_dead_letters(&self) -> Vec<DeadLetter<M>> {
        self.core.dead_letters.retained()
    }

    /// Number of dead letters processed so far.
    pub fn dead_letter_count(&self) -> u64 {
        self.core.dead_letters.total()
    }

    /// Number of registered actors, the logging actor included.
    pub fn actor_count(&self) -> usize {
        self.core.registry.read().len()
    }

    /// Worker pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        self.core.pool.stats()
    }

    /// Stop every actor, then the logging actor, then drain the dead-letter
    /// sink and the worker pool. Idempotent.
    pub fn shutdown(&self) {
        self.core.shutdown();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.core.is_shutting_down()
    }
}
