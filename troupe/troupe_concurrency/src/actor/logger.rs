//! The logging actor and the sinks it writes to.
//!
//! Actors report through messages: `ctx.log(...)` wraps a
//! [`FileEventMessage`] in the system's payload type and sends it to the
//! logging actor, which stamps it and hands it to a [`LogSink`]. Payloads
//! that do not carry a file event are marooned like in any other actor.

use log::{debug, log, warn, Level};
use parking_lot::{Condvar, Mutex};
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use troupe_core::{EventType, LogRecord, Message, Payload};

use super::context::{Actor, ActorContext};

/// Name the logging actor is registered under.
pub const LOGGER_NAME: &str = "logger";

/// `log` target used by [`FacadeSink`].
pub const EVENT_TARGET: &str = "troupe::events";

pub(crate) fn level_for(event_type: EventType) -> Level {
    match event_type {
        EventType::Debug => Level::Debug,
        EventType::Info => Level::Info,
        EventType::Warn => Level::Warn,
        EventType::Error => Level::Error,
    }
}

/// Destination for log records.
pub trait LogSink: Send + Sync + 'static {
    /// One-time setup. Called every time the logging actor starts, so
    /// implementations must make repeated calls harmless.
    fn prepare(&self) {}

    /// Write one record.
    fn write(&self, record: &LogRecord);
}

/// Forwards records to the `log` facade under [`EVENT_TARGET`].
pub struct FacadeSink {
    prepared: Once,
}

impl FacadeSink {
    /// Create a new facade sink
    pub fn new() -> Self {
        Self {
            prepared: Once::new(),
        }
    }
}

impl Default for FacadeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for FacadeSink {
    fn prepare(&self) {
        self.prepared
            .call_once(|| debug!(target: EVENT_TARGET, "event log attached to the log facade"));
    }

    fn write(&self, record: &LogRecord) {
        log!(
            target: EVENT_TARGET,
            level_for(record.event.event_type),
            "{} ({}): {} [tracking={}]",
            record.event.actor,
            record.event.source_file,
            record.event.message,
            record.tracking
        );
    }
}

/// Writes one formatted line per record to any writer.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<io::Stderr> {
    /// Sink writing to standard error
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send + 'static> LogSink for WriterSink<W> {
    fn write(&self, record: &LogRecord) {
        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{}", record.format()).and_then(|_| writer.flush()) {
            warn!("Failed to write log record: {}", e);
        }
    }
}

/// Keeps records in memory. Used by tests and by embedders that render the
/// log themselves.
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
    changed: Condvar,
    prepared: Once,
    prepare_runs: AtomicUsize,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            changed: Condvar::new(),
            prepared: Once::new(),
            prepare_runs: AtomicUsize::new(0),
        }
    }

    /// Records written so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records rendered as text lines
    pub fn lines(&self) -> Vec<String> {
        self.records.lock().iter().map(LogRecord::format).collect()
    }

    /// How many times the one-time setup actually ran
    pub fn prepare_runs(&self) -> usize {
        self.prepare_runs.load(Ordering::SeqCst)
    }

    /// Block until `predicate` holds for the records written so far, or the
    /// timeout passes. Returns the final value of the predicate.
    pub fn wait_until<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&[LogRecord]) -> bool,
    {
        let deadline = Instant::now().checked_add(timeout);
        let mut records = self.records.lock();
        while !predicate(&records) {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut records, deadline).timed_out() {
                        return predicate(&records);
                    }
                }
                None => self.changed.wait(&mut records),
            }
        }
        true
    }

    /// Block until at least `count` records were written.
    pub fn wait_for_records(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |records| records.len() >= count)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemorySink {
    fn prepare(&self) {
        self.prepared.call_once(|| {
            self.prepare_runs.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn write(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
        self.changed.notify_all();
    }
}

/// The system's logging actor.
pub struct LoggerActor {
    sink: Arc<dyn LogSink>,
    written: u64,
}

impl LoggerActor {
    /// Create a logger writing to `sink`
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink, written: 0 }
    }
}

impl<M: Payload> Actor<M> for LoggerActor {
    fn pre_setup(&mut self, _ctx: &ActorContext<'_, M>) -> anyhow::Result<()> {
        self.sink.prepare();
        Ok(())
    }

    fn receive(&mut self, ctx: &ActorContext<'_, M>, message: Message<M>) -> anyhow::Result<()> {
        let record = message
            .payload()
            .as_file_event()
            .map(|event| LogRecord::new(event.clone(), message.tracking()));

        match record {
            Some(record) => {
                self.sink.write(&record);
                self.written += 1;
            }
            None => ctx.notify_marooned_message(message),
        }
        Ok(())
    }

    fn post_stop(&mut self, ctx: &ActorContext<'_, M>) {
        debug!("Logger {} stopped after {} records", ctx.self_ref(), self.written);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use troupe_core::{FileEventMessage, Tracking};

    fn record(event_type: EventType, text: &str) -> LogRecord {
        LogRecord::new(
            FileEventMessage::new(event_type, "checker", "a.mp3", text),
            Tracking::new(),
        )
    }

    #[test]
    fn test_memory_sink_prepare_once() {
        let sink = MemorySink::new();
        sink.prepare();
        sink.prepare();
        assert_eq!(sink.prepare_runs(), 1);
    }

    #[test]
    fn test_memory_sink_wait() {
        let sink = Arc::new(MemorySink::new());
        assert!(!sink.wait_for_records(1, Duration::from_millis(20)));

        let writer = Arc::clone(&sink);
        let handle = std::thread::spawn(move || writer.write(&record(EventType::Info, "done")));
        assert!(sink.wait_for_records(1, Duration::from_secs(5)));
        handle.join().unwrap();

        let lines = sink.lines();
        assert!(lines[0].contains("[INFO] checker (a.mp3): done"));
    }

    #[test]
    fn test_writer_sink_lines() {
        let sink = WriterSink::new(Vec::new());
        sink.write(&record(EventType::Warn, "incomplete"));
        sink.write(&record(EventType::Error, "unreadable"));

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[WARN] checker (a.mp3): incomplete"));
        assert!(lines[1].contains("[ERROR]"));
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(level_for(EventType::Warn), Level::Warn);
        assert_eq!(level_for(EventType::Debug), Level::Debug);
    }
}
