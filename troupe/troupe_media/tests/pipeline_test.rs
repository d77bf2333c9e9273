//! Integration tests for the metadata-checking pipeline.
//!
//! A collector actor stands in for the caller and forwards every reply it
//! receives to the test thread.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use troupe_concurrency::actor::{Actor, ActorContext, DeadLetterReason, MemorySink};
use troupe_concurrency::{ActorRef, ActorSystem};
use troupe_core::{ActorSystemConfig, EventType, Message};
use troupe_media::{
    MediaMessage, Metadata, MetadataCheckerActor, MetadataField, MetadataReader, CHECKER_NAME,
};

const WAIT: Duration = Duration::from_secs(5);

/// Reader backed by a fixed table; unknown paths fail like a missing file.
struct TableReader {
    files: HashMap<PathBuf, Metadata>,
}

impl TableReader {
    fn new(files: impl IntoIterator<Item = (&'static str, Metadata)>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|(path, metadata)| (PathBuf::from(path), metadata))
                .collect(),
        }
    }
}

impl MetadataReader for TableReader {
    fn extract_metadata(&self, source: &Path) -> io::Result<Metadata> {
        self.files.get(source).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", source.display()),
            )
        })
    }
}

struct Collector {
    replies: Sender<Message<MediaMessage>>,
}

impl Actor<MediaMessage> for Collector {
    fn receive(
        &mut self,
        _ctx: &ActorContext<'_, MediaMessage>,
        message: Message<MediaMessage>,
    ) -> anyhow::Result<()> {
        let _ = self.replies.send(message);
        Ok(())
    }
}

fn tagged(track_number: Option<u32>) -> Metadata {
    Metadata {
        artist: Some("Nina Simone".to_string()),
        album: Some("Pastel Blues".to_string()),
        title: Some("Sinnerman".to_string()),
        track_number,
    }
}

struct Pipeline {
    system: ActorSystem<MediaMessage>,
    sink: Arc<MemorySink>,
    checker: ActorRef,
    collector: ActorRef,
    replies: Receiver<Message<MediaMessage>>,
}

impl Pipeline {
    fn start() -> Self {
        let reader = Arc::new(TableReader::new([
            ("a.mp3", tagged(Some(1))),
            ("07 - Sinnerman.mp3", tagged(None)),
            ("untitled.mp3", Metadata {
                album: None,
                ..tagged(None)
            }),
        ]));

        let sink = Arc::new(MemorySink::new());
        let config = ActorSystemConfig {
            worker_threads: 2,
            ..Default::default()
        };
        let system = ActorSystem::with_sink(config, sink.clone()).unwrap();

        let checker = system
            .create_actor(CHECKER_NAME, move || {
                Ok(MetadataCheckerActor::with_reader(reader.clone()))
            })
            .unwrap();

        let (tx, replies) = unbounded();
        let collector = system
            .create_actor("collector", move || Ok(Collector { replies: tx.clone() }))
            .unwrap();

        Self {
            system,
            sink,
            checker,
            collector,
            replies,
        }
    }

    fn check(&self, source: &str) -> Message<MediaMessage> {
        self.system.tell(
            self.checker,
            Message::new(MediaMessage::check(source)),
            self.collector,
        );
        let reply = self.replies.recv_timeout(WAIT).unwrap();
        // Exactly one reply per request.
        assert!(self.replies.recv_timeout(Duration::from_millis(100)).is_err());
        reply
    }

    fn logged(&self, event_type: EventType, source: &str) -> bool {
        self.sink.wait_until(WAIT, |records| {
            records
                .iter()
                .any(|r| r.event.event_type == event_type && r.event.source_file == source)
        })
    }
}

#[test]
fn test_complete_file_gets_one_reply_and_info_line() {
    let pipeline = Pipeline::start();

    let reply = pipeline.check("a.mp3");
    match reply.payload() {
        MediaMessage::FileMetadataIsComplete { source, metadata } => {
            assert_eq!(source, Path::new("a.mp3"));
            assert_eq!(metadata, &tagged(Some(1)));
        }
        other => panic!("unexpected reply {:?}", other),
    }

    assert!(pipeline.logged(EventType::Info, "a.mp3"));
    assert!(pipeline
        .sink
        .lines()
        .iter()
        .any(|line| line.contains("[INFO] metadata-checker (a.mp3)")));
    pipeline.system.shutdown();
}

#[test]
fn test_track_number_falls_back_to_file_name() {
    let pipeline = Pipeline::start();

    let reply = pipeline.check("07 - Sinnerman.mp3");
    match reply.payload() {
        MediaMessage::FileMetadataIsComplete { metadata, .. } => {
            assert_eq!(metadata.track_number, Some(7));
        }
        other => panic!("unexpected reply {:?}", other),
    }
    pipeline.system.shutdown();
}

#[test]
fn test_incomplete_file_lists_missing_fields() {
    let pipeline = Pipeline::start();

    let reply = pipeline.check("untitled.mp3");
    match reply.payload() {
        MediaMessage::FileMetadataIsIncomplete { missing, .. } => {
            assert_eq!(
                missing,
                &vec![MetadataField::Album, MetadataField::TrackNumber]
            );
        }
        other => panic!("unexpected reply {:?}", other),
    }
    assert!(pipeline.logged(EventType::Warn, "untitled.mp3"));
    pipeline.system.shutdown();
}

#[test]
fn test_unreadable_file_still_gets_one_reply() {
    let pipeline = Pipeline::start();

    let reply = pipeline.check("missing.mp3");
    match reply.payload() {
        MediaMessage::FileMetadataCouldNotBeChecked { source, reason } => {
            assert_eq!(source, Path::new("missing.mp3"));
            assert!(reason.contains("does not exist"));
        }
        other => panic!("unexpected reply {:?}", other),
    }
    assert!(pipeline.logged(EventType::Error, "missing.mp3"));

    // The checker keeps working after a read failure.
    let reply = pipeline.check("a.mp3");
    assert!(matches!(
        reply.payload(),
        MediaMessage::FileMetadataIsComplete { .. }
    ));
    pipeline.system.shutdown();
}

#[test]
fn test_ask_checker_keeps_tracking() {
    let pipeline = Pipeline::start();

    let pending = pipeline
        .system
        .ask(pipeline.checker, MediaMessage::check("a.mp3"), WAIT)
        .unwrap();
    let tracking = pending.tracking();
    let reply = pending.wait().unwrap();

    assert!(reply.payload().is_check_reply());
    assert_eq!(reply.tracking(), tracking);
    assert!(pipeline.sink.wait_until(WAIT, |records| records
        .iter()
        .any(|r| r.tracking == tracking && r.event.source_file == "a.mp3")));
    pipeline.system.shutdown();
}

#[test]
fn test_checker_maroons_unrelated_payloads() {
    let pipeline = Pipeline::start();
    let letters = pipeline.system.subscribe_dead_letters();

    let stray = MediaMessage::FileMetadataCouldNotBeChecked {
        source: PathBuf::from("a.mp3"),
        reason: "not a request".to_string(),
    };
    pipeline
        .system
        .tell(pipeline.checker, Message::new(stray.clone()), pipeline.collector);

    let letter = letters.recv_timeout(WAIT).unwrap();
    assert_eq!(letter.recipient, pipeline.checker);
    assert_eq!(letter.sender, pipeline.collector);
    assert_eq!(letter.reason, DeadLetterReason::Unhandled);
    assert_eq!(letter.message.payload(), &stray);

    // One dead letter, and no reply to the sender.
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(
        letters
            .try_iter()
            .filter(|extra| extra.recipient == pipeline.checker)
            .count(),
        0
    );
    assert!(pipeline.replies.try_recv().is_err());
    pipeline.system.shutdown();
}
