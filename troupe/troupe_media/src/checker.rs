//! The metadata-checking actor.

use log::debug;
use std::path::Path;
use std::sync::Arc;
use troupe_concurrency::actor::{Actor, ActorContext};
use troupe_core::{EventType, Message};

use crate::messages::MediaMessage;
use crate::metadata::{LeadingNumberEvaluator, MedianameEvaluator, MetadataReader};

/// Conventional name for the checker actor.
pub const CHECKER_NAME: &str = "metadata-checker";

/// Answers every `CheckFileMetadata` with exactly one of
/// `FileMetadataIsComplete`, `FileMetadataIsIncomplete` or
/// `FileMetadataCouldNotBeChecked`, sent to the request's sender.
///
/// Reader errors become a `FileMetadataCouldNotBeChecked` reply; they never
/// fail the actor.
pub struct MetadataCheckerActor {
    reader: Arc<dyn MetadataReader>,
    evaluator: Arc<dyn MedianameEvaluator>,
    checked: u64,
}

impl MetadataCheckerActor {
    /// Create a checker with an explicit file-name evaluator
    pub fn new(reader: Arc<dyn MetadataReader>, evaluator: Arc<dyn MedianameEvaluator>) -> Self {
        Self {
            reader,
            evaluator,
            checked: 0,
        }
    }

    /// Create a checker using [`LeadingNumberEvaluator`] for fallbacks
    pub fn with_reader(reader: Arc<dyn MetadataReader>) -> Self {
        Self::new(reader, Arc::new(LeadingNumberEvaluator))
    }

    fn check(&self, ctx: &ActorContext<'_, MediaMessage>, source: &Path) -> MediaMessage {
        let file = source.display().to_string();

        let mut metadata = match self.reader.extract_metadata(source) {
            Ok(metadata) => metadata,
            Err(e) => {
                ctx.log(
                    EventType::Error,
                    &file,
                    format!("metadata could not be read: {}", e),
                );
                return MediaMessage::FileMetadataCouldNotBeChecked {
                    source: source.to_path_buf(),
                    reason: e.to_string(),
                };
            }
        };

        if metadata.track_number.is_none() {
            if let Some(track_number) = self.evaluator.evaluate(source).track_number {
                debug!("Track number {} for {} taken from its name", track_number, file);
                metadata.track_number = Some(track_number);
            }
        }

        let missing = metadata.missing_fields();
        if missing.is_empty() {
            ctx.log(EventType::Info, &file, "metadata is complete");
            MediaMessage::FileMetadataIsComplete {
                source: source.to_path_buf(),
                metadata,
            }
        } else {
            let names: Vec<_> = missing.iter().map(|field| field.as_str()).collect();
            ctx.log(
                EventType::Warn,
                &file,
                format!("metadata is incomplete, missing {}", names.join(", ")),
            );
            MediaMessage::FileMetadataIsIncomplete {
                source: source.to_path_buf(),
                metadata,
                missing,
            }
        }
    }
}

impl Actor<MediaMessage> for MetadataCheckerActor {
    fn receive(
        &mut self,
        ctx: &ActorContext<'_, MediaMessage>,
        message: Message<MediaMessage>,
    ) -> anyhow::Result<()> {
        let request = match message.payload() {
            MediaMessage::CheckFileMetadata { source } => Some(source.clone()),
            MediaMessage::FileMetadataIsComplete { .. }
            | MediaMessage::FileMetadataIsIncomplete { .. }
            | MediaMessage::FileMetadataCouldNotBeChecked { .. }
            | MediaMessage::FileEvent(_) => None,
        };
        let Some(source) = request else {
            self.notify_marooned_message(ctx, message);
            return Ok(());
        };

        let reply = self.check(ctx, &source);
        self.checked += 1;
        ctx.reply(reply);
        Ok(())
    }

    fn post_stop(&mut self, ctx: &ActorContext<'_, MediaMessage>) {
        debug!("{} checked {} files", ctx.name(), self.checked);
    }
}
