//! The payload set exchanged by the media actors.

use std::path::{Path, PathBuf};
use troupe_core::{FileEventMessage, Payload};

use crate::metadata::{Metadata, MetadataField};

/// Everything the media pipeline can say.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaMessage {
    /// Request: check the tags of `source`
    CheckFileMetadata {
        /// File to check
        source: PathBuf,
    },

    /// Reply: every required field is present
    FileMetadataIsComplete {
        /// File that was checked
        source: PathBuf,
        /// Tags found, with fallbacks applied
        metadata: Metadata,
    },

    /// Reply: some required fields are missing
    FileMetadataIsIncomplete {
        /// File that was checked
        source: PathBuf,
        /// Tags found, with fallbacks applied
        metadata: Metadata,
        /// Fields still missing
        missing: Vec<MetadataField>,
    },

    /// Reply: the file could not be read
    FileMetadataCouldNotBeChecked {
        /// File that was checked
        source: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Log event for the logging actor
    FileEvent(FileEventMessage),
}

impl MediaMessage {
    /// Build a check request.
    pub fn check(source: impl Into<PathBuf>) -> Self {
        Self::CheckFileMetadata {
            source: source.into(),
        }
    }

    /// The file a request or reply is about.
    pub fn source(&self) -> Option<&Path> {
        match self {
            Self::CheckFileMetadata { source }
            | Self::FileMetadataIsComplete { source, .. }
            | Self::FileMetadataIsIncomplete { source, .. }
            | Self::FileMetadataCouldNotBeChecked { source, .. } => Some(source),
            Self::FileEvent(_) => None,
        }
    }

    /// Whether this is one of the three terminal replies to a check.
    pub fn is_check_reply(&self) -> bool {
        matches!(
            self,
            Self::FileMetadataIsComplete { .. }
                | Self::FileMetadataIsIncomplete { .. }
                | Self::FileMetadataCouldNotBeChecked { .. }
        )
    }
}

impl Payload for MediaMessage {
    fn from_file_event(event: FileEventMessage) -> Self {
        Self::FileEvent(event)
    }

    fn as_file_event(&self) -> Option<&FileEventMessage> {
        match self {
            Self::FileEvent(event) => Some(event),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::CheckFileMetadata { .. } => "CheckFileMetadata",
            Self::FileMetadataIsComplete { .. } => "FileMetadataIsComplete",
            Self::FileMetadataIsIncomplete { .. } => "FileMetadataIsIncomplete",
            Self::FileMetadataCouldNotBeChecked { .. } => "FileMetadataCouldNotBeChecked",
            Self::FileEvent(_) => "FileEvent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_and_reply_kind() {
        let request = MediaMessage::check("a.mp3");
        assert_eq!(request.source(), Some(Path::new("a.mp3")));
        assert!(!request.is_check_reply());

        let reply = MediaMessage::FileMetadataCouldNotBeChecked {
            source: PathBuf::from("a.mp3"),
            reason: "gone".to_string(),
        };
        assert!(reply.is_check_reply());
        assert_eq!(reply.kind(), "FileMetadataCouldNotBeChecked");
    }

    #[test]
    fn test_file_event_roundtrip() {
        let event = FileEventMessage::info("checker", "a.mp3", "ok");
        let payload = MediaMessage::from_file_event(event.clone());
        assert_eq!(payload.as_file_event(), Some(&event));
        assert_eq!(payload.source(), None);
    }
}
