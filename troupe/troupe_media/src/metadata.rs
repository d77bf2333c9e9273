//! Metadata model and the collaborators the checker relies on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// Tags extracted from a media file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Performing artist
    pub artist: Option<String>,

    /// Album the track belongs to
    pub album: Option<String>,

    /// Track title
    pub title: Option<String>,

    /// Position on the album
    pub track_number: Option<u32>,
}

/// A field the checker requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    /// Performing artist
    Artist,
    /// Album name
    Album,
    /// Track title
    Title,
    /// Track number
    TrackNumber,
}

impl MetadataField {
    /// Every required field, in reporting order.
    pub const REQUIRED: [MetadataField; 4] = [
        MetadataField::Artist,
        MetadataField::Album,
        MetadataField::Title,
        MetadataField::TrackNumber,
    ];

    /// Field name as used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Title => "title",
            Self::TrackNumber => "track_number",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Metadata {
    fn has(&self, field: MetadataField) -> bool {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }

        match field {
            MetadataField::Artist => present(&self.artist),
            MetadataField::Album => present(&self.album),
            MetadataField::Title => present(&self.title),
            MetadataField::TrackNumber => self.track_number.is_some(),
        }
    }

    /// Required fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<MetadataField> {
        MetadataField::REQUIRED
            .into_iter()
            .filter(|field| !self.has(*field))
            .collect()
    }

    /// Whether every required field is present.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Extracts tags from a file.
pub trait MetadataReader: Send + Sync {
    /// Read the tags of `source`. I/O problems are reported, not panicked.
    fn extract_metadata(&self, source: &Path) -> io::Result<Metadata>;
}

/// What a file name says about its track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MedianameGuess {
    /// Track number, if the name carries one
    pub track_number: Option<u32>,
}

/// Guesses metadata from a file name.
pub trait MedianameEvaluator: Send + Sync {
    /// Evaluate the name of `source`
    fn evaluate(&self, source: &Path) -> MedianameGuess;
}

/// Reads a track number from the digits a file name starts with, as in
/// `07 - Song.mp3` or `07.Song.flac`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadingNumberEvaluator;

impl MedianameEvaluator for LeadingNumberEvaluator {
    fn evaluate(&self, source: &Path) -> MedianameGuess {
        let stem = source
            .file_stem()
            .map(|stem| stem.to_string_lossy())
            .unwrap_or_default();
        let digits: String = stem
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();

        // A name that is nothing but digits is more likely a title than a
        // position.
        let track_number = if digits.len() == stem.trim().len() {
            None
        } else {
            digits.parse().ok().filter(|n| *n > 0)
        };
        MedianameGuess { track_number }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Metadata {
        Metadata {
            artist: Some("Nina Simone".to_string()),
            album: Some("Pastel Blues".to_string()),
            title: Some("Sinnerman".to_string()),
            track_number: Some(9),
        }
    }

    #[test]
    fn test_missing_fields() {
        assert!(full().is_complete());

        let partial = Metadata {
            album: Some("   ".to_string()),
            track_number: None,
            ..full()
        };
        assert_eq!(
            partial.missing_fields(),
            vec![MetadataField::Album, MetadataField::TrackNumber]
        );
        assert_eq!(Metadata::default().missing_fields().len(), 4);
    }

    #[test]
    fn test_leading_number() {
        let evaluator = LeadingNumberEvaluator;
        let guess = |name: &str| evaluator.evaluate(Path::new(name)).track_number;

        assert_eq!(guess("07 - Sinnerman.mp3"), Some(7));
        assert_eq!(guess("/music/pastel/12.Tomorrow.flac"), Some(12));
        assert_eq!(guess("Sinnerman.mp3"), None);
        assert_eq!(guess("1984.mp3"), None);
        assert_eq!(guess("00 - intro.mp3"), None);
    }

    #[test]
    fn test_field_display() {
        assert_eq!(MetadataField::TrackNumber.to_string(), "track_number");
    }
}
