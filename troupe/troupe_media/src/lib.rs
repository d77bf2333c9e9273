#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Troupe Media
//!
//! Actors that check music files for complete metadata.
//!
//! The checker never touches tags itself. It relies on two collaborators:
//! a [`MetadataReader`] that extracts tags from a file, and a
//! [`MedianameEvaluator`] that guesses missing values from the file name.
//! Every check request gets exactly one reply, including when the file
//! cannot be read, so callers can safely `ask` it.

pub mod checker;
pub mod messages;
pub mod metadata;

pub use checker::{MetadataCheckerActor, CHECKER_NAME};
pub use messages::MediaMessage;
pub use metadata::{
    LeadingNumberEvaluator, MedianameEvaluator, MedianameGuess, Metadata, MetadataField,
    MetadataReader,
};
