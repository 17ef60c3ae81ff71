use thiserror::Error;

use crate::bencode::BencodeError;

/// Errors that can occur when mapping bencoded data onto typed structures.
///
/// Used for torrent files, and reused by tracker responses and persisted
/// session state, which share the same "well-formed but wrong shape" failure.
#[derive(Debug, Error)]
pub enum MetainfoError {
    /// The data is not valid bencode.
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    /// A required field is missing.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field has an invalid value or type.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// The info hash is not 20 bytes (or 40 hex digits).
    #[error("invalid info hash")]
    InvalidInfoHash,

    /// An I/O error occurred while reading torrent content.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
