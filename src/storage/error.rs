use thiserror::Error;

use crate::bencode::BencodeError;
use crate::metainfo::MetainfoError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("piece hash mismatch for piece {0}")]
    HashMismatch(u32),

    #[error("invalid piece index: {0}")]
    InvalidPieceIndex(u32),

    #[error("invalid block offset: piece {piece}, offset {offset}")]
    InvalidBlockOffset { piece: u32, offset: u32 },

    #[error("invalid file index: {0}")]
    InvalidFileIndex(usize),

    #[error("bitfield has {actual} pieces, torrent has {expected}")]
    BitfieldLength { expected: usize, actual: usize },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("path traversal detected in file path: {0}")]
    PathTraversal(String),

    #[error("file lengths overflow the 64-bit address space")]
    LengthOverflow,

    /// A read ran past the data actually present on disk.
    #[error("unexpected end of stream")]
    EndOfStream,

    /// The operation is not allowed in the storage's current state.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("metainfo error: {0}")]
    Metainfo(#[from] MetainfoError),
}
