use thiserror::Error;

/// Errors produced while decoding bencode.
///
/// Every syntax error carries the absolute byte offset (from the start of the
/// decoded input) where decoding stopped.
#[derive(Debug, Error)]
pub enum BencodeError {
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: u64 },

    #[error("unexpected byte {:?} at offset {offset}", char::from(*.byte))]
    UnexpectedByte { byte: u8, offset: u64 },

    #[error("trailing data after value at offset {offset}")]
    TrailingData { offset: u64 },

    #[error("nesting too deep at offset {offset}")]
    NestingTooDeep { offset: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BencodeError {
    /// Returns the byte offset of a syntax error, if this is one.
    pub fn offset(&self) -> Option<u64> {
        match self {
            BencodeError::UnexpectedEof { offset }
            | BencodeError::UnexpectedByte { offset, .. }
            | BencodeError::TrailingData { offset }
            | BencodeError::NestingTooDeep { offset } => Some(*offset),
            BencodeError::Io(_) => None,
        }
    }
}
