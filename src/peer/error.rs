use thiserror::Error;

/// Errors raised while reading or writing the peer wire protocol.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The handshake named a protocol other than `BitTorrent protocol`.
    #[error("incompatible protocol")]
    IncompatibleProtocol,

    /// A fixed-length message declared the wrong length.
    #[error("incorrect length for {message}: {length}, expected {expected}")]
    IncorrectLength {
        message: &'static str,
        length: u32,
        expected: u32,
    },

    /// A piece message too short to hold its index and offset.
    #[error("piece message too short: {length}")]
    PieceTooShort { length: u32 },

    /// A piece message larger than the configured maximum.
    #[error("piece message too long: {length}, maximum {max}")]
    PieceTooLong { length: u32, max: u32 },

    #[error("unrecognized message id {id} (length {length})")]
    UnrecognizedMessage { id: u8, length: u32 },

    /// The stream ended in the middle of a handshake or frame.
    #[error("unexpected end of stream")]
    EndOfStream,

    #[error("timeout")]
    Timeout,
}
