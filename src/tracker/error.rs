use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    /// The response decoded but a field is missing or has the wrong type.
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] crate::metainfo::MetainfoError),
}
