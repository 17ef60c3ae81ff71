use std::fmt;

use rand::Rng as _;

use crate::constants::{CLIENT_PREFIX, HASH_LEN};

/// A 20-byte peer identifier.
///
/// Generated ids follow the Azureus style: the client prefix
/// (`-BP0001-`) followed by twelve random bytes.
///
/// # Examples
///
/// ```
/// use bitpiece::peer::PeerId;
///
/// let peer_id = PeerId::generate();
/// assert_eq!(peer_id.as_bytes().len(), 20);
/// assert_eq!(peer_id.client(), Some("BP0001"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId([u8; HASH_LEN]);

impl PeerId {
    pub fn new(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Generates a random peer id carrying this client's prefix.
    pub fn generate() -> Self {
        let mut id = [0u8; HASH_LEN];
        let prefix = CLIENT_PREFIX.as_bytes();
        id[..prefix.len()].copy_from_slice(prefix);
        rand::rng().fill(&mut id[prefix.len()..]);
        Self(id)
    }

    /// Returns `None` unless `bytes` is exactly 20 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// The client code and version of an Azureus-style id, e.g. `BP0001`.
    pub fn client(&self) -> Option<&str> {
        if self.0[0] == b'-' && self.0[7] == b'-' {
            std::str::from_utf8(&self.0[1..7]).ok()
        } else {
            None
        }
    }
}

impl From<[u8; HASH_LEN]> for PeerId {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self)
    }
}

/// Printable bytes as-is, everything else as `%xx`.
impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "%{:02x}", byte)?;
            }
        }
        Ok(())
    }
}
