use std::fmt;

use sha1::{Digest, Sha1};

use super::error::MetainfoError;

/// SHA-1 digest of a torrent's original `info` dictionary bytes.
///
/// This is the protocol-visible identity of a torrent: it appears in the
/// peer handshake, and it names the persisted session file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Hashes raw bencoded `info` bytes.
    pub fn from_info_bytes(raw_info: &[u8]) -> Self {
        Self(Sha1::digest(raw_info).into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MetainfoError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| MetainfoError::InvalidInfoHash)?;
        Ok(Self(arr))
    }

    /// Parses 40 hex digits, in either case.
    pub fn from_hex(s: &str) -> Result<Self, MetainfoError> {
        let bytes = hex_decode(s).ok_or(MetainfoError::InvalidInfoHash)?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0, false)
    }

    /// Upper-case hex, the form used for session file names.
    pub fn to_hex_upper(&self) -> String {
        hex_encode(&self.0, true)
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 20]> for InfoHash {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

fn hex_encode(bytes: &[u8], upper: bool) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        use std::fmt::Write;
        let _ = if upper {
            write!(s, "{:02X}", b)
        } else {
            write!(s, "{:02x}", b)
        };
        s
    })
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
