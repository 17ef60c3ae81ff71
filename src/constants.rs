//! Protocol constants.
//!
//! Literal values fixed by the wire and file formats. Tunable values (timeouts,
//! payload bounds, directories) live in [`crate::config`] instead.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Client ID prefix for peer ID generation (Azureus-style)
pub const CLIENT_PREFIX: &str = "-BP0001-";

// ============================================================================
// Handshake
// ============================================================================

/// BitTorrent protocol string
pub const PROTOCOL_STRING: &str = "BitTorrent protocol";

/// Reserved bytes in handshake. No extension bits are advertised.
pub const RESERVED_BYTES: [u8; 8] = [0; 8];

/// Length byte + protocol string + reserved bytes
pub const HANDSHAKE_PREFIX_LEN: usize = 1 + PROTOCOL_STRING.len() + RESERVED_BYTES.len();

/// Full handshake: prefix + info hash + peer id
pub const HANDSHAKE_LEN: usize = HANDSHAKE_PREFIX_LEN + 20 + 20;

// ============================================================================
// Sizes
// ============================================================================

/// SHA-1 digest length, used for piece hashes, info hashes and peer ids
pub const HASH_LEN: usize = 20;

/// Compact peer record: 4-byte IPv4 address + 2-byte port
pub const COMPACT_PEER_LEN: usize = 6;

/// Maximum Piece payload accepted by default (128KB)
pub const MAX_DATA_LENGTH: u32 = 131072;

/// Default piece length for newly created torrents (256KB)
pub const DEFAULT_PIECE_LENGTH: u64 = 262144;

// ============================================================================
// Defaults for configuration
// ============================================================================

/// Peer read timeout
pub const PEER_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Peer write timeout
pub const PEER_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval at which coalesced progress changes are published
pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Directory holding persisted session files
pub const SESSION_DIR: &str = "data";
