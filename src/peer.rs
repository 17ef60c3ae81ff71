//! Peer wire protocol ([BEP-3]).
//!
//! A connection opens with a 68-byte [`Handshake`] in each direction and
//! continues as a stream of length-prefixed [`Message`]s. Both can be read
//! and written synchronously against any [`std::io::Read`]/[`std::io::Write`],
//! or asynchronously through [`PeerTransport`].
//!
//! Incoming frames are validated from their 5-byte header against
//! [`MessageLimits`] before the payload is read, so a peer cannot make the
//! decoder allocate more than one maximum-size block.
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod error;
mod message;
mod peer_id;
mod transport;

pub use error::PeerError;
pub use message::{Handshake, Message, MessageId, MessageLimits};
pub use peer_id::PeerId;
pub use transport::PeerTransport;

#[cfg(test)]
mod tests;
