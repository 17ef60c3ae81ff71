//! Tracker announce responses ([BEP-3], [BEP-23]).
//!
//! Only the response side is handled here: a bencoded dictionary carrying
//! either a `failure reason` or the announce interval and a peer list, the
//! latter as dictionaries or in compact form. Building the announce request
//! is left to the HTTP layer.
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html
//! [BEP-23]: http://bittorrent.org/beps/bep_0023.html

mod error;
mod response;

pub use error::TrackerError;
pub use response::{AnnounceResponse, Peer, TrackerResponse};
