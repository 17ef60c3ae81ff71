//! bitpiece - BitTorrent building blocks
//!
//! The pieces a client needs below its scheduling logic: the bencode codec,
//! torrent metainfo, the peer wire protocol, tracker responses, and
//! hash-verified piece storage with persisted sessions.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 Bencode encoding/decoding
//! - [`metainfo`] - BEP-3 Torrent metainfo parsing and creation
//! - [`peer`] - BEP-3 Peer wire protocol
//! - [`tracker`] - BEP-3/23 Tracker announce responses
//! - [`storage`] - Piece storage, verification and session persistence
//! - [`bitfield`] - Piece availability bitmaps
//! - [`observable`] - Change-notifying values and a coalescing poller
//! - [`config`] - Tunable timeouts, limits and directories

pub mod bencode;
pub mod bitfield;
pub mod config;
pub mod constants;
pub mod metainfo;
pub mod observable;
pub mod peer;
pub mod storage;
pub mod tracker;

pub use bencode::{decode, encode, BencodeError, Value};
pub use bitfield::Bitfield;
pub use config::Config;
pub use metainfo::{File, Info, InfoHash, Metainfo, MetainfoError, TorrentBuilder};
pub use observable::{ChangeSource, Observable, Poller};
pub use peer::{Handshake, Message, PeerError, PeerId, PeerTransport};
pub use storage::{SessionState, StorageError, TorrentState, TorrentStorage};
pub use tracker::{AnnounceResponse, Peer, TrackerError, TrackerResponse};
