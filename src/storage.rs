//! Hash-verified piece storage.
//!
//! # Overview
//!
//! Torrents split their content into fixed-size pieces laid end to end over
//! one virtual byte space, and pieces may span multiple files. This module
//! maps pieces onto files, verifies every piece before it is committed, and
//! keeps per-file and aggregate progress.
//!
//! # Components
//!
//! - [`FileIndex`] - Ordered mapping from virtual offsets to files on disk
//! - [`TorrentStorage`] - Per-torrent piece reads, verified writes and recheck
//! - [`TorrentState`] - Lifecycle of a torrent's storage
//! - [`SessionState`] - Persisted state used to restore storage after a restart
//!
//! # Examples
//!
//! ```no_run
//! use bitpiece::metainfo::Metainfo;
//! use bitpiece::storage::TorrentStorage;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metainfo = Metainfo::from_bytes(&std::fs::read("example.torrent")?)?;
//!
//! // Verify whatever is already on disk.
//! let storage = TorrentStorage::open("./downloads", &metainfo.info, &[])?;
//! println!("{:.1}% complete", storage.progress() * 100.0);
//!
//! storage.start()?;
//! let data = vec![0u8; metainfo.info.piece_length as usize];
//! match storage.write(0, &data) {
//!     Ok(()) => println!("piece 0 stored"),
//!     Err(e) => println!("rejected: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! File paths are validated to prevent directory traversal. Paths containing
//! `..`, a root or a drive prefix are rejected when the storage is created.

mod error;
mod file;
mod manager;
mod session;

pub use error::StorageError;
pub use file::{FileIndex, FileSpan, PhysicalFile};
pub use manager::{FileStatus, TorrentState, TorrentStorage};
pub use session::SessionState;
