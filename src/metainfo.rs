//! Torrent metainfo handling ([BEP-3]).
//!
//! # Overview
//!
//! A torrent file (`.torrent`) contains metadata about the files to be shared:
//! - File names, sizes, and directory structure
//! - Piece hashes for data integrity verification
//! - Tracker URLs for peer discovery
//!
//! The [`Metainfo`] struct represents a parsed torrent file and [`Info`] its
//! `info` dictionary. [`TorrentBuilder`] goes the other way, hashing content
//! already on disk into a new torrent.
//!
//! # Examples
//!
//! ```no_run
//! use bitpiece::metainfo::Metainfo;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("example.torrent")?;
//! let torrent = Metainfo::from_bytes(&data)?;
//!
//! println!("Name: {}", torrent.info.name());
//! println!("Info hash: {}", torrent.info_hash);
//! println!("Number of pieces: {}", torrent.info.piece_count());
//!
//! for file in torrent.info.files() {
//!     println!("  {} ({} bytes)", file.path.display(), file.length);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Torrent Structure
//!
//! - **info** - Core torrent metadata (hashed to create the info hash)
//!   - `name` - Suggested file/directory name
//!   - `piece length` - Size of each piece in bytes
//!   - `pieces` - Concatenated SHA1 hashes of each piece
//!   - `length` - Total size (single-file) OR `files` list (multi-file)
//!   - `private` - Optional, restricts peer sources to the listed trackers
//! - **announce** - Primary tracker URL
//! - **announce-list** - Additional tracker tiers
//! - **creation date**, **comment**, **created by**, **encoding** - Optional
//!
//! The info hash is the SHA-1 of the `info` dictionary bytes exactly as they
//! appear in the file, never of a re-encoded copy.
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod builder;
mod error;
mod info_hash;
mod torrent;

pub use builder::TorrentBuilder;
pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub use torrent::{File, FileInfo, Info, Layout, Metainfo};

pub(crate) use torrent::{
    optional_integer, optional_string, required_bytes, required_integer, required_str, Dict,
};

#[cfg(test)]
mod tests;
