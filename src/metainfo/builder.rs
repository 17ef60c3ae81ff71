//! Torrent creation from content already on disk.
//!
//! The builder lays the files out in a [`FileIndex`], streams through it one
//! piece at a time and records the SHA-1 of each piece. Because the content
//! is complete by construction, a storage engine serving it can be created
//! with a full bitfield instead of rechecking.
//!
//! # Examples
//!
//! ```no_run
//! use bitpiece::metainfo::TorrentBuilder;
//! use bitpiece::observable::Observable;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let progress = Arc::new(Observable::new(0.0));
//! progress.subscribe(|_, done| println!("hashed {:.0}%", done * 100.0));
//!
//! let metainfo = TorrentBuilder::single_file("path/to/file.iso")?
//!     .piece_length(262144)
//!     .announce("http://tracker.example.com/announce")
//!     .progress(progress)
//!     .build()?;
//!
//! std::fs::write("file.iso.torrent", metainfo.to_bytes())?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sha1::{Digest, Sha1};

use super::error::MetainfoError;
use super::torrent::{FileInfo, Info, Layout, Metainfo};
use crate::constants::DEFAULT_PIECE_LENGTH;
use crate::observable::Observable;
use crate::storage::{FileIndex, StorageError};

/// Builder for creating torrents from existing files.
#[derive(Debug)]
pub struct TorrentBuilder {
    /// Directory holding the content (the storage root when seeding).
    root: PathBuf,
    /// File name (single-file) or directory name (multi-file).
    name: String,
    /// Files relative to `root/name`; `None` for a single-file torrent.
    files: Option<Vec<PathBuf>>,
    piece_length: u64,
    announce: Option<String>,
    announce_list: Vec<Vec<String>>,
    private: Option<bool>,
    comment: Option<String>,
    created_by: Option<String>,
    creation_date: Option<i64>,
    progress: Option<Arc<Observable<f64>>>,
}

impl TorrentBuilder {
    fn with_layout(root: PathBuf, name: String, files: Option<Vec<PathBuf>>) -> Self {
        Self {
            root,
            name,
            files,
            piece_length: DEFAULT_PIECE_LENGTH,
            announce: None,
            announce_list: Vec::new(),
            private: None,
            comment: None,
            created_by: Some(format!("bitpiece/{}", env!("CARGO_PKG_VERSION"))),
            creation_date: None,
            progress: None,
        }
    }

    /// Describes a torrent for one existing file.
    pub fn single_file(path: impl AsRef<Path>) -> Result<Self, MetainfoError> {
        let path = path.as_ref();
        let (root, name) = split_name(path)?;
        Ok(Self::with_layout(root, name, None))
    }

    /// Describes a torrent for `dir` containing `files`, in that order.
    ///
    /// File paths are relative to `dir`, whose own name becomes the torrent name.
    pub fn directory<I, P>(dir: impl AsRef<Path>, files: I) -> Result<Self, MetainfoError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let (root, name) = split_name(dir.as_ref())?;
        let files: Vec<PathBuf> = files.into_iter().map(Into::into).collect();
        if files.is_empty() {
            return Err(MetainfoError::MissingField("files"));
        }
        Ok(Self::with_layout(root, name, Some(files)))
    }

    /// Describes a torrent for every regular file below `dir`, sorted by path.
    pub fn scan_directory(dir: impl AsRef<Path>) -> Result<Self, MetainfoError> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        collect_files(dir, PathBuf::new(), &mut files)?;
        files.sort();
        Self::directory(dir, files)
    }

    /// Sets the piece length in bytes.
    pub fn piece_length(mut self, length: u64) -> Self {
        self.piece_length = length;
        self
    }

    /// Sets the primary tracker URL.
    pub fn announce(mut self, url: impl Into<String>) -> Self {
        self.announce = Some(url.into());
        self
    }

    /// Adds a tracker tier (for multi-tracker torrents).
    pub fn add_tracker_tier(mut self, urls: Vec<String>) -> Self {
        self.announce_list.push(urls);
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = Some(private);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    /// Sets the creation date (Unix timestamp). Defaults to now.
    pub fn creation_date(mut self, timestamp: i64) -> Self {
        self.creation_date = Some(timestamp);
        self
    }

    /// Reports hashing progress as a fraction in `0.0..=1.0`.
    pub fn progress(mut self, progress: Arc<Observable<f64>>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The directory a storage engine should be rooted at to serve this content.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hashes the content and returns the finished metainfo.
    pub fn build(self) -> Result<Metainfo, MetainfoError> {
        let announce = self
            .announce
            .clone()
            .ok_or(MetainfoError::MissingField("announce"))?;
        if self.piece_length == 0 {
            return Err(MetainfoError::InvalidField("piece length"));
        }

        let content_dir = match self.files {
            Some(_) => self.root.join(&self.name),
            None => self.root.clone(),
        };
        let paths = match &self.files {
            Some(files) => files.clone(),
            None => vec![PathBuf::from(&self.name)],
        };

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let length = std::fs::metadata(content_dir.join(&path))?.len();
            entries.push((path, length));
        }

        let index = FileIndex::new(&content_dir, entries.clone()).map_err(storage_error)?;
        let pieces = self.hash_pieces(&index)?;
        index.close().map_err(storage_error)?;

        let layout = match self.files {
            Some(_) => Layout::MultiFile {
                directory: self.name.clone(),
                files: entries
                    .into_iter()
                    .map(|(path, length)| FileInfo {
                        path,
                        length,
                        md5sum: None,
                    })
                    .collect(),
            },
            None => Layout::SingleFile {
                name: self.name.clone(),
                length: index.length(),
                md5sum: None,
            },
        };

        let info = Info {
            piece_length: self.piece_length,
            pieces,
            private: self.private,
            layout,
        };

        let mut metainfo = Metainfo::new(info, announce);
        if !self.announce_list.is_empty() {
            metainfo.announce_list = Some(self.announce_list);
        }
        metainfo.comment = self.comment;
        metainfo.created_by = self.created_by;
        metainfo.creation_date = Some(self.creation_date.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0)
        }));

        tracing::debug!(
            name = %self.name,
            pieces = metainfo.info.piece_count(),
            info_hash = %metainfo.info_hash,
            "created torrent"
        );

        Ok(metainfo)
    }

    fn hash_pieces(&self, index: &FileIndex) -> Result<Vec<[u8; 20]>, MetainfoError> {
        let total = index.length();
        let count = total.div_ceil(self.piece_length);
        let mut pieces = Vec::with_capacity(count as usize);
        let mut buf = Vec::new();

        for piece in 0..count {
            let offset = piece * self.piece_length;
            let size = self.piece_length.min(total - offset) as usize;
            buf.resize(size, 0);
            index.read(offset, &mut buf).map_err(storage_error)?;
            pieces.push(Sha1::digest(&buf).into());

            if let Some(ref progress) = self.progress {
                progress.set((piece + 1) as f64 / count as f64);
            }
        }

        if count == 0 {
            if let Some(ref progress) = self.progress {
                progress.set(1.0);
            }
        }

        Ok(pieces)
    }
}

fn split_name(path: &Path) -> Result<(PathBuf, String), MetainfoError> {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or(MetainfoError::InvalidField("name"))?
        .to_string();
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok((root, name))
}

fn collect_files(base: &Path, relative: PathBuf, out: &mut Vec<PathBuf>) -> Result<(), MetainfoError> {
    for entry in std::fs::read_dir(base.join(&relative))? {
        let entry = entry?;
        let path = relative.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(base, path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn storage_error(err: StorageError) -> MetainfoError {
    match err {
        StorageError::Io(e) => MetainfoError::Io(e),
        StorageError::PathTraversal(_) => MetainfoError::InvalidField("path"),
        other => MetainfoError::Io(std::io::Error::other(other)),
    }
}
