//! Persisted per-torrent state.
//!
//! Each torrent is saved as one bencoded dictionary in the session
//! directory, named by its info hash in upper-case hex:
//!
//! | key | value |
//! |---|---|
//! | `metaInfo` | the torrent's metainfo dictionary |
//! | `rootDirectory` | `file://` URI of the storage root |
//! | `ignoredFiles` | list of `file://` URIs of ignored files |
//! | `pieceMap` | `{data: <bitfield bytes>, size: <piece count>}` |
//! | `state` | [`TorrentState`] ordinal (optional, defaults to stopped) |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use url::Url;

use super::error::StorageError;
use super::manager::{TorrentState, TorrentStorage};
use crate::bencode::{decode, encode, Value};
use crate::bitfield::Bitfield;
use crate::config::StorageConfig;
use crate::metainfo::{
    optional_integer, required_bytes, required_integer, required_str, InfoHash, Metainfo,
    MetainfoError,
};

/// Everything needed to bring a torrent's storage back after a restart.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub info_hash: InfoHash,
    pub metainfo: Metainfo,
    pub root_directory: PathBuf,
    /// Ignored files, relative to the content directory.
    pub ignored_files: Vec<PathBuf>,
    pub piece_map: Bitfield,
    pub state: TorrentState,
}

impl SessionState {
    /// Snapshots a running torrent.
    pub fn capture(metainfo: &Metainfo, storage: &TorrentStorage) -> Self {
        Self {
            info_hash: metainfo.info_hash,
            metainfo: metainfo.clone(),
            root_directory: storage.root_dir().to_path_buf(),
            ignored_files: storage
                .files()
                .into_iter()
                .filter(|f| f.ignored)
                .map(|f| f.path)
                .collect(),
            piece_map: storage.bitfield(),
            state: storage.state(),
        }
    }

    /// Rebuilds the storage engine from the saved bitfield, without rechecking.
    pub fn restore(&self) -> Result<TorrentStorage, StorageError> {
        TorrentStorage::new(
            &self.root_directory,
            &self.metainfo.info,
            &self.ignored_files,
            self.piece_map.clone(),
            self.state,
        )
    }

    /// Name of the file this session is saved under.
    pub fn file_name(&self) -> String {
        self.info_hash.to_hex_upper()
    }

    pub fn to_value(&self) -> Result<Value, StorageError> {
        let root = std::path::absolute(&self.root_directory)?;
        let content_dir = self.metainfo.info.content_dir(&root);

        let ignored = self
            .ignored_files
            .iter()
            .map(|path| file_uri(&content_dir.join(path)).map(|uri| Value::string(&uri)))
            .collect::<Result<Vec<_>, _>>()?;

        // A recheck cannot resume after a restart.
        let state = match self.state {
            TorrentState::Checking => TorrentState::Error,
            other => other,
        };

        let mut dict = BTreeMap::new();
        dict.insert(Bytes::from_static(b"metaInfo"), self.metainfo.to_value());
        dict.insert(
            Bytes::from_static(b"rootDirectory"),
            Value::string(&file_uri(&root)?),
        );
        dict.insert(Bytes::from_static(b"ignoredFiles"), Value::List(ignored));
        dict.insert(
            Bytes::from_static(b"pieceMap"),
            Value::dict([
                ("data", Value::Bytes(self.piece_map.to_bytes())),
                ("size", Value::Integer(self.piece_map.len() as i64)),
            ]),
        );
        dict.insert(Bytes::from_static(b"state"), Value::Integer(state.ordinal()));
        Ok(Value::Dict(dict))
    }

    /// Maps a saved dictionary. The info hash comes from the file name, since
    /// the stored metainfo may no longer be byte-identical to the original.
    pub fn from_value(value: &Value, info_hash: InfoHash) -> Result<Self, StorageError> {
        let dict = value
            .as_dict()
            .ok_or(MetainfoError::InvalidField("session"))?;

        let metainfo = Metainfo::from_value(
            dict.get(b"metaInfo".as_slice())
                .ok_or(MetainfoError::MissingField("metaInfo"))?,
            info_hash,
        )?;

        let root_directory = path_from_uri(required_str(dict, "rootDirectory")?, "rootDirectory")?;
        let content_dir = metainfo.info.content_dir(&root_directory);

        let ignored_files = dict
            .get(b"ignoredFiles".as_slice())
            .ok_or(MetainfoError::MissingField("ignoredFiles"))?
            .as_list()
            .ok_or(MetainfoError::InvalidField("ignoredFiles"))?
            .iter()
            .map(|uri| -> Result<PathBuf, StorageError> {
                let uri = uri
                    .as_str()
                    .ok_or(MetainfoError::InvalidField("ignoredFiles"))?;
                let path = path_from_uri(uri, "ignoredFiles")?;
                path.strip_prefix(&content_dir)
                    .map(Path::to_path_buf)
                    .map_err(|_| StorageError::from(MetainfoError::InvalidField("ignoredFiles")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let piece_map = dict
            .get(b"pieceMap".as_slice())
            .and_then(Value::as_dict)
            .ok_or(MetainfoError::MissingField("pieceMap"))?;
        let size = required_integer(piece_map, "size")?;
        let size = usize::try_from(size).map_err(|_| MetainfoError::InvalidField("size"))?;
        let piece_map = Bitfield::from_bytes(required_bytes(piece_map, "data")?, size)
            .ok_or(MetainfoError::InvalidField("data"))?;

        let state = match optional_integer(dict, "state")? {
            Some(ordinal) => {
                TorrentState::from_ordinal(ordinal).ok_or(MetainfoError::InvalidField("state"))?
            }
            None => TorrentState::Stopped,
        };

        Ok(Self {
            info_hash,
            metainfo,
            root_directory,
            ignored_files,
            piece_map,
            state,
        })
    }

    /// Writes the session to `<dir>/<INFO HASH>`, creating `dir` if needed.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, StorageError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, encode(&self.to_value()?))?;
        tracing::debug!(path = %path.display(), state = ?self.state, "session saved");
        Ok(path)
    }

    /// Saves into the configured session directory.
    pub fn save_in(&self, config: &StorageConfig) -> Result<PathBuf, StorageError> {
        self.save(&config.session_dir)
    }

    /// Reads one session file, taking the info hash from its name.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let info_hash = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| InfoHash::from_hex(name).ok())
            .ok_or(MetainfoError::InvalidInfoHash)?;

        let data = std::fs::read(path)?;
        let session = Self::from_value(&decode(&data)?, info_hash)?;
        tracing::debug!(info_hash = %info_hash, "session loaded");
        Ok(session)
    }

    /// Loads every session in `dir`.
    ///
    /// Only files named as 40 upper-case hex digits are considered; any that
    /// fail to decode or map are skipped. A missing directory holds no sessions.
    pub fn load_all(dir: &Path) -> Result<Vec<Self>, StorageError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry?;
            let is_session = entry
                .file_name()
                .to_str()
                .is_some_and(is_session_name);
            if is_session && entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut sessions = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::load(&path) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session");
                }
            }
        }
        Ok(sessions)
    }

    /// Loads every session in the configured session directory.
    pub fn load_all_in(config: &StorageConfig) -> Result<Vec<Self>, StorageError> {
        Self::load_all(&config.session_dir)
    }

    /// Removes the saved session, if any.
    pub fn delete(&self, dir: &Path) -> Result<(), StorageError> {
        match std::fs::remove_file(dir.join(self.file_name())) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_session_name(name: &str) -> bool {
    name.len() == 40
        && name
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

fn file_uri(path: &Path) -> Result<String, StorageError> {
    Url::from_file_path(path)
        .map(String::from)
        .map_err(|_| StorageError::PathTraversal(path.display().to_string()))
}

fn path_from_uri(uri: &str, field: &'static str) -> Result<PathBuf, StorageError> {
    Url::parse(uri)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .ok_or(StorageError::Metainfo(MetainfoError::InvalidField(field)))
}
