use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use super::error::MetainfoError;
use super::info_hash::InfoHash;
use crate::bencode::{decode, dict_entry_span, encode, Value};
use crate::constants::HASH_LEN;

/// A parsed torrent file.
///
/// Contains all metadata from a `.torrent` file, including file information,
/// piece hashes, and tracker URLs.
///
/// # Examples
///
/// ```no_run
/// use bitpiece::metainfo::Metainfo;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let data = std::fs::read("example.torrent")?;
/// let metainfo = Metainfo::from_bytes(&data)?;
///
/// println!("Torrent: {}", metainfo.info.name());
/// println!("Size: {} bytes", metainfo.info.total_length());
/// println!("Info hash: {}", metainfo.info_hash);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// The info dictionary containing file and piece information.
    pub info: Info,
    /// The unique identifier for this torrent (hash of the info dictionary).
    pub info_hash: InfoHash,
    /// Primary tracker URL.
    pub announce: String,
    /// Multi-tier tracker list.
    pub announce_list: Option<Vec<Vec<String>>>,
    /// Unix timestamp when the torrent was created.
    pub creation_date: Option<i64>,
    pub comment: Option<String>,
    /// Name/version of the program that created the torrent.
    pub created_by: Option<String>,
    /// Character encoding of the string fields.
    pub encoding: Option<String>,
    raw_info: Bytes,
}

/// The info dictionary from a torrent file.
///
/// Contains the core metadata that identifies the torrent content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    /// Number of bytes per piece (the final piece may be shorter).
    pub piece_length: u64,
    /// SHA1 hash of each piece.
    pub pieces: Vec<[u8; 20]>,
    /// If set, clients should only use trackers listed in the metainfo.
    pub private: Option<bool>,
    pub layout: Layout,
}

/// How the torrent's content maps onto files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// One file named `name`.
    SingleFile {
        name: String,
        length: u64,
        md5sum: Option<String>,
    },
    /// A directory named `directory` holding an ordered list of files.
    MultiFile {
        directory: String,
        files: Vec<FileInfo>,
    },
}

/// A file entry of a multi-file torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Path relative to the torrent's directory.
    pub path: PathBuf,
    pub length: u64,
    pub md5sum: Option<String>,
}

/// A file within a torrent, positioned in the piece address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// Path relative to the content directory (see [`Info::content_dir`]).
    pub path: PathBuf,
    /// Size of the file in bytes.
    pub length: u64,
    /// Byte offset within the torrent's piece data.
    pub offset: u64,
}

impl Metainfo {
    /// Creates metainfo for a freshly generated info dictionary.
    pub fn new(info: Info, announce: impl Into<String>) -> Self {
        let raw_info = Bytes::from(encode(&info.to_value()));
        Self {
            info_hash: InfoHash::from_info_bytes(&raw_info),
            info,
            announce: announce.into(),
            announce_list: None,
            creation_date: None,
            comment: None,
            created_by: None,
            encoding: None,
            raw_info,
        }
    }

    /// Parses a torrent file from raw bytes.
    ///
    /// The info hash is computed over the `info` dictionary exactly as it
    /// appears in `data`, so non-canonical input keeps its identity.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The data is not valid bencode
    /// - Required fields are missing (info, announce, name, pieces, etc.)
    /// - The pieces field length is not a multiple of 20 or does not match
    ///   the content length
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let value = decode(data)?;
        if value.as_dict().is_none() {
            return Err(MetainfoError::InvalidField("root"));
        }

        let span = dict_entry_span(data, b"info")?.ok_or(MetainfoError::MissingField("info"))?;
        let raw_info = Bytes::copy_from_slice(&data[span]);
        let info_hash = InfoHash::from_info_bytes(&raw_info);

        let mut metainfo = Self::from_value(&value, info_hash)?;
        metainfo.raw_info = raw_info;
        Ok(metainfo)
    }

    /// Maps an already decoded metainfo dictionary.
    ///
    /// The info hash is supplied by the caller because a decoded value no
    /// longer carries the original bytes it was hashed over.
    pub fn from_value(value: &Value, info_hash: InfoHash) -> Result<Self, MetainfoError> {
        let dict = value.as_dict().ok_or(MetainfoError::InvalidField("root"))?;

        let info_value = dict
            .get(b"info".as_slice())
            .ok_or(MetainfoError::MissingField("info"))?;
        let info = Info::from_value(info_value)?;

        let announce = required_str(dict, "announce")?.to_string();

        let announce_list = match dict.get(b"announce-list".as_slice()) {
            Some(value) => Some(parse_announce_list(value)?),
            None => None,
        };

        Ok(Self {
            info,
            info_hash,
            announce,
            announce_list,
            creation_date: optional_integer(dict, "creation date")?,
            comment: optional_string(dict, "comment")?,
            created_by: optional_string(dict, "created by")?,
            encoding: optional_string(dict, "encoding")?,
            raw_info: Bytes::from(encode(info_value)),
        })
    }

    /// Converts back to a bencode dictionary.
    ///
    /// The `info` entry is decoded from the original info bytes, so unknown
    /// keys survive. Encoding writes keys in canonical order: the info hash is
    /// only preserved when the original info dictionary was already canonical.
    pub fn to_value(&self) -> Value {
        let info = decode(&self.raw_info).unwrap_or_else(|_| self.info.to_value());

        let mut dict = BTreeMap::new();
        dict.insert(Bytes::from_static(b"info"), info);
        dict.insert(
            Bytes::from_static(b"announce"),
            Value::string(&self.announce),
        );
        if let Some(ref tiers) = self.announce_list {
            let tiers = tiers
                .iter()
                .map(|tier| Value::List(tier.iter().map(|url| Value::string(url)).collect()))
                .collect();
            dict.insert(Bytes::from_static(b"announce-list"), Value::List(tiers));
        }
        if let Some(date) = self.creation_date {
            dict.insert(Bytes::from_static(b"creation date"), Value::Integer(date));
        }
        if let Some(ref comment) = self.comment {
            dict.insert(Bytes::from_static(b"comment"), Value::string(comment));
        }
        if let Some(ref created_by) = self.created_by {
            dict.insert(Bytes::from_static(b"created by"), Value::string(created_by));
        }
        if let Some(ref encoding) = self.encoding {
            dict.insert(Bytes::from_static(b"encoding"), Value::string(encoding));
        }
        Value::Dict(dict)
    }

    /// Serializes to `.torrent` file bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(&self.to_value())
    }

    /// Returns the raw bencoded info dictionary.
    pub fn raw_info(&self) -> &Bytes {
        &self.raw_info
    }

    /// Returns all tracker URLs from both `announce` and `announce-list`.
    ///
    /// The primary tracker comes first, followed by trackers from
    /// `announce-list`. Duplicates are removed.
    pub fn trackers(&self) -> Vec<String> {
        let mut trackers = vec![self.announce.clone()];

        for tier in self.announce_list.iter().flatten() {
            for tracker in tier {
                if !trackers.contains(tracker) {
                    trackers.push(tracker.clone());
                }
            }
        }

        trackers
    }
}

impl Info {
    pub fn from_value(value: &Value) -> Result<Self, MetainfoError> {
        let dict = value.as_dict().ok_or(MetainfoError::InvalidField("info"))?;

        let piece_length = required_integer(dict, "piece length")?;
        if piece_length <= 0 {
            return Err(MetainfoError::InvalidField("piece length"));
        }
        let piece_length = piece_length as u64;

        let pieces_bytes = required_bytes(dict, "pieces")?;
        if pieces_bytes.len() % HASH_LEN != 0 {
            return Err(MetainfoError::InvalidField("pieces"));
        }
        let pieces: Vec<[u8; 20]> = pieces_bytes
            .chunks_exact(HASH_LEN)
            .map(|chunk| {
                let mut arr = [0u8; 20];
                arr.copy_from_slice(chunk);
                arr
            })
            .collect();

        let private = optional_integer(dict, "private")?.map(|v| v == 1);
        let name = required_str(dict, "name")?.to_string();

        let layout = match dict.get(b"files".as_slice()) {
            Some(_) if dict.contains_key(b"length".as_slice()) => {
                return Err(MetainfoError::InvalidField("files"));
            }
            Some(files) => {
                let files = files
                    .as_list()
                    .ok_or(MetainfoError::InvalidField("files"))?
                    .iter()
                    .map(parse_file_info)
                    .collect::<Result<Vec<FileInfo>, _>>()?;
                files
                    .iter()
                    .try_fold(0u64, |total, f| total.checked_add(f.length))
                    .ok_or(MetainfoError::InvalidField("length"))?;
                Layout::MultiFile {
                    directory: name,
                    files,
                }
            }
            None => {
                let length = required_integer(dict, "length")?;
                if length < 0 {
                    return Err(MetainfoError::InvalidField("length"));
                }
                Layout::SingleFile {
                    name,
                    length: length as u64,
                    md5sum: optional_string(dict, "md5sum")?,
                }
            }
        };

        let info = Self {
            piece_length,
            pieces,
            private,
            layout,
        };

        if info.total_length().div_ceil(piece_length) != info.pieces.len() as u64 {
            return Err(MetainfoError::InvalidField("pieces"));
        }

        Ok(info)
    }

    pub fn to_value(&self) -> Value {
        let mut dict = BTreeMap::new();
        dict.insert(
            Bytes::from_static(b"piece length"),
            Value::Integer(self.piece_length as i64),
        );
        dict.insert(
            Bytes::from_static(b"pieces"),
            Value::Bytes(Bytes::from(self.pieces.concat())),
        );
        if let Some(private) = self.private {
            dict.insert(
                Bytes::from_static(b"private"),
                Value::Integer(private as i64),
            );
        }

        match &self.layout {
            Layout::SingleFile {
                name,
                length,
                md5sum,
            } => {
                dict.insert(Bytes::from_static(b"name"), Value::string(name));
                dict.insert(Bytes::from_static(b"length"), Value::Integer(*length as i64));
                if let Some(md5sum) = md5sum {
                    dict.insert(Bytes::from_static(b"md5sum"), Value::string(md5sum));
                }
            }
            Layout::MultiFile { directory, files } => {
                dict.insert(Bytes::from_static(b"name"), Value::string(directory));
                let files = files.iter().map(FileInfo::to_value).collect();
                dict.insert(Bytes::from_static(b"files"), Value::List(files));
            }
        }

        Value::Dict(dict)
    }

    /// The file name (single-file) or directory name (multi-file).
    pub fn name(&self) -> &str {
        match &self.layout {
            Layout::SingleFile { name, .. } => name,
            Layout::MultiFile { directory, .. } => directory,
        }
    }

    pub fn is_multi_file(&self) -> bool {
        matches!(self.layout, Layout::MultiFile { .. })
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn piece_hash(&self, index: u32) -> Option<&[u8; 20]> {
        self.pieces.get(index as usize)
    }

    /// Returns the size of the piece at `index`; only the last piece may be
    /// shorter than `piece_length`.
    pub fn piece_size(&self, index: u32) -> Option<u64> {
        let index = index as u64;
        if index >= self.pieces.len() as u64 {
            return None;
        }
        let start = index * self.piece_length;
        Some(self.piece_length.min(self.total_length().saturating_sub(start)))
    }

    /// Total size of all files combined.
    ///
    /// Parsed torrents are rejected when this would overflow; for a
    /// hand-built [`Info`] the sum saturates.
    pub fn total_length(&self) -> u64 {
        match &self.layout {
            Layout::SingleFile { length, .. } => *length,
            Layout::MultiFile { files, .. } => files
                .iter()
                .fold(0u64, |total, f| total.saturating_add(f.length)),
        }
    }

    /// Returns every file with its offset in the piece address space.
    pub fn files(&self) -> Vec<File> {
        match &self.layout {
            Layout::SingleFile { name, length, .. } => vec![File {
                path: PathBuf::from(name),
                length: *length,
                offset: 0,
            }],
            Layout::MultiFile { files, .. } => {
                let mut offset = 0u64;
                files
                    .iter()
                    .map(|f| {
                        let file = File {
                            path: f.path.clone(),
                            length: f.length,
                            offset,
                        };
                        offset = offset.saturating_add(f.length);
                        file
                    })
                    .collect()
            }
        }
    }

    /// Directory that [`File::path`] entries are relative to: `root` itself
    /// for a single file, `root/<name>` for a multi-file torrent.
    pub fn content_dir(&self, root: &Path) -> PathBuf {
        match &self.layout {
            Layout::SingleFile { .. } => root.to_path_buf(),
            Layout::MultiFile { directory, .. } => root.join(directory),
        }
    }
}

impl FileInfo {
    fn to_value(&self) -> Value {
        let path = self
            .path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(Value::string(&s.to_string_lossy())),
                _ => None,
            })
            .collect();

        let mut dict = BTreeMap::new();
        dict.insert(Bytes::from_static(b"length"), Value::Integer(self.length as i64));
        dict.insert(Bytes::from_static(b"path"), Value::List(path));
        if let Some(ref md5sum) = self.md5sum {
            dict.insert(Bytes::from_static(b"md5sum"), Value::string(md5sum));
        }
        Value::Dict(dict)
    }
}

fn parse_file_info(value: &Value) -> Result<FileInfo, MetainfoError> {
    let dict = value.as_dict().ok_or(MetainfoError::InvalidField("files"))?;

    let length = required_integer(dict, "length")?;
    if length < 0 {
        return Err(MetainfoError::InvalidField("length"));
    }

    let segments = dict
        .get(b"path".as_slice())
        .ok_or(MetainfoError::MissingField("path"))?
        .as_list()
        .ok_or(MetainfoError::InvalidField("path"))?;
    if segments.is_empty() {
        return Err(MetainfoError::InvalidField("path"));
    }
    let path = segments
        .iter()
        .map(|s| s.as_str().ok_or(MetainfoError::InvalidField("path")))
        .collect::<Result<PathBuf, _>>()?;

    Ok(FileInfo {
        path,
        length: length as u64,
        md5sum: optional_string(dict, "md5sum")?,
    })
}

fn parse_announce_list(value: &Value) -> Result<Vec<Vec<String>>, MetainfoError> {
    let invalid = || MetainfoError::InvalidField("announce-list");
    value
        .as_list()
        .ok_or_else(invalid)?
        .iter()
        .map(|tier| -> Result<Vec<String>, MetainfoError> {
            tier.as_list()
                .ok_or_else(invalid)?
                .iter()
                .map(|url| url.as_str().map(String::from).ok_or_else(invalid))
                .collect()
        })
        .collect()
}

pub(crate) type Dict = BTreeMap<Bytes, Value>;

pub(crate) fn required_integer(dict: &Dict, key: &'static str) -> Result<i64, MetainfoError> {
    dict.get(key.as_bytes())
        .ok_or(MetainfoError::MissingField(key))?
        .as_integer()
        .ok_or(MetainfoError::InvalidField(key))
}

pub(crate) fn required_bytes<'a>(dict: &'a Dict, key: &'static str) -> Result<&'a Bytes, MetainfoError> {
    dict.get(key.as_bytes())
        .ok_or(MetainfoError::MissingField(key))?
        .as_bytes()
        .ok_or(MetainfoError::InvalidField(key))
}

pub(crate) fn required_str<'a>(dict: &'a Dict, key: &'static str) -> Result<&'a str, MetainfoError> {
    dict.get(key.as_bytes())
        .ok_or(MetainfoError::MissingField(key))?
        .as_str()
        .ok_or(MetainfoError::InvalidField(key))
}

pub(crate) fn optional_integer(dict: &Dict, key: &'static str) -> Result<Option<i64>, MetainfoError> {
    dict.get(key.as_bytes())
        .map(|v| v.as_integer().ok_or(MetainfoError::InvalidField(key)))
        .transpose()
}

pub(crate) fn optional_string(dict: &Dict, key: &'static str) -> Result<Option<String>, MetainfoError> {
    dict.get(key.as_bytes())
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or(MetainfoError::InvalidField(key))
        })
        .transpose()
}
