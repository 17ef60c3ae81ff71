use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Component, Path, PathBuf};

use parking_lot::Mutex;

use super::error::StorageError;

/// Rejects paths that could escape the storage root.
pub(crate) fn validate_file_path(file_path: &Path) -> Result<(), StorageError> {
    if file_path.as_os_str().is_empty() {
        return Err(StorageError::PathTraversal(String::new()));
    }
    for component in file_path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::PathTraversal(file_path.display().to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Length of the intersection of two byte ranges.
pub(crate) fn overlap(a: &Range<u64>, b: &Range<u64>) -> u64 {
    a.end.min(b.end).saturating_sub(a.start.max(b.start))
}

/// The part of a virtual byte range that lands in one physical file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpan {
    pub file_index: usize,
    pub file_offset: u64,
    pub length: u64,
}

struct Handle {
    file: File,
    writable: bool,
}

/// One file on disk, placed at `offset` in the virtual address space.
///
/// The handle is opened on first use and kept until [`PhysicalFile::close`].
/// All I/O on the file goes through its own lock, so seek and transfer are
/// never interleaved with another caller's.
pub struct PhysicalFile {
    path: PathBuf,
    absolute_path: PathBuf,
    offset: u64,
    length: u64,
    handle: Mutex<Option<Handle>>,
}

impl PhysicalFile {
    fn new(root: &Path, path: PathBuf, offset: u64, length: u64) -> Result<Self, StorageError> {
        validate_file_path(&path)?;
        Ok(Self {
            absolute_path: root.join(&path),
            path,
            offset,
            length,
            handle: Mutex::new(None),
        })
    }

    /// Path relative to the index root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn byte_range(&self) -> Range<u64> {
        self.offset..self.offset + self.length
    }

    /// Reads exactly `buf.len()` bytes starting at `file_offset`.
    pub fn read_at(&self, file_offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        self.with_handle(false, |file| {
            file.seek(SeekFrom::Start(file_offset))?;
            file.read_exact(buf)
        })
    }

    /// Writes all of `data` at `file_offset`, creating the file and its
    /// parent directories if needed.
    pub fn write_at(&self, file_offset: u64, data: &[u8]) -> Result<(), StorageError> {
        self.with_handle(true, |file| {
            file.seek(SeekFrom::Start(file_offset))?;
            file.write_all(data)
        })
    }

    /// Flushes written data to durable storage. A no-op if nothing was written.
    pub fn sync(&self) -> Result<(), StorageError> {
        if let Some(handle) = self.handle.lock().as_ref() {
            if handle.writable {
                handle.file.sync_all()?;
            }
        }
        Ok(())
    }

    /// Syncs and releases the handle. The next access reopens the file.
    pub fn close(&self) -> Result<(), StorageError> {
        if let Some(handle) = self.handle.lock().take() {
            if handle.writable {
                handle.file.sync_all()?;
            }
        }
        Ok(())
    }

    fn with_handle<T>(
        &self,
        writable: bool,
        f: impl FnOnce(&mut File) -> io::Result<T>,
    ) -> Result<T, StorageError> {
        let mut guard = self.handle.lock();

        let reopen = match guard.as_ref() {
            Some(handle) => writable && !handle.writable,
            None => true,
        };
        if reopen {
            *guard = Some(self.open(writable)?);
        }

        let handle = guard
            .as_mut()
            .ok_or(StorageError::IllegalState("file handle missing after open"))?;
        f(&mut handle.file).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => StorageError::EndOfStream,
            _ => StorageError::Io(e),
        })
    }

    fn open(&self, writable: bool) -> Result<Handle, StorageError> {
        let file = if writable {
            if let Some(parent) = self.absolute_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&self.absolute_path)?
        } else {
            File::open(&self.absolute_path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    StorageError::FileNotFound(self.absolute_path.display().to_string())
                }
                _ => StorageError::Io(e),
            })?
        };

        tracing::trace!(path = %self.absolute_path.display(), writable, "opened file");
        Ok(Handle { file, writable })
    }
}

impl std::fmt::Debug for PhysicalFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalFile")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}

/// Maps a contiguous virtual byte space onto an ordered list of files.
///
/// Files are stored sorted by start offset with no gaps or overlaps, so the
/// file holding a given offset is found by binary search.
#[derive(Debug)]
pub struct FileIndex {
    files: Vec<PhysicalFile>,
    length: u64,
}

impl FileIndex {
    /// Lays out `entries` back to back under `root`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathTraversal`] if any path is empty, absolute,
    /// or contains `..`, and [`StorageError::LengthOverflow`] if the lengths
    /// add up past `u64::MAX`.
    pub fn new<I, P>(root: &Path, entries: I) -> Result<Self, StorageError>
    where
        I: IntoIterator<Item = (P, u64)>,
        P: Into<PathBuf>,
    {
        let mut files = Vec::new();
        let mut offset = 0u64;
        for (path, length) in entries {
            files.push(PhysicalFile::new(root, path.into(), offset, length)?);
            offset = offset
                .checked_add(length)
                .ok_or(StorageError::LengthOverflow)?;
        }
        Ok(Self {
            files,
            length: offset,
        })
    }

    /// Total length of the virtual byte space.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[PhysicalFile] {
        &self.files
    }

    pub fn get(&self, index: usize) -> Option<&PhysicalFile> {
        self.files.get(index)
    }

    /// Returns the index of the file containing `offset`.
    ///
    /// Zero-length files never contain an offset.
    pub fn locate(&self, offset: u64) -> Option<usize> {
        let index = self
            .files
            .partition_point(|f| f.offset + f.length <= offset);
        (index < self.files.len()).then_some(index)
    }

    /// Splits `length` bytes starting at `offset` into per-file spans.
    ///
    /// Fails with [`StorageError::EndOfStream`] if the range runs past the
    /// last file.
    pub fn spans(&self, offset: u64, length: u64) -> Result<Vec<FileSpan>, StorageError> {
        match offset.checked_add(length) {
            Some(end) if end <= self.length => {}
            _ => return Err(StorageError::EndOfStream),
        }

        let mut spans = Vec::new();
        let mut current = offset;
        let mut remaining = length;
        let Some(first) = self.locate(offset) else {
            return Ok(spans);
        };

        for (file_index, file) in self.files.iter().enumerate().skip(first) {
            if remaining == 0 {
                break;
            }
            if file.length == 0 {
                continue;
            }
            let take = remaining.min(file.offset + file.length - current);
            spans.push(FileSpan {
                file_index,
                file_offset: current - file.offset,
                length: take,
            });
            current += take;
            remaining -= take;
        }

        Ok(spans)
    }

    /// Fills `buf` with the bytes at `offset`, crossing file boundaries as needed.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        let mut filled = 0usize;
        for span in self.spans(offset, buf.len() as u64)? {
            let end = filled + span.length as usize;
            self.files[span.file_index].read_at(span.file_offset, &mut buf[filled..end])?;
            filled = end;
        }
        Ok(())
    }

    /// Writes `data` at `offset` and returns the spans that were written.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<Vec<FileSpan>, StorageError> {
        let spans = self.spans(offset, data.len() as u64)?;
        let mut written = 0usize;
        for span in &spans {
            let end = written + span.length as usize;
            self.files[span.file_index].write_at(span.file_offset, &data[written..end])?;
            written = end;
        }
        Ok(spans)
    }

    /// Syncs and releases every open handle.
    pub fn close(&self) -> Result<(), StorageError> {
        for file in &self.files {
            file.close()?;
        }
        Ok(())
    }
}
