use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use sha1::{Digest, Sha1};

use super::error::StorageError;
use super::file::{FileIndex, FileSpan};
use crate::bitfield::Bitfield;
use crate::metainfo::Info;
use crate::observable::Observable;

/// Lifecycle of a torrent's storage, persisted by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TorrentState {
    #[default]
    Stopped,
    Downloading,
    Seeding,
    Checking,
    Error,
}

impl TorrentState {
    pub fn ordinal(self) -> i64 {
        match self {
            TorrentState::Stopped => 0,
            TorrentState::Downloading => 1,
            TorrentState::Seeding => 2,
            TorrentState::Checking => 3,
            TorrentState::Error => 4,
        }
    }

    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(TorrentState::Stopped),
            1 => Some(TorrentState::Downloading),
            2 => Some(TorrentState::Seeding),
            3 => Some(TorrentState::Checking),
            4 => Some(TorrentState::Error),
            _ => None,
        }
    }
}

/// Snapshot of one file's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// Path relative to the content directory.
    pub path: PathBuf,
    pub length: u64,
    pub completed: u64,
    pub ignored: bool,
}

struct Progress {
    bitfield: Bitfield,
    file_completed: Vec<u64>,
    ignored: Vec<bool>,
    state: TorrentState,
    active_length: u64,
    completed: u64,
    /// Bumped on every snapshot handed to the observables.
    sequence: u64,
}

/// Hash-verified piece storage for one torrent.
///
/// Pieces are addressed by index over the torrent's virtual byte space and
/// mapped onto files through a [`FileIndex`]. Every write is verified
/// against the recorded SHA-1 before any byte reaches disk, so a rejected
/// piece leaves both the files and the bitfield untouched.
///
/// All bookkeeping (bitfield, per-file counters, state) sits behind a single
/// lock; file I/O happens outside it and is serialized per file by the index.
/// Aggregate totals and the state are mirrored into [`Observable`]s after the
/// lock is released, so listeners may call back into the storage. Under
/// concurrent updates a listener can briefly see an older snapshot, but the
/// observables always settle on the latest one.
pub struct TorrentStorage {
    root_dir: PathBuf,
    piece_length: u64,
    pieces: Vec<[u8; 20]>,
    index: FileIndex,
    progress: Mutex<Progress>,
    /// Shared by writes in flight, taken exclusively to enter checking.
    writers: RwLock<()>,
    published: AtomicU64,
    length: Arc<Observable<u64>>,
    completed: Arc<Observable<u64>>,
    state: Arc<Observable<TorrentState>>,
}

impl TorrentStorage {
    /// Creates storage for `info` under `root_dir` with a known bitfield.
    ///
    /// File paths in `ignored` are relative to the content directory. Per-file
    /// progress is derived from the pieces already set in `bitfield`; pass
    /// [`Bitfield::full`] when serving content that was just hashed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BitfieldLength`] if the bitfield does not have
    /// one bit per piece, or [`StorageError::PathTraversal`] if a file path
    /// could escape the content directory.
    pub fn new(
        root_dir: impl Into<PathBuf>,
        info: &Info,
        ignored: &[PathBuf],
        bitfield: Bitfield,
        state: TorrentState,
    ) -> Result<Self, StorageError> {
        let root_dir = root_dir.into();
        if bitfield.len() != info.piece_count() {
            return Err(StorageError::BitfieldLength {
                expected: info.piece_count(),
                actual: bitfield.len(),
            });
        }

        let files = info.files();
        let ignored: Vec<bool> = files.iter().map(|f| ignored.contains(&f.path)).collect();
        let index = FileIndex::new(
            &info.content_dir(&root_dir),
            files.into_iter().map(|f| (f.path, f.length)),
        )?;

        let state = match state {
            TorrentState::Checking => TorrentState::Stopped,
            other => other,
        };

        let storage = Self {
            root_dir,
            piece_length: info.piece_length,
            pieces: info.pieces.clone(),
            progress: Mutex::new(Progress {
                file_completed: vec![0; index.len()],
                bitfield,
                ignored,
                state,
                active_length: 0,
                completed: 0,
                sequence: 0,
            }),
            index,
            writers: RwLock::new(()),
            published: AtomicU64::new(0),
            length: Arc::new(Observable::new(0)),
            completed: Arc::new(Observable::new(0)),
            state: Arc::new(Observable::new(state)),
        };

        storage.recount(&mut storage.progress.lock());
        storage.publish();
        Ok(storage)
    }

    /// Creates storage with nothing known and verifies everything on disk.
    pub fn open(
        root_dir: impl Into<PathBuf>,
        info: &Info,
        ignored: &[PathBuf],
    ) -> Result<Self, StorageError> {
        let bitfield = Bitfield::new(info.piece_count());
        let storage = Self::new(root_dir, info, ignored, bitfield, TorrentState::Stopped)?;
        storage.recheck(0..storage.piece_count() as u32)?;
        Ok(storage)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Total number of bytes across all files, ignored or not.
    pub fn total_length(&self) -> u64 {
        self.index.length()
    }

    /// Byte range of `piece` in the virtual address space.
    pub fn piece_range(&self, piece: u32) -> Result<Range<u64>, StorageError> {
        if piece as usize >= self.pieces.len() {
            return Err(StorageError::InvalidPieceIndex(piece));
        }
        let start = piece as u64 * self.piece_length;
        let end = (start + self.piece_length).min(self.index.length());
        Ok(start..end)
    }

    /// Reads `length` bytes at `offset` within `piece`.
    pub fn read(&self, piece: u32, offset: u32, length: u32) -> Result<Bytes, StorageError> {
        self.ensure_not_checking("read while checking")?;

        let range = self.piece_range(piece)?;
        if offset as u64 + length as u64 > range.end - range.start {
            return Err(StorageError::InvalidBlockOffset { piece, offset });
        }

        let mut buf = vec![0u8; length as usize];
        self.index.read(range.start + offset as u64, &mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Reads a whole piece.
    pub fn read_piece(&self, piece: u32) -> Result<Bytes, StorageError> {
        let range = self.piece_range(piece)?;
        self.read(piece, 0, (range.end - range.start) as u32)
    }

    /// Verifies and stores a complete piece.
    ///
    /// Writing a piece that is already present does nothing. A piece whose
    /// length or SHA-1 does not match fails with [`StorageError::HashMismatch`]
    /// before anything is written. A recheck cannot start while a write is in
    /// flight, so a write that passed the state check always commits.
    ///
    /// Once the piece is committed, failing to sync a completed file is only
    /// logged: the data is in place and a later [`close`](Self::close) syncs
    /// again.
    pub fn write(&self, piece: u32, data: &[u8]) -> Result<(), StorageError> {
        let range = self.piece_range(piece)?;
        let gate = self.writers.read();
        {
            let progress = self.progress.lock();
            if progress.state == TorrentState::Checking {
                return Err(StorageError::IllegalState("write while checking"));
            }
            if progress.bitfield.has(piece as usize) {
                return Ok(());
            }
        }

        let hash: [u8; 20] = Sha1::digest(data).into();
        if data.len() as u64 != range.end - range.start || hash != self.pieces[piece as usize] {
            tracing::warn!(piece, length = data.len(), "piece hash mismatch");
            return Err(StorageError::HashMismatch(piece));
        }

        let spans = self.index.write(range.start, data)?;

        let finished = {
            let mut progress = self.progress.lock();
            // Another writer committed the same piece while we were on disk.
            if progress.bitfield.has(piece as usize) {
                return Ok(());
            }

            let mut finished = Vec::new();
            for span in &spans {
                progress.file_completed[span.file_index] += span.length;
                if !progress.ignored[span.file_index] {
                    progress.completed += span.length;
                }
                let file_length = self.index.files()[span.file_index].length();
                if progress.file_completed[span.file_index] == file_length {
                    finished.push(span.file_index);
                }
            }
            progress.bitfield.set(piece as usize);

            if progress.state == TorrentState::Downloading && progress.bitfield.is_complete() {
                progress.state = TorrentState::Seeding;
                tracing::debug!(root = %self.root_dir.display(), "download complete");
            }
            finished
        };
        drop(gate);

        for file_index in finished {
            let file = &self.index.files()[file_index];
            match file.sync() {
                Ok(()) => tracing::debug!(path = %file.path().display(), "file complete"),
                Err(e) => tracing::warn!(
                    path = %file.path().display(),
                    error = %e,
                    "failed to sync completed file"
                ),
            }
        }

        tracing::trace!(piece, "piece written");
        self.publish();
        Ok(())
    }

    /// Re-verifies the pieces in `pieces` against the files on disk.
    ///
    /// Missing files and short reads count as absent pieces; pieces lying
    /// entirely in ignored files are not read at all. Always leaves the
    /// storage [`TorrentState::Stopped`].
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::IllegalState`] if a recheck is already running.
    pub fn recheck(&self, pieces: Range<u32>) -> Result<(), StorageError> {
        let end = pieces.end.min(self.pieces.len() as u32);
        let start = pieces.start.min(end);

        let ignored = {
            let _gate = self.writers.write();
            let mut progress = self.progress.lock();
            if progress.state == TorrentState::Checking {
                return Err(StorageError::IllegalState("recheck already running"));
            }
            progress.state = TorrentState::Checking;
            progress
                .bitfield
                .fill_range(start as usize..end as usize, false);
            self.recount(&mut progress);
            progress.ignored.clone()
        };
        self.publish();
        tracing::debug!(start, end, "recheck started");

        let verified: Vec<u32> = (start..end)
            .filter(|&piece| self.verify(piece, &ignored))
            .collect();

        {
            let mut progress = self.progress.lock();
            for &piece in &verified {
                progress.bitfield.set(piece as usize);
            }
            self.recount(&mut progress);
            progress.state = TorrentState::Stopped;
        }
        self.publish();

        tracing::debug!(
            start,
            end,
            verified = verified.len(),
            "recheck finished"
        );
        Ok(())
    }

    /// Marks a file as ignored (or not), moving its bytes in or out of the
    /// aggregate totals immediately.
    pub fn set_ignored(&self, file_index: usize, ignored: bool) -> Result<(), StorageError> {
        {
            let mut progress = self.progress.lock();
            let current = *progress
                .ignored
                .get(file_index)
                .ok_or(StorageError::InvalidFileIndex(file_index))?;
            if current == ignored {
                return Ok(());
            }

            let length = self.index.files()[file_index].length();
            let completed = progress.file_completed[file_index];
            progress.ignored[file_index] = ignored;
            if ignored {
                progress.active_length -= length;
                progress.completed -= completed;
            } else {
                progress.active_length += length;
                progress.completed += completed;
            }
        }
        self.publish();
        Ok(())
    }

    /// Moves to [`TorrentState::Downloading`], or straight to
    /// [`TorrentState::Seeding`] if every piece is present.
    pub fn start(&self) -> Result<(), StorageError> {
        {
            let mut progress = self.progress.lock();
            if progress.state == TorrentState::Checking {
                return Err(StorageError::IllegalState("start while checking"));
            }
            progress.state = if progress.bitfield.is_complete() {
                TorrentState::Seeding
            } else {
                TorrentState::Downloading
            };
        }
        self.publish();
        Ok(())
    }

    pub fn stop(&self) -> Result<(), StorageError> {
        {
            let mut progress = self.progress.lock();
            if progress.state == TorrentState::Checking {
                return Err(StorageError::IllegalState("stop while checking"));
            }
            progress.state = TorrentState::Stopped;
        }
        self.publish();
        Ok(())
    }

    pub fn state(&self) -> TorrentState {
        self.progress.lock().state
    }

    pub fn bitfield(&self) -> Bitfield {
        self.progress.lock().bitfield.clone()
    }

    pub fn files(&self) -> Vec<FileStatus> {
        let progress = self.progress.lock();
        self.index
            .files()
            .iter()
            .enumerate()
            .map(|(i, file)| FileStatus {
                path: file.path().to_path_buf(),
                length: file.length(),
                completed: progress.file_completed[i],
                ignored: progress.ignored[i],
            })
            .collect()
    }

    /// Completed fraction of the non-ignored bytes; `1.0` when nothing is active.
    pub fn progress(&self) -> f64 {
        let progress = self.progress.lock();
        if progress.active_length == 0 {
            1.0
        } else {
            progress.completed as f64 / progress.active_length as f64
        }
    }

    /// Total length of the non-ignored files.
    pub fn length(&self) -> &Arc<Observable<u64>> {
        &self.length
    }

    /// Verified bytes within the non-ignored files.
    pub fn completed(&self) -> &Arc<Observable<u64>> {
        &self.completed
    }

    pub fn state_observable(&self) -> &Arc<Observable<TorrentState>> {
        &self.state
    }

    /// Syncs and releases every open file handle.
    pub fn close(&self) -> Result<(), StorageError> {
        self.index.close()
    }

    fn ensure_not_checking(&self, operation: &'static str) -> Result<(), StorageError> {
        if self.progress.lock().state == TorrentState::Checking {
            return Err(StorageError::IllegalState(operation));
        }
        Ok(())
    }

    fn piece_spans(&self, piece: u32) -> Vec<FileSpan> {
        self.piece_range(piece)
            .and_then(|range| self.index.spans(range.start, range.end - range.start))
            .unwrap_or_default()
    }

    fn verify(&self, piece: u32, ignored: &[bool]) -> bool {
        let spans = self.piece_spans(piece);
        if spans.iter().all(|span| ignored[span.file_index]) {
            return false;
        }

        match self.read_unchecked(piece) {
            Ok(data) => {
                let hash: [u8; 20] = Sha1::digest(&data).into();
                hash == self.pieces[piece as usize]
            }
            Err(e) => {
                tracing::trace!(piece, error = %e, "piece unreadable");
                false
            }
        }
    }

    fn read_unchecked(&self, piece: u32) -> Result<Vec<u8>, StorageError> {
        let range = self.piece_range(piece)?;
        let mut buf = vec![0u8; (range.end - range.start) as usize];
        self.index.read(range.start, &mut buf)?;
        Ok(buf)
    }

    /// Rebuilds every counter from the bitfield.
    fn recount(&self, progress: &mut Progress) {
        progress.file_completed.iter_mut().for_each(|c| *c = 0);
        let present: Vec<usize> = progress.bitfield.ones().collect();
        for piece in present {
            for span in self.piece_spans(piece as u32) {
                progress.file_completed[span.file_index] += span.length;
            }
        }

        let mut active_length = 0;
        let mut completed = 0;
        for (i, file) in self.index.files().iter().enumerate() {
            if !progress.ignored[i] {
                active_length += file.length();
                completed += progress.file_completed[i];
            }
        }
        progress.active_length = active_length;
        progress.completed = completed;
    }

    /// Mirrors the current totals and state into the observables.
    ///
    /// No lock is held while listeners run. A snapshot older than one already
    /// published is dropped; if a newer snapshot was taken while this one was
    /// being set, the loop publishes again so the latest values win.
    fn publish(&self) {
        loop {
            let (sequence, active_length, completed, state) = {
                let mut progress = self.progress.lock();
                progress.sequence += 1;
                (
                    progress.sequence,
                    progress.active_length,
                    progress.completed,
                    progress.state,
                )
            };
            if self.published.fetch_max(sequence, Ordering::AcqRel) > sequence {
                return;
            }

            self.length.set(active_length);
            self.completed.set(completed);
            self.state.set(state);

            if self.published.load(Ordering::Acquire) == sequence {
                return;
            }
        }
    }
}

impl std::fmt::Debug for TorrentStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorrentStorage")
            .field("root_dir", &self.root_dir)
            .field("pieces", &self.pieces.len())
            .field("files", &self.index.len())
            .field("state", &self.state())
            .finish()
    }
}
