// FILE: src/core/song_io.rs
//! The boundary between the catalog and the files it describes.
//!
//! Everything that touches a song's backing file goes through [`SongIo`]:
//! probing a new file, asking whether its volume is reachable, and
//! persisting a new location after a root move.

use crate::core::bouncer::Bouncer;
use crate::core::mount_table::is_mount;
use crate::core::song::Song;
use crate::error::{LibraryError, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// mtime (unix seconds) and size of a backing file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub mtime: u64,
    pub size: u64,
}

pub trait SongIo {
    /// Probe a file on disk and build a catalog entry for it.
    ///
    /// Returns `NotReady` while the file is still being written.
    fn read_song(&self, path: &Path) -> Result<Song>;

    /// Whether the storage behind the song is currently reachable.
    fn is_mounted(&self, song: &Song) -> bool;

    /// Persist the song's new location to its backing file. `song` is still
    /// at its old path. Returns the file's stat after the write.
    fn write_location(&self, song: &Song, new_path: &Path) -> Result<FileStat>;

    /// Whether the catalog entry still matches the file on disk.
    fn is_valid(&self, song: &Song) -> bool;
}

/// Plain filesystem implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSongIo;

pub(crate) fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl SongIo for FsSongIo {
    fn read_song(&self, path: &Path) -> Result<Song> {
        if !Bouncer::is_media(path) {
            return Err(LibraryError::Unsupported(path.to_path_buf()));
        }

        let metadata = std::fs::symlink_metadata(path)?;
        if !metadata.is_file() {
            return Err(LibraryError::Unsupported(path.to_path_buf()));
        }

        // A freshly created file shows up empty before the writer flushes.
        if metadata.len() == 0 {
            return Err(LibraryError::NotReady(path.to_path_buf()));
        }

        match OpenOptions::new().read(true).open(path) {
            Ok(_file) => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock) => {
                return Err(LibraryError::NotReady(path.to_path_buf()));
            }
            Err(e) => return Err(LibraryError::Io(e)),
        }

        let mtime = metadata.modified().map(unix_secs).unwrap_or(0);
        let mut song = Song::new(path).with_stat(mtime, metadata.len());
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            song.tags.insert("title".to_string(), stem.to_string());
        }
        Ok(song)
    }

    fn is_mounted(&self, song: &Song) -> bool {
        match song.mountpoint() {
            None => true,
            Some(mountpoint) => is_mount(mountpoint),
        }
    }

    fn write_location(&self, song: &Song, new_path: &Path) -> Result<FileStat> {
        let file = OpenOptions::new().write(true).open(new_path)?;
        file.set_modified(SystemTime::now())?;
        let meta = file.metadata()?;
        tracing::debug!("[SongIo] Wrote location for {} -> {}", song.path().display(), new_path.display());
        Ok(FileStat {
            mtime: meta.modified().map(unix_secs).unwrap_or(0),
            size: meta.len(),
        })
    }

    fn is_valid(&self, song: &Song) -> bool {
        match std::fs::metadata(song.path()) {
            Ok(meta) => meta.modified().map(unix_secs).unwrap_or(0) == song.mtime,
            Err(_) => false,
        }
    }
}
