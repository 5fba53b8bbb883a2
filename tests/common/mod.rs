// Shared fixtures for the integration tests.
#![allow(dead_code)]

use songlib::{FileLibrary, FileStat, LibraryError, LibraryEvent, MountTable, Result, Song, SongIo};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Default)]
pub struct FakeState {
    /// path -> (mtime, size) for files that "exist".
    pub files: BTreeMap<PathBuf, (u64, u64)>,
    pub unmounted: HashSet<PathBuf>,
    /// Roots whose files refuse location writes (read-only media).
    pub read_only: Vec<PathBuf>,
    pub written: Vec<(PathBuf, PathBuf)>,
}

/// `SongIo` over an in-memory file table. Clones share state, so a test
/// keeps one handle while the library owns another.
#[derive(Default, Clone)]
pub struct FakeIo {
    pub state: Rc<RefCell<FakeState>>,
}

impl FakeIo {
    pub fn put(&self, path: &str, mtime: u64, size: u64) {
        self.state.borrow_mut().files.insert(path.into(), (mtime, size));
    }

    pub fn unmount(&self, mount_point: &str) {
        self.state.borrow_mut().unmounted.insert(mount_point.into());
    }

    pub fn make_read_only(&self, root: &str) {
        self.state.borrow_mut().read_only.push(root.into());
    }

    pub fn written(&self) -> Vec<(PathBuf, PathBuf)> {
        self.state.borrow().written.clone()
    }
}

impl SongIo for FakeIo {
    fn read_song(&self, path: &Path) -> Result<Song> {
        match self.state.borrow().files.get(path) {
            Some(&(mtime, size)) => Ok(Song::new(path).with_stat(mtime, size)),
            None => Err(LibraryError::Io(std::io::ErrorKind::NotFound.into())),
        }
    }

    fn is_mounted(&self, song: &Song) -> bool {
        song.mountpoint()
            .map_or(true, |m| !self.state.borrow().unmounted.contains(m))
    }

    fn write_location(&self, song: &Song, new_path: &Path) -> Result<FileStat> {
        let mut state = self.state.borrow_mut();
        if state.read_only.iter().any(|root| new_path.starts_with(root)) {
            return Err(LibraryError::Io(std::io::ErrorKind::PermissionDenied.into()));
        }
        state.written.push((song.path().to_path_buf(), new_path.to_path_buf()));
        // Writing touches the file.
        let stat = FileStat { mtime: song.mtime + 1, size: song.size };
        state.files.insert(new_path.to_path_buf(), (stat.mtime, stat.size));
        Ok(stat)
    }

    fn is_valid(&self, song: &Song) -> bool {
        self.state.borrow().files.get(song.path()).map(|&(m, _)| m) == Some(song.mtime)
    }
}

pub fn fake_library(mount_roots: &[&str]) -> (FileLibrary, FakeIo) {
    let io = FakeIo::default();
    let lib = FileLibrary::new("test", Box::new(io.clone()), MountTable::new(mount_roots.iter().copied()));
    (lib, io)
}

pub fn songs(paths: &[&str]) -> Vec<Song> {
    paths.iter().map(|p| Song::new(*p)).collect()
}

pub fn drain(rx: &mut UnboundedReceiver<LibraryEvent>) -> Vec<LibraryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
