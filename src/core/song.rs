// FILE: src/core/song.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A file-backed library entry, keyed by its absolute path.
///
/// The path is only changed through the library's re-key operation, so the
/// key and the item never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    path: PathBuf,
    mountpoint: Option<PathBuf>,
    pub mtime: u64,
    pub size: u64,
    pub tags: BTreeMap<String, String>,
}

impl Song {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mountpoint: None,
            mtime: 0,
            size: 0,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_stat(mut self, mtime: u64, size: u64) -> Self {
        self.mtime = mtime;
        self.size = size;
        self
    }

    pub fn with_mountpoint(mut self, mountpoint: Option<PathBuf>) -> Self {
        self.mountpoint = mountpoint;
        self
    }

    pub fn key(&self) -> &Path {
        &self.path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mountpoint(&self) -> Option<&Path> {
        self.mountpoint.as_deref()
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    pub(crate) fn set_mountpoint(&mut self, mountpoint: Option<PathBuf>) {
        self.mountpoint = mountpoint;
    }
}

impl std::fmt::Display for Song {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (size: {})", self.path.display(), self.size)
    }
}
