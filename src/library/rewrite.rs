// FILE: src/library/rewrite.rs
use super::FileLibrary;
use crate::core::paths::{normalize_path, rebase};
use crate::core::song::Song;
use crate::error::{LibraryError, Result};
use std::path::{Path, PathBuf};

/// Result of relocating one song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub from: PathBuf,
    pub song: Song,
    /// False when the backing file could not be updated (read-only medium,
    /// file not at the new location yet). The index is updated regardless.
    pub persisted: bool,
}

/// Rewrites song paths from one root to another.
#[derive(Debug, Clone)]
pub struct PathRewriter {
    old_root: PathBuf,
    new_root: PathBuf,
}

impl PathRewriter {
    pub fn new(old_root: &Path, new_root: &Path) -> Self {
        Self {
            old_root: normalize_path(old_root),
            new_root: normalize_path(new_root),
        }
    }

    pub fn old_root(&self) -> &Path {
        &self.old_root
    }

    pub fn new_root(&self) -> &Path {
        &self.new_root
    }

    /// `old_root/rel` -> `new_root/rel`, or None if the path is elsewhere.
    pub fn target(&self, path: &Path) -> Option<PathBuf> {
        rebase(path, &self.old_root, &self.new_root)
    }

    /// Move one song to its rewritten path and try to persist the change.
    pub fn apply(&self, library: &mut FileLibrary, key: &Path) -> Result<Rewritten> {
        let target = self
            .target(key)
            .ok_or_else(|| LibraryError::InvalidPath(format!("{} is not under {}", key.display(), self.old_root.display())))?;

        // The backing file learns its new location from the song as it was.
        let original = library
            .get(key)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(key.to_path_buf()))?;
        let mut song = library.rekey_silent(key, &target)?.clone();

        let written = library.io().write_location(&original, &target);
        let persisted = match written {
            Ok(stat) => {
                if let Some(moved) = library.items.get_mut(&target) {
                    moved.mtime = stat.mtime;
                    moved.size = stat.size;
                    song = moved.clone();
                }
                true
            }
            Err(e) => {
                tracing::warn!("[Library] Could not persist new location for {}: {}", target.display(), e);
                false
            }
        };

        Ok(Rewritten {
            from: key.to_path_buf(),
            song,
            persisted,
        })
    }
}
