// FILE: src/library/roots.rs
//! Bulk root operations, driven one song at a time.
//!
//! Both operations are iterators. Each `next()` processes exactly one song
//! and yields a progress marker, so a caller can interleave them with other
//! work or stop early. Stopping early leaves processed songs in their new
//! state and untouched songs as they were. The batched notification goes out
//! when the iterator is exhausted or dropped, whichever comes first.

use super::rewrite::PathRewriter;
use super::{FileLibrary, LibraryEvent, Rename};
use crate::core::paths::{is_under, normalize_path};
use crate::core::song::Song;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootStep {
    Moved { from: PathBuf, to: PathBuf, persisted: bool },
    Removed { path: PathBuf },
    Skipped { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub step: RootStep,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }
}

pub struct MoveRoot<'a> {
    library: &'a mut FileLibrary,
    rewriter: PathRewriter,
    pending: std::vec::IntoIter<PathBuf>,
    total: usize,
    done: usize,
    renamed: Vec<Rename>,
    failed_writes: usize,
}

impl<'a> MoveRoot<'a> {
    fn new(library: &'a mut FileLibrary, old_root: &Path, new_root: &Path) -> Self {
        let rewriter = PathRewriter::new(old_root, new_root);
        let keys = library.keys_under(rewriter.old_root());
        tracing::info!(
            "[Library] Moving {} songs from {} to {}",
            keys.len(),
            rewriter.old_root().display(),
            rewriter.new_root().display()
        );
        Self {
            library,
            rewriter,
            total: keys.len(),
            pending: keys.into_iter(),
            done: 0,
            renamed: Vec::new(),
            failed_writes: 0,
        }
    }

    fn flush(&mut self) {
        if self.renamed.is_empty() {
            return;
        }
        let renamed = std::mem::take(&mut self.renamed);
        tracing::info!(
            "[Library] Moved {} songs to {} ({} not written)",
            renamed.len(),
            self.rewriter.new_root().display(),
            self.failed_writes
        );
        self.library.emit(LibraryEvent::Renamed(renamed));
    }
}

impl Iterator for MoveRoot<'_> {
    type Item = Progress;

    fn next(&mut self) -> Option<Progress> {
        let Some(key) = self.pending.next() else {
            self.flush();
            return None;
        };
        self.done += 1;

        // The index may have changed since the snapshot; re-check each step.
        let step = if !self.library.contains(&key) {
            RootStep::Skipped { path: key, reason: "no longer in library".to_string() }
        } else {
            match self.rewriter.apply(self.library, &key) {
                Ok(rewritten) => {
                    if !rewritten.persisted {
                        self.failed_writes += 1;
                    }
                    let step = RootStep::Moved {
                        from: rewritten.from.clone(),
                        to: rewritten.song.key().to_path_buf(),
                        persisted: rewritten.persisted,
                    };
                    self.renamed.push(Rename { from: rewritten.from, song: rewritten.song });
                    step
                }
                Err(e) => {
                    tracing::warn!("[Library] Skipping {}: {}", key.display(), e);
                    RootStep::Skipped { path: key, reason: e.to_string() }
                }
            }
        };

        Some(Progress { done: self.done, total: self.total, step })
    }
}

impl Drop for MoveRoot<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

pub struct RemoveRoots<'a> {
    library: &'a mut FileLibrary,
    pending: std::vec::IntoIter<PathBuf>,
    total: usize,
    done: usize,
    removed: Vec<Song>,
}

impl<'a> RemoveRoots<'a> {
    fn new(library: &'a mut FileLibrary, roots: &[PathBuf]) -> Self {
        let roots: Vec<PathBuf> = roots.iter().map(|r| normalize_path(r)).collect();
        let keys: Vec<PathBuf> = library
            .keys()
            .filter(|key| roots.iter().any(|root| is_under(key, root)))
            .map(Path::to_path_buf)
            .collect();
        tracing::info!("[Library] Removing {} songs under {} roots", keys.len(), roots.len());
        Self {
            library,
            total: keys.len(),
            pending: keys.into_iter(),
            done: 0,
            removed: Vec::new(),
        }
    }

    fn flush(&mut self) {
        if self.removed.is_empty() {
            return;
        }
        let removed = std::mem::take(&mut self.removed);
        tracing::info!("[Library] Removed {} songs", removed.len());
        self.library.emit(LibraryEvent::Removed(removed));
    }
}

impl Iterator for RemoveRoots<'_> {
    type Item = Progress;

    fn next(&mut self) -> Option<Progress> {
        let Some(key) = self.pending.next() else {
            self.flush();
            return None;
        };
        self.done += 1;

        let step = match self.library.take(&key) {
            Some(song) => {
                self.removed.push(song);
                RootStep::Removed { path: key }
            }
            None => RootStep::Skipped { path: key, reason: "no longer in library".to_string() },
        };
        Some(Progress { done: self.done, total: self.total, step })
    }
}

impl Drop for RemoveRoots<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

impl FileLibrary {
    /// Relocate every live song under `old_root` to `new_root`.
    pub fn move_root(&mut self, old_root: &Path, new_root: &Path) -> MoveRoot<'_> {
        MoveRoot::new(self, old_root, new_root)
    }

    /// Evict every live song under any of `roots`. This is a real deletion,
    /// unlike masking.
    pub fn remove_roots(&mut self, roots: &[PathBuf]) -> RemoveRoots<'_> {
        RemoveRoots::new(self, roots)
    }
}
