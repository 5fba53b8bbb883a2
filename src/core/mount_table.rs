// FILE: src/core/mount_table.rs
//! Configured mount roots and the "is this actually mounted" probe.

use std::path::{Path, PathBuf};

/// The set of configured mount roots (removable volumes, network shares).
///
/// A song's mount point is the longest configured root containing its path.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    roots: Vec<PathBuf>,
}

impl MountTable {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut roots: Vec<PathBuf> = roots.into_iter().map(Into::into).collect();
        roots.sort();
        roots.dedup();
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Finds the longest-prefix mount root that contains the path.
    pub fn lookup(&self, path: &Path) -> Option<&Path> {
        let mut best: Option<&Path> = None;
        let mut best_len = 0;

        for root in &self.roots {
            if path.starts_with(root) {
                let len = root.as_os_str().len();
                if best.is_none() || len > best_len {
                    best_len = len;
                    best = Some(root.as_path());
                }
            }
        }

        best
    }
}

/// The directory sits on a different device
/// than its parent, or is the filesystem root.
#[cfg(unix)]
pub fn is_mount(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return false;
    };
    if !meta.is_dir() {
        return false;
    }
    let parent = path.join("..");
    let Ok(parent_meta) = std::fs::metadata(&parent) else {
        return false;
    };
    meta.dev() != parent_meta.dev() || meta.ino() == parent_meta.ino()
}

#[cfg(not(unix))]
pub fn is_mount(path: &Path) -> bool {
    path.is_dir()
}
