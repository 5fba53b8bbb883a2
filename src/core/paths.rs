// FILE: src/core/paths.rs
//! Path helpers shared by the library and the watcher.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: make it absolute against the current
/// directory and fold `.` and `..` components. Never touches the disk, so
/// it works for files that are already gone.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True if `path` lies inside `root` (or is `root`).
///
/// Component-wise, so `/music2/a.mp3` is NOT under `/music`.
pub fn is_under(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Rebase `path` from `old_root` onto `new_root`, keeping the relative part.
pub fn rebase(path: &Path, old_root: &Path, new_root: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(old_root).ok()?;
    if relative.as_os_str().is_empty() {
        return Some(new_root.to_path_buf());
    }
    Some(new_root.join(relative))
}
