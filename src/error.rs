//! Error types for songlib

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not in library: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Path already tracked: {}", .0.display())]
    Collision(PathBuf),

    #[error("File not ready: {}", .0.display())]
    NotReady(PathBuf),

    #[error("Unsupported file: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl LibraryError {
    /// Errors worth retrying later: the file exists but cannot be read yet.
    pub fn is_transient(&self) -> bool {
        match self {
            LibraryError::NotReady(_) => true,
            LibraryError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LibraryError::NotReady(PathBuf::from("/a.mp3")).is_transient());
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(LibraryError::Io(denied).is_transient());
        let gone = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(!LibraryError::Io(gone).is_transient());
        assert!(!LibraryError::NotFound(PathBuf::from("/a.mp3")).is_transient());
    }
}
