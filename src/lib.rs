//! songlib: a file-backed song catalog
//!
//! Tracks media files under a set of roots and keeps the catalog in step
//! with the disk:
//! - Library (live index + masked shadow index for unplugged volumes)
//! - Root operations (bulk move / bulk remove, driven step by step)
//! - Librarian (background watcher - reconciles filesystem events)

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod librarian;
pub mod library;
pub mod storage;

pub use config::LibraryConfig;
pub use core::mount_table::MountTable;
pub use core::song::Song;
pub use core::song_io::{FileStat, FsSongIo, SongIo};
pub use error::{LibraryError, Result};
pub use librarian::Librarian;
pub use library::{FileLibrary, LibraryEvent, Progress, ReloadOutcome, Rename, RootStep};
pub use storage::{load_library, open_catalog, save_library};
