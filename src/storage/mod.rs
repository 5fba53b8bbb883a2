// FILE: src/storage/mod.rs
pub mod connection;
pub mod repository;

pub use connection::{open_catalog, open_in_memory};
pub use repository::Repository;

use crate::error::Result;
use crate::library::FileLibrary;
use rusqlite::Connection;

/// Cold-start the library from the catalog. Songs on unreachable volumes
/// end up masked.
pub fn load_library(library: &mut FileLibrary, conn: &mut Connection) -> Result<usize> {
    let songs = Repository::new(conn).load_all()?;
    let count = songs.len();
    library.load_init(songs);
    Ok(count)
}

/// Persist live and masked songs alike.
pub fn save_library(library: &mut FileLibrary, conn: &mut Connection) -> Result<usize> {
    let written = Repository::new(conn).replace_all(library.get_content())?;
    library.mark_clean();
    tracing::info!("[Catalog] Saved {} songs", written);
    Ok(written)
}
