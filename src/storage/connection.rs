//! Catalog connection management
//!
//! Opens (and creates, if needed) the SQLite catalog that stores the song
//! library between runs.

use rusqlite::Connection;
use crate::error::{LibraryError, Result};
use std::path::Path;

/// Open the catalog at `db_path`, creating parent directories and tables.
pub fn open_catalog(db_path: &Path) -> Result<Connection> {
    if let Some(db_dir) = db_path.parent() {
        if !db_dir.as_os_str().is_empty() {
            std::fs::create_dir_all(db_dir).map_err(LibraryError::Io)?;
        }
    }

    let conn = Connection::open(db_path).map_err(LibraryError::Database)?;
    configure(&conn)?;
    super::repository::create_tables(&conn)?;

    tracing::info!("[Catalog] Opened {}", db_path.display());
    Ok(conn)
}

/// In-memory catalog, used by tests and dry runs.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    super::repository::create_tables(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    // Enable WAL mode for better concurrent access
    conn.pragma_update(None, "journal_mode", WAL)?;

    // Optimize for performance
    conn.pragma_update(None, "synchronous", NORMAL)?;
    Ok(())
}

// SQL pragma constants
const WAL: &str = "WAL";
const NORMAL: &str = "NORMAL";
