// FILE: src/storage/repository.rs
use rusqlite::{params, Connection};
use crate::core::song::Song;
use crate::error::{LibraryError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub(crate) fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(r#"
        CREATE TABLE IF NOT EXISTS songs (
            path TEXT PRIMARY KEY,
            mountpoint TEXT,
            mtime INTEGER NOT NULL DEFAULT 0,
            size INTEGER NOT NULL DEFAULT 0,
            tags TEXT NOT NULL DEFAULT '{}',
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#).map_err(LibraryError::Database)?;
    tracing::debug!("[Catalog] Ensured songs table");
    Ok(())
}

pub struct Repository<'a> {
    conn: &'a mut Connection,
}

impl<'a> Repository<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Replace the stored catalog with `songs` in a single transaction.
    pub fn replace_all<'s, I>(&mut self, songs: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'s Song>,
    {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM songs", [])?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO songs (path, mountpoint, mtime, size, tags) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for song in songs {
                let path = song.path().to_string_lossy().into_owned();
                let mountpoint = song.mountpoint().map(|m| m.to_string_lossy().into_owned());
                let tags = serde_json::to_string(&song.tags)?;
                stmt.execute(params![path, mountpoint, song.mtime as i64, song.size as i64, tags])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn load_all(&self) -> Result<Vec<Song>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, mountpoint, mtime, size, tags FROM songs ORDER BY path",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)? as u64,
                row.get::<_, i64>(3)? as u64,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut songs = Vec::new();
        for row in rows {
            let (path, mountpoint, mtime, size, tags) = row?;
            let mut song = Song::new(PathBuf::from(path))
                .with_stat(mtime, size)
                .with_mountpoint(mountpoint.map(PathBuf::from));
            song.tags = match serde_json::from_str::<BTreeMap<String, String>>(&tags) {
                Ok(tags) => tags,
                Err(e) => {
                    tracing::warn!("[Catalog] Bad tags for {}: {}", song.path().display(), e);
                    BTreeMap::new()
                }
            };
            songs.push(song);
        }
        Ok(songs)
    }

    pub fn count(&self) -> Result<u64> {
        let count = self.conn.query_row("SELECT COUNT(*) FROM songs", [], |row| row.get::<_, i64>(0))?;
        Ok(count as u64)
    }
}
