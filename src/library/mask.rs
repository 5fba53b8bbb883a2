// FILE: src/library/mask.rs
//! Mount-point masking.
//!
//! When a volume goes away its songs move from the live index into a shadow
//! bucket keyed by mount point. They are hidden, never deleted, and come
//! back in one piece on unmask.

use super::{FileLibrary, LibraryEvent};
use crate::core::paths::normalize_path;
use crate::core::song::Song;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Mount point -> masked songs. Buckets are kept in insertion order and a
/// bucket only exists while it holds at least one song.
#[derive(Debug, Default)]
pub struct MaskRegistry {
    buckets: Vec<(PathBuf, BTreeMap<PathBuf, Song>)>,
}

impl MaskRegistry {
    pub fn insert(&mut self, mount_point: PathBuf, song: Song) {
        let key = song.key().to_path_buf();
        match self.buckets.iter_mut().find(|(mp, _)| *mp == mount_point) {
            Some((_, songs)) => {
                songs.insert(key, song);
            }
            None => {
                let mut songs = BTreeMap::new();
                songs.insert(key, song);
                self.buckets.push((mount_point, songs));
            }
        }
    }

    /// Detach a whole bucket.
    pub fn take(&mut self, mount_point: &Path) -> Option<BTreeMap<PathBuf, Song>> {
        let idx = self.buckets.iter().position(|(mp, _)| mp == mount_point)?;
        Some(self.buckets.remove(idx).1)
    }

    /// Drop one song, and its bucket if that empties it.
    pub fn remove(&mut self, key: &Path) -> Option<Song> {
        let idx = self.buckets.iter().position(|(_, songs)| songs.contains_key(key))?;
        let song = self.buckets[idx].1.remove(key);
        if self.buckets[idx].1.is_empty() {
            self.buckets.remove(idx);
        }
        song
    }

    pub fn contains(&self, key: &Path) -> bool {
        self.buckets.iter().any(|(_, songs)| songs.contains_key(key))
    }

    pub fn get(&self, mount_point: &Path) -> Vec<&Song> {
        self.buckets
            .iter()
            .find(|(mp, _)| mp == mount_point)
            .map(|(_, songs)| songs.values().collect())
            .unwrap_or_default()
    }

    pub fn mount_points(&self) -> Vec<&Path> {
        self.buckets.iter().map(|(mp, _)| mp.as_path()).collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|(_, songs)| songs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.buckets.iter().flat_map(|(_, songs)| songs.values())
    }
}

impl FileLibrary {
    /// Hide every live song on `mount_point`. No-op if none match.
    pub fn mask(&mut self, mount_point: &Path) {
        let mount_point = normalize_path(mount_point);
        let keys: Vec<PathBuf> = self
            .items
            .values()
            .filter(|song| song.mountpoint() == Some(mount_point.as_path()))
            .map(|song| song.key().to_path_buf())
            .collect();
        if keys.is_empty() {
            tracing::debug!("[Library] Nothing to mask under {}", mount_point.display());
            return;
        }

        let mut songs = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(song) = self.items.remove(&key) {
                self.masked.insert(mount_point.clone(), song.clone());
                songs.push(song);
            }
        }
        tracing::info!("[Library] Masked {} songs under {}", songs.len(), mount_point.display());
        self.emit(LibraryEvent::Masked { mount_point, songs });
    }

    /// Bring back everything hidden under `mount_point`. Unknown mount
    /// points are ignored.
    pub fn unmask(&mut self, mount_point: &Path) {
        let mount_point = normalize_path(mount_point);
        let Some(bucket) = self.masked.take(&mount_point) else {
            return;
        };

        let mut songs = Vec::with_capacity(bucket.len());
        for (key, song) in bucket {
            if self.items.contains_key(&key) {
                // Re-added while hidden; the live copy is newer.
                tracing::debug!("[Library] Dropping stale masked copy of {}", key.display());
                continue;
            }
            self.items.insert(key, song.clone());
            songs.push(song);
        }
        tracing::info!("[Library] Unmasked {} songs under {}", songs.len(), mount_point.display());
        self.emit(LibraryEvent::Unmasked { mount_point, songs });
    }

    /// Whether the song with this key is currently hidden.
    pub fn masked(&self, key: &Path) -> bool {
        self.masked.contains(key)
    }

    pub fn get_masked(&self, mount_point: &Path) -> Vec<&Song> {
        self.masked.get(&normalize_path(mount_point))
    }

    pub fn masked_mount_points(&self) -> Vec<&Path> {
        self.masked.mount_points()
    }

    pub fn masked_count(&self) -> usize {
        self.masked.len()
    }

    /// Forget a single masked song, e.g. one whose file was replaced on disk.
    pub fn forget_masked(&mut self, key: &Path) -> Option<Song> {
        let song = self.masked.remove(&normalize_path(key))?;
        tracing::debug!("[Library] Forgot masked {}", song.key().display());
        self.emit(LibraryEvent::Removed(vec![song.clone()]));
        Some(song)
    }

    /// Forget everything hidden under `mount_point` for good.
    pub fn remove_masked(&mut self, mount_point: &Path) {
        let mount_point = normalize_path(mount_point);
        let Some(bucket) = self.masked.take(&mount_point) else {
            return;
        };
        let songs: Vec<Song> = bucket.into_values().collect();
        tracing::info!("[Library] Forgot {} masked songs under {}", songs.len(), mount_point.display());
        self.emit(LibraryEvent::Removed(songs));
    }
}
