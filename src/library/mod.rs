// FILE: src/library/mod.rs
//! The file-backed song library.
//!
//! Holds the live index (path -> song), the masked shadow index for songs
//! whose volume is unreachable, and the subscriber list that receives
//! batched change notifications.

pub mod mask;
pub mod rewrite;
pub mod roots;
pub mod scan;

pub use mask::MaskRegistry;
pub use rewrite::{PathRewriter, Rewritten};
pub use roots::{MoveRoot, Progress, RemoveRoots, RootStep};
pub use scan::ScanReport;

use crate::core::mount_table::MountTable;
use crate::core::paths::{is_under, normalize_path};
use crate::core::song::Song;
use crate::core::song_io::{FsSongIo, SongIo};
use crate::error::{LibraryError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// A key-changing update: the song now lives at `song.path()`, it used to
/// live at `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: PathBuf,
    pub song: Song,
}

/// Batched change notifications. One event per operation, never one per song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    Added(Vec<Song>),
    Changed(Vec<Song>),
    Removed(Vec<Song>),
    Renamed(Vec<Rename>),
    /// Songs hidden because their volume went away. Not a deletion.
    Masked { mount_point: PathBuf, songs: Vec<Song> },
    Unmasked { mount_point: PathBuf, songs: Vec<Song> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Unchanged,
    Changed,
    Removed,
    Masked,
}

/// Per-item result of a reload before notifications go out.
enum Reloaded {
    Unchanged,
    Changed(Song),
    Removed(Song),
    Masked(PathBuf, Song),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    pub checked: usize,
    pub changed: usize,
    pub removed: usize,
    pub masked: usize,
}

pub struct FileLibrary {
    name: String,
    items: BTreeMap<PathBuf, Song>,
    masked: MaskRegistry,
    mounts: MountTable,
    exclude: Vec<PathBuf>,
    io: Box<dyn SongIo>,
    subscribers: Vec<UnboundedSender<LibraryEvent>>,
    dirty: bool,
}

impl FileLibrary {
    pub fn new(name: impl Into<String>, io: Box<dyn SongIo>, mounts: MountTable) -> Self {
        Self {
            name: name.into(),
            items: BTreeMap::new(),
            masked: MaskRegistry::default(),
            mounts,
            exclude: Vec::new(),
            io,
            subscribers: Vec::new(),
            dirty: false,
        }
    }

    /// Library backed by the real filesystem.
    pub fn with_fs(name: impl Into<String>, mounts: MountTable) -> Self {
        Self::new(name, Box::new(FsSongIo), mounts)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn io(&self) -> &dyn SongIo {
        self.io.as_ref()
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    pub fn set_exclude(&mut self, exclude: Vec<PathBuf>) {
        self.exclude = exclude.iter().map(|p| normalize_path(p)).collect();
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|root| is_under(path, root))
    }

    /// Register an observer. Dropping the receiver unsubscribes it.
    pub fn subscribe(&mut self) -> UnboundedReceiver<LibraryEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn emit(&mut self, event: LibraryEvent) {
        let empty = match &event {
            LibraryEvent::Added(s) | LibraryEvent::Changed(s) | LibraryEvent::Removed(s) => s.is_empty(),
            LibraryEvent::Renamed(r) => r.is_empty(),
            LibraryEvent::Masked { songs, .. } | LibraryEvent::Unmasked { songs, .. } => songs.is_empty(),
        };
        if empty {
            return;
        }
        self.dirty = true;
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// True when the catalog changed since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // ---- live index queries ----

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &Path) -> bool {
        self.items.contains_key(key)
    }

    pub fn get(&self, key: &Path) -> Option<&Song> {
        self.items.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.items.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Path> {
        self.items.keys().map(PathBuf::as_path)
    }

    pub fn contains_filename(&self, path: &Path) -> bool {
        self.items.contains_key(&normalize_path(path))
    }

    pub fn get_filename(&self, path: &Path) -> Option<&Song> {
        self.items.get(&normalize_path(path))
    }

    /// Everything the library knows about, live and masked.
    pub fn get_content(&self) -> Vec<&Song> {
        self.items.values().chain(self.masked.iter()).collect()
    }

    /// Live or masked.
    pub fn knows(&self, key: &Path) -> bool {
        self.items.contains_key(key) || self.masked.contains(key)
    }

    pub(crate) fn keys_under(&self, root: &Path) -> Vec<PathBuf> {
        self.items.keys().filter(|k| is_under(k, root)).cloned().collect()
    }

    fn attach(&self, mut song: Song) -> Song {
        let key = normalize_path(song.path());
        let mountpoint = self.mounts.lookup(&key).map(Path::to_path_buf);
        song.set_path(key);
        song.set_mountpoint(mountpoint);
        song
    }

    /// Shadow bucket for a song whose volume is gone.
    fn mask_key(song: &Song) -> PathBuf {
        song.mountpoint().map_or_else(|| PathBuf::from("/"), Path::to_path_buf)
    }

    // ---- mutation ----

    /// Add songs to the live index. Paths already known (live or masked)
    /// are skipped. Returns what was actually added.
    pub fn add(&mut self, songs: Vec<Song>) -> Vec<Song> {
        let mut added = Vec::new();
        for song in songs {
            let song = self.attach(song);
            if self.knows(song.key()) {
                tracing::debug!("[Library] Already tracked, skipping: {}", song.key().display());
                continue;
            }
            self.items.insert(song.key().to_path_buf(), song.clone());
            added.push(song);
        }
        if !added.is_empty() {
            tracing::debug!("[Library] {}: added {} songs", self.name, added.len());
        }
        self.emit(LibraryEvent::Added(added.clone()));
        added
    }

    /// Remove songs from the live index. Unknown keys are ignored.
    pub fn remove<P: AsRef<Path>>(&mut self, keys: &[P]) -> Vec<Song> {
        let removed: Vec<Song> = keys
            .iter()
            .filter_map(|k| self.items.remove(k.as_ref()))
            .collect();
        if !removed.is_empty() {
            tracing::debug!("[Library] {}: removed {} songs", self.name, removed.len());
        }
        self.emit(LibraryEvent::Removed(removed.clone()));
        removed
    }

    pub(crate) fn take(&mut self, key: &Path) -> Option<Song> {
        self.items.remove(key)
    }

    /// Announce that songs were modified in place.
    pub fn changed<P: AsRef<Path>>(&mut self, keys: &[P]) -> Result<()> {
        let mut songs = Vec::with_capacity(keys.len());
        for key in keys {
            let song = self
                .items
                .get(key.as_ref())
                .ok_or_else(|| LibraryError::NotFound(key.as_ref().to_path_buf()))?;
            songs.push(song.clone());
        }
        self.emit(LibraryEvent::Changed(songs));
        Ok(())
    }

    /// Edit a song's metadata. The key cannot be changed this way.
    pub fn edit_tags<F>(&mut self, key: &Path, edit: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let song = self
            .items
            .get_mut(key)
            .ok_or_else(|| LibraryError::NotFound(key.to_path_buf()))?;
        edit(&mut song.tags);
        let song = song.clone();
        self.emit(LibraryEvent::Changed(vec![song]));
        Ok(())
    }

    /// Key-changing update without notification. The song is never absent
    /// from the index between the two map operations as seen by callers.
    pub(crate) fn rekey_silent(&mut self, from: &Path, to: &Path) -> Result<&Song> {
        if !self.items.contains_key(from) {
            return Err(LibraryError::NotFound(from.to_path_buf()));
        }
        if from != to && self.knows(to) {
            return Err(LibraryError::Collision(to.to_path_buf()));
        }
        let mut song = self
            .items
            .remove(from)
            .ok_or_else(|| LibraryError::NotFound(from.to_path_buf()))?;
        song.set_path(to.to_path_buf());
        song.set_mountpoint(self.mounts.lookup(to).map(Path::to_path_buf));
        let key = to.to_path_buf();
        Ok(self.items.entry(key).or_insert(song))
    }

    /// Change a song's key in place. Emits a single `Renamed`.
    pub fn rekey(&mut self, from: &Path, to: &Path) -> Result<()> {
        let from = normalize_path(from);
        let to = normalize_path(to);
        let song = self.rekey_silent(&from, &to)?.clone();
        tracing::debug!("[Library] Renamed {} -> {}", from.display(), to.display());
        self.emit(LibraryEvent::Renamed(vec![Rename { from, song }]));
        Ok(())
    }

    /// Probe a single file and add it if it is not known yet.
    pub fn add_filename(&mut self, path: &Path) -> Result<Option<Song>> {
        let key = normalize_path(path);
        if self.knows(&key) || self.is_excluded(&key) {
            return Ok(None);
        }
        let song = self.io.read_song(&key)?;
        let added = self.add(vec![song]);
        Ok(added.into_iter().next())
    }

    /// Cold-start load. Songs on unreachable volumes go straight to the
    /// shadow index; nothing is announced.
    pub fn load_init(&mut self, songs: Vec<Song>) {
        let mut live = 0;
        let mut hidden = 0;
        for song in songs {
            let song = self.attach(song);
            if self.knows(song.key()) {
                continue;
            }
            if self.io.is_mounted(&song) {
                self.items.insert(song.key().to_path_buf(), song);
                live += 1;
            } else {
                self.masked.insert(Self::mask_key(&song), song);
                hidden += 1;
            }
        }
        tracing::info!("[Library] {}: loaded {} songs ({} masked)", self.name, live, hidden);
    }

    fn reload_entry(&mut self, key: &Path) -> Result<Reloaded> {
        let current = self
            .items
            .get(key)
            .ok_or_else(|| LibraryError::NotFound(key.to_path_buf()))?;

        match self.io.read_song(key) {
            Ok(fresh) => {
                if fresh.mtime == current.mtime && fresh.size == current.size {
                    return Ok(Reloaded::Unchanged);
                }
                let mut updated = current.clone();
                updated.mtime = fresh.mtime;
                updated.size = fresh.size;
                updated.tags.extend(fresh.tags);
                self.items.insert(key.to_path_buf(), updated.clone());
                Ok(Reloaded::Changed(updated))
            }
            Err(e) if e.is_transient() => {
                tracing::debug!("[Library] Reload deferred for {}: {}", key.display(), e);
                Ok(Reloaded::Unchanged)
            }
            Err(e) => {
                let mounted = self.io.is_mounted(current);
                let Some(song) = self.items.remove(key) else {
                    return Err(LibraryError::NotFound(key.to_path_buf()));
                };
                if mounted {
                    tracing::debug!("[Library] Dropping {}: {}", key.display(), e);
                    Ok(Reloaded::Removed(song))
                } else {
                    let mount_point = Self::mask_key(&song);
                    self.masked.insert(mount_point.clone(), song.clone());
                    Ok(Reloaded::Masked(mount_point, song))
                }
            }
        }
    }

    /// Re-read one song from disk.
    pub fn reload(&mut self, path: &Path) -> Result<ReloadOutcome> {
        let key = normalize_path(path);
        let outcome = match self.reload_entry(&key)? {
            Reloaded::Unchanged => ReloadOutcome::Unchanged,
            Reloaded::Changed(song) => {
                self.emit(LibraryEvent::Changed(vec![song]));
                ReloadOutcome::Changed
            }
            Reloaded::Removed(song) => {
                self.emit(LibraryEvent::Removed(vec![song]));
                ReloadOutcome::Removed
            }
            Reloaded::Masked(mount_point, song) => {
                self.emit(LibraryEvent::Masked { mount_point, songs: vec![song] });
                ReloadOutcome::Masked
            }
        };
        Ok(outcome)
    }

    /// Reload every song whose file no longer matches the catalog
    /// (or every song, when `force`).
    pub fn rebuild(&mut self, force: bool) -> RebuildReport {
        let keys: Vec<PathBuf> = self.items.keys().cloned().collect();
        let mut report = RebuildReport::default();
        let mut changed = Vec::new();
        let mut removed = Vec::new();
        let mut masked: BTreeMap<PathBuf, Vec<Song>> = BTreeMap::new();

        for key in keys {
            let Some(song) = self.items.get(&key) else { continue };
            if !force && self.io.is_valid(song) {
                continue;
            }
            report.checked += 1;
            match self.reload_entry(&key) {
                Ok(Reloaded::Unchanged) => {}
                Ok(Reloaded::Changed(song)) => changed.push(song),
                Ok(Reloaded::Removed(song)) => removed.push(song),
                Ok(Reloaded::Masked(mount_point, song)) => masked.entry(mount_point).or_default().push(song),
                Err(e) => tracing::warn!("[Library] Rebuild failed for {}: {}", key.display(), e),
            }
        }

        report.changed = changed.len();
        report.removed = removed.len();
        report.masked = masked.values().map(Vec::len).sum();
        self.emit(LibraryEvent::Changed(changed));
        self.emit(LibraryEvent::Removed(removed));
        for (mount_point, songs) in masked {
            self.emit(LibraryEvent::Masked { mount_point, songs });
        }
        tracing::info!(
            "[Library] {}: rebuild checked {}, changed {}, removed {}, masked {}",
            self.name, report.checked, report.changed, report.removed, report.masked
        );
        report
    }
}
