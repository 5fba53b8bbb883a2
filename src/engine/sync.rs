// FILE: src/engine/sync.rs
//! WatchSync: reconciles watch events against the live index.
//!
//! Created files are not added right away. They wait in a settle queue
//! until two looks at the file, `settle` apart, agree on size and mtime and
//! the probe succeeds. A file still being copied never lands in the catalog
//! half-written.

use super::events::WatchEvent;
use crate::core::bouncer::Bouncer;
use crate::core::paths::{is_under, normalize_path, rebase};
use crate::library::{FileLibrary, LibraryEvent, Rename};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

type Snapshot = (u64, Option<SystemTime>);

#[derive(Debug, Clone)]
struct Pending {
    snapshot: Snapshot,
    due: Instant,
    attempts: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub added: usize,
    pub deferred: usize,
    pub dropped: usize,
}

pub struct WatchSync {
    pending: BTreeMap<PathBuf, Pending>,
    settle: Duration,
    max_attempts: u32,
}

fn snapshot(path: &Path) -> Option<Snapshot> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    Some((meta.len(), meta.modified().ok()))
}

impl WatchSync {
    pub fn new(settle: Duration, max_attempts: u32) -> Self {
        Self {
            pending: BTreeMap::new(),
            settle,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.pending.contains_key(path)
    }

    pub fn apply(&mut self, library: &mut FileLibrary, event: WatchEvent, now: Instant) {
        match event {
            WatchEvent::Created(path) => self.created(library, &normalize_path(&path), now),
            WatchEvent::Modified(path) => self.modified(library, &normalize_path(&path), now),
            WatchEvent::Deleted(path) => self.deleted(library, &normalize_path(&path)),
            WatchEvent::Moved { from, to } => {
                self.moved(library, &normalize_path(&from), &normalize_path(&to), now)
            }
        }
    }

    fn created(&mut self, library: &mut FileLibrary, path: &Path, now: Instant) {
        if library.is_excluded(path) {
            return;
        }
        if library.knows(path) {
            tracing::debug!("[WatchSync] Duplicate create ignored: {}", path.display());
            return;
        }
        if path.is_dir() {
            tracing::debug!("[WatchSync] New directory, scanning: {}", path.display());
            library.scan_dir(path);
            return;
        }
        if !Bouncer::is_media(path) {
            return;
        }
        let Some(snapshot) = snapshot(path) else {
            // Gone again before we looked; a later event will tell.
            return;
        };
        let attempts = self.pending.get(path).map_or(0, |p| p.attempts);
        self.pending.insert(
            path.to_path_buf(),
            Pending { snapshot, due: now + self.settle, attempts },
        );
        tracing::debug!("[WatchSync] Settling {}", path.display());
    }

    fn modified(&mut self, library: &mut FileLibrary, path: &Path, now: Instant) {
        if library.contains(path) {
            if let Err(e) = library.reload(path) {
                tracing::warn!("[WatchSync] Reload failed for {}: {}", path.display(), e);
            }
            return;
        }
        if path.is_dir() {
            return;
        }
        // Some backends report a new file only as a modification.
        self.created(library, path, now);
    }

    fn deleted(&mut self, library: &mut FileLibrary, path: &Path) {
        self.pending.retain(|p, _| !is_under(p, path));
        let keys = library.keys_under(path);
        if keys.is_empty() {
            return;
        }
        tracing::debug!("[WatchSync] {} removed from disk ({} songs)", path.display(), keys.len());
        library.remove(&keys);
    }

    fn moved(&mut self, library: &mut FileLibrary, from: &Path, to: &Path, now: Instant) {
        // Files still settling follow the move.
        let settling: Vec<PathBuf> = self.pending.keys().filter(|p| is_under(p, from)).cloned().collect();
        for old in settling {
            if let (Some(entry), Some(new)) = (self.pending.remove(&old), rebase(&old, from, to)) {
                self.pending.insert(new, entry);
            }
        }

        let keys = library.keys_under(from);
        if keys.is_empty() {
            self.created(library, to, now);
            return;
        }

        // Renamed to something we would not catalogue: gone as far as we care.
        let is_file_move = keys.len() == 1 && keys[0] == from;
        if library.is_excluded(to) || (is_file_move && !Bouncer::is_media(to)) {
            library.remove(&keys);
            return;
        }

        let mut renamed = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(target) = rebase(&key, from, to) else { continue };
            // The file on disk at the target is now the moved one.
            if library.contains(&target) {
                library.remove(&[target.as_path()]);
            } else if library.masked(&target) {
                library.forget_masked(&target);
            }
            match library.rekey_silent(&key, &target) {
                Ok(song) => renamed.push(Rename { from: key, song: song.clone() }),
                Err(e) => tracing::warn!("[WatchSync] Could not move {}: {}", key.display(), e),
            }
        }
        tracing::debug!("[WatchSync] Moved {} -> {} ({} songs)", from.display(), to.display(), renamed.len());
        library.emit(LibraryEvent::Renamed(renamed));
    }

    /// Look at settling files that are due. Stable, readable files are added.
    pub fn poll(&mut self, library: &mut FileLibrary, now: Instant) -> PollReport {
        let mut report = PollReport::default();
        let due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(path, _)| path.clone())
            .collect();

        for path in due {
            let Some(mut entry) = self.pending.remove(&path) else { continue };
            if library.knows(&path) {
                continue;
            }
            let Some(current) = snapshot(&path) else {
                report.dropped += 1;
                continue;
            };

            let stable = current == entry.snapshot && current.0 > 0;
            if stable {
                match library.add_filename(&path) {
                    Ok(Some(_)) => {
                        report.added += 1;
                        continue;
                    }
                    Ok(None) => continue,
                    Err(e) if e.is_transient() => {
                        tracing::debug!("[WatchSync] {} not ready: {}", path.display(), e);
                    }
                    Err(e) => {
                        tracing::debug!("[WatchSync] Not adding {}: {}", path.display(), e);
                        report.dropped += 1;
                        continue;
                    }
                }
            }

            entry.attempts += 1;
            if entry.attempts >= self.max_attempts {
                tracing::warn!("[WatchSync] Gave up on {} after {} attempts", path.display(), entry.attempts);
                report.dropped += 1;
                continue;
            }
            entry.snapshot = current;
            entry.due = now + self.settle;
            self.pending.insert(path, entry);
            report.deferred += 1;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mount_table::MountTable;
    use crate::core::song::Song;
    use crate::core::song_io::{FsSongIo, SongIo};

    fn setup() -> (tempfile::TempDir, FileLibrary, WatchSync) {
        let dir = tempfile::tempdir().unwrap();
        let lib = FileLibrary::with_fs("watch", MountTable::default());
        (dir, lib, WatchSync::new(Duration::ZERO, 3))
    }

    #[test]
    fn test_created_waits_for_poll() {
        let (dir, mut lib, mut sync) = setup();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"data").unwrap();
        let now = Instant::now();

        sync.apply(&mut lib, WatchEvent::Created(path.clone()), now);
        assert!(!lib.contains(&path));
        assert!(sync.is_pending(&path));

        let report = sync.poll(&mut lib, now);
        assert_eq!(report.added, 1);
        assert!(lib.contains(&path));
        assert_eq!(sync.pending_count(), 0);
    }

    #[test]
    fn test_empty_file_is_deferred_then_dropped() {
        let (dir, mut lib, mut sync) = setup();
        let path = dir.path().join("growing.mp3");
        std::fs::write(&path, b"").unwrap();
        let now = Instant::now();

        sync.apply(&mut lib, WatchEvent::Created(path.clone()), now);
        assert_eq!(sync.poll(&mut lib, now).deferred, 1);
        assert_eq!(sync.poll(&mut lib, now).deferred, 1);
        assert_eq!(sync.poll(&mut lib, now).dropped, 1);
        assert!(!lib.contains(&path));
    }

    #[test]
    fn test_settle_window_respected() {
        let dir = tempfile::tempdir().unwrap();
        let mut lib = FileLibrary::with_fs("watch", MountTable::default());
        let mut sync = WatchSync::new(Duration::from_secs(60), 3);
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"data").unwrap();
        let now = Instant::now();

        sync.apply(&mut lib, WatchEvent::Created(path.clone()), now);
        assert_eq!(sync.poll(&mut lib, now), PollReport::default());
        assert_eq!(sync.poll(&mut lib, now + Duration::from_secs(61)).added, 1);
    }

    #[test]
    fn test_delete_before_settle_cancels() {
        let (dir, mut lib, mut sync) = setup();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"data").unwrap();
        let now = Instant::now();

        sync.apply(&mut lib, WatchEvent::Created(path.clone()), now);
        std::fs::remove_file(&path).unwrap();
        sync.apply(&mut lib, WatchEvent::Deleted(path.clone()), now);
        assert_eq!(sync.pending_count(), 0);
        assert_eq!(sync.poll(&mut lib, now).added, 0);
    }

    #[test]
    fn test_directory_delete_removes_children() {
        let (dir, mut lib, mut sync) = setup();
        let album = dir.path().join("album");
        std::fs::create_dir(&album).unwrap();
        std::fs::write(album.join("1.mp3"), b"data").unwrap();
        std::fs::write(album.join("2.mp3"), b"data").unwrap();
        std::fs::write(dir.path().join("keep.mp3"), b"data").unwrap();
        lib.scan(&[dir.path().to_path_buf()]);
        assert_eq!(lib.len(), 3);

        let mut rx = lib.subscribe();
        sync.apply(&mut lib, WatchEvent::Deleted(album), Instant::now());
        assert_eq!(lib.len(), 1);
        assert!(matches!(rx.try_recv().unwrap(), LibraryEvent::Removed(s) if s.len() == 2));
    }

    #[test]
    fn test_move_onto_tracked_path_replaces_it() {
        let (dir, mut lib, mut sync) = setup();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        std::fs::write(&a, b"aaaa").unwrap();
        std::fs::write(&b, b"bb").unwrap();
        lib.scan(&[dir.path().to_path_buf()]);
        std::fs::rename(&a, &b).unwrap();

        let mut rx = lib.subscribe();
        sync.apply(&mut lib, WatchEvent::Moved { from: a.clone(), to: b.clone() }, Instant::now());
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.get(&b).unwrap().size, 4);
        assert!(matches!(rx.try_recv().unwrap(), LibraryEvent::Removed(_)));
        assert!(matches!(rx.try_recv().unwrap(), LibraryEvent::Renamed(_)));
    }

    #[test]
    fn test_rename_to_non_media_removes() {
        let (dir, mut lib, mut sync) = setup();
        let a = dir.path().join("a.mp3");
        std::fs::write(&a, b"data").unwrap();
        lib.scan(&[dir.path().to_path_buf()]);

        let to = dir.path().join("a.mp3.bak");
        sync.apply(&mut lib, WatchEvent::Moved { from: a.clone(), to }, Instant::now());
        assert!(lib.is_empty());
    }

    #[test]
    fn test_move_onto_masked_path_takes_the_key() {
        let (dir, _, mut sync) = setup();
        let usb = dir.path().join("usb");
        std::fs::create_dir(&usb).unwrap();
        let a = usb.join("a.mp3");
        let b = usb.join("b.mp3");
        std::fs::write(&a, b"aaaa").unwrap();
        std::fs::write(&b, b"bb").unwrap();

        // A plain directory is never a mount, so `b` loads masked.
        let mut lib = FileLibrary::with_fs("watch", MountTable::new([usb.clone()]));
        lib.add(vec![FsSongIo.read_song(&a).unwrap()]);
        lib.load_init(vec![Song::new(&b)]);
        assert!(lib.masked(&b));

        std::fs::rename(&a, &b).unwrap();
        let mut rx = lib.subscribe();
        sync.apply(&mut lib, WatchEvent::Moved { from: a.clone(), to: b.clone() }, Instant::now());

        assert!(!lib.contains(&a));
        assert!(lib.contains(&b));
        assert!(!lib.masked(&b));
        assert_eq!(lib.get(&b).unwrap().size, 4);
        assert!(matches!(rx.try_recv().unwrap(), LibraryEvent::Removed(s) if s.len() == 1));
        assert!(matches!(rx.try_recv().unwrap(), LibraryEvent::Renamed(r) if r.len() == 1));
    }

    #[test]
    fn test_move_from_untracked_is_a_create() {
        let (dir, mut lib, mut sync) = setup();
        let to = dir.path().join("arrived.mp3");
        std::fs::write(&to, b"data").unwrap();
        let now = Instant::now();

        sync.apply(&mut lib, WatchEvent::Moved { from: dir.path().join("elsewhere.mp3"), to: to.clone() }, now);
        assert!(sync.is_pending(&to));
        assert_eq!(sync.poll(&mut lib, now).added, 1);
        assert!(lib.contains(&to));
    }

    #[test]
    fn test_create_for_known_path_is_ignored() {
        let (dir, _, mut sync) = setup();
        let usb = dir.path().join("usb");
        std::fs::create_dir(&usb).unwrap();
        let live = dir.path().join("live.mp3");
        let hidden = usb.join("hidden.mp3");
        std::fs::write(&live, b"data").unwrap();
        std::fs::write(&hidden, b"data").unwrap();

        let mut lib = FileLibrary::with_fs("watch", MountTable::new([usb.clone()]));
        lib.add(vec![FsSongIo.read_song(&live).unwrap()]);
        lib.load_init(vec![Song::new(&hidden)]);
        let mut rx = lib.subscribe();

        let now = Instant::now();
        sync.apply(&mut lib, WatchEvent::Created(live.clone()), now);
        sync.apply(&mut lib, WatchEvent::Created(hidden.clone()), now);
        assert_eq!(sync.pending_count(), 0);
        assert_eq!(sync.poll(&mut lib, now), PollReport::default());
        assert!(lib.masked(&hidden));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_created_directory_is_scanned() {
        let (dir, mut lib, mut sync) = setup();
        let album = dir.path().join("album");
        std::fs::create_dir(&album).unwrap();
        std::fs::write(album.join("1.mp3"), b"data").unwrap();
        std::fs::write(album.join("2.mp3"), b"data").unwrap();

        sync.apply(&mut lib, WatchEvent::Created(album.clone()), Instant::now());
        assert_eq!(lib.len(), 2);
        assert!(lib.contains(&album.join("1.mp3")));
    }

    #[test]
    fn test_directory_move_rekeys_children() {
        let (dir, mut lib, mut sync) = setup();
        let album = dir.path().join("album");
        std::fs::create_dir(&album).unwrap();
        std::fs::write(album.join("1.mp3"), b"data").unwrap();
        std::fs::write(album.join("2.mp3"), b"data").unwrap();
        lib.scan(&[dir.path().to_path_buf()]);

        let renamed = dir.path().join("renamed");
        std::fs::rename(&album, &renamed).unwrap();
        let mut rx = lib.subscribe();
        sync.apply(&mut lib, WatchEvent::Moved { from: album.clone(), to: renamed.clone() }, Instant::now());

        assert_eq!(lib.len(), 2);
        assert!(lib.contains(&renamed.join("1.mp3")));
        assert!(lib.contains(&renamed.join("2.mp3")));
        assert!(matches!(rx.try_recv().unwrap(), LibraryEvent::Renamed(r) if r.len() == 2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_modified_tracked_file_is_reloaded() {
        let (dir, mut lib, mut sync) = setup();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"data").unwrap();
        lib.scan(&[dir.path().to_path_buf()]);

        std::fs::write(&path, b"more data").unwrap();
        let mut rx = lib.subscribe();
        sync.apply(&mut lib, WatchEvent::Modified(path.clone()), Instant::now());

        assert_eq!(lib.get(&path).unwrap().size, 9);
        assert!(matches!(rx.try_recv().unwrap(), LibraryEvent::Changed(s) if s.len() == 1));
        assert_eq!(sync.pending_count(), 0);
    }
}
