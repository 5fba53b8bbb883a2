// FILE: src/engine/events.rs
//! Translates raw notify events into the four watch events the library
//! understands.
//!
//! Backends report renames differently: some send one event carrying both
//! paths, inotify sends a `From` half and a `To` half sharing a tracker id
//! (and then a combined event as well). The tracker pairs halves so a rename
//! always comes out as a single `Moved`.

use lru::LruCache;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const TRACKER_CAPACITY: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

pub struct RenameTracker {
    /// Unpaired `From` halves by tracker id.
    pending: LruCache<usize, (PathBuf, Instant)>,
    /// Tracker ids already turned into a `Moved`.
    completed: LruCache<usize, ()>,
    window: Duration,
}

impl RenameTracker {
    pub fn new(window: Duration) -> Self {
        let capacity = NonZeroUsize::new(TRACKER_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            pending: LruCache::new(capacity),
            completed: LruCache::new(capacity),
            window,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn map_event(&mut self, event: Event, now: Instant) -> Vec<WatchEvent> {
        let tracker = event.attrs.tracker();
        let Event { kind, paths, .. } = event;

        match kind {
            EventKind::Create(_) => paths.into_iter().map(WatchEvent::Created).collect(),
            EventKind::Remove(_) => paths.into_iter().map(WatchEvent::Deleted).collect(),
            EventKind::Modify(ModifyKind::Name(mode)) => self.map_rename(mode, paths, tracker, now),
            EventKind::Modify(_) => paths.into_iter().map(WatchEvent::Modified).collect(),
            // Writer closed the file: a good moment to look at it again.
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                paths.into_iter().map(WatchEvent::Modified).collect()
            }
            _ => Vec::new(),
        }
    }

    fn map_rename(
        &mut self,
        mode: RenameMode,
        paths: Vec<PathBuf>,
        tracker: Option<usize>,
        now: Instant,
    ) -> Vec<WatchEvent> {
        match mode {
            RenameMode::Both => {
                if let Some(id) = tracker {
                    if self.completed.contains(&id) {
                        return Vec::new();
                    }
                    self.pending.pop(&id);
                    self.completed.put(id, ());
                }
                // Use get(1), not last(), to pick the destination.
                match (paths.first(), paths.get(1)) {
                    (Some(from), Some(to)) => vec![WatchEvent::Moved { from: from.clone(), to: to.clone() }],
                    (Some(from), None) => vec![WatchEvent::Deleted(from.clone())],
                    _ => Vec::new(),
                }
            }
            RenameMode::From => {
                let Some(id) = tracker else {
                    return paths.into_iter().map(WatchEvent::Deleted).collect();
                };
                let mut events = Vec::new();
                for path in paths {
                    if let Some((evicted_id, (evicted, _))) = self.pending.push(id, (path, now)) {
                        if evicted_id != id {
                            events.push(WatchEvent::Deleted(evicted));
                        }
                    }
                }
                events
            }
            RenameMode::To => {
                let paired = tracker.and_then(|id| {
                    if self.completed.contains(&id) {
                        return Some(None);
                    }
                    let (from, _) = self.pending.pop(&id)?;
                    self.completed.put(id, ());
                    Some(Some(from))
                });
                match paired {
                    Some(None) => Vec::new(),
                    Some(Some(from)) => paths
                        .into_iter()
                        .take(1)
                        .map(|to| WatchEvent::Moved { from: from.clone(), to })
                        .collect(),
                    None => paths.into_iter().map(WatchEvent::Created).collect(),
                }
            }
            RenameMode::Any | RenameMode::Other => paths
                .into_iter()
                .map(|path| {
                    if std::fs::symlink_metadata(&path).is_ok() {
                        WatchEvent::Created(path)
                    } else {
                        WatchEvent::Deleted(path)
                    }
                })
                .collect(),
        }
    }

    /// `From` halves whose partner never arrived: the file left the
    /// watched tree.
    pub fn expire(&mut self, now: Instant) -> Vec<WatchEvent> {
        let stale: Vec<usize> = self
            .pending
            .iter()
            .filter(|(_, (_, seen))| now.saturating_duration_since(*seen) >= self.window)
            .map(|(id, _)| *id)
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.pending.pop(&id))
            .map(|(path, _)| WatchEvent::Deleted(path))
            .collect()
    }
}
