// FILE: src/librarian.rs
//! Librarian: the watcher that keeps the library in step with the disk.
//!
//! The notify backend calls us from its own thread; every raw event is
//! forwarded over a channel and handled on the caller's runtime, one at a
//! time, through the same library primitives as direct API calls.

use crate::config::LibraryConfig;
use crate::core::paths::normalize_path;
use crate::engine::{RenameTracker, WatchEvent, WatchSync};
use crate::error::Result;
use crate::library::FileLibrary;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_millis(50);

pub struct Librarian {
    watcher: RecommendedWatcher,
    rx: UnboundedReceiver<notify::Result<Event>>,
    watched: Vec<PathBuf>,
    tracker: RenameTracker,
    sync: WatchSync,
    debounce: Duration,
    queue: Vec<WatchEvent>,
    last_activity: Instant,
}

impl Librarian {
    pub fn new(config: &LibraryConfig) -> Result<Self> {
        Self::with_timing(config.debounce(), config.settle(), config.settle_attempts)
    }

    pub fn with_timing(debounce: Duration, settle: Duration, settle_attempts: u32) -> Result<Self> {
        let (tx, rx) = unbounded_channel();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // Receiver gone means we are shutting down.
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;

        Ok(Self {
            watcher,
            rx,
            watched: Vec::new(),
            // A rename's halves arrive back to back; give them a little slack.
            tracker: RenameTracker::new(debounce.max(Duration::from_millis(200))),
            sync: WatchSync::new(settle, settle_attempts),
            debounce,
            queue: Vec::new(),
            last_activity: Instant::now(),
        })
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    pub fn pending_count(&self) -> usize {
        self.sync.pending_count()
    }

    /// Start receiving events for `dir` and everything below it.
    pub fn monitor_dir(&mut self, dir: &Path) -> Result<()> {
        let dir = normalize_path(dir);
        if self.watched.contains(&dir) {
            return Ok(());
        }
        self.watcher.watch(&dir, RecursiveMode::Recursive)?;
        tracing::info!("[Librarian] Watching {}", dir.display());
        self.watched.push(dir);
        Ok(())
    }

    pub fn unmonitor_dir(&mut self, dir: &Path) -> Result<()> {
        let dir = normalize_path(dir);
        let Some(idx) = self.watched.iter().position(|d| *d == dir) else {
            return Ok(());
        };
        self.watched.remove(idx);
        self.watcher.unwatch(&dir)?;
        tracing::info!("[Librarian] Stopped watching {}", dir.display());
        Ok(())
    }

    /// Watch every directory that exists; missing ones are logged and skipped.
    pub fn start_watching(&mut self, dirs: &[PathBuf]) -> Result<()> {
        for dir in dirs {
            if !dir.is_dir() {
                tracing::warn!("[Librarian] Not watching missing directory {}", dir.display());
                continue;
            }
            self.monitor_dir(dir)?;
        }
        Ok(())
    }

    fn ingest(&mut self, received: notify::Result<Event>, now: Instant) {
        match received {
            Ok(event) => {
                let mapped = self.tracker.map_event(event, now);
                if !mapped.is_empty() {
                    self.queue.extend(mapped);
                    self.last_activity = now;
                }
            }
            Err(e) => tracing::error!("[Librarian] Watch error: {}", e),
        }
    }

    /// Apply buffered events once things have been quiet for the debounce
    /// window, then give settling files a look.
    fn tick(&mut self, library: &mut FileLibrary, now: Instant, force: bool) {
        let expired = self.tracker.expire(now);
        self.queue.extend(expired);

        let quiet = now.saturating_duration_since(self.last_activity) >= self.debounce;
        if !self.queue.is_empty() && (quiet || force) {
            let events = std::mem::take(&mut self.queue);
            tracing::debug!("[Librarian] Processing {} events", events.len());
            for event in events {
                self.sync.apply(library, event, now);
            }
        }

        let report = self.sync.poll(library, now);
        if report.added > 0 {
            tracing::info!("[Librarian] Added {} new songs", report.added);
        }
    }

    /// Serve watch events until `cancel` fires.
    pub async fn run(&mut self, library: &mut FileLibrary, cancel: CancellationToken) -> Result<()> {
        tracing::info!("[Librarian] Monitoring {} directories", self.watched.len());
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.rx.recv() => match received {
                    Some(received) => self.ingest(received, Instant::now()),
                    None => break,
                },
                _ = ticker.tick() => self.tick(library, Instant::now(), false),
            }
        }

        // Whatever is already buffered still belongs to the library.
        while let Ok(received) = self.rx.try_recv() {
            self.ingest(received, Instant::now());
        }
        self.tick(library, Instant::now(), true);
        tracing::info!("[Librarian] Stopped");
        Ok(())
    }
}
