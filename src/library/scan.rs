// FILE: src/library/scan.rs
use super::FileLibrary;
use crate::core::bouncer::Bouncer;
use crate::core::paths::{is_under, normalize_path};
use crate::core::song::Song;
use std::path::{Path, PathBuf};

const SCAN_BATCH_SIZE: usize = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub seen: usize,
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FileLibrary {
    /// Walk `roots` and add every media file not already known.
    ///
    /// New songs are announced in batches so observers see a handful of
    /// events, not one per file.
    pub fn scan(&mut self, roots: &[PathBuf]) -> ScanReport {
        let mut report = ScanReport::default();
        let mut batch: Vec<Song> = Vec::with_capacity(SCAN_BATCH_SIZE);
        let exclude = self.exclude.clone();

        for root in roots {
            let root = normalize_path(root);
            if !root.exists() {
                tracing::debug!("[Library] Scan root missing: {}", root.display());
                continue;
            }
            tracing::info!("[Library] Scanning {}", root.display());

            let walker = walkdir::WalkDir::new(&root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| {
                    if e.path_is_symlink() {
                        return false;
                    }
                    if e.depth() > 0 {
                        if let Some(name) = e.file_name().to_str() {
                            if name.starts_with('.') {
                                return false;
                            }
                        }
                    }
                    !exclude.iter().any(|ex| is_under(e.path(), ex))
                });

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::debug!("[Library] Walk error under {}: {}", root.display(), e);
                        report.failed += 1;
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if !Bouncer::is_media(path) {
                    continue;
                }
                report.seen += 1;
                if self.knows(path) {
                    report.skipped += 1;
                    continue;
                }
                match self.io.read_song(path) {
                    Ok(song) => batch.push(song),
                    Err(e) => {
                        tracing::debug!("[Library] Could not read {}: {}", path.display(), e);
                        report.failed += 1;
                    }
                }
                if batch.len() >= SCAN_BATCH_SIZE {
                    report.added += self.add(std::mem::take(&mut batch)).len();
                }
            }
        }

        if !batch.is_empty() {
            report.added += self.add(batch).len();
        }
        tracing::info!(
            "[Library] Scan complete: {} seen, {} added, {} known, {} failed",
            report.seen, report.added, report.skipped, report.failed
        );
        report
    }

    /// Scan a single directory, e.g. one that was just moved into a
    /// watched tree.
    pub fn scan_dir(&mut self, dir: &Path) -> ScanReport {
        self.scan(&[dir.to_path_buf()])
    }
}
