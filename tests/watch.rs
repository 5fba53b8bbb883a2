mod common;

use common::drain;
use songlib::{FileLibrary, Librarian, LibraryEvent, MountTable};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn watched_dir() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    (dir, root)
}

fn librarian(root: &Path) -> Librarian {
    let mut librarian =
        Librarian::with_timing(Duration::from_millis(50), Duration::from_millis(50), 10).unwrap();
    librarian.start_watching(&[root.to_path_buf()]).unwrap();
    librarian
}

/// Run the librarian while `act` touches the disk, then stop it.
async fn drive<F: FnOnce()>(librarian: &mut Librarian, lib: &mut FileLibrary, act: F) {
    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    let (result, _) = tokio::join!(librarian.run(lib, cancel), async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        act();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        stop.cancel();
    });
    result.unwrap();
}

fn count<F: Fn(&LibraryEvent) -> bool>(events: &[LibraryEvent], pred: F) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[tokio::test]
async fn test_created_file_is_added_once() {
    let (_dir, root) = watched_dir();
    let mut lib = FileLibrary::with_fs("watch", MountTable::default());
    let mut rx = lib.subscribe();
    let mut librarian = librarian(&root);
    let path = root.join("new.mp3");

    let written = path.clone();
    drive(&mut librarian, &mut lib, move || std::fs::write(&written, b"ID3 some audio").unwrap()).await;

    assert!(lib.contains(&path));
    let events = drain(&mut rx);
    assert_eq!(
        count(&events, |e| matches!(e, LibraryEvent::Added(s) if s.iter().any(|s| s.path() == path))),
        1
    );
}

#[tokio::test]
async fn test_deleted_file_is_removed_once() {
    let (_dir, root) = watched_dir();
    let path = root.join("old.mp3");
    std::fs::write(&path, b"ID3 some audio").unwrap();

    let mut lib = FileLibrary::with_fs("watch", MountTable::default());
    lib.scan(&[root.clone()]);
    assert!(lib.contains(&path));
    let mut rx = lib.subscribe();
    let mut librarian = librarian(&root);

    let removed = path.clone();
    drive(&mut librarian, &mut lib, move || std::fs::remove_file(&removed).unwrap()).await;

    assert!(!lib.contains(&path));
    let events = drain(&mut rx);
    assert_eq!(
        count(&events, |e| matches!(e, LibraryEvent::Removed(s) if s.iter().any(|s| s.path() == path))),
        1
    );
}

#[tokio::test]
async fn test_rename_is_a_single_rekey() {
    let (_dir, root) = watched_dir();
    let from = root.join("a.mp3");
    let to = root.join("b.mp3");
    std::fs::write(&from, b"ID3 some audio").unwrap();

    let mut lib = FileLibrary::with_fs("watch", MountTable::default());
    lib.scan(&[root.clone()]);
    let mut rx = lib.subscribe();
    let mut librarian = librarian(&root);

    let (src, dst) = (from.clone(), to.clone());
    drive(&mut librarian, &mut lib, move || std::fs::rename(&src, &dst).unwrap()).await;

    assert!(lib.contains(&to));
    assert!(!lib.contains(&from));
    let events = drain(&mut rx);
    assert_eq!(count(&events, |e| matches!(e, LibraryEvent::Removed(_))), 0);
    assert_eq!(count(&events, |e| matches!(e, LibraryEvent::Added(_))), 0);
    assert_eq!(
        count(&events, |e| matches!(e, LibraryEvent::Renamed(r) if r.iter().any(|r| r.song.path() == to))),
        1
    );
}
