//! End-to-end tests against a real inotify descriptor.
//!
//! These need real time and a real kernel, so they are ignored by
//! default, matching the other timing-sensitive suites. Run them with:
//!
//!   cargo test --test watch_integration -- --ignored

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mirrorsync::watch::{
    default_watch_mask, process_notify_events, EventKind, FsEvent, WatchCallbacks,
};
use tempfile::TempDir;
use tokio::time::sleep;

const SETTLE: Duration = Duration::from_millis(300);

fn collecting_callbacks(sink: Arc<Mutex<Vec<FsEvent>>>) -> WatchCallbacks {
    WatchCallbacks {
        event: Some(Box::new(move |event| sink.lock().unwrap().push(event))),
        ..Default::default()
    }
}

#[ignore = "Requires real time - run with: cargo test --test watch_integration -- --ignored"]
#[tokio::test(flavor = "multi_thread")]
async fn watch_reports_create_change_move_and_delete() {
    let root = TempDir::new().unwrap();
    let root_path = root.path().to_path_buf();

    let events = Arc::new(Mutex::new(Vec::new()));
    let callbacks = collecting_callbacks(Arc::clone(&events));
    let watcher = tokio::spawn(process_notify_events(
        vec![root_path.clone()],
        Vec::new(),
        default_watch_mask(),
        callbacks,
    ));
    sleep(SETTLE).await;

    let file = root_path.join("f");
    std::fs::write(&file, b"0123456789").unwrap();
    sleep(SETTLE).await;

    let renamed = root_path.join("g");
    std::fs::rename(&file, &renamed).unwrap();
    sleep(SETTLE).await;

    std::fs::remove_file(&renamed).unwrap();
    sleep(SETTLE).await;

    // Deleting the last root ends the processing loop.
    std::fs::remove_dir(&root_path).unwrap();
    let code = watcher.await.unwrap();
    assert_eq!(code, 0);

    let events = events.lock().unwrap();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::Create), "kinds: {kinds:?}");
    assert!(kinds.contains(&EventKind::Change), "kinds: {kinds:?}");
    assert!(kinds.contains(&EventKind::Move), "kinds: {kinds:?}");
    assert!(kinds.contains(&EventKind::Delete), "kinds: {kinds:?}");

    let moved = events
        .iter()
        .find(|e| e.kind == EventKind::Move)
        .expect("move event");
    assert_eq!(moved.path, renamed);
    assert_eq!(moved.path2, Some(file.clone()));
}

#[ignore = "Requires real time - run with: cargo test --test watch_integration -- --ignored"]
#[tokio::test(flavor = "multi_thread")]
async fn hard_link_within_the_watched_set_reports_link() {
    let root = TempDir::new().unwrap();
    let root_path = root.path().to_path_buf();
    let original = root_path.join("f");
    std::fs::write(&original, b"content").unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let callbacks = collecting_callbacks(Arc::clone(&events));
    let watcher = tokio::spawn(process_notify_events(
        vec![root_path.clone()],
        Vec::new(),
        default_watch_mask(),
        callbacks,
    ));
    sleep(SETTLE).await;

    let link = root_path.join("f2");
    std::fs::hard_link(&original, &link).unwrap();
    sleep(SETTLE).await;

    std::fs::remove_file(&link).unwrap();
    std::fs::remove_file(&original).unwrap();
    sleep(SETTLE).await;
    std::fs::remove_dir(&root_path).unwrap();
    let code = watcher.await.unwrap();
    assert_eq!(code, 0);

    let events = events.lock().unwrap();
    let linked = events
        .iter()
        .find(|e| e.kind == EventKind::Link)
        .expect("link event");
    assert_eq!(linked.path, link);
    assert_eq!(linked.path2, Some(original.clone()));

    // The first delete still had a surviving link inside the set.
    let first_delete = events
        .iter()
        .find(|e| e.kind == EventKind::Delete)
        .expect("delete event");
    assert!(!first_delete.data_modified);
    assert_eq!(first_delete.path2, Some(original));
}

#[ignore = "Requires real time - run with: cargo test --test watch_integration -- --ignored"]
#[tokio::test(flavor = "multi_thread")]
async fn nothing_to_watch_returns_code_one() {
    let missing = PathBuf::from("/nonexistent/mirrorsync/root");
    let code = process_notify_events(
        vec![missing],
        Vec::new(),
        default_watch_mask(),
        WatchCallbacks::default(),
    )
    .await;
    assert_eq!(code, 1);
}
