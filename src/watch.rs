use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc::{self, Receiver};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Creates a watcher for the database file and returns a receiver that gets a
/// `()` whenever the database (or its WAL/journal) is written.
/// The watcher must be kept alive for events to be received.
pub fn watch_db(db_path: &str) -> Result<(RecommendedWatcher, Receiver<()>)> {
    let (tx, rx) = mpsc::channel();
    let path = Path::new(db_path);
    let db_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        let Ok(event) = res else { return };
        if matches!(event.kind, EventKind::Access(_)) {
            return;
        }
        if event.paths.iter().any(|p| touches_db(p, &db_name)) {
            // Ignore send errors (receiver dropped)
            let _ = tx.send(());
        }
    })
    .context("failed to create file watcher")?;

    // Watch the parent directory since SQLite writes through sidecar files
    let watch_path = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    watcher
        .watch(watch_path, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", watch_path.display()))?;

    Ok((watcher, rx))
}

/// `workplan.db`, `workplan.db-wal`, `workplan.db-shm` and `workplan.db-journal`.
fn touches_db(path: &Path, db_name: &OsString) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    if name == db_name.as_os_str() {
        return true;
    }
    let (Some(name), Some(db)) = (name.to_str(), db_name.to_str()) else {
        return false;
    };
    name.strip_prefix(db)
        .is_some_and(|suffix| matches!(suffix, "-wal" | "-shm" | "-journal"))
}

/// Drains pending events. Returns whether there were any.
pub fn drain_events(rx: &Receiver<()>) -> bool {
    let mut any = false;
    while rx.try_recv().is_ok() {
        any = true;
    }
    any
}
