//! Real filesystem watching backed by the `notify` crate, translating its
//! platform events into the abstracted [`FsEvent`] stream that
//! [`super::dispatch`] consumes.

use super::event::FsEvent;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("failed to start watcher: {0}")]
    Notify(#[from] notify::Error),
}

/// A live watch on one root, yielding abstracted events over an unbounded
/// channel. Kept alive for as long as the returned `RootWatch` is held —
/// dropping it stops the watcher.
pub struct RootWatch {
    _watcher: RecommendedWatcher,
    pub events: mpsc::UnboundedReceiver<FsEvent>,
}

/// Starts a recursive watch on `root`, debouncing repeated events for the
/// same path the way the teacher's Linux handler debounces inotify bursts.
pub fn watch_root(root: &Path) -> Result<RootWatch, WatchError> {
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<Event>();
    let (tx, rx) = mpsc::unbounded_channel::<FsEvent>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = raw_tx.send(event);
            }
            Err(e) => warn!("watch error: {e}"),
        },
        notify::Config::default(),
    )?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    tokio::spawn(async move {
        let mut recent: HashMap<PathBuf, Instant> = HashMap::new();
        let debounce = Duration::from_millis(50);

        while let Some(event) = raw_rx.recv().await {
            for fs_event in translate(event) {
                let key = match &fs_event {
                    FsEvent::Created(p) | FsEvent::Modified(p) | FsEvent::Deleted(p) => p.clone(),
                    FsEvent::Moved { to, .. } => to.clone(),
                };

                let now = Instant::now();
                if let Some(last) = recent.get(&key) {
                    if now.duration_since(*last) < debounce {
                        debug!("debounced event for {}", key.display());
                        continue;
                    }
                }
                recent.insert(key, now);
                recent.retain(|_, last| now.duration_since(*last) < Duration::from_secs(1));

                if tx.send(fs_event).is_err() {
                    return;
                }
            }
        }
    });

    Ok(RootWatch {
        _watcher: watcher,
        events: rx,
    })
}

fn translate(event: Event) -> Vec<FsEvent> {
    match event.kind {
        EventKind::Create(_) => event.paths.into_iter().map(FsEvent::Created).collect(),
        EventKind::Modify(notify::event::ModifyKind::Name(notify::event::RenameMode::Both)) => {
            if event.paths.len() == 2 {
                vec![FsEvent::Moved {
                    from: event.paths[0].clone(),
                    to: event.paths[1].clone(),
                }]
            } else {
                Vec::new()
            }
        }
        EventKind::Modify(_) => event.paths.into_iter().map(FsEvent::Modified).collect(),
        EventKind::Remove(_) => event.paths.into_iter().map(FsEvent::Deleted).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn watch_reports_created_file() {
        let dir = tempdir().unwrap();
        let mut watch = watch_root(dir.path()).unwrap();

        let file = dir.path().join("new.txt");
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        std::fs::write(&file, "hi").unwrap();

        let event = tokio::time::timeout(StdDuration::from_secs(5), watch.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed");

        match event {
            FsEvent::Created(p) | FsEvent::Modified(p) => assert_eq!(p, file),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
