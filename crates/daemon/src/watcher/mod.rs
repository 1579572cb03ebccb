// Watch source: recursive filesystem notifications for one repository root.
//
// Wraps the OS-native watcher (fsevents on macOS, inotify on Linux) and
// exposes two bounded channels: change events and watch errors. Events for
// anything under a `.git` directory are dropped so the repository's own
// bookkeeping never looks like a user edit. Recursive mode covers
// subdirectories created after the watch starts.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// What happened to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEventKind {
    Create,
    Modify,
    Remove,
}

/// One change notification delivered to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

const EVENT_CHANNEL_CAPACITY: usize = 512;
const ERROR_CHANNEL_CAPACITY: usize = 16;

/// A live recursive watch on one repository root. Dropping the handle stops
/// the watch and closes both channels, which is how consumers learn the
/// source is gone.
pub struct WatchSource {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl WatchSource {
    /// Start watching `root` recursively.
    ///
    /// Returns the handle plus the event and error receivers. Fails if the
    /// path does not exist or cannot be watched.
    pub fn add(
        root: &Path,
    ) -> Result<(Self, mpsc::Receiver<FsEvent>, mpsc::Receiver<notify::Error>)> {
        let root = root
            .canonicalize()
            .with_context(|| format!("failed to canonicalize watch root: {}", root.display()))?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if let Some(events) = translate_event(&event) {
                        for fs_event in events {
                            if event_tx.blocking_send(fs_event).is_err() {
                                // Receiver dropped; nothing left to notify.
                                debug!("event channel closed, stopping event dispatch");
                                return;
                            }
                        }
                    }
                }
                Err(error) => {
                    let _ = error_tx.blocking_send(error);
                }
            }
        })
        .context("failed to create filesystem watcher")?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch directory: {}", root.display()))?;

        debug!(path = %root.display(), "watch source started");

        Ok((Self { _watcher: watcher, root }, event_rx, error_rx))
    }

    /// The canonicalized root being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// True when any component of `path` is a `.git` directory.
fn is_git_metadata(path: &Path) -> bool {
    path.components().any(|component| matches!(component, Component::Normal(name) if name == ".git"))
}

/// Map a raw `notify::Event` to zero or more [`FsEvent`]s, dropping git
/// metadata, metadata-only modifications, and access events.
fn translate_event(event: &Event) -> Option<Vec<FsEvent>> {
    let kind = match &event.kind {
        EventKind::Create(_) => FsEventKind::Create,
        EventKind::Modify(modify_kind) => {
            use notify::event::ModifyKind;
            match modify_kind {
                // Permission and timestamp churn never needs a commit.
                ModifyKind::Metadata(_) => {
                    trace!("skipping metadata-only modify event");
                    return None;
                }
                _ => FsEventKind::Modify,
            }
        }
        EventKind::Remove(_) => FsEventKind::Remove,
        _ => {
            trace!(kind = ?event.kind, "skipping non-content event");
            return None;
        }
    };

    let events: Vec<FsEvent> = event
        .paths
        .iter()
        .filter(|path| {
            if is_git_metadata(path) {
                trace!(path = %path.display(), "skipping git metadata event");
                false
            } else {
                true
            }
        })
        .map(|path| FsEvent { kind: kind.clone(), path: path.clone() })
        .collect();

    if events.is_empty() {
        None
    } else {
        Some(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, ModifyKind, RemoveKind};
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::{timeout, Duration};

    fn make_event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        Event { kind, paths, attrs: Default::default() }
    }

    // ── translate_event ────────────────────────────────────────────

    #[test]
    fn create_is_translated() {
        let event = make_event(
            EventKind::Create(CreateKind::File),
            vec![PathBuf::from("/repo/notes/a.md")],
        );
        let result = translate_event(&event).unwrap();
        assert_eq!(result, vec![FsEvent {
            kind: FsEventKind::Create,
            path: PathBuf::from("/repo/notes/a.md"),
        }]);
    }

    #[test]
    fn data_modify_is_translated() {
        let event = make_event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            vec![PathBuf::from("/repo/a.md")],
        );
        assert_eq!(translate_event(&event).unwrap()[0].kind, FsEventKind::Modify);
    }

    #[test]
    fn remove_is_translated() {
        let event =
            make_event(EventKind::Remove(RemoveKind::File), vec![PathBuf::from("/repo/a.md")]);
        assert_eq!(translate_event(&event).unwrap()[0].kind, FsEventKind::Remove);
    }

    #[test]
    fn metadata_modify_is_dropped() {
        let event = make_event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            vec![PathBuf::from("/repo/a.md")],
        );
        assert!(translate_event(&event).is_none());
    }

    #[test]
    fn git_metadata_paths_are_dropped() {
        let event = make_event(
            EventKind::Create(CreateKind::File),
            vec![
                PathBuf::from("/repo/.git/index.lock"),
                PathBuf::from("/repo/.git/objects/ab/cdef"),
                PathBuf::from("/repo/kept.txt"),
            ],
        );
        let result = translate_event(&event).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, PathBuf::from("/repo/kept.txt"));
    }

    #[test]
    fn dot_git_named_file_outside_metadata_is_kept() {
        // A file merely *containing* .git in its name is not metadata.
        assert!(!is_git_metadata(Path::new("/repo/notes/.gitignore")));
        assert!(is_git_metadata(Path::new("/repo/sub/.git/HEAD")));
    }

    // ── live watcher ───────────────────────────────────────────────

    #[tokio::test]
    async fn watcher_detects_create() {
        let tmp = TempDir::new().unwrap();
        let (source, mut events, _errors) = WatchSource::add(tmp.path()).unwrap();

        // Give the OS watcher a moment to register.
        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(tmp.path().join("new.txt"), "hello").unwrap();

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for create event")
            .expect("channel closed");

        assert!(matches!(event.kind, FsEventKind::Create | FsEventKind::Modify));
        assert!(event.path.ends_with("new.txt"));

        drop(source);
    }

    #[tokio::test]
    async fn watcher_sees_new_subdirectories() {
        let tmp = TempDir::new().unwrap();
        let (source, mut events, _errors) = WatchSource::add(tmp.path()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let subdir = tmp.path().join("deep").join("nested");
        fs::create_dir_all(&subdir).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(subdir.join("inner.txt"), "nested").unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut saw_inner = false;
        while tokio::time::Instant::now() < deadline {
            match timeout(Duration::from_secs(2), events.recv()).await {
                Ok(Some(event)) if event.path.ends_with("inner.txt") => {
                    saw_inner = true;
                    break;
                }
                Ok(Some(_)) => continue,
                _ => break,
            }
        }
        assert!(saw_inner, "expected an event for the nested file");

        drop(source);
    }

    #[tokio::test]
    async fn watcher_drops_git_directory_churn() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();

        let (source, mut events, _errors) = WatchSource::add(tmp.path()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(tmp.path().join(".git").join("index.lock"), "").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        fs::write(tmp.path().join("visible.txt"), "edit").unwrap();

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed");

        // The first delivered event must be the user edit, not git churn.
        assert!(event.path.ends_with("visible.txt"));

        drop(source);
    }

    #[test]
    fn watcher_rejects_missing_root() {
        assert!(WatchSource::add(Path::new("/nonexistent/autosync-test")).is_err());
    }

    #[test]
    fn watcher_exposes_canonical_root() {
        let tmp = TempDir::new().unwrap();
        let (source, _events, _errors) = WatchSource::add(tmp.path()).unwrap();
        assert_eq!(source.root(), tmp.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn dropping_source_closes_channels() {
        let tmp = TempDir::new().unwrap();
        let (source, mut events, mut errors) = WatchSource::add(tmp.path()).unwrap();

        drop(source);

        assert!(timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event channel should close promptly")
            .is_none());
        assert!(timeout(Duration::from_secs(5), errors.recv())
            .await
            .expect("error channel should close promptly")
            .is_none());
    }
}
