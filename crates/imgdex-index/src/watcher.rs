//! Inbox watcher for detecting new files.

use notify_debouncer_full::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Non-recursive directory watcher with debouncing.
///
/// Emits the path of every file that appears in the watched inbox, either
/// freshly created or renamed into it. Removals and in-place modifications
/// are ignored.
pub struct InboxWatcher {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    inbox: PathBuf,
}

impl InboxWatcher {
    /// Create a watcher for `inbox` sending new paths to `event_tx`.
    pub fn new(
        inbox: &Path,
        event_tx: tokio_mpsc::Sender<PathBuf>,
        debounce_duration: Duration,
    ) -> Result<Self, notify::Error> {
        // FSEvents reports canonical paths (e.g. /private/var on macOS).
        let inbox = inbox.canonicalize().unwrap_or_else(|_| inbox.to_path_buf());
        let (tx, rx) = mpsc::channel();

        // Spawn thread to convert events
        let thread_inbox = inbox.clone();
        std::thread::spawn(move || {
            while let Ok(result) = rx.recv() {
                if !handle_debounced_events(result, &thread_inbox, &event_tx) {
                    break;
                }
            }
            debug!("Inbox event thread finished");
        });

        let debouncer = new_debouncer(debounce_duration, None, move |result| {
            let _ = tx.send(result);
        })?;

        Ok(Self { debouncer, inbox })
    }

    /// Watched directory.
    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    /// Start watching the inbox (its direct children only).
    pub fn watch(&mut self) -> Result<(), notify::Error> {
        debug!("Starting to watch: {:?}", self.inbox);
        self.debouncer.watch(&self.inbox, RecursiveMode::NonRecursive)
    }
}

/// Forward converted events. Returns `false` once the receiver is gone.
fn handle_debounced_events(
    result: DebounceEventResult,
    inbox: &Path,
    event_tx: &tokio_mpsc::Sender<PathBuf>,
) -> bool {
    match result {
        Ok(events) => {
            for event in events {
                if let Some(path) = convert_event(&event, inbox) {
                    // Use blocking send since we're in a std thread
                    if event_tx.blocking_send(path).is_err() {
                        warn!("Inbox event channel closed");
                        return false;
                    }
                }
            }
        }
        Err(errors) => {
            for error in errors {
                error!("Watch error: {error}");
            }
        }
    }
    true
}

fn convert_event(event: &notify_debouncer_full::DebouncedEvent, inbox: &Path) -> Option<PathBuf> {
    use notify_debouncer_full::notify::EventKind;
    use notify_debouncer_full::notify::event::{ModifyKind, RenameMode};

    let path = match &event.kind {
        EventKind::Create(_) => event.paths.first()?,
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both)) => {
            event.paths.last()?
        }
        // Both ends of a rename look alike here; only an existing file
        // directly inside the inbox is an arrival.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            let path = event.paths.last()?;
            if path.parent() != Some(inbox) || !path.exists() {
                return None;
            }
            path
        }
        _ => return None,
    };

    // Skip hidden files, including partially written staging files
    if path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
    {
        return None;
    }

    Some(path.clone())
}

/// Wait until the size of `path` stops changing for `settle`.
///
/// The size is sampled every `poll`. Returns `false` if the file disappears
/// while waiting.
pub async fn wait_until_settled(path: &Path, settle: Duration, poll: Duration) -> bool {
    let poll = poll.max(Duration::from_millis(1));
    let mut last_size = None;
    let mut stable_since = Instant::now();

    loop {
        let size = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                debug!("{:?} gone while settling: {}", path, e);
                return false;
            }
        };

        let now = Instant::now();
        if last_size == Some(size) {
            if now.duration_since(stable_since) >= settle {
                return true;
            }
        } else {
            last_size = Some(size);
            stable_since = now;
            if settle.is_zero() {
                return true;
            }
        }
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_debouncer_full::DebouncedEvent;
    use notify_debouncer_full::notify::EventKind;
    use notify_debouncer_full::notify::event::{
        CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode,
    };
    use std::time::Instant as StdInstant;
    use tempfile::tempdir;

    fn make_event(kind: EventKind, paths: Vec<PathBuf>) -> DebouncedEvent {
        DebouncedEvent {
            event: notify_debouncer_full::notify::Event {
                kind,
                paths,
                attrs: Default::default(),
            },
            time: StdInstant::now(),
        }
    }

    #[test]
    fn test_convert_event_create() {
        let path = PathBuf::from("/inbox/photo.png");
        let event = make_event(EventKind::Create(CreateKind::File), vec![path.clone()]);

        assert_eq!(convert_event(&event, Path::new("/inbox")), Some(path));
    }

    #[test]
    fn test_convert_event_rename_into_inbox() {
        let from = PathBuf::from("/downloads/report.docx");
        let to = PathBuf::from("/inbox/report.docx");

        let both = make_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec![from, to.clone()],
        );
        assert_eq!(convert_event(&both, Path::new("/inbox")), Some(to.clone()));

        let only_to = make_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            vec![to.clone()],
        );
        assert_eq!(convert_event(&only_to, Path::new("/inbox")), Some(to));
    }

    #[test]
    fn test_convert_event_ignores_modify_and_remove() {
        let path = PathBuf::from("/inbox/photo.png");

        let modify = make_event(
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            vec![path.clone()],
        );
        let rename_from = make_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            vec![path.clone()],
        );
        let remove = make_event(EventKind::Remove(RemoveKind::File), vec![path]);

        assert!(convert_event(&modify, Path::new("/inbox")).is_none());
        assert!(convert_event(&rename_from, Path::new("/inbox")).is_none());
        assert!(convert_event(&remove, Path::new("/inbox")).is_none());
    }

    #[test]
    fn test_hidden_files_skipped() {
        let path = PathBuf::from("/inbox/.photo.png.part");
        let event = make_event(EventKind::Create(CreateKind::File), vec![path]);

        assert!(convert_event(&event, Path::new("/inbox")).is_none());
    }

    #[test]
    fn test_convert_event_unspecified_rename() {
        let dir = tempdir().unwrap();
        let inbox = dir.path().canonicalize().unwrap();
        let arrived = inbox.join("scan.png");
        std::fs::write(&arrived, b"png").unwrap();
        std::fs::create_dir(inbox.join("processed")).unwrap();
        let nested = inbox.join("processed").join("report.docx");
        std::fs::write(&nested, b"zip").unwrap();

        let rename = |path: &Path| {
            make_event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
                vec![path.to_path_buf()],
            )
        };

        assert_eq!(convert_event(&rename(&arrived), &inbox), Some(arrived.clone()));
        // The old name of a file moved away no longer exists.
        assert!(convert_event(&rename(&inbox.join("moved_out.png")), &inbox).is_none());
        assert!(convert_event(&rename(&nested), &inbox).is_none());
    }

    #[tokio::test]
    async fn test_watcher_keeps_inbox() {
        let dir = tempdir().unwrap();
        let (tx, _rx) = tokio_mpsc::channel(8);
        let mut watcher = InboxWatcher::new(dir.path(), tx, Duration::from_millis(50)).unwrap();

        assert_eq!(watcher.inbox(), dir.path().canonicalize().unwrap().as_path());
        watcher.watch().unwrap();
    }

    #[tokio::test]
    async fn test_wait_until_settled_stable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"done").unwrap();

        let settled =
            wait_until_settled(&path, Duration::from_millis(30), Duration::from_millis(5)).await;
        assert!(settled);
    }

    #[tokio::test]
    async fn test_wait_until_settled_missing_file() {
        let dir = tempdir().unwrap();
        let settled = wait_until_settled(
            &dir.path().join("gone.png"),
            Duration::from_millis(30),
            Duration::from_millis(5),
        )
        .await;
        assert!(!settled);
    }

    #[tokio::test]
    async fn test_wait_until_settled_waits_for_growth_to_stop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("slow.png");
        std::fs::write(&path, b"a").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let mut data = tokio::fs::read(&writer_path).await.unwrap();
                data.push(b'a');
                tokio::fs::write(&writer_path, data).await.unwrap();
            }
        });

        let started = StdInstant::now();
        assert!(
            wait_until_settled(&path, Duration::from_millis(60), Duration::from_millis(5)).await
        );
        writer.await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
