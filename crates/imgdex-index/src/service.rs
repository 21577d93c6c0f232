//! Ingest service: inbox dispatch, live watching and OCR sweeps.

use imgdex_core::{
    ContainerKind, Error, FileKind, Result, StorageError, StoreStatus, StoredImage, SweepReport,
};
use imgdex_extract::{ArchiveExtractor, Classifier};
use imgdex_ocr::OcrScheduler;
use imgdex_store::{ImageStore, relocate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::watcher::{InboxWatcher, wait_until_settled};

/// Ingest update events.
#[derive(Debug, Clone)]
pub enum IngestUpdate {
    FileStored { source: PathBuf, stored: PathBuf },
    ArchiveExtracted { source: PathBuf, images: usize, archived_to: PathBuf },
    FileRejected { path: PathBuf },
    FileError { path: PathBuf, error: String },
    SweepFinished { report: SweepReport },
}

/// Configuration for the ingest service.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Watched inbox directory
    pub inbox: PathBuf,
    /// Where containers go after their images are stored
    pub processed: PathBuf,
    /// Debounce window for filesystem events
    pub debounce: Duration,
    /// How long a new file's size must stay unchanged before dispatch
    pub settle: Duration,
    /// Size sampling interval while settling
    pub settle_poll: Duration,
    /// Upper bound on waiting for the watcher task at shutdown
    pub shutdown_timeout: Duration,
}

impl IngestConfig {
    /// Defaults for an inbox, with the processed area inside it.
    #[must_use]
    pub fn new(inbox: PathBuf) -> Self {
        Self {
            processed: inbox.join("processed"),
            inbox,
            debounce: Duration::from_millis(500),
            settle: Duration::from_millis(1000),
            settle_poll: Duration::from_millis(200),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// What [`IngestService::dispatch`] did with a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Bare image moved into the store
    Stored(StoredImage),
    /// Container images stored, container moved to the processed area
    Extracted {
        images: Vec<StoredImage>,
        archived_to: PathBuf,
    },
    /// Unsupported type, left in place
    Rejected,
    /// Not a regular file, or already gone
    Skipped,
}

/// Counters of one inbox sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboxReport {
    pub stored: usize,
    pub archives: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl InboxReport {
    fn record(&mut self, outcome: &Result<DispatchOutcome>) {
        match outcome {
            Ok(DispatchOutcome::Stored(_)) => self.stored += 1,
            Ok(DispatchOutcome::Extracted { .. }) => self.archives += 1,
            Ok(DispatchOutcome::Rejected) => self.rejected += 1,
            Ok(DispatchOutcome::Skipped) => {}
            Err(_) => self.failed += 1,
        }
    }
}

/// Everything the dispatch path needs, shared with the watcher task.
#[derive(Clone)]
struct Pipeline {
    config: Arc<IngestConfig>,
    images: Arc<ImageStore>,
    classifier: Arc<Classifier>,
    extractor: ArchiveExtractor,
    scheduler: Arc<OcrScheduler>,
    update_tx: broadcast::Sender<IngestUpdate>,
    /// Serializes dispatch so a sweep and the watcher never handle the
    /// same file at once
    dispatch_lock: Arc<Mutex<()>>,
}

impl Pipeline {
    async fn dispatch(&self, path: &Path) -> Result<DispatchOutcome> {
        let _guard = self.dispatch_lock.lock().await;
        match self.route(path).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Failed to ingest {:?}: {}", path, e);
                let _ = self.update_tx.send(IngestUpdate::FileError {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn route(&self, path: &Path) -> Result<DispatchOutcome> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{:?} no longer exists, skipping", path);
                return Ok(DispatchOutcome::Skipped);
            }
            Err(e) => return Err(StorageError::io("inspect", path, e).into()),
        };
        if !metadata.is_file() {
            debug!("{:?} is not a regular file, skipping", path);
            return Ok(DispatchOutcome::Skipped);
        }

        match self.classifier.classify(path) {
            FileKind::Image(_) => {
                info!("Processing image file: {:?}", path);
                let stored = self.images.store_from_path(path).await?;
                let _ = self.update_tx.send(IngestUpdate::FileStored {
                    source: path.to_path_buf(),
                    stored: stored.path.clone(),
                });
                Ok(DispatchOutcome::Stored(stored))
            }
            FileKind::Container(kind) => {
                info!("Processing {} file: {:?}", kind, path);
                let images = self.extract(path, kind).await?;
                let archived_to = self.archive(path).await?;
                let _ = self.update_tx.send(IngestUpdate::ArchiveExtracted {
                    source: path.to_path_buf(),
                    images: images.len(),
                    archived_to: archived_to.clone(),
                });
                Ok(DispatchOutcome::Extracted {
                    images,
                    archived_to,
                })
            }
            FileKind::Unsupported => {
                warn!("Unsupported format, leaving {:?} in place", path);
                let _ = self.update_tx.send(IngestUpdate::FileRejected {
                    path: path.to_path_buf(),
                });
                Ok(DispatchOutcome::Rejected)
            }
        }
    }

    /// Store every embedded image. The container is untouched on failure;
    /// images stored before the failure stay in the store.
    async fn extract(&self, path: &Path, kind: ContainerKind) -> Result<Vec<StoredImage>> {
        let mut entries = self.extractor.images(path, kind);
        let mut stored = Vec::new();
        while let Some(entry) = entries.next().await {
            let entry = entry?;
            debug!("Storing {} from {:?}", entry.name, path);
            stored.push(self.images.store(&entry.data, &entry.extension).await?);
        }
        info!("Extracted {} images from {:?}", stored.len(), path);
        Ok(stored)
    }

    async fn archive(&self, path: &Path) -> Result<PathBuf> {
        let name = path
            .file_name()
            .ok_or_else(|| Error::Other(format!("{path:?} has no file name")))?;
        let processed = &self.config.processed;
        tokio::fs::create_dir_all(processed)
            .await
            .map_err(|e| StorageError::io("create directory", processed, e))?;

        let target = processed.join(name);
        relocate(path, &target).await?;
        info!("Moved {:?} to {:?}", path, target);
        Ok(target)
    }

    async fn process_pending(&self) -> Result<SweepReport> {
        let report = self.scheduler.process_pending().await?;
        let _ = self.update_tx.send(IngestUpdate::SweepFinished { report });
        Ok(report)
    }
}

struct WatchHandle {
    watcher: InboxWatcher,
    task: JoinHandle<()>,
}

/// Ingestion front door.
///
/// Both the startup backlog sweep and the live watcher go through
/// [`dispatch`](Self::dispatch), so a file is handled the same way no
/// matter how it was noticed.
pub struct IngestService {
    pipeline: Pipeline,
    watch: Mutex<Option<WatchHandle>>,
}

impl IngestService {
    /// Create a new ingest service.
    pub fn new(config: IngestConfig, images: Arc<ImageStore>, scheduler: Arc<OcrScheduler>) -> Self {
        let (update_tx, _) = broadcast::channel(256);
        Self {
            pipeline: Pipeline {
                config: Arc::new(config),
                images,
                classifier: Arc::new(Classifier::new()),
                extractor: ArchiveExtractor::new(),
                scheduler,
                update_tx,
                dispatch_lock: Arc::new(Mutex::new(())),
            },
            watch: Mutex::new(None),
        }
    }

    /// Subscribe to ingest updates.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestUpdate> {
        self.pipeline.update_tx.subscribe()
    }

    /// Image store fed by the service.
    pub fn images(&self) -> &Arc<ImageStore> {
        &self.pipeline.images
    }

    /// Create the inbox, processed and store directories and the index.
    pub async fn init(&self) -> Result<()> {
        let config = &self.pipeline.config;
        for dir in [&config.inbox, &config.processed] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io("create directory", dir, e))?;
        }
        self.pipeline.images.init().await?;
        self.pipeline.scheduler.index().init().await?;
        Ok(())
    }

    /// Route one file: store it, extract it, or reject it.
    pub async fn dispatch(&self, path: &Path) -> Result<DispatchOutcome> {
        self.pipeline.dispatch(path).await
    }

    /// Dispatch every regular, non-hidden file directly inside the inbox.
    ///
    /// Failures are counted, not returned; only an unreadable inbox is an
    /// error.
    pub async fn sweep_inbox(&self) -> Result<InboxReport> {
        let inbox = &self.pipeline.config.inbox;
        let mut entries = tokio::fs::read_dir(inbox)
            .await
            .map_err(|e| StorageError::io("list", inbox, e))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io("list", inbox, e))?
        {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut report = InboxReport::default();
        for path in paths {
            report.record(&self.pipeline.dispatch(&path).await);
        }
        info!(
            "Inbox sweep: {} stored, {} archives, {} rejected, {} failed",
            report.stored, report.archives, report.rejected, report.failed
        );
        Ok(report)
    }

    /// Dispatch the given files, then run one OCR sweep.
    pub async fn ingest(&self, paths: &[PathBuf]) -> Result<(InboxReport, SweepReport)> {
        let mut report = InboxReport::default();
        for path in paths {
            report.record(&self.pipeline.dispatch(path).await);
        }
        let sweep = self.pipeline.process_pending().await?;
        Ok((report, sweep))
    }

    /// Run one OCR sweep over the store.
    pub async fn process_pending(&self) -> Result<SweepReport> {
        self.pipeline.process_pending().await
    }

    /// Stored, indexed and pending counts.
    pub async fn status(&self) -> Result<StoreStatus> {
        self.pipeline.scheduler.status().await
    }

    /// Whether the watcher is active.
    pub async fn is_running(&self) -> bool {
        self.watch.lock().await.is_some()
    }

    /// Start watching the inbox.
    ///
    /// Each new file is settled, dispatched and followed by an OCR sweep.
    /// Files that arrived before the watch was in place are picked up by a
    /// catch-up sweep of the inbox.
    pub async fn start(&self) -> Result<()> {
        let mut watch = self.watch.lock().await;
        if watch.is_some() {
            return Ok(());
        }

        let config = Arc::clone(&self.pipeline.config);
        let (event_tx, mut event_rx) = mpsc::channel(1024);
        let mut watcher = InboxWatcher::new(&config.inbox, event_tx, config.debounce)
            .map_err(|e| Error::Other(format!("watcher error: {e}")))?;
        watcher
            .watch()
            .map_err(|e| Error::Other(format!("watch error: {e}")))?;
        info!("Watching {:?}", watcher.inbox());

        let pipeline = self.pipeline.clone();
        let task = tokio::spawn(async move {
            while let Some(path) = event_rx.recv().await {
                info!("New file detected: {:?}", path);
                if !wait_until_settled(&path, config.settle, config.settle_poll).await {
                    continue;
                }
                // Errors are already logged and broadcast by dispatch.
                let _ = pipeline.dispatch(&path).await;
                if let Err(e) = pipeline.process_pending().await {
                    error!("OCR sweep failed: {}", e);
                }
            }
            debug!("Inbox watcher task finished");
        });

        *watch = Some(WatchHandle { watcher, task });
        drop(watch);

        self.sweep_inbox().await?;
        Ok(())
    }

    /// Stop watching and wait for the file being handled to finish.
    ///
    /// The wait is bounded by the configured shutdown timeout; past it the
    /// task is aborted.
    pub async fn stop(&self) {
        let Some(WatchHandle { watcher, mut task }) = self.watch.lock().await.take() else {
            return;
        };
        drop(watcher);

        let timeout = self.pipeline.config.shutdown_timeout;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => info!("Inbox watcher stopped"),
            Ok(Err(e)) => error!("Inbox watcher task failed: {}", e),
            Err(_) => {
                warn!("Inbox watcher did not stop within {:?}, aborting", timeout);
                task.abort();
            }
        }
    }
}
