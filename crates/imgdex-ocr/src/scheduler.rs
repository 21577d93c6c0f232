//! OCR sweep over the image store.

use imgdex_core::{Error, InsertOutcome, StoreStatus, StoredImage, SweepReport, TextIndex};
use imgdex_store::ImageStore;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::pool::RecognizerPool;

/// Recognizes every stored image that has no text record yet.
///
/// The pending set is recomputed from the store listing and the index on
/// every sweep; nothing is queued between sweeps. Sweeps are serialized so
/// the same image is never handed to two workers at once.
pub struct OcrScheduler {
    images: Arc<ImageStore>,
    index: Arc<dyn TextIndex>,
    pool: Arc<RecognizerPool>,
    sweep_lock: Mutex<()>,
    /// Images whose text turned out to be a duplicate during this run.
    /// They have no record, so without this they would be recognized again
    /// on every sweep.
    duplicates: Mutex<HashSet<String>>,
}

impl OcrScheduler {
    /// Create a scheduler over a store and an index.
    pub fn new(
        images: Arc<ImageStore>,
        index: Arc<dyn TextIndex>,
        pool: Arc<RecognizerPool>,
    ) -> Self {
        Self {
            images,
            index,
            pool,
            sweep_lock: Mutex::new(()),
            duplicates: Mutex::new(HashSet::new()),
        }
    }

    /// Worker pool used for recognition.
    pub fn pool(&self) -> &Arc<RecognizerPool> {
        &self.pool
    }

    /// Text index written by the sweep.
    pub fn index(&self) -> &Arc<dyn TextIndex> {
        &self.index
    }

    /// Stored images with no text record.
    pub async fn pending(&self) -> Result<Vec<StoredImage>, Error> {
        let mut pending = Vec::new();
        for image in self.images.list().await? {
            if !self.index.has_record(&image.file_name()).await? {
                pending.push(image);
            }
        }
        Ok(pending)
    }

    /// Stored, indexed and pending counts.
    pub async fn status(&self) -> Result<StoreStatus, Error> {
        let stored = self.images.list().await?.len() as u64;
        let indexed = self.index.count().await?;
        let pending = self.pending().await?.len() as u64;
        Ok(StoreStatus {
            stored_images: stored,
            indexed_records: indexed,
            pending_images: pending,
        })
    }

    /// Run one sweep.
    ///
    /// Per-image failures are logged and counted; the image stays pending
    /// and is retried by the next sweep. Only a failure to list the store
    /// aborts the sweep.
    pub async fn process_pending(&self) -> Result<SweepReport, Error> {
        let _sweep = self.sweep_lock.lock().await;
        let mut report = SweepReport::default();

        let stored = self.images.list().await?;
        let skipped = self.duplicates.lock().await.clone();

        let mut work = Vec::new();
        for image in stored {
            let name = image.file_name();
            if skipped.contains(&name) {
                continue;
            }
            match self.index.has_record(&name).await {
                Ok(true) => debug!("{} already processed", name),
                Ok(false) => work.push(image),
                Err(e) => {
                    warn!("Index lookup failed for {}: {}", name, e);
                    report.failed += 1;
                }
            }
        }

        report.pending = work.len();
        if work.is_empty() {
            info!("No images to process in {:?}", self.images.root());
            return Ok(report);
        }
        info!(
            "Processing {} images with {} workers",
            work.len(),
            self.pool.max_concurrent()
        );

        let mut tasks = JoinSet::new();
        for image in work {
            let pool = Arc::clone(&self.pool);
            let index = Arc::clone(&self.index);
            tasks.spawn(async move {
                let name = image.file_name();
                let outcome = recognize_and_index(&pool, index.as_ref(), &image).await;
                (name, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(InsertOutcome::Inserted))) => report.indexed += 1,
                Ok((name, Ok(InsertOutcome::DuplicateText))) => {
                    report.duplicates += 1;
                    self.duplicates.lock().await.insert(name);
                }
                Ok((name, Ok(InsertOutcome::AlreadyIndexed))) => {
                    debug!("{} was indexed concurrently", name);
                }
                Ok((name, Err(e))) => {
                    warn!("OCR failed for {}: {}", name, e);
                    report.failed += 1;
                }
                Err(e) => {
                    error!("OCR worker task failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Sweep finished: {} pending, {} indexed, {} duplicates, {} failed",
            report.pending, report.indexed, report.duplicates, report.failed
        );
        Ok(report)
    }
}

async fn recognize_and_index(
    pool: &RecognizerPool,
    index: &dyn TextIndex,
    image: &StoredImage,
) -> Result<InsertOutcome, Error> {
    let text = pool.recognize_file(&image.path).await?;
    Ok(index.insert_if_novel(&image.file_name(), &text).await?)
}
