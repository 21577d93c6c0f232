//! Recognizer pool for concurrent OCR operations.

use imgdex_core::{OcrEngine, RecognizeError};
use imgdex_extract::load_image;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// OCR engine with concurrency control.
///
/// At most `max_concurrent` images are loaded and recognized at the same
/// time; further callers wait for a permit.
pub struct RecognizerPool {
    /// Engine shared by every worker
    engine: Arc<dyn OcrEngine>,
    /// Semaphore to limit concurrent recognition
    semaphore: Semaphore,
    /// Maximum concurrent operations
    max_concurrent: usize,
}

impl RecognizerPool {
    /// Create a new pool. A zero worker count is raised to one.
    pub fn new(engine: Arc<dyn OcrEngine>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            engine,
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
        }
    }

    /// Engine name.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Language hint passed to the engine.
    pub fn language(&self) -> &str {
        self.engine.language()
    }

    /// Load the image at `path` and recognize its text.
    pub async fn recognize_file(&self, path: &Path) -> Result<String, RecognizeError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| RecognizeError::Engine(format!("semaphore error: {e}")))?;

        let image = load_image(path).await?;
        debug!("Recognizing {:?} with {}", path, self.engine.name());
        self.engine.recognize(&image).await
    }

    /// Get pool statistics.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get max concurrent operations.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
