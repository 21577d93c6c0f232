//! Core traits for imgdex components.
//!
//! - [`TextIndex`]: Persist recognized text with filename and content dedup
//! - [`OcrEngine`]: Turn an in-memory image into text
//!
//! Both are object-safe so the pipeline can hold them as `Arc<dyn ...>` and
//! tests can substitute in-memory or scripted implementations.

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::{IndexError, RecognizeError};
use crate::types::{InsertOutcome, TextRecord};

// ============================================================================
// Text Index
// ============================================================================

/// Durable `filename → text` store.
///
/// Implementations must be safe to call from many OCR workers at once and
/// must serialize writes so that both dedup checks and the insert happen
/// atomically with respect to other writers.
#[async_trait]
pub trait TextIndex: Send + Sync {
    /// Create tables or other backing structures.
    async fn init(&self) -> Result<(), IndexError>;

    /// Whether a record exists for `filename`.
    async fn has_record(&self, filename: &str) -> Result<bool, IndexError>;

    /// Insert a record unless the filename is already indexed or the exact
    /// same text is already stored under any filename. Never overwrites.
    async fn insert_if_novel(&self, filename: &str, text: &str)
    -> Result<InsertOutcome, IndexError>;

    /// Case-sensitive substring search, in insertion order.
    async fn search(&self, substring: &str) -> Result<Vec<TextRecord>, IndexError>;

    /// Number of records.
    async fn count(&self) -> Result<u64, IndexError>;
}

// ============================================================================
// OCR
// ============================================================================

/// Optical character recognition backend.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Engine identifier for logs.
    fn name(&self) -> &str;

    /// Language hint passed to the engine.
    fn language(&self) -> &str;

    /// Check that the engine is usable.
    async fn init(&self) -> Result<(), RecognizeError> {
        Ok(())
    }

    /// Recognize the text in an image.
    async fn recognize(&self, image: &DynamicImage) -> Result<String, RecognizeError>;
}
