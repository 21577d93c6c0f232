//! In-memory text index for testing without SQLite.
//!
//! [`MemoryIndex`] keeps records in insertion order behind a single lock,
//! giving the same dedup and ordering semantics as
//! [`SqliteIndex`](crate::SqliteIndex) without touching disk.

use async_trait::async_trait;
use chrono::Utc;
use imgdex_core::{IndexError, InsertOutcome, TextIndex, TextRecord};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory text index.
///
/// # Example
///
/// ```rust
/// use imgdex_store::MemoryIndex;
/// use imgdex_core::{InsertOutcome, TextIndex};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let index = MemoryIndex::new();
/// index.init().await?;
///
/// assert_eq!(index.insert_if_novel("img_1.png", "hello").await?, InsertOutcome::Inserted);
/// assert_eq!(index.insert_if_novel("img_2.png", "hello").await?, InsertOutcome::DuplicateText);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MemoryIndex {
    records: Arc<RwLock<Vec<TextRecord>>>,
}

impl MemoryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record in insertion order.
    pub async fn records(&self) -> Vec<TextRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl TextIndex for MemoryIndex {
    async fn init(&self) -> Result<(), IndexError> {
        debug!("MemoryIndex initialized");
        Ok(())
    }

    async fn has_record(&self, filename: &str) -> Result<bool, IndexError> {
        let records = self.records.read().await;
        Ok(records.iter().any(|r| r.filename == filename))
    }

    async fn insert_if_novel(
        &self,
        filename: &str,
        text: &str,
    ) -> Result<InsertOutcome, IndexError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.filename == filename) {
            return Ok(InsertOutcome::AlreadyIndexed);
        }
        if records.iter().any(|r| r.text == text) {
            debug!("Duplicate text, skipping {}", filename);
            return Ok(InsertOutcome::DuplicateText);
        }
        records.push(TextRecord {
            filename: filename.to_string(),
            text: text.to_string(),
            indexed_at: Utc::now(),
        });
        Ok(InsertOutcome::Inserted)
    }

    async fn search(&self, substring: &str) -> Result<Vec<TextRecord>, IndexError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.text.contains(substring))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64, IndexError> {
        Ok(self.records.read().await.len() as u64)
    }
}
