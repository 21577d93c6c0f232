//! Sequence number allocation for stored images.

use imgdex_core::{StorageError, parse_sequence};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Hands out sequence numbers derived from the store directory contents.
///
/// There is exactly one allocator per image store and it lives as long as
/// the store. Callers hold the [`SequenceGuard`] until the file that
/// consumes the number is visible under its final name, so the scan and the
/// write form one critical section.
pub struct SequenceAllocator {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl SequenceAllocator {
    /// Create an allocator scanning `dir`.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            lock: Mutex::new(()),
        }
    }

    /// Enter the allocation critical section.
    pub async fn acquire(&self) -> SequenceGuard<'_> {
        SequenceGuard {
            dir: &self.dir,
            _guard: self.lock.lock().await,
        }
    }
}

/// Exclusive access to the next sequence number.
pub struct SequenceGuard<'a> {
    dir: &'a Path,
    _guard: MutexGuard<'a, ()>,
}

impl SequenceGuard<'_> {
    /// One more than the highest sequence found in the store, or 1 if empty.
    ///
    /// Gaps left by deleted files are never refilled because only the
    /// maximum matters.
    pub async fn next_id(&self) -> Result<u64, StorageError> {
        let max = max_sequence(self.dir).await?;
        let next = max
            .checked_add(1)
            .ok_or_else(|| StorageError::Allocate("sequence space exhausted".to_string()))?;
        debug!("Allocated sequence {} in {:?}", next, self.dir);
        Ok(next)
    }
}

/// Highest sequence number among the directory entries, 0 when none parse.
async fn max_sequence(dir: &Path) -> Result<u64, StorageError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| StorageError::io("scan", dir, e))?;

    let mut max = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::io("scan", dir, e))?
    {
        if let Some(seq) = entry.file_name().to_str().and_then(parse_sequence) {
            max = max.max(seq);
        }
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_empty_store_starts_at_one() {
        let dir = tempdir().unwrap();
        let allocator = SequenceAllocator::new(dir.path().to_path_buf());

        let guard = allocator.acquire().await;
        assert_eq!(guard.next_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_next_is_max_plus_one_and_gaps_are_kept() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("img_1.png"), b"a").unwrap();
        std::fs::write(dir.path().join("img_5.jpg"), b"b").unwrap();

        let allocator = SequenceAllocator::new(dir.path().to_path_buf());
        assert_eq!(allocator.acquire().await.next_id().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_malformed_names_are_ignored() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("img_2.png"), b"a").unwrap();
        std::fs::write(dir.path().join("img_abc.png"), b"b").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"c").unwrap();
        std::fs::write(dir.path().join(".img_99.png.part"), b"d").unwrap();

        let allocator = SequenceAllocator::new(dir.path().to_path_buf());
        assert_eq!(allocator.acquire().await.next_id().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let allocator = SequenceAllocator::new(dir.path().join("missing"));

        let result = allocator.acquire().await.next_id().await;
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[tokio::test]
    async fn test_guard_serializes_allocate_and_write() {
        let dir = tempdir().unwrap();
        let allocator = Arc::new(SequenceAllocator::new(dir.path().to_path_buf()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let allocator = Arc::clone(&allocator);
            let root = dir.path().to_path_buf();
            handles.push(tokio::spawn(async move {
                let guard = allocator.acquire().await;
                let id = guard.next_id().await.unwrap();
                tokio::fs::write(root.join(format!("img_{id}.png")), b"x")
                    .await
                    .unwrap();
                id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
    }
}
