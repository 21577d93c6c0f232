//! Image store: one file per ingested image, named by sequence number.

use imgdex_core::{
    DEFAULT_IMAGE_EXTENSION, StorageError, StoredImage, normalized_extension,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::sequence::SequenceAllocator;

/// Flat directory of `img_<sequence>.<ext>` files.
///
/// Every write goes through the store's single [`SequenceAllocator`]; the
/// allocation and the final rename into place happen under the same guard,
/// so two concurrent ingests can never pick the same name.
pub struct ImageStore {
    root: PathBuf,
    allocator: SequenceAllocator,
}

impl ImageStore {
    /// Create a store rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        let allocator = SequenceAllocator::new(root.clone());
        Self { root, allocator }
    }

    /// Store directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a stored image by filename.
    #[must_use]
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Create the store directory.
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::io("create directory", &self.root, e))
    }

    /// Write raw image bytes under a newly allocated name.
    ///
    /// The bytes go to a hidden temporary file first and are renamed into
    /// place, so a failed write never leaves a truncated `img_<n>` file.
    pub async fn store(&self, data: &[u8], extension: &str) -> Result<StoredImage, StorageError> {
        let extension = normalize(extension);

        let guard = self.allocator.acquire().await;
        let sequence = guard.next_id().await?;
        let file_name = StoredImage::file_name_for(sequence, &extension);
        let target = self.root.join(&file_name);
        let staging = staging_path(&self.root, &file_name);

        if let Err(e) = tokio::fs::write(&staging, data).await {
            discard(&staging).await;
            return Err(StorageError::io("write", &staging, e));
        }
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            discard(&staging).await;
            return Err(StorageError::io("rename", &target, e));
        }
        drop(guard);

        info!("Image saved: {:?}", target);
        Ok(StoredImage {
            sequence,
            extension,
            path: target,
        })
    }

    /// Move an existing file into the store under a newly allocated name.
    ///
    /// The source is relocated, not copied: afterwards it no longer exists
    /// at its original path.
    pub async fn store_from_path(&self, source: &Path) -> Result<StoredImage, StorageError> {
        let extension = normalize(
            normalized_extension(source)
                .as_deref()
                .unwrap_or(DEFAULT_IMAGE_EXTENSION),
        );

        let guard = self.allocator.acquire().await;
        if let Err(e) = tokio::fs::metadata(source).await {
            return Err(StorageError::io("move", source, e));
        }
        let sequence = guard.next_id().await?;
        let file_name = StoredImage::file_name_for(sequence, &extension);
        let target = self.root.join(&file_name);

        move_file(source, &target, &staging_path(&self.root, &file_name)).await?;
        drop(guard);

        info!("Image saved: {:?} (from {:?})", target, source);
        Ok(StoredImage {
            sequence,
            extension,
            path: target,
        })
    }

    /// All stored images, ordered by sequence number.
    pub async fn list(&self) -> Result<Vec<StoredImage>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::io("list", &self.root, e))?;

        let mut images = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io("list", &self.root, e))?
        {
            let path = entry.path();
            match StoredImage::from_path(&path) {
                Some(image) => images.push(image),
                None => debug!("Skipping non-image store entry {:?}", path),
            }
        }

        images.sort_by_key(|image| image.sequence);
        Ok(images)
    }
}

/// Move a file to `target`, replacing any file already there.
///
/// Falls back to copy-then-delete when a plain rename is impossible (for
/// example across filesystems).
pub async fn relocate(source: &Path, target: &Path) -> Result<(), StorageError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    move_file(source, target, &staging_path(dir, &name)).await
}

async fn move_file(source: &Path, target: &Path, staging: &Path) -> Result<(), StorageError> {
    match tokio::fs::rename(source, target).await {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::io("move", source, e));
        }
        Err(e) => {
            debug!("Rename {:?} -> {:?} failed ({}), copying", source, target, e);
        }
    }

    if let Err(e) = tokio::fs::copy(source, staging).await {
        discard(staging).await;
        return Err(StorageError::io("copy", source, e));
    }
    if let Err(e) = tokio::fs::rename(staging, target).await {
        discard(staging).await;
        return Err(StorageError::io("rename", target, e));
    }
    if let Err(e) = tokio::fs::remove_file(source).await {
        warn!("Copied {:?} but could not remove the original: {}", source, e);
        return Err(StorageError::io("remove", source, e));
    }
    Ok(())
}

fn staging_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(format!(".{file_name}.part"))
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to remove staging file {:?}: {}", path, e);
    }
}

fn normalize(extension: &str) -> String {
    let ext = extension.trim_start_matches('.').to_lowercase();
    if ext.is_empty() {
        DEFAULT_IMAGE_EXTENSION.to_string()
    } else {
        ext
    }
}
