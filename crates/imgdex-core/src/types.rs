//! Core types for imgdex.
//!
//! ## Image Store
//! - [`StoredImage`]: An image persisted under its allocated sequence number
//! - [`IMAGE_EXTENSIONS`]: Extensions accepted as bare images
//!
//! ## Extraction
//! - [`ArchiveEntry`]: An embedded image read out of a container archive
//! - [`ContainerKind`]: The supported container formats
//! - [`FileKind`]: Routing decision for an inbox file
//!
//! ## Text Index
//! - [`TextRecord`]: A recognized `(filename, text)` pair
//! - [`InsertOutcome`]: What `insert_if_novel` did
//!
//! ## Reporting
//! - [`SweepReport`]: Counters of one OCR sweep
//! - [`StoreStatus`]: Stored / indexed / pending counts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Lower-cased extensions (without the dot) accepted as bare images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff"];

/// Filename prefix of every stored image.
pub const STORED_IMAGE_PREFIX: &str = "img_";

/// Extension used when raw bytes arrive without one.
pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

/// Lower-cased extension of a path, without the leading dot.
#[must_use]
pub fn normalized_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

/// Whether `ext` (any case, with or without a leading dot) is a bare image extension.
#[must_use]
pub fn is_image_extension(ext: &str) -> bool {
    let ext = ext.trim_start_matches('.').to_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

// ============================================================================
// Stored Images
// ============================================================================

/// An image file in the image store, named `img_<sequence>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    /// Allocated sequence number
    pub sequence: u64,
    /// Lower-cased extension without the dot
    pub extension: String,
    /// Absolute location inside the store
    pub path: PathBuf,
}

impl StoredImage {
    /// Build the stored filename for a sequence number and extension.
    #[must_use]
    pub fn file_name_for(sequence: u64, extension: &str) -> String {
        format!(
            "{STORED_IMAGE_PREFIX}{sequence}.{}",
            extension.trim_start_matches('.')
        )
    }

    /// Parse a stored image from its path.
    ///
    /// Only names of the form `img_<n>.<ext>` with `ext` in
    /// [`IMAGE_EXTENSIONS`] are recognized.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (stem, extension) = name.rsplit_once('.')?;
        let sequence = stem.strip_prefix(STORED_IMAGE_PREFIX)?.parse().ok()?;
        let extension = extension.to_lowercase();
        if !is_image_extension(&extension) {
            return None;
        }
        Some(Self {
            sequence,
            extension,
            path: path.to_path_buf(),
        })
    }

    /// Filename used as the text index key.
    #[must_use]
    pub fn file_name(&self) -> String {
        Self::file_name_for(self.sequence, &self.extension)
    }
}

/// Best-effort parse of the sequence segment of a store filename.
///
/// Accepts anything starting with `img_` followed by digits up to the first
/// dot (or the end of the name). Everything else is ignored.
#[must_use]
pub fn parse_sequence(file_name: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(STORED_IMAGE_PREFIX)?;
    let digits = rest.split('.').next()?;
    digits.parse().ok()
}

// ============================================================================
// Extraction
// ============================================================================

/// Supported container archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// Word-processing document (`.docx`)
    Docx,
    /// Presentation (`.pptx`)
    Pptx,
}

impl ContainerKind {
    /// Archive folder holding embedded media.
    #[must_use]
    pub fn media_prefix(self) -> &'static str {
        match self {
            Self::Docx => "word/media/",
            Self::Pptx => "ppt/media/",
        }
    }

    /// File extension of this container kind.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pptx => "pptx",
        }
    }

    /// Container kind for an extension, if any.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            _ => None,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// An image read out of a container archive. Never persisted as-is.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Entry name inside the archive
    pub name: String,
    /// Lower-cased extension without the dot
    pub extension: String,
    /// Raw image bytes
    pub data: Vec<u8>,
}

/// Routing decision for an incoming file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// Bare image, stored directly (carries the lower-cased extension)
    Image(String),
    /// Container archive, images extracted then the archive is relocated
    Container(ContainerKind),
    /// Anything else
    Unsupported,
}

// ============================================================================
// Text Index
// ============================================================================

/// A recognized text stored under the image filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRecord {
    /// Stored image filename (unique)
    pub filename: String,
    /// Recognized text, possibly empty
    pub text: String,
    /// When the record was inserted
    pub indexed_at: DateTime<Utc>,
}

/// Result of [`TextIndex::insert_if_novel`](crate::TextIndex::insert_if_novel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    /// A new record was written
    Inserted,
    /// The same text is already stored under another filename
    DuplicateText,
    /// The filename already has a record
    AlreadyIndexed,
}

// ============================================================================
// Reporting
// ============================================================================

/// Counters produced by one `process_pending` sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Images that had no record when the sweep started
    pub pending: usize,
    /// New records written
    pub indexed: usize,
    /// Images whose text was already stored under another filename
    pub duplicates: usize,
    /// Images that failed (decode, OCR or index error)
    pub failed: usize,
}

impl SweepReport {
    /// Merge another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.pending += other.pending;
        self.indexed += other.indexed;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
    }
}

/// Snapshot of the store and index sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    /// Images in the image store
    pub stored_images: u64,
    /// Records in the text index
    pub indexed_records: u64,
    /// Stored images without a record
    pub pending_images: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== StoredImage Tests ====================

    #[test]
    fn test_stored_image_file_name() {
        assert_eq!(StoredImage::file_name_for(1, "png"), "img_1.png");
        assert_eq!(StoredImage::file_name_for(42, ".jpeg"), "img_42.jpeg");
    }

    #[test]
    fn test_stored_image_from_path() {
        let image = StoredImage::from_path(Path::new("/store/img_7.PNG")).unwrap();
        assert_eq!(image.sequence, 7);
        assert_eq!(image.extension, "png");
        assert_eq!(image.file_name(), "img_7.png");
    }

    #[test]
    fn test_stored_image_from_path_rejects_foreign_names() {
        assert!(StoredImage::from_path(Path::new("/store/photo.png")).is_none());
        assert!(StoredImage::from_path(Path::new("/store/img_x.png")).is_none());
        assert!(StoredImage::from_path(Path::new("/store/img_3.txt")).is_none());
        assert!(StoredImage::from_path(Path::new("/store/img_3")).is_none());
        assert!(StoredImage::from_path(Path::new("/store/.img_3.png.part")).is_none());
    }

    #[test]
    fn test_parse_sequence_best_effort() {
        assert_eq!(parse_sequence("img_12.png"), Some(12));
        assert_eq!(parse_sequence("img_12"), Some(12));
        assert_eq!(parse_sequence("img_12.tar.gz"), Some(12));
        assert_eq!(parse_sequence("img_.png"), None);
        assert_eq!(parse_sequence("img_abc.png"), None);
        assert_eq!(parse_sequence("image_3.png"), None);
        assert_eq!(parse_sequence(".img_3.png.part"), None);
    }

    #[test]
    fn test_extension_helpers() {
        assert_eq!(
            normalized_extension(Path::new("/a/Photo.JPG")),
            Some("jpg".to_string())
        );
        assert_eq!(normalized_extension(Path::new("/a/README")), None);
        assert!(is_image_extension("TIFF"));
        assert!(is_image_extension(".bmp"));
        assert!(!is_image_extension("gif"));
    }

    // ==================== ContainerKind Tests ====================

    #[test]
    fn test_container_kind_media_prefix() {
        assert_eq!(ContainerKind::Docx.media_prefix(), "word/media/");
        assert_eq!(ContainerKind::Pptx.media_prefix(), "ppt/media/");
    }

    #[test]
    fn test_container_kind_from_extension() {
        assert_eq!(ContainerKind::from_extension("DOCX"), Some(ContainerKind::Docx));
        assert_eq!(ContainerKind::from_extension(".pptx"), Some(ContainerKind::Pptx));
        assert_eq!(ContainerKind::from_extension("xlsx"), None);
        assert_eq!(ContainerKind::Pptx.to_string(), "pptx");
    }

    // ==================== Reporting Tests ====================

    #[test]
    fn test_sweep_report_merge() {
        let mut total = SweepReport {
            pending: 2,
            indexed: 1,
            duplicates: 1,
            failed: 0,
        };
        total.merge(SweepReport {
            pending: 3,
            indexed: 2,
            duplicates: 0,
            failed: 1,
        });
        assert_eq!(total.pending, 5);
        assert_eq!(total.indexed, 3);
        assert_eq!(total.duplicates, 1);
        assert_eq!(total.failed, 1);
    }

    #[test]
    fn test_insert_outcome_serialization() {
        assert_eq!(
            serde_json::to_string(&InsertOutcome::DuplicateText).unwrap(),
            "\"duplicate_text\""
        );
        assert_eq!(
            serde_json::to_string(&InsertOutcome::Inserted).unwrap(),
            "\"inserted\""
        );
    }

    #[test]
    fn test_text_record_serialization() {
        let record = TextRecord {
            filename: "img_1.png".to_string(),
            text: "INVOICE".to_string(),
            indexed_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: TextRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
