//! Error types for imgdex.
//!
//! Each pipeline stage has its own error enum so that a failure can be
//! attributed to the single file, image or archive that caused it.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for imgdex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Writing or moving a file into the image store failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Reading an archive failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// The OCR engine could not recognize an image
    #[error("recognition error: {0}")]
    Recognition(#[from] RecognizeError),

    /// The text index could not be read or written
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Image store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{op} failed for {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sequence allocation failed: {0}")]
    Allocate(String),
}

impl StorageError {
    /// Wrap an I/O error with the operation and path it concerns.
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether the failure was caused by a missing source file.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Archive extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("cannot open archive {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("cannot read archive entry {name}: {reason}")]
    Entry { name: String, reason: String },
}

/// OCR errors.
#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("ocr engine failed: {0}")]
    Engine(String),

    #[error("task join error: {0}")]
    Join(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text index errors.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index initialization failed: {0}")]
    Init(String),

    #[error("insert failed: {0}")]
    Insert(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Result type alias for imgdex operations.
pub type Result<T> = std::result::Result<T, Error>;
