//! # imgdex-core
//!
//! Core types and traits shared by every stage of the imgdex pipeline.
//!
//! imgdex ingests images (dropped directly into an inbox or embedded in
//! office archives), stores them under sequence-numbered names, runs OCR
//! over each stored image exactly once and keeps the recognized text in a
//! deduplicated index that supports substring search.
//!
//! ## Architecture
//!
//! ```text
//! Inbox → Classifier → (ArchiveExtractor →) ImageStore → OcrScheduler → TextIndex
//!                                                                          ↓
//!                                                              substring → TextRecord
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`StoredImage`] | An image persisted as `img_<sequence>.<ext>` |
//! | [`ArchiveEntry`] | Raw bytes of an image found inside an archive |
//! | [`TextRecord`] | A `(filename, text)` row of the text index |
//! | [`FileKind`] | How an inbox file is routed |
//! | [`SweepReport`] | Counters produced by one OCR sweep |
//!
//! ## Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`TextIndex`] | Durable filename → text store with both dedup checks |
//! | [`OcrEngine`] | Recognize text in an in-memory image |
//!
//! ## Related Crates
//!
//! - `imgdex-store`: sequence allocation, image store, SQLite text index
//! - `imgdex-extract`: file classification and archive extraction
//! - `imgdex-ocr`: Tesseract engine and the OCR scheduler
//! - `imgdex-index`: dispatch, backlog sweep and the inbox watcher
//! - `imgdex-query`: search execution and result previews

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, ExtractError, IndexError, RecognizeError, Result, StorageError};
pub use traits::*;
pub use types::*;
