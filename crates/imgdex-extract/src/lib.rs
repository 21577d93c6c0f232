//! # imgdex-extract
//!
//! Decides what to do with an incoming file and pulls images out of office
//! archives.
//!
//! ## Supported Formats
//!
//! | Kind | Extensions | Handling |
//! |------|------------|----------|
//! | Bare image | `.png`, `.jpg`, `.jpeg`, `.bmp`, `.tiff` | Moved into the image store |
//! | Word document | `.docx` | Images under `word/media/` extracted |
//! | Presentation | `.pptx` | Images under `ppt/media/` extracted |
//!
//! Anything else is classified as unsupported.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use imgdex_extract::{ArchiveExtractor, Classifier};
//! use imgdex_core::FileKind;
//!
//! let classifier = Classifier::new();
//! if let FileKind::Container(kind) = classifier.classify(path) {
//!     let mut images = ArchiveExtractor::new().images(path, kind);
//!     while let Some(entry) = images.next().await {
//!         let entry = entry?;
//!         store.store(&entry.data, &entry.extension).await?;
//!     }
//! }
//! ```
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Classifier`] | Maps file extensions to a [`FileKind`](imgdex_core::FileKind) |
//! | [`ArchiveExtractor`] | Streams embedded images out of a container |
//! | [`MediaEntries`] | Lazy iterator over the media entries of an open archive |
//! | [`load_image`] | Reads and decodes an image for OCR |

pub mod archive;
pub mod classifier;
pub mod image;

pub use archive::{ArchiveExtractor, ArchiveImages, MediaEntries};
pub use classifier::Classifier;
pub use crate::image::{decode_image, load_image};
