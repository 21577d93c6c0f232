//! Storage layer for imgdex.
//!
//! This crate owns everything that is persisted:
//!
//! - [`ImageStore`]: flat directory of `img_<sequence>.<ext>` files
//! - [`SequenceAllocator`]: exclusive allocation of the next sequence number
//! - [`SqliteIndex`]: the durable [`TextIndex`](imgdex_core::TextIndex)
//! - [`MemoryIndex`]: an in-memory text index for tests
//!
//! The image store directory is the only source of truth for both the next
//! sequence number and the set of images awaiting OCR. Nothing else is
//! persisted, so there is no separate counter or queue that can drift from
//! the files on disk after a crash. The price is an O(store size) directory
//! scan per allocation and per sweep.
//!
//! # Example
//!
//! ```rust,ignore
//! use imgdex_store::{ImageStore, SqliteIndex};
//! use imgdex_core::TextIndex;
//!
//! let images = ImageStore::new("images".into());
//! images.init().await?;
//! let stored = images.store_from_path(Path::new("assets/photo.png")).await?;
//!
//! let index = SqliteIndex::open("images_text.db".as_ref())?;
//! index.init().await?;
//! index.insert_if_novel(&stored.file_name(), "recognized text").await?;
//! ```

pub mod images;
pub mod memory;
pub mod schema;
pub mod sequence;
pub mod sqlite;

pub use images::{ImageStore, relocate};
pub use memory::MemoryIndex;
pub use sequence::{SequenceAllocator, SequenceGuard};
pub use sqlite::SqliteIndex;
