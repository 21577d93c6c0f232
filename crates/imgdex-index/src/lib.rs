//! Inbox ingestion for imgdex.
//!
//! This crate connects the inbox to the image store and the OCR sweep:
//! classify → (extract →) store → recognize → index.
//!
//! # Components
//!
//! - [`IngestService`]: Dispatches inbox files and drives OCR sweeps
//! - [`InboxWatcher`]: Monitors the inbox for new files
//! - [`IngestConfig`]: Directories and timings for the service
//! - [`IngestUpdate`]: Events emitted during ingestion
//!
//! # Example
//!
//! ```rust,ignore
//! use imgdex_index::{IngestConfig, IngestService, IngestUpdate};
//!
//! let service = IngestService::new(IngestConfig::new(inbox), images, scheduler);
//! service.init().await?;
//!
//! // Subscribe to updates
//! let mut updates = service.subscribe();
//!
//! // Backlog, live watch, first OCR sweep
//! service.sweep_inbox().await?;
//! service.start().await?;
//! service.process_pending().await?;
//!
//! while let Ok(update) = updates.recv().await {
//!     match update {
//!         IngestUpdate::FileStored { stored, .. } => { /* ... */ }
//!         IngestUpdate::FileError { path, error } => { /* ... */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod service;
pub mod watcher;

pub use service::{DispatchOutcome, InboxReport, IngestConfig, IngestService, IngestUpdate};
pub use watcher::{InboxWatcher, wait_until_settled};
