//! # imgdex-ocr
//!
//! Optical character recognition for stored images.
//!
//! Recognition is delegated to an [`OcrEngine`](imgdex_core::OcrEngine);
//! the default engine shells out to the `tesseract` command line tool. The
//! [`OcrScheduler`] decides which images still need recognition and fans
//! them out over a [`RecognizerPool`] that never runs more than N engine
//! calls at once.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use imgdex_ocr::{OcrScheduler, RecognizerPool, TesseractEngine};
//! use std::sync::Arc;
//!
//! let engine = TesseractEngine::new("tesseract", "ita");
//! engine.init().await?;
//!
//! let pool = RecognizerPool::new(Arc::new(engine), 4);
//! let scheduler = OcrScheduler::new(images, index, Arc::new(pool));
//! let report = scheduler.process_pending().await?;
//! ```
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TesseractEngine`] | Runs `tesseract stdin stdout -l <lang>` per image |
//! | [`RecognizerPool`] | Semaphore-bounded access to one engine |
//! | [`OcrScheduler`] | Computes the pending set and runs one sweep over it |

pub mod pool;
pub mod scheduler;
pub mod tesseract;

pub use pool::RecognizerPool;
pub use scheduler::OcrScheduler;
pub use tesseract::TesseractEngine;
