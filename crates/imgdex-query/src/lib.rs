//! Search over recognized text.
//!
//! Matching is a case-sensitive substring test done by the
//! [`TextIndex`](imgdex_core::TextIndex); hits keep index insertion order.

pub mod executor;

pub use executor::{SearchExecutor, SearchHit};
