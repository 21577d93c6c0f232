//! SQL schema for the text index.

/// Connection-level settings applied on open.
pub const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;
PRAGMA busy_timeout=5000;";

/// Schema creation, idempotent.
///
/// `filename` is UNIQUE so the storage layer itself rejects a second record
/// for the same image even if a caller skips the `has_record` check.
/// `id` gives the insertion order used by search.
pub const CREATE_TABLES: &str = "CREATE TABLE IF NOT EXISTS images_text (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT UNIQUE NOT NULL,
    text TEXT NOT NULL,
    indexed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_images_text_text ON images_text(text);";
