//! SQLite-backed text index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use imgdex_core::{IndexError, InsertOutcome, TextIndex, TextRecord};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::schema;

/// Text index persisted in a single SQLite table.
///
/// One connection is shared behind a mutex, which gives the single-writer
/// discipline: the dedup checks and the insert of one call run inside one
/// transaction while every other caller waits. Calls run on the blocking
/// thread pool so OCR workers never stall the async runtime.
pub struct SqliteIndex {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIndex {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| IndexError::Init(format!("cannot create {parent:?}: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| IndexError::Init(format!("cannot open {path:?}: {e}")))?;
        conn.execute_batch(schema::PRAGMAS)
            .map_err(|e| IndexError::Init(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Database file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, IndexError>
    where
        F: FnOnce(&mut Connection) -> Result<T, IndexError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| IndexError::Query("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| IndexError::Query(format!("index task failed: {e}")))?
    }
}

#[async_trait]
impl TextIndex for SqliteIndex {
    async fn init(&self) -> Result<(), IndexError> {
        self.with_conn(|conn| {
            conn.execute_batch(schema::CREATE_TABLES)
                .map_err(|e| IndexError::Init(e.to_string()))
        })
        .await?;
        info!("Text index ready at {:?}", self.path);
        Ok(())
    }

    async fn has_record(&self, filename: &str) -> Result<bool, IndexError> {
        let filename = filename.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT 1 FROM images_text WHERE filename = ?1",
                params![filename],
                |_| Ok(()),
            )
            .optional()
            .map(|row| row.is_some())
            .map_err(|e| IndexError::Query(e.to_string()))
        })
        .await
    }

    async fn insert_if_novel(
        &self,
        filename: &str,
        text: &str,
    ) -> Result<InsertOutcome, IndexError> {
        let filename = filename.to_string();
        let text = text.to_string();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| IndexError::Insert(e.to_string()))?;

            let filename_taken = tx
                .query_row(
                    "SELECT 1 FROM images_text WHERE filename = ?1",
                    params![filename],
                    |_| Ok(()),
                )
                .optional()
                .map_err(|e| IndexError::Query(e.to_string()))?
                .is_some();
            if filename_taken {
                debug!("{} already indexed", filename);
                return Ok(InsertOutcome::AlreadyIndexed);
            }

            let text_taken = tx
                .query_row(
                    "SELECT 1 FROM images_text WHERE text = ?1 LIMIT 1",
                    params![text],
                    |_| Ok(()),
                )
                .optional()
                .map_err(|e| IndexError::Query(e.to_string()))?
                .is_some();
            if text_taken {
                info!("Text already present in the index, not inserted for {}", filename);
                return Ok(InsertOutcome::DuplicateText);
            }

            tx.execute(
                "INSERT INTO images_text (filename, text, indexed_at) VALUES (?1, ?2, ?3)",
                params![filename, text, Utc::now()],
            )
            .map_err(|e| IndexError::Insert(e.to_string()))?;
            tx.commit()
                .map_err(|e| IndexError::Insert(e.to_string()))?;

            info!("Text saved for {}", filename);
            Ok(InsertOutcome::Inserted)
        })
        .await
    }

    async fn search(&self, substring: &str) -> Result<Vec<TextRecord>, IndexError> {
        let substring = substring.to_string();
        self.with_conn(move |conn| {
            // instr() is case-sensitive, unlike LIKE.
            let mut stmt = conn
                .prepare(
                    "SELECT filename, text, indexed_at FROM images_text
                     WHERE instr(text, ?1) > 0
                     ORDER BY id",
                )
                .map_err(|e| IndexError::Query(e.to_string()))?;

            let rows = stmt
                .query_map(params![substring], |row| {
                    Ok(TextRecord {
                        filename: row.get(0)?,
                        text: row.get(1)?,
                        indexed_at: row.get::<_, DateTime<Utc>>(2)?,
                    })
                })
                .map_err(|e| IndexError::Query(e.to_string()))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| IndexError::Query(e.to_string()))
        })
        .await
    }

    async fn count(&self) -> Result<u64, IndexError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM images_text", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| u64::try_from(n).unwrap_or_default())
            .map_err(|e| IndexError::Query(e.to_string()))
        })
        .await
    }
}
