//! Query execution.

use imgdex_core::{Error, TextIndex, TextRecord};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Characters of text shown in a hit preview by default.
pub const DEFAULT_PREVIEW_CHARS: usize = 100;

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// 1-based position in the result list
    pub rank: usize,
    /// Stored image filename
    pub filename: String,
    /// Full recognized text
    pub text: String,
    /// Leading characters of the text on a single line
    pub preview: String,
}

/// Query executor.
pub struct SearchExecutor {
    /// Index searched
    index: Arc<dyn TextIndex>,
    /// Maximum hits returned, 0 for no limit
    limit: usize,
    /// Preview length in characters
    preview_chars: usize,
}

impl SearchExecutor {
    /// Create an executor with no result limit and the default preview.
    pub fn new(index: Arc<dyn TextIndex>) -> Self {
        Self {
            index,
            limit: 0,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }

    /// Cap the number of hits; 0 means unlimited.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the preview length in characters.
    #[must_use]
    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    /// Execute a substring query.
    ///
    /// The empty query matches every record.
    pub async fn execute(&self, query: &str) -> Result<Vec<SearchHit>, Error> {
        debug!("Executing query: {:?}", query);

        let records = self.index.search(query).await?;
        let take = if self.limit == 0 {
            records.len()
        } else {
            self.limit
        };

        let hits: Vec<SearchHit> = records
            .into_iter()
            .take(take)
            .enumerate()
            .map(|(i, record)| self.hit(i + 1, record))
            .collect();

        debug!("Found {} results", hits.len());
        Ok(hits)
    }

    fn hit(&self, rank: usize, record: TextRecord) -> SearchHit {
        let preview = preview(&record.text, self.preview_chars);
        SearchHit {
            rank,
            filename: record.filename,
            text: record.text,
            preview,
        }
    }
}

/// First `chars` characters of `text` with line breaks flattened to spaces.
fn preview(text: &str, chars: usize) -> String {
    text.chars()
        .take(chars)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
