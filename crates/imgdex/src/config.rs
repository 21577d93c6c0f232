//! Configuration handling for imgdex.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory and database locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// OCR configuration
    #[serde(default)]
    pub ocr: OcrConfig,

    /// Inbox watcher configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Directory and database locations. Relative paths are resolved against
/// the working root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Watched inbox
    #[serde(default = "default_inbox")]
    pub inbox: PathBuf,

    /// Image store
    #[serde(default = "default_images")]
    pub images: PathBuf,

    /// Processed containers (default: `<inbox>/processed`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<PathBuf>,

    /// SQLite text index
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

fn default_inbox() -> PathBuf {
    PathBuf::from("assets")
}

fn default_images() -> PathBuf {
    PathBuf::from("images")
}

fn default_database() -> PathBuf {
    PathBuf::from("images_text.db")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            inbox: default_inbox(),
            images: default_images(),
            processed: None,
            database: default_database(),
        }
    }
}

/// OCR-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language pack
    #[serde(default = "default_language")]
    pub language: String,

    /// Concurrent recognitions
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Tesseract executable
    #[serde(default = "default_command")]
    pub command: String,
}

fn default_language() -> String {
    "ita".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_command() -> String {
    "tesseract".to_string()
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            workers: default_workers(),
            command: default_command(),
        }
    }
}

/// Watcher-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce duration for file events (ms)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Time a new file's size must stay unchanged (ms)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Size polling interval while settling (ms)
    #[serde(default = "default_settle_poll_ms")]
    pub settle_poll_ms: u64,

    /// Maximum wait for the watcher at shutdown (ms)
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_settle_poll_ms() -> u64 {
    200
}

fn default_shutdown_timeout_ms() -> u64 {
    30_000
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            settle_ms: default_settle_ms(),
            settle_poll_ms: default_settle_poll_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

/// Query-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Characters of text shown per hit
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Result limit (0 = unlimited)
    #[serde(default)]
    pub limit: usize,
}

fn default_preview_chars() -> usize {
    100
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
            limit: 0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Absolute locations derived from [`PathsConfig`] and a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub inbox: PathBuf,
    pub images: PathBuf,
    pub processed: PathBuf,
    pub database: PathBuf,
}

impl Config {
    /// Load from the default config file, or defaults if there is none.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from `path` (or the default location when `None`).
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let Some(path) = path.or_else(Self::config_path) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Default config file location.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Resolve every path against `root`.
    pub fn resolve(&self, root: &Path) -> ResolvedPaths {
        let inbox = root.join(&self.paths.inbox);
        let processed = self
            .paths
            .processed
            .as_ref()
            .map_or_else(|| inbox.join("processed"), |p| root.join(p));
        ResolvedPaths {
            images: root.join(&self.paths.images),
            database: root.join(&self.paths.database),
            processed,
            inbox,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watch.debounce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.watch.settle_ms)
    }

    pub fn settle_poll(&self) -> Duration {
        Duration::from_millis(self.watch.settle_poll_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.watch.shutdown_timeout_ms)
    }

    /// Commented sample config file.
    pub fn sample_toml() -> &'static str {
        SAMPLE_TOML
    }
}

const SAMPLE_TOML: &str = r#"# imgdex configuration

[paths]
# Relative paths are resolved against --root (default: current directory)
inbox = "assets"
images = "images"
# processed = "assets/processed"
database = "images_text.db"

[ocr]
language = "ita"
workers = 4
command = "tesseract"

[watch]
debounce_ms = 500
settle_ms = 1000
settle_poll_ms = 200
shutdown_timeout_ms = 30000

[query]
preview_chars = 100
# 0 = unlimited
limit = 0

[logging]
level = "info"
"#;

/// Get the config directory for imgdex.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("IMGDEX_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "imgdex").map(|dirs| dirs.config_dir().to_path_buf())
}
