//! # imgdex CLI
//!
//! Command-line interface for imgdex, an image OCR indexer.
//!
//! Images dropped into the inbox (directly, or embedded in `.docx`/`.pptx`
//! files) are moved into the image store as `img_<n>.<ext>`, recognized
//! once with Tesseract, and their text kept in a deduplicated SQLite index
//! that supports substring search.
//!
//! ## Commands
//!
//! - `imgdex run` - Ingest the backlog, watch the inbox and search interactively
//! - `imgdex ingest <PATH>...` - Ingest specific files, then run OCR
//! - `imgdex process` - Run OCR over every pending stored image
//! - `imgdex search <QUERY>` - Search recognized text
//! - `imgdex status` - Show store and index counts
//!
//! ## Examples
//!
//! ```bash
//! # Watch ./assets and search interactively
//! imgdex run
//!
//! # Search with JSON output
//! imgdex search "fattura" --format json
//!
//! # Open the second hit
//! imgdex search "fattura" --open 2
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imgdex_core::{OcrEngine, StoreStatus, SweepReport, TextIndex};
use imgdex_index::{InboxReport, IngestConfig, IngestService, IngestUpdate};
use imgdex_ocr::{OcrScheduler, RecognizerPool, TesseractEngine};
use imgdex_query::{SearchExecutor, SearchHit};
use imgdex_store::{ImageStore, SqliteIndex};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

mod config;
mod interactive;

use config::{Config, ResolvedPaths};
use interactive::{SearchLoop, open_hit, print_hits};

#[derive(Parser)]
#[command(name = "imgdex")]
#[command(about = "Index the text of images with OCR and search it")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/imgdex/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory relative paths are resolved against
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the inbox, keep watching it and search interactively
    Run,

    /// Ingest the given files, then run OCR over pending images
    Ingest {
        /// Image, .docx or .pptx files
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Run OCR over every stored image without a text record
    Process,

    /// Search recognized text (case-sensitive substring)
    Search {
        /// Substring to look for
        query: String,

        /// Open the N-th result with the system viewer
        #[arg(long, value_name = "N")]
        open: Option<usize>,
    },

    /// Show store and index counts
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for search results.
#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    results: &'a [SearchHit],
}

/// Output structure for ingest results.
#[derive(Serialize)]
struct IngestOutput {
    stored: usize,
    archives: usize,
    rejected: usize,
    failed_files: usize,
    ocr: SweepReport,
}

/// Output structure for status.
#[derive(Serialize)]
struct StatusOutput {
    images: String,
    database: String,
    #[serde(flatten)]
    status: StoreStatus,
}

/// The component stack shared by the pipeline commands.
struct Components {
    index: Arc<SqliteIndex>,
    engine: Arc<TesseractEngine>,
    service: IngestService,
}

/// Create the standard component stack.
fn create_components(config: &Config, paths: &ResolvedPaths) -> Result<Components> {
    let index = Arc::new(
        SqliteIndex::open(&paths.database)
            .with_context(|| format!("Failed to open {}", paths.database.display()))?,
    );
    let images = Arc::new(ImageStore::new(paths.images.clone()));

    let engine = Arc::new(TesseractEngine::new(
        config.ocr.command.clone(),
        config.ocr.language.clone(),
    ));
    let pool = Arc::new(RecognizerPool::new(
        Arc::clone(&engine) as Arc<dyn OcrEngine>,
        config.ocr.workers,
    ));
    let scheduler = Arc::new(OcrScheduler::new(
        Arc::clone(&images),
        Arc::clone(&index) as Arc<dyn TextIndex>,
        pool,
    ));

    let ingest_config = IngestConfig {
        inbox: paths.inbox.clone(),
        processed: paths.processed.clone(),
        debounce: config.debounce(),
        settle: config.settle(),
        settle_poll: config.settle_poll(),
        shutdown_timeout: config.shutdown_timeout(),
    };
    let service = IngestService::new(ingest_config, images, scheduler);

    Ok(Components {
        index,
        engine,
        service,
    })
}

/// Initialize directories and the index, and check the OCR engine.
async fn prepare(components: &Components) -> Result<()> {
    components
        .service
        .init()
        .await
        .context("Failed to initialize storage")?;

    info!(
        "Checking OCR engine ({} -l {})",
        components.engine.command(),
        components.engine.language()
    );
    components
        .engine
        .init()
        .await
        .context("OCR engine is not available")?;
    Ok(())
}

/// Start the watcher, run one OCR sweep, then `session`.
///
/// The watcher is stopped on every exit path, including a failed start or
/// sweep.
async fn with_watcher<F, Fut>(service: &IngestService, session: F) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let result = async {
        // Watch first; start() then sweeps the inbox backlog.
        service.start().await.context("Failed to start watcher")?;
        service
            .process_pending()
            .await
            .context("Initial OCR sweep failed")?;
        session().await
    }
    .await;

    info!("Shutting down");
    service.stop().await;
    result
}

fn search_executor(config: &Config, index: Arc<SqliteIndex>) -> SearchExecutor {
    SearchExecutor::new(index as Arc<dyn TextIndex>)
        .with_limit(config.query.limit)
        .with_preview_chars(config.query.preview_chars)
}

fn log_level(cli: &Cli, config: &Config) -> Level {
    if cli.verbose {
        return Level::DEBUG;
    }
    config.logging.level.parse().unwrap_or_else(|_| {
        eprintln!(
            "Unknown log level {:?}, using info",
            config.logging.level
        );
        Level::INFO
    })
}

fn print_sweep(format: OutputFormat, report: &SweepReport) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            println!("OCR sweep");
            println!("  Pending:    {}", report.pending);
            println!("  Indexed:    {}", report.indexed);
            println!("  Duplicates: {}", report.duplicates);
            println!("  Failed:     {}", report.failed);
        }
    }
    Ok(())
}

fn print_ingest(format: OutputFormat, inbox: &InboxReport, sweep: &SweepReport) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = IngestOutput {
                stored: inbox.stored,
                archives: inbox.archives,
                rejected: inbox.rejected,
                failed_files: inbox.failed,
                ocr: *sweep,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("Ingest");
            println!("  Images stored:      {}", inbox.stored);
            println!("  Archives extracted: {}", inbox.archives);
            println!("  Rejected:           {}", inbox.rejected);
            println!("  Failed:             {}", inbox.failed);
            print_sweep(format, sweep)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(Some(path.clone()))
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    // Setup logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&cli, &config))
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let paths = config.resolve(&cli.root);

    match cli.command {
        Commands::Run => {
            let components = create_components(&config, &paths)?;
            prepare(&components).await?;
            let service = &components.service;

            let mut updates = service.subscribe();
            let reporter = tokio::spawn(async move {
                while let Ok(update) = updates.recv().await {
                    if let IngestUpdate::ArchiveExtracted {
                        source,
                        images,
                        archived_to,
                    } = update
                    {
                        info!(
                            "{:?}: {} images stored, archived to {:?}",
                            source, images, archived_to
                        );
                    }
                }
            });

            let search = SearchLoop::new(
                search_executor(&config, Arc::clone(&components.index)),
                paths.images.clone(),
            );
            let result = with_watcher(service, || search.run()).await;
            reporter.abort();
            result?;
            info!("Stopped");
        }

        Commands::Ingest { paths: files } => {
            let components = create_components(&config, &paths)?;
            prepare(&components).await?;

            let (inbox, sweep) = components
                .service
                .ingest(&files)
                .await
                .context("Ingest failed")?;
            print_ingest(cli.format, &inbox, &sweep)?;
        }

        Commands::Process => {
            let components = create_components(&config, &paths)?;
            prepare(&components).await?;

            let report = components
                .service
                .process_pending()
                .await
                .context("OCR sweep failed")?;
            print_sweep(cli.format, &report)?;
        }

        Commands::Search { query, open } => {
            if !paths.database.exists() {
                anyhow::bail!(
                    "Index not found at {}. Run 'imgdex run' or 'imgdex ingest' first.",
                    paths.database.display()
                );
            }

            let index = Arc::new(
                SqliteIndex::open(&paths.database)
                    .with_context(|| format!("Failed to open {}", paths.database.display()))?,
            );
            index.init().await.context("Failed to initialize index")?;

            let hits = search_executor(&config, index)
                .execute(&query)
                .await
                .context("Query execution failed")?;

            match cli.format {
                OutputFormat::Json => {
                    let output = SearchOutput {
                        query: &query,
                        results: &hits,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Query: {query}\n");
                    print_hits(&hits);
                }
            }

            if let Some(n) = open {
                match n.checked_sub(1).and_then(|i| hits.get(i)) {
                    Some(hit) => {
                        open_hit(&paths.images, hit)?;
                    }
                    None => warn!("Invalid result number: {}", n),
                }
            }
        }

        Commands::Status => {
            let components = create_components(&config, &paths)?;
            components
                .service
                .init()
                .await
                .context("Failed to initialize storage")?;

            let status = components.service.status().await?;

            match cli.format {
                OutputFormat::Json => {
                    let output = StatusOutput {
                        images: paths.images.to_string_lossy().to_string(),
                        database: paths.database.to_string_lossy().to_string(),
                        status,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Store Status");
                    println!("  Images:   {}", paths.images.display());
                    println!("  Database: {}", paths.database.display());
                    println!("  Stored:   {}", status.stored_images);
                    println!("  Indexed:  {}", status.indexed_records);
                    println!("  Pending:  {}", status.pending_images);
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}
