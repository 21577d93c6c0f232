//! Line-based search prompt and hit rendering.

use anyhow::{Context, Result};
use imgdex_query::{SearchExecutor, SearchHit};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info, warn};

/// Print hits as a numbered list.
pub fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results found.");
        return;
    }
    for hit in hits {
        println!("{}. File: {}", hit.rank, hit.filename);
        println!("   {}...", hit.preview);
        println!();
    }
}

/// Open a hit's stored image with the platform viewer.
pub fn open_hit(images: &Path, hit: &SearchHit) -> Result<PathBuf> {
    let path = images.join(&hit.filename);
    open::that_detached(&path).with_context(|| format!("Failed to open {}", path.display()))?;
    info!("Opened {:?}", path);
    Ok(path)
}

/// Answer to the "which result" prompt.
#[derive(Debug, PartialEq, Eq)]
enum Selection {
    Skip,
    /// Zero-based index into the hit list
    Open(usize),
    OutOfRange(usize),
    Invalid,
}

fn parse_selection(input: &str, count: usize) -> Selection {
    let input = input.trim();
    if input.is_empty() {
        return Selection::Skip;
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Selection::Open(n - 1),
        Ok(n) => Selection::OutOfRange(n),
        Err(_) => Selection::Invalid,
    }
}

/// Interactive search loop over stdin.
///
/// No lock is held while waiting for input; the watcher and OCR sweeps keep
/// running in the background.
pub struct SearchLoop {
    executor: SearchExecutor,
    images: PathBuf,
}

impl SearchLoop {
    pub fn new(executor: SearchExecutor, images: PathBuf) -> Self {
        Self { executor, images }
    }

    /// Run until `exit`, end of input or Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let select = std::io::stdin().is_terminal();

        loop {
            prompt("Enter search term (or 'exit' to quit): ")?;
            let Some(query) = next_line(&mut lines).await? else {
                break;
            };
            if query.trim().eq_ignore_ascii_case("exit") {
                break;
            }

            let hits = match self.executor.execute(&query).await {
                Ok(hits) => hits,
                Err(e) => {
                    error!("Search failed: {}", e);
                    continue;
                }
            };
            print_hits(&hits);

            if select && !hits.is_empty() && !self.choose(&hits, &mut lines).await? {
                break;
            }
        }

        info!("Search loop finished");
        Ok(())
    }

    /// Ask for a result number. Returns `false` when input has ended.
    async fn choose(&self, hits: &[SearchHit], lines: &mut Lines<BufReader<Stdin>>) -> Result<bool> {
        prompt("Enter result number to open (blank to skip): ")?;
        let Some(answer) = next_line(lines).await? else {
            return Ok(false);
        };

        match parse_selection(&answer, hits.len()) {
            Selection::Skip => {}
            Selection::Open(i) => {
                if let Err(e) = open_hit(&self.images, &hits[i]) {
                    warn!("{:#}", e);
                }
            }
            Selection::OutOfRange(n) => warn!("Invalid result number: {}", n),
            Selection::Invalid => warn!("Not a number: {:?}", answer.trim()),
        }
        Ok(true)
    }
}

fn prompt(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{text}").context("Failed to write prompt")?;
    stdout.flush().context("Failed to flush stdout")
}

/// Next input line, or `None` on end of input or Ctrl-C.
async fn next_line(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    tokio::select! {
        line = lines.next_line() => line.context("Failed to read input"),
        _ = tokio::signal::ctrl_c() => {
            println!();
            Ok(None)
        }
    }
}
