//! File-to-memory synchronization.
//!
//! Reads markdown sources, chunks and normalizes them, and stores each chunk
//! through the engine's merge-aware add, so repeated runs converge instead of
//! accumulating near-duplicates. Redis keys of shape `sync:<absolute-path>`
//! make the whole pipeline idempotent: an immutable source is ingested once,
//! the canonical `memory.md` is re-ingested only when its content hash
//! changes.

pub mod chunk;
pub mod discover;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::memory::{AddInput, AddOptions, Engine};
use crate::redis;

/// What to sync and what to leave alone.
#[derive(Debug, Default)]
pub struct SyncOptions {
    /// Base path for default discovery and the ignore file.
    pub base: PathBuf,
    /// Explicit files to ingest.
    pub files: Vec<PathBuf>,
    /// Explicit directories whose `*.md` entries are ingested.
    pub dirs: Vec<PathBuf>,
    /// Extra exclude globs, unioned with the ignore file's patterns.
    pub excludes: Vec<String>,
}

/// Sync outcome for a single file.
#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub file: String,
    pub added: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Aggregate outcome of one sync run.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub files: usize,
    pub added: usize,
    pub skipped: usize,
    pub results: Vec<FileOutcome>,
}

/// Run a full sync: discover, filter, ingest, and mark. A problem with one
/// file is recorded in its result row and never aborts the run.
pub async fn run(
    engine: &Engine,
    state: &mut redis::Client,
    opts: &SyncOptions,
) -> Result<SyncReport> {
    let discovered =
        discover::discover_files(&opts.base, &opts.files, &opts.dirs).context("discover files")?;

    let mut patterns = discover::load_ignore_patterns(&opts.base);
    patterns.extend(opts.excludes.iter().cloned());

    let mut report = SyncReport {
        files: discovered.len(),
        added: 0,
        skipped: 0,
        results: Vec::new(),
    };

    for path in &discovered {
        let outcome = sync_file(engine, state, path, &patterns).await;
        report.added += outcome.added;
        report.skipped += outcome.skipped;
        report.results.push(outcome);
    }

    Ok(report)
}

/// Ingest one file, honoring skip rules and the marker protocol.
async fn sync_file(
    engine: &Engine,
    state: &mut redis::Client,
    path: &Path,
    patterns: &[String],
) -> FileOutcome {
    let file = path.display().to_string();
    let skipped = |file: String, reason: &str| FileOutcome {
        file,
        added: 0,
        skipped: 1,
        reason: Some(reason.to_string()),
    };

    if discover::is_ignored(path, patterns) {
        return skipped(file, "excluded by ignore pattern");
    }

    // The daily journal named for today is still being appended to.
    if discover::is_today_daily_file(path) {
        return skipped(file, "today's daily file, still growing");
    }

    let key = discover::sync_key(path);
    let is_memory_md = discover::is_memory_md(path);

    // Immutable sources: the marker's existence alone denies re-ingestion,
    // checked before the file is even read. A marker-read failure degrades
    // to "not synced yet" rather than aborting.
    if !is_memory_md && state.exists(&key).await.unwrap_or(false) {
        return skipped(file, "already synced");
    }

    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(err) => {
            return FileOutcome {
                file,
                added: 0,
                skipped: 0,
                reason: Some(format!("read error: {err}")),
            }
        }
    };
    let text = String::from_utf8_lossy(&content);
    if text.trim().is_empty() {
        return skipped(file, "empty file");
    }

    // The canonical memory file is mutable: only a changed content hash
    // forces re-ingestion.
    let mut digest = String::new();
    if is_memory_md {
        digest = chunk::content_hash(&content);
        if let Ok(Some(stored)) = state.get(&key).await {
            if stored == digest {
                return skipped(file, "already synced (unchanged)");
            }
        }
    }

    let mut added = 0usize;
    let pieces = chunk::chunk(&text, chunk::DEFAULT_CHUNK_SIZE, chunk::DEFAULT_CHUNK_OVERLAP);
    for (index, piece) in pieces.into_iter().enumerate() {
        let normalized = chunk::normalize_text(&piece);
        if normalized.is_empty() {
            continue;
        }

        let mut payload = Map::new();
        payload.insert("source".to_string(), Value::String(file.clone()));
        payload.insert("chunk_index".to_string(), Value::from(index as i64));

        // Merge-aware add: unchanged chunks collapse into their previous
        // selves on repeat runs. A failed chunk is logged and skipped.
        let add = engine
            .add(
                AddInput::Text(normalized),
                AddOptions {
                    payload,
                    ..Default::default()
                },
            )
            .await;
        match add {
            Ok(_) => added += 1,
            Err(err) => {
                warn!(file = %file, chunk = index, "sync: chunk store failed: {err:#}");
            }
        }
    }

    // Mark the file only when at least one chunk actually landed. If every
    // chunk failed (say the embedder was down), the next run retries.
    if added > 0 {
        let marked = if is_memory_md {
            state
                .set_with_ttl(&key, &digest, discover::MEMORY_MD_TTL_SECONDS)
                .await
        } else {
            state.set(&key, "1").await
        };
        if let Err(err) = marked {
            warn!(file = %file, "sync: marker write failed: {err:#}");
        }
    }

    FileOutcome {
        file,
        added,
        skipped: 0,
        reason: None,
    }
}
