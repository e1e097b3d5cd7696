//! Ingestion pipeline orchestration.
//!
//! Coordinates one run: scanner → change detection → chunking → atomic chunk
//! replacement, with every invocation recorded in the run ledger. A file that
//! fails to stat, hash, read, or store is logged and recorded in the run's
//! `failed` list; the scan carries on with the next file.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::chunk::chunk_text;
use crate::context::AppContext;
use crate::error::HxError;
use crate::models::{FailedItem, RunCounters};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ItemOutcome, ProgressMode};
use crate::runs::RunGuard;
use crate::scanner::{self, ScanError};
use crate::store::Store;

/// Summary of one ingest run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: i64,
    #[serde(flatten)]
    pub counters: RunCounters,
}

enum FileOutcome {
    Skipped,
    Rebuilt { chunks: u64 },
}

/// Ingest every allowed file under `root`.
///
/// Unchanged files are skipped unless `force` is set. Fails only for fatal
/// conditions (missing root, store errors while opening or closing the run).
pub async fn ingest(
    ctx: &AppContext,
    store: &Store,
    root: &Path,
    force: bool,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    if !root.exists() {
        return Err(HxError::PathNotFound(root.to_path_buf()).into());
    }
    let root = std::fs::canonicalize(root)
        .with_context(|| format!("Failed to resolve {}", root.display()))?;
    let entries = scanner::scan(&root, &ctx.config.ingest)?;
    let policy_version = &ctx.config.chunking.policy_version;

    ctx.logger.info(&format!(
        "ingest root={} force={} policy={}",
        root.display(),
        force,
        policy_version
    ));

    let mut run = RunGuard::start(store, policy_version).await?;
    progress.report(IngestProgressEvent::Discovering {
        root: root.display().to_string(),
    });

    for entry in entries {
        let counters = run.counters_mut();
        counters.scanned += 1;
        let n = counters.scanned;

        let (shown, outcome) = match entry {
            Err(ScanError { path, error }) => {
                let shown = scanner::stored_path(&path, &ctx.config.base_dir);
                record_failure(ctx, counters, &shown, &error);
                (shown, ItemOutcome::Failed)
            }
            Ok(path) => {
                let shown = scanner::stored_path(&path, &ctx.config.base_dir);
                match ingest_file(ctx, store, &path, &shown, force).await {
                    Ok(FileOutcome::Skipped) => {
                        ctx.logger.debug(&format!("unchanged {}", shown));
                        counters.skipped += 1;
                        (shown, ItemOutcome::Skipped)
                    }
                    Ok(FileOutcome::Rebuilt { chunks }) => {
                        ctx.logger.debug(&format!("rebuilt {} ({} chunks)", shown, chunks));
                        counters.rebuilt_files += 1;
                        counters.inserted_chunks += chunks;
                        (shown, ItemOutcome::Rebuilt)
                    }
                    Err(error) => {
                        record_failure(ctx, counters, &shown, &error);
                        (shown, ItemOutcome::Failed)
                    }
                }
            }
        };

        progress.report(IngestProgressEvent::Processed {
            n,
            path: shown,
            outcome,
        });
    }

    let run_id = run.id();
    let counters = run.finish().await?;

    ctx.logger.info(&format!(
        "run {} done: scanned={} rebuilt_files={} skipped={} inserted_chunks={} failed={} elapsed={:.2}s",
        run_id,
        counters.scanned,
        counters.rebuilt_files,
        counters.skipped,
        counters.inserted_chunks,
        counters.failed.len(),
        counters.elapsed_seconds
    ));

    Ok(IngestReport { run_id, counters })
}

async fn ingest_file(
    ctx: &AppContext,
    store: &Store,
    path: &Path,
    stored_path: &str,
    force: bool,
) -> Result<FileOutcome> {
    let meta = scanner::file_meta(path, stored_path.to_string())?;
    let (file_id, changed) = store.upsert_file(&meta).await?;
    if !changed && !force {
        return Ok(FileOutcome::Skipped);
    }

    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let chunks = chunk_text(&text);

    let inserted = store
        .replace_chunks(
            file_id,
            stored_path,
            &meta.content_hash,
            &ctx.config.chunking.policy_version,
            &chunks,
        )
        .await?;
    Ok(FileOutcome::Rebuilt { chunks: inserted })
}

fn record_failure(
    ctx: &AppContext,
    counters: &mut RunCounters,
    path: &str,
    error: &anyhow::Error,
) {
    ctx.logger
        .exception(&format!("failed to ingest {}", path), error);
    counters.failed.push(FailedItem {
        path: path.to_string(),
        error: format!("{:#}", error),
    });
}

/// CLI entry point for `hx ingest`.
pub async fn run_ingest(
    ctx: &AppContext,
    root: &Path,
    force: bool,
    progress: Option<ProgressMode>,
    json: bool,
) -> Result<()> {
    let store = Store::open(&ctx.config.db_path()).await?;
    let reporter = progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let result = ingest(ctx, &store, root, force, reporter.as_ref()).await;
    store.close().await;
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let c = &report.counters;
    println!("ingest {}", root.display());
    println!("  run: {}", report.run_id);
    println!("  scanned: {}", c.scanned);
    println!("  rebuilt files: {}", c.rebuilt_files);
    println!("  skipped: {}", c.skipped);
    println!("  inserted chunks: {}", c.inserted_chunks);
    println!("  failed: {}", c.failed.len());
    for item in &c.failed {
        println!("    {}: {}", item.path, item.error);
    }
    println!("  elapsed: {:.2}s", c.elapsed_seconds);
    println!("ok");
    Ok(())
}
