//! Database statistics, run history, and health overview.
//!
//! Backs `hx stats`, `hx runs`, and `hx doctor`. Runs that were started but
//! never closed (the process died mid-ingest) are flagged here; nothing
//! repairs them automatically.

use anyhow::Result;

use crate::context::AppContext;
use crate::models::Run;
use crate::store::Store;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(ctx: &AppContext, json: bool) -> Result<()> {
    let db_path = ctx.config.db_path();
    let store = Store::open(&db_path).await?;
    let result = store.stats().await;
    let last_run = store.list_runs(1).await;
    store.close().await;
    let stats = result?;
    let last_run = last_run?.into_iter().next();

    if json {
        let obj = serde_json::json!({
            "stats": stats,
            "last_run": last_run,
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
        return Ok(());
    }

    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    println!("Knowledge base stats");
    println!("====================");
    println!();
    println!("  Database:      {}", db_path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Files:         {}", stats.file_count);
    println!("  Chunks:        {}", stats.chunk_count);
    println!("  Index entries: {}", stats.index_entry_count);
    println!(
        "  Runs:          {} ({} not closed)",
        stats.run_count, stats.open_run_count
    );
    if let Some(run) = last_run {
        println!("  Last run:      #{} {}", run.id, describe_run(&run));
    }
    println!();

    Ok(())
}

/// List recent runs, newest first.
pub async fn run_runs(ctx: &AppContext, limit: i64) -> Result<()> {
    let store = Store::open(&ctx.config.db_path()).await?;
    let result = store.list_runs(limit.max(1)).await;
    store.close().await;
    let runs = result?;

    if runs.is_empty() {
        println!("No runs.");
        return Ok(());
    }

    println!(
        "  {:>5}  {:<17} {:<10} {:>7} {:>7} {:>7} {:>7}",
        "RUN", "STARTED", "POLICY", "SCANNED", "REBUILT", "SKIPPED", "FAILED"
    );
    println!("  {}", "-".repeat(72));
    for run in &runs {
        let started = format_ts(run.started_at);
        match (&run.counters, run.is_closed()) {
            (Some(c), true) => println!(
                "  {:>5}  {:<17} {:<10} {:>7} {:>7} {:>7} {:>7}",
                run.id,
                started,
                run.chunk_policy_version,
                c.scanned,
                c.rebuilt_files,
                c.skipped,
                c.failed.len()
            ),
            _ => println!(
                "  {:>5}  {:<17} {:<10} NOT CLOSED",
                run.id, started, run.chunk_policy_version
            ),
        }
    }

    Ok(())
}

/// Print resolved paths, configuration, and counts.
pub async fn run_doctor(ctx: &AppContext) -> Result<()> {
    let cfg = &ctx.config;
    println!("config:          {}", ctx.config_path.display());
    println!("base dir:        {}", cfg.base_dir.display());
    println!("database:        {}", cfg.db_path().display());
    if cfg.log.to_file {
        println!("log file:        {}", cfg.log_path().display());
    }
    println!("extensions:      {}", cfg.ingest.include_exts.join(" "));
    println!("chunk policy:    {}", cfg.chunking.policy_version);

    let store = Store::open(&cfg.db_path()).await?;
    let result = store.stats().await;
    store.close().await;
    let stats = result?;

    println!("files:           {}", stats.file_count);
    println!("chunks:          {}", stats.chunk_count);
    println!("index entries:   {}", stats.index_entry_count);
    if stats.chunk_count != stats.index_entry_count {
        ctx.logger.warning(&format!(
            "chunk count {} does not match index entry count {}",
            stats.chunk_count, stats.index_entry_count
        ));
    }
    if stats.open_run_count > 0 {
        ctx.logger.warning(&format!(
            "{} run(s) were never closed; see `hx runs`",
            stats.open_run_count
        ));
    }
    ctx.logger.info("doctor OK");
    Ok(())
}

fn describe_run(run: &Run) -> String {
    match (&run.counters, run.is_closed()) {
        (Some(c), true) => format!(
            "{}: scanned {}, rebuilt {}, failed {}",
            format_ts(run.started_at),
            c.scanned,
            c.rebuilt_files,
            c.failed.len()
        ),
        _ => format!("{}: NOT CLOSED", format_ts(run.started_at)),
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
