//! `hx search`: ranked full-text lookup.

use anyhow::Result;

use crate::context::AppContext;
use crate::models::SearchHit;
use crate::store::Store;

/// Search with the configured default limit unless `limit` is given.
pub async fn search_chunks(
    ctx: &AppContext,
    store: &Store,
    query: &str,
    limit: Option<i64>,
) -> Result<Vec<SearchHit>> {
    let top_k = limit.unwrap_or(ctx.config.retrieval.top_k).max(1);
    let hits = store.search(query, top_k).await?;
    ctx.logger
        .debug(&format!("search {:?} top_k={} hits={}", query, top_k, hits.len()));
    Ok(hits)
}

pub async fn run_search(
    ctx: &AppContext,
    query: &str,
    limit: Option<i64>,
    json: bool,
) -> Result<()> {
    let store = Store::open(&ctx.config.db_path()).await?;
    let result = search_chunks(ctx, &store, query, limit).await;
    store.close().await;
    let hits = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.4}] id={}", i + 1, hit.score, hit.chunk_id);
        println!("    ref: {}#L{}-L{}", hit.path, hit.start_line, hit.end_line);
        if !hit.heading.is_empty() {
            println!("    heading: {}", hit.heading);
        }
        println!("    excerpt: \"{}\"", hit.snippet.trim());
        println!();
    }

    Ok(())
}
