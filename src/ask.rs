//! `hx ask`: retrieve, stitch, and summarize into a cited answer.

use anyhow::Result;
use serde::Serialize;

use crate::context::AppContext;
use crate::models::Citation;
use crate::retrieve::retrieve;
use crate::store::Store;
use crate::summarize::{summarize, SummaryMode};

/// Answer text plus the citations it was drawn from.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// Answer `query` from the knowledge base. No match gives an empty answer
/// and no citations.
pub async fn ask(
    ctx: &AppContext,
    store: &Store,
    query: &str,
    mode: SummaryMode,
    top_k: Option<i64>,
) -> Result<AskResponse> {
    let retrieval_cfg = &ctx.config.retrieval;
    let top_k = top_k.unwrap_or(retrieval_cfg.top_k).max(1);

    let retrieval = retrieve(
        store,
        query,
        top_k,
        retrieval_cfg.context_chunks,
        retrieval_cfg.neighbor_gap,
    )
    .await?;
    ctx.logger.debug(&format!(
        "ask {:?} hits={} citations={}",
        query,
        retrieval.hits.len(),
        retrieval.citations.len()
    ));

    Ok(AskResponse {
        answer: summarize(&retrieval.context, mode),
        citations: retrieval.citations,
    })
}

pub async fn run_ask(
    ctx: &AppContext,
    query: &str,
    mode: &str,
    limit: Option<i64>,
    json: bool,
) -> Result<()> {
    let mode: SummaryMode = mode.parse()?;
    let store = Store::open(&ctx.config.db_path()).await?;
    let result = ask(ctx, &store, query, mode, limit).await;
    store.close().await;
    let response = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.citations.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("--- Answer ---");
    println!("{}", response.answer);
    println!();
    println!("--- Citations ({}) ---", response.citations.len());
    for (i, cite) in response.citations.iter().enumerate() {
        let ids: Vec<String> = cite.merged_chunk_ids.iter().map(|id| id.to_string()).collect();
        println!(
            "[{}] {}#L{}-L{}  chunks={}",
            i + 1,
            cite.path,
            cite.start_line,
            cite.end_line,
            ids.join(",")
        );
        if !cite.heading_path.is_empty() {
            println!("    heading: {}", cite.heading_path);
        }
    }

    Ok(())
}
