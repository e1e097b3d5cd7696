//! Chunk retrieval by ID.
//!
//! Fetches one chunk with its file path and line range, for `hx show`.

use anyhow::Result;

use crate::context::AppContext;
use crate::store::Store;

/// CLI entry point: print the chunk, or "Not found." for an unknown id.
pub async fn run_get(ctx: &AppContext, id: i64, json: bool) -> Result<()> {
    let store = Store::open(&ctx.config.db_path()).await?;
    let result = store.get_chunk(id).await;
    store.close().await;

    let Some(chunk) = result? else {
        if json {
            println!("null");
        } else {
            println!("Not found.");
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&chunk)?);
        return Ok(());
    }

    println!("chunk_id: {}", chunk.id);
    println!("path:     {}", chunk.path);
    if !chunk.heading.is_empty() {
        println!("heading:  {}", chunk.heading);
    }
    println!("range:    L{}-L{}", chunk.start_line, chunk.end_line);
    println!("{}", "-".repeat(60));
    println!("{}", chunk.text);

    Ok(())
}
