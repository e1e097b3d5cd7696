//! Retrieval and citation stitching.
//!
//! Runs a ranked search, fetches the full chunk rows, and restores relevance
//! order (the store returns rows in storage order). The top few rows become
//! the answer context; all rows are stitched into per-file citations, where
//! neighbouring chunks of the same file merge into one span.

use anyhow::Result;
use std::collections::{HashMap, HashSet};

use crate::models::{ChunkRow, Citation, SearchHit};
use crate::store::Store;

/// Output of [`retrieve`].
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub hits: Vec<SearchHit>,
    pub citations: Vec<Citation>,
    pub context: String,
}

/// Search, reorder, build context from the top `context_chunks`, and stitch
/// every retrieved row into deduplicated citations.
pub async fn retrieve(
    store: &Store,
    query: &str,
    top_k: i64,
    context_chunks: usize,
    neighbor_gap: i64,
) -> Result<Retrieval> {
    let hits = store.search(query, top_k).await?;
    if hits.is_empty() {
        return Ok(Retrieval {
            hits,
            citations: Vec::new(),
            context: String::new(),
        });
    }

    let ids: Vec<i64> = hits.iter().map(|h| h.chunk_id).collect();
    let rows = store.get_chunks_by_ids(&ids).await?;
    let rows = order_by_relevance(&ids, rows);

    let context = build_context(&rows, context_chunks);
    let citations = dedup_citations(stitch_chunks(&rows, neighbor_gap));

    Ok(Retrieval {
        hits,
        citations,
        context,
    })
}

/// Reorder `rows` to follow `ids`. Rows whose id is not in `ids` are dropped.
pub fn order_by_relevance(ids: &[i64], rows: Vec<ChunkRow>) -> Vec<ChunkRow> {
    let position: HashMap<i64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut rows: Vec<(usize, ChunkRow)> = rows
        .into_iter()
        .filter_map(|r| position.get(&r.id).map(|&p| (p, r)))
        .collect();
    rows.sort_by_key(|(p, _)| *p);
    rows.into_iter().map(|(_, r)| r).collect()
}

/// Texts of the first `limit` rows, separated by a blank line.
pub fn build_context(rows: &[ChunkRow], limit: usize) -> String {
    rows.iter()
        .take(limit)
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Merge chunks of the same file whose `chunk_index` is within
/// `neighbor_gap` of the previous one.
///
/// Files appear in the order they are first seen in `rows`; within a file,
/// citations follow `chunk_index`.
pub fn stitch_chunks(rows: &[ChunkRow], neighbor_gap: i64) -> Vec<Citation> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_path: HashMap<&str, Vec<&ChunkRow>> = HashMap::new();
    for row in rows {
        by_path
            .entry(row.path.as_str())
            .or_insert_with(|| {
                order.push(row.path.as_str());
                Vec::new()
            })
            .push(row);
    }

    let mut stitched = Vec::new();
    for path in order {
        let mut items = by_path.remove(path).unwrap_or_default();
        items.sort_by_key(|r| r.chunk_index);

        let mut current: Option<(Citation, i64)> = None;
        for item in items {
            if let Some((cite, last_index)) = current.as_mut() {
                if item.chunk_index <= *last_index + neighbor_gap {
                    cite.text = format!("{}\n{}", cite.text, item.text).trim().to_string();
                    cite.start_line = cite.start_line.min(item.start_line);
                    cite.end_line = cite.end_line.max(item.end_line);
                    cite.merged_chunk_ids.push(item.id);
                    *last_index = (*last_index).max(item.chunk_index);
                    continue;
                }
            }
            if let Some((cite, _)) = current.take() {
                stitched.push(cite);
            }
            current = Some((citation_for(item), item.chunk_index));
        }
        if let Some((cite, _)) = current {
            stitched.push(cite);
        }
    }
    stitched
}

fn citation_for(row: &ChunkRow) -> Citation {
    Citation {
        path: row.path.clone(),
        start_line: row.start_line,
        end_line: row.end_line,
        heading_path: row.heading.clone(),
        merged_chunk_ids: vec![row.id],
        text: row.text.clone(),
    }
}

/// Drop citations whose `(path, start_line, end_line)` was already seen.
pub fn dedup_citations(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|c| seen.insert((c.path.clone(), c.start_line, c.end_line)))
        .collect()
}
