//! Core data models used throughout the knowledge base.
//!
//! These types represent the files, chunks, runs, search hits, and citations
//! that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Metadata for one scanned file, as written to the `files` table.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub path: String,
    pub mtime: i64,
    pub content_hash: String,
    pub size_bytes: i64,
    pub file_type: String,
}

/// A chunk produced by the chunker, before it has an id or index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub heading_path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub text: String,
}

/// A stored chunk joined with its owning file path.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub id: i64,
    pub file_id: i64,
    pub path: String,
    pub chunk_index: i64,
    pub heading: String,
    pub start_line: i64,
    pub end_line: i64,
    pub text: String,
}

/// A single chunk as returned by `hx show`.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkView {
    pub id: i64,
    pub path: String,
    pub heading: String,
    pub start_line: i64,
    pub end_line: i64,
    pub text: String,
}

/// A ranked full-text hit. Lower `score` means a stronger match.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub path: String,
    pub heading: String,
    pub start_line: i64,
    pub end_line: i64,
    pub snippet: String,
    pub score: f64,
}

/// A stitched reference to a contiguous span of one file.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub heading_path: String,
    pub merged_chunk_ids: Vec<i64>,
    #[serde(skip)]
    pub text: String,
}

/// A file that could not be ingested during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedItem {
    pub path: String,
    pub error: String,
}

/// Aggregate counters stored with each run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCounters {
    pub scanned: u64,
    pub rebuilt_files: u64,
    pub skipped: u64,
    pub inserted_chunks: u64,
    pub failed: Vec<FailedItem>,
    pub elapsed_seconds: f64,
}

/// One row of the run ledger.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: i64,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub chunk_policy_version: String,
    pub counters: Option<RunCounters>,
}

impl Run {
    pub fn is_closed(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Row counts for `hx stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub file_count: i64,
    pub chunk_count: i64,
    pub index_entry_count: i64,
    pub run_count: i64,
    pub open_run_count: i64,
}
