//! # hx-kb
//!
//! A local-first knowledge base for a directory of markdown and text notes.
//!
//! Notes are scanned, fingerprinted, split into heading-scoped chunks, and
//! stored in SQLite with an FTS5 index. Re-ingesting only rebuilds files whose
//! content hash changed. Queries return ranked hits, or a rule-extracted
//! answer with stitched citations back to file line ranges.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌──────────────┐
//! │ Scanner  │──▶│  Changed?  │──▶│ Chunker  │──▶│ Store (FTS5) │
//! └──────────┘   └────────────┘   └──────────┘   └──────┬───────┘
//!       every invocation recorded in the run ledger      │
//!                                                        ▼
//!                         ┌──────────┐   ┌──────────┐   ┌──────────┐
//!                         │ Summarize│◀──│ Stitcher │◀──│ Retrieve │
//!                         └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! hx init-config                  # write ./hx.toml with defaults
//! hx init                         # create the database
//! hx ingest notes/                # index a directory
//! hx search "backup schedule"
//! hx ask "how do I rotate keys" --mode steps
//! hx show 42
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`context`] | Per-process config + logger handle |
//! | [`logging`] | Logger trait and tracing setup |
//! | [`scanner`] | Directory walk and content fingerprint |
//! | [`chunk`] | Heading-scoped structural chunker |
//! | [`store`] | Files, chunks, and FTS5 index |
//! | [`runs`] | Run ledger |
//! | [`ingest`] | Ingestion pipeline |
//! | [`retrieve`] | Retrieval and citation stitching |
//! | [`summarize`] | Rule-based answer extraction |

pub mod ask;
pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod get;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod retrieve;
pub mod runs;
pub mod scanner;
pub mod search;
pub mod stats;
pub mod store;
pub mod summarize;
