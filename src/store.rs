//! SQLite-backed store for files, chunks, and the FTS5 index.
//!
//! Every method runs as its own short-lived unit of work against the pool;
//! nothing holds a transaction across calls. [`Store::replace_chunks`] is the
//! only multi-statement write and runs in a single transaction, so readers
//! never see chunks without index entries (or the reverse), nor a mix of old
//! and new chunk sets for a file.

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::path::{Path, PathBuf};

use crate::chunk::text_hash;
use crate::db;
use crate::error::HxError;
use crate::migrate;
use crate::models::{ChunkDraft, ChunkRow, ChunkView, FileMeta, SearchHit, StoreStats};

/// Characters of chunk text shown as a search snippet.
pub const SNIPPET_CHARS: i64 = 160;

/// Handle to the knowledge base. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    db_path: PathBuf,
}

/// Chunk ids and index entry ids currently stored for one file.
#[derive(Debug, Clone)]
pub struct FileIndexState {
    pub file_id: i64,
    pub content_hash: String,
    pub chunk_ids: Vec<i64>,
    pub indexed_ids: Vec<i64>,
}

impl Store {
    /// Open an existing, initialized knowledge base.
    ///
    /// Fails with [`HxError::StoreUnavailable`] when the file or any table is
    /// missing.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        let missing = migrate::missing_tables(&pool).await?;
        if !missing.is_empty() {
            pool.close().await;
            return Err(HxError::StoreUnavailable {
                path: db_path.to_path_buf(),
                reason: format!("missing tables: {} (run `hx init`)", missing.join(", ")),
            }
            .into());
        }
        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ============ Change detection ============

    /// Insert or refresh a file row. Returns `(file_id, changed)`.
    ///
    /// `changed` is true when the path is new or its stored hash differs.
    /// Metadata is written either way, but the stored hash only moves forward
    /// in [`Store::replace_chunks`], so a file whose rebuild fails is still
    /// seen as changed on the next run.
    pub async fn upsert_file(&self, meta: &FileMeta) -> Result<(i64, bool)> {
        let mut tx = self.pool.begin().await?;

        let prior: Option<String> = sqlx::query_scalar("SELECT sha256 FROM files WHERE path = ?")
            .bind(&meta.path)
            .fetch_optional(&mut *tx)
            .await?;
        let changed = prior.as_deref() != Some(meta.content_hash.as_str());
        let stored_hash = prior.unwrap_or_default();

        let now = Utc::now().timestamp();
        let file_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO files (path, mtime, sha256, size, type, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                mtime = excluded.mtime,
                size = excluded.size,
                type = excluded.type,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&meta.path)
        .bind(meta.mtime)
        .bind(&stored_hash)
        .bind(meta.size_bytes)
        .bind(&meta.file_type)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((file_id, changed))
    }

    // ============ Atomic chunk replacement ============

    /// Replace every chunk and index entry owned by `file_id` with `chunks`
    /// and record `content_hash` as the file's indexed hash.
    ///
    /// Index entries are deleted before chunk rows. All of it commits or none
    /// of it does. Returns the number of chunks inserted.
    pub async fn replace_chunks(
        &self,
        file_id: i64,
        path: &str,
        content_hash: &str,
        policy_version: &str,
        chunks: &[ChunkDraft],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks_fts WHERE rowid IN (SELECT id FROM chunks WHERE file_id = ?)")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM chunks WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO chunks (file_id, chunk_index, heading, start_line, end_line,
                                    text, text_sha256, chunk_policy_version)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(file_id)
            .bind(index as i64)
            .bind(&chunk.heading_path)
            .bind(chunk.start_line)
            .bind(chunk.end_line)
            .bind(&chunk.text)
            .bind(text_hash(&chunk.text))
            .bind(policy_version)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO chunks_fts (rowid, text, heading, path, file_id) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(chunk_id)
            .bind(&chunk.text)
            .bind(&chunk.heading_path)
            .bind(path)
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE files SET sha256 = ? WHERE id = ?")
            .bind(content_hash)
            .bind(file_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(chunks.len() as u64)
    }

    // ============ Ranked search ============

    /// Full-text search, best match first (ascending bm25 score).
    ///
    /// A blank query or one with no matches returns an empty list.
    pub async fn search(&self, query: &str, top_k: i64) -> Result<Vec<SearchHit>> {
        let Some(match_expr) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT c.id AS chunk_id, f.path, c.heading, c.start_line, c.end_line,
                   substr(c.text, 1, ?) AS snippet,
                   bm25(chunks_fts) AS score
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.rowid
            JOIN files f ON f.id = c.file_id
            WHERE chunks_fts MATCH ?
            ORDER BY score ASC, c.id ASC
            LIMIT ?
            "#,
        )
        .bind(SNIPPET_CHARS)
        .bind(&match_expr)
        .bind(top_k)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let snippet: String = row.get("snippet");
                SearchHit {
                    chunk_id: row.get("chunk_id"),
                    path: row.get("path"),
                    heading: row.get("heading"),
                    start_line: row.get("start_line"),
                    end_line: row.get("end_line"),
                    snippet: flatten_newlines(&snippet),
                    score: row.get("score"),
                }
            })
            .collect();

        Ok(hits)
    }

    // ============ Chunk lookup ============

    /// Fetch full chunk rows. Order is storage order, not the order of `ids`.
    pub async fn get_chunks_by_ids(&self, ids: &[i64]) -> Result<Vec<ChunkRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT c.id, c.file_id, f.path, c.chunk_index, c.heading,
                   c.start_line, c.end_line, c.text
            FROM chunks c
            JOIN files f ON f.id = c.file_id
            WHERE c.id IN ("#,
        );
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(chunk_row).collect())
    }

    /// Fetch one chunk for display, or `None` if the id is unknown.
    pub async fn get_chunk(&self, id: i64) -> Result<Option<ChunkView>> {
        let row = sqlx::query(
            r#"
            SELECT c.id, f.path, c.heading, c.start_line, c.end_line, c.text
            FROM chunks c
            JOIN files f ON f.id = c.file_id
            WHERE c.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ChunkView {
            id: row.get("id"),
            path: row.get("path"),
            heading: row.get("heading"),
            start_line: row.get("start_line"),
            end_line: row.get("end_line"),
            text: row.get("text"),
        }))
    }

    /// Chunk and index-entry ids stored for `path`, in chunk order.
    pub async fn file_index_state(&self, path: &str) -> Result<Option<FileIndexState>> {
        let file = sqlx::query("SELECT id, sha256 FROM files WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        let Some(file) = file else {
            return Ok(None);
        };
        let file_id: i64 = file.get("id");

        let chunk_ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM chunks WHERE file_id = ? ORDER BY chunk_index ASC")
                .bind(file_id)
                .fetch_all(&self.pool)
                .await?;
        let indexed_ids: Vec<i64> =
            sqlx::query_scalar("SELECT rowid FROM chunks_fts WHERE file_id = ? ORDER BY rowid ASC")
                .bind(file_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(Some(FileIndexState {
            file_id,
            content_hash: file.get("sha256"),
            chunk_ids,
            indexed_ids,
        }))
    }

    // ============ Stats ============

    pub async fn stats(&self) -> Result<StoreStats> {
        let file_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let index_entry_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks_fts")
            .fetch_one(&self.pool)
            .await?;
        let run_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM runs")
            .fetch_one(&self.pool)
            .await?;
        let open_run_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM runs WHERE finished_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreStats {
            file_count,
            chunk_count,
            index_entry_count,
            run_count,
            open_run_count,
        })
    }
}

fn chunk_row(row: &SqliteRow) -> ChunkRow {
    ChunkRow {
        id: row.get("id"),
        file_id: row.get("file_id"),
        path: row.get("path"),
        chunk_index: row.get("chunk_index"),
        heading: row.get("heading"),
        start_line: row.get("start_line"),
        end_line: row.get("end_line"),
        text: row.get("text"),
    }
}

/// Turn free text into an FTS5 expression: each whitespace token becomes a
/// quoted phrase, all of which must match. `None` for a blank query.
pub fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

fn flatten_newlines(s: &str) -> String {
    s.replace("\r\n", " ").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_query_quotes_terms() {
        assert_eq!(fts_query("  "), None);
        assert_eq!(fts_query("deploy guide").unwrap(), "\"deploy\" \"guide\"");
        assert_eq!(fts_query("c++ \"x\"").unwrap(), "\"c++\" \"\"\"x\"\"\"");
    }

    #[test]
    fn test_flatten_newlines() {
        assert_eq!(flatten_newlines("a\nb\r\nc"), "a b c");
    }
}
