//! Run ledger: one audit row per ingestion invocation.
//!
//! A run is `Open` from [`Store::start_run`] until [`Store::finish_run`] sets
//! `finished_at` and stores the counters. [`RunGuard`] ties the two together
//! so that a started run is closed on every exit path: `finish()` on normal
//! completion or a returned error, and `Drop` if the ingest future is dropped
//! or unwinds first.

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, Row};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use crate::models::{Run, RunCounters};
use crate::store::Store;

impl Store {
    /// Open a new run row with `finished_at = NULL`.
    pub async fn start_run(&self, policy_version: &str) -> Result<i64> {
        let run_id: i64 = sqlx::query_scalar(
            "INSERT INTO runs (started_at, chunk_policy_version) VALUES (?, ?) RETURNING id",
        )
        .bind(Utc::now().timestamp())
        .bind(policy_version)
        .fetch_one(self.pool())
        .await?;
        Ok(run_id)
    }

    /// Close a run: set `finished_at` and store the serialized counters.
    pub async fn finish_run(&self, run_id: i64, counters: &RunCounters) -> Result<()> {
        let payload = serde_json::to_string(counters)?;
        sqlx::query("UPDATE runs SET finished_at = ?, counters_json = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(payload)
            .bind(run_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn get_run(&self, run_id: i64) -> Result<Option<Run>> {
        let row = sqlx::query(
            "SELECT id, started_at, finished_at, chunk_policy_version, counters_json FROM runs WHERE id = ?",
        )
        .bind(run_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|r| run_from_row(&r)))
    }

    /// Most recent runs first.
    pub async fn list_runs(&self, limit: i64) -> Result<Vec<Run>> {
        let rows = sqlx::query(
            r#"
            SELECT id, started_at, finished_at, chunk_policy_version, counters_json
            FROM runs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(run_from_row).collect())
    }
}

fn run_from_row(row: &sqlx::sqlite::SqliteRow) -> Run {
    let counters_json: Option<String> = row.get("counters_json");
    Run {
        id: row.get("id"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
        chunk_policy_version: row.get("chunk_policy_version"),
        counters: counters_json.and_then(|s| serde_json::from_str(&s).ok()),
    }
}

/// An open run that is guaranteed to be closed.
///
/// Counters are accumulated in the guard while ingesting. Call
/// [`RunGuard::finish`] to close the run; if the guard is dropped first, the
/// run is closed synchronously with whatever counters were collected.
pub struct RunGuard {
    store: Store,
    run_id: i64,
    started: Instant,
    counters: RunCounters,
    closed: bool,
}

impl RunGuard {
    pub async fn start(store: &Store, policy_version: &str) -> Result<Self> {
        let run_id = store.start_run(policy_version).await?;
        Ok(Self {
            store: store.clone(),
            run_id,
            started: Instant::now(),
            counters: RunCounters::default(),
            closed: false,
        })
    }

    pub fn id(&self) -> i64 {
        self.run_id
    }

    pub fn counters_mut(&mut self) -> &mut RunCounters {
        &mut self.counters
    }

    /// Close the run and return the final counters.
    pub async fn finish(mut self) -> Result<RunCounters> {
        self.counters.elapsed_seconds = self.started.elapsed().as_secs_f64();
        self.store.finish_run(self.run_id, &self.counters).await?;
        self.closed = true;
        Ok(std::mem::take(&mut self.counters))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.counters.elapsed_seconds = self.started.elapsed().as_secs_f64();
        let db_path = self.store.db_path().to_path_buf();
        let run_id = self.run_id;
        let counters = std::mem::take(&mut self.counters);

        // The owning runtime may be unwinding or shutting down, so close on a
        // private runtime with a fresh connection.
        let handle = std::thread::spawn(move || close_run_blocking(db_path, run_id, counters));
        match handle.join() {
            Ok(Ok(())) => {
                tracing::warn!(target: "hx", run_id, "run closed before ingest completed")
            }
            Ok(Err(e)) => {
                tracing::error!(target: "hx", run_id, error = %format!("{:#}", e), "failed to close run")
            }
            Err(_) => tracing::error!(target: "hx", run_id, "run close thread panicked"),
        }
    }
}

fn close_run_blocking(db_path: PathBuf, run_id: i64, counters: RunCounters) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let payload = serde_json::to_string(&counters)?;
        let mut conn = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .connect()
            .await?;
        sqlx::query(
            "UPDATE runs SET finished_at = ?, counters_json = ? WHERE id = ? AND finished_at IS NULL",
        )
        .bind(Utc::now().timestamp())
        .bind(payload)
        .bind(run_id)
        .execute(&mut conn)
        .await?;
        conn.close().await?;
        Ok::<(), anyhow::Error>(())
    })
}
