//! # hx CLI
//!
//! Command-line front end for the notes knowledge base.
//!
//! ## Usage
//!
//! ```bash
//! hx --config ./hx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hx init-config` | Write a default config file if none exists |
//! | `hx init` | Create the SQLite database and schema |
//! | `hx doctor` | Show resolved paths, settings, and counts |
//! | `hx ingest [root]` | Index a directory incrementally |
//! | `hx search "<query>"` | Ranked full-text search |
//! | `hx ask "<query>"` | Rule-extracted answer with citations |
//! | `hx show <id>` | Print one chunk |
//! | `hx stats` | Row counts and last run |
//! | `hx runs` | Recent ingest runs |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hx_kb::context::AppContext;
use hx_kb::progress::ProgressMode;
use hx_kb::{ask, config, get, ingest, migrate, search, stats};

/// hx — index a directory of notes and answer lookups with cited excerpts.
#[derive(Parser)]
#[command(name = "hx", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply if it does not exist.
    #[arg(long, global = true, default_value = "./hx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file.
    InitConfig,

    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Health check: resolved paths, settings, and row counts.
    Doctor,

    /// Scan a directory and index new or changed files.
    Ingest {
        /// Directory to scan.
        #[arg(default_value = "data")]
        root: PathBuf,

        /// Rebuild chunks even for files whose content is unchanged.
        #[arg(long)]
        force: bool,

        /// Progress output on stderr. Defaults to human when stderr is a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,

        /// Print the run report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Full-text search over indexed chunks.
    Search {
        query: String,

        /// Maximum number of hits.
        #[arg(long)]
        limit: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Answer a query from the indexed notes, with citations.
    Ask {
        query: String,

        /// `summary` (leading lines) or `steps` (list and procedural lines).
        #[arg(long, default_value = "summary")]
        mode: String,

        /// Number of chunks to retrieve.
        #[arg(long)]
        limit: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Show one chunk by id.
    Show {
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Row counts and the most recent run.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// List recent ingest runs, flagging any that never closed.
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig => {
            // No logging or database needed
            if config::write_default_config(&cli.config)? {
                println!("config written: {}", cli.config.display());
            } else {
                println!("config ready: {}", cli.config.display());
            }
        }
        Commands::Init => {
            let ctx = AppContext::load(&cli.config)?;
            let db_path = ctx.config.db_path();
            migrate::run_migrations(&db_path).await?;
            println!("Database initialized: {}", db_path.display());
        }
        Commands::Doctor => {
            let ctx = AppContext::load(&cli.config)?;
            stats::run_doctor(&ctx).await?;
        }
        Commands::Ingest {
            root,
            force,
            progress,
            json,
        } => {
            let ctx = AppContext::load(&cli.config)?;
            ingest::run_ingest(&ctx, &root, force, progress, json).await?;
        }
        Commands::Search { query, limit, json } => {
            let ctx = AppContext::load(&cli.config)?;
            search::run_search(&ctx, &query, limit, json).await?;
        }
        Commands::Ask {
            query,
            mode,
            limit,
            json,
        } => {
            let ctx = AppContext::load(&cli.config)?;
            ask::run_ask(&ctx, &query, &mode, limit, json).await?;
        }
        Commands::Show { id, json } => {
            let ctx = AppContext::load(&cli.config)?;
            get::run_get(&ctx, id, json).await?;
        }
        Commands::Stats { json } => {
            let ctx = AppContext::load(&cli.config)?;
            stats::run_stats(&ctx, json).await?;
        }
        Commands::Runs { limit } => {
            let ctx = AppContext::load(&cli.config)?;
            stats::run_runs(&ctx, limit).await?;
        }
    }

    Ok(())
}
