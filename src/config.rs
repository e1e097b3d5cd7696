//! TOML configuration.
//!
//! Every section has defaults, so a missing config file is not an error: the
//! knowledge base then lives next to where the config file would have been.
//! Relative paths (`db.path`, `log.file`) resolve against that base directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::HxError;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Directory relative paths are resolved against. Not read from TOML.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kb.sqlite")
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub to_console: bool,
    #[serde(default = "default_true")]
    pub to_file: bool,
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
    #[serde(default = "default_rotate_mb")]
    pub rotate_mb: u64,
    #[serde(default = "default_backups")]
    pub backups: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            to_console: true,
            to_file: true,
            file: default_log_file(),
            rotate_mb: default_rotate_mb(),
            backups: default_backups(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_file() -> PathBuf {
    PathBuf::from("cache/logs/hx.log")
}
fn default_rotate_mb() -> u64 {
    5
}
fn default_backups() -> u32 {
    3
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_exts")]
    pub include_exts: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_exts: default_include_exts(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_exts() -> Vec<String> {
    vec![".md".to_string(), ".txt".to_string()]
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_policy_version")]
    pub policy_version: String,
    /// Sizing hint; the structural chunker splits on headings only.
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            policy_version: default_policy_version(),
            target_chars: default_target_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_policy_version() -> String {
    "md_v1".to_string()
}
fn default_target_chars() -> usize {
    800
}
fn default_overlap_chars() -> usize {
    120
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default = "default_neighbor_gap")]
    pub neighbor_gap: i64,
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            neighbor_gap: default_neighbor_gap(),
            context_chunks: default_context_chunks(),
        }
    }
}

fn default_top_k() -> i64 {
    8
}
fn default_neighbor_gap() -> i64 {
    1
}
fn default_context_chunks() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            log: LogConfig::default(),
            ingest: IngestConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Resolve a configured path against the base directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.resolve(&self.db.path)
    }

    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.log.file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest.include_exts.is_empty() {
            return Err(invalid("ingest.include_exts must not be empty"));
        }
        if self.chunking.policy_version.trim().is_empty() {
            return Err(invalid("chunking.policy_version must not be empty"));
        }
        if self.retrieval.top_k < 1 {
            return Err(invalid("retrieval.top_k must be >= 1"));
        }
        if self.retrieval.neighbor_gap < 0 {
            return Err(invalid("retrieval.neighbor_gap must be >= 0"));
        }
        if self.retrieval.context_chunks < 1 {
            return Err(invalid("retrieval.context_chunks must be >= 1"));
        }
        if self.log.rotate_mb == 0 {
            return Err(invalid("log.rotate_mb must be > 0"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> anyhow::Error {
    HxError::InvalidConfig(msg.to_string()).into()
}

/// Directory a config path's relative entries resolve against.
fn base_dir_of(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::canonicalize(&parent).unwrap_or(parent)
}

/// Load the config at `path`, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };
    config.base_dir = base_dir_of(path);
    config.validate()?;
    Ok(config)
}

/// Write the default configuration to `path` unless a file is already there.
///
/// Returns `true` when a new file was written.
pub fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(true)
}
