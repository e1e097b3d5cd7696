//! Error taxonomy for the knowledge base.
//!
//! Fatal conditions are raised as [`HxError`] values wrapped in
//! [`anyhow::Error`], so callers can still `downcast_ref` to tell them apart.
//! Per-file ingestion failures never surface here; they are recorded in the
//! run's `failed` list instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HxError {
    /// Database file or one of its tables is missing.
    #[error("knowledge base unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    /// Ingestion root (or an explicitly named file) does not exist.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// Unknown summarizer mode.
    #[error("unknown answer mode '{0}'. Use summary or steps.")]
    InvalidMode(String),

    /// Configuration value out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
