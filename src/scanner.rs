//! Directory scanner and content fingerprinting.
//!
//! Walks a root directory with `walkdir`, keeps regular files whose extension
//! is on the allow-list, and drops anything matching the exclude globs. The
//! walk is lazy; callers pull paths one at a time and must not rely on the
//! order, which is whatever the filesystem returns.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::models::FileMeta;

/// Block size for streaming hashes.
const HASH_BLOCK_SIZE: usize = 1024 * 1024;

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// A walk entry that could not be read. Carries the offending path when known.
#[derive(Debug)]
pub struct ScanError {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

/// Lazily yield every allowed file under `root`.
pub fn scan<'a>(
    root: &'a Path,
    config: &IngestConfig,
) -> Result<impl Iterator<Item = std::result::Result<PathBuf, ScanError>> + 'a> {
    let allowed = normalize_exts(&config.include_exts);

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    let iter = walker.into_iter().filter_map(move |entry| {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                return Some(Err(ScanError {
                    path,
                    error: anyhow::Error::new(err),
                }));
            }
        };
        if !entry.file_type().is_file() {
            return None;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            return None;
        }
        if !has_allowed_ext(path, &allowed) {
            return None;
        }
        Some(Ok(entry.into_path()))
    });
    Ok(iter)
}

/// Streaming SHA-256 of a file's content, hex encoded.
pub fn fingerprint(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Stat and fingerprint a file, recording it under `stored_path`.
pub fn file_meta(path: &Path, stored_path: String) -> Result<FileMeta> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    let mtime = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    Ok(FileMeta {
        path: stored_path,
        mtime,
        content_hash: fingerprint(path)?,
        size_bytes: metadata.len() as i64,
        file_type: file_type(path),
    })
}

/// Lowercased extension without the dot, or empty.
pub fn file_type(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Path as stored in the `files` table: relative to `base` when under it
/// (with `/` separators), otherwise canonical absolute.
pub fn stored_path(path: &Path, base: &Path) -> String {
    let abs = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let base = std::fs::canonicalize(base).unwrap_or_else(|_| base.to_path_buf());
    match abs.strip_prefix(&base) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => abs.to_string_lossy().to_string(),
    }
}

fn normalize_exts(exts: &[String]) -> Vec<String> {
    exts.iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn has_allowed_ext(path: &Path, allowed: &[String]) -> bool {
    let ext = file_type(path);
    !ext.is_empty() && allowed.iter().any(|a| *a == ext)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
