//! Logging capability and process-wide tracing setup.
//!
//! Pipeline components log through the [`Logger`] trait so tests can swap in
//! a recording double. The production implementation, [`TracingLogger`],
//! forwards to `tracing`; [`init_tracing`] installs the subscriber once at
//! process start with a console layer and a size-rotated log file.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;

/// Minimal logging surface used by the ingestion and retrieval pipeline.
pub trait Logger: Send + Sync {
    fn debug(&self, msg: &str);
    fn info(&self, msg: &str);
    fn warning(&self, msg: &str);
    fn error(&self, msg: &str);
    /// Log an error together with its full cause chain.
    fn exception(&self, msg: &str, err: &anyhow::Error);
}

/// [`Logger`] backed by the global `tracing` subscriber.
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, msg: &str) {
        tracing::debug!(target: "hx", "{}", msg);
    }

    fn info(&self, msg: &str) {
        tracing::info!(target: "hx", "{}", msg);
    }

    fn warning(&self, msg: &str) {
        tracing::warn!(target: "hx", "{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!(target: "hx", "{}", msg);
    }

    fn exception(&self, msg: &str, err: &anyhow::Error) {
        tracing::error!(target: "hx", error = %format!("{:#}", err), "{}", msg);
    }
}

/// Install the global subscriber. Call once, before any logging happens.
pub fn init_tracing(log: &LogConfig, log_path: &Path) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let console = log
        .to_console
        .then(|| fmt::layer().with_writer(io::stderr).with_target(false));

    let file = if log.to_file {
        let writer = RotatingFile::open(log_path, log.rotate_mb * 1024 * 1024, log.backups)?;
        Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(writer)))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Append-only log file that rolls over once it reaches `max_bytes`.
///
/// On rollover `hx.log.{n-1}` moves to `hx.log.{n}` (the oldest is dropped),
/// the live file becomes `hx.log.1`, and a fresh file is started.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backups: u32,
    file: File,
    size: u64,
}

impl RotatingFile {
    pub fn open(path: &Path, max_bytes: u64, backups: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
        let file = open_append(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            backups,
            file,
            size,
        })
    }

    fn backup_path(&self, n: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backups == 0 {
            self.file = File::create(&self.path)?;
            self.size = 0;
            return Ok(());
        }
        for n in (1..self.backups).rev() {
            let from = self.backup_path(n);
            if from.exists() {
                std::fs::rename(&from, self.backup_path(n + 1))?;
            }
        }
        std::fs::rename(&self.path, self.backup_path(1))?;
        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rotates_when_full() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("hx.log");
        let mut f = RotatingFile::open(&path, 16, 2).unwrap();

        f.write_all(b"0123456789\n").unwrap();
        f.write_all(b"abcdefghij\n").unwrap();
        f.write_all(b"ABCDEFGHIJ\n").unwrap();
        f.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ABCDEFGHIJ\n");
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("logs/hx.log.1")).unwrap(),
            "abcdefghij\n"
        );
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("logs/hx.log.2")).unwrap(),
            "0123456789\n"
        );
    }

    #[test]
    fn test_oldest_backup_dropped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hx.log");
        let mut f = RotatingFile::open(&path, 4, 1).unwrap();
        for line in ["aaaa", "bbbb", "cccc"] {
            f.write_all(line.as_bytes()).unwrap();
        }
        f.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "cccc");
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("hx.log.1")).unwrap(),
            "bbbb"
        );
        assert!(!tmp.path().join("hx.log.2").exists());
    }

    #[test]
    fn test_zero_backups_truncates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hx.log");
        let mut f = RotatingFile::open(&path, 4, 0).unwrap();
        f.write_all(b"aaaa").unwrap();
        f.write_all(b"bb").unwrap();
        f.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "bb");
    }
}
