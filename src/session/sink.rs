//! Append-only session log file.
//!
//! Each received line is written with its own open/append/flush/close cycle,
//! so everything written before a crash or teardown is already on disk.

use crate::error::SinkError;
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Build the log file name for a session started at `started`.
pub fn log_file_name(prefix: &str, started: DateTime<Utc>) -> String {
    format!("{prefix}{}.txt", started.format("%d_%m_%Y_%H_%M_%S_%3f"))
}

/// An open log sink. Exists only while the client is in `Logging`.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    lines_written: u64,
}

impl LogSink {
    /// Open (creating if necessary) the log file at `path`.
    ///
    /// The parent directory is created when missing. Existing content is kept.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            lines_written: 0,
        })
    }

    /// Create a new log file at `path`, never reusing an existing one.
    ///
    /// If `path` is taken, a numeric suffix is added before the extension
    /// (`name.txt`, `name_1.txt`, `name_2.txt`, ...).
    pub fn create_new(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let base = path.into();
        if let Some(parent) = base.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut suffix = 0u32;
        loop {
            let candidate = suffixed_path(&base, suffix);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(_) => {
                    return Ok(Self {
                        path: candidate,
                        lines_written: 0,
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    suffix += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Append one record.
    pub fn append(&mut self, line: &str) -> Result<(), SinkError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        self.lines_written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines appended through this sink.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }
}

fn suffixed_path(base: &Path, suffix: u32) -> PathBuf {
    if suffix == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    base.with_file_name(name)
}
