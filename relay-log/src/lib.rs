// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! Level-routed, append-only log file sinks.
//!
//! Three files are opened per process at [`init`]: one each for `Fatal`
//! (`log::Level::Error`), `Warning` (`log::Level::Warn`), and `Notice`
//! (`Info`/`Debug`/`Trace`), combined behind a single [`log::Log`]
//! implementation registered once via
//! [`r3bl_simple_logger::CombinedLogger`]. Grounded in the teacher's
//! `WriteLogger`/`CombinedLogger`/`Config` trio -- this crate adds only the
//! exact-level routing `CombinedLogger` does not provide on its own (each of
//! its child loggers is normally a minimum-severity cutoff, not an exclusive
//! bucket).

#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

mod error;

pub use error::{Error, Result};

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{Level, LevelFilter, Log, Metadata, Record};
use r3bl_simple_logger::{CombinedLogger, Config, SharedLogger, WriteLogger};

/// Wraps a [`WriteLogger`] so that only records whose level is exactly one
/// of `levels` pass through, rather than `WriteLogger`'s own
/// minimum-severity cutoff.
struct ExactLevelLogger<W: Write + Send + 'static> {
    levels: &'static [Level],
    inner: Box<WriteLogger<W>>,
}

impl<W: Write + Send + 'static> Log for ExactLevelLogger<W> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.levels.contains(&metadata.level())
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

impl<W: Write + Send + 'static> SharedLogger for ExactLevelLogger<W> {
    fn level(&self) -> LevelFilter {
        self.levels
            .iter()
            .copied()
            .map(LevelFilter::from)
            .max()
            .unwrap_or(LevelFilter::Off)
    }

    fn config(&self) -> Option<&Config> {
        self.inner.config()
    }

    fn as_log(self: Box<Self>) -> Box<dyn Log> {
        Box::new(*self)
    }
}

fn bucket(levels: &'static [Level], path: &Path) -> Result<Box<ExactLevelLogger<File>>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::OpenLogFile(path.to_path_buf(), e))?;
    Ok(Box::new(ExactLevelLogger {
        levels,
        inner: WriteLogger::new(LevelFilter::Trace, Config::default(), file),
    }))
}

/// Installs the three-file log sink for this process under `log_dir`,
/// naming each file `process<pid>_<timestamp>_{Fatal,Warning,Notice}.log`.
/// `timestamp` is caller-supplied so callers (and tests) control its format
/// and avoid this crate reading the clock itself.
///
/// # Errors
/// Returns [`Error::CreateLogDir`] or [`Error::OpenLogFile`] if the log
/// directory or one of its files cannot be created, and
/// [`Error::AlreadyInitialized`] if a logger is already registered in this
/// process.
pub fn init(log_dir: &Path, pid: u32, timestamp: &str) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| Error::CreateLogDir(log_dir.to_path_buf(), e))?;

    let fatal = bucket(&[Level::Error], &log_dir.join(format!("process{pid}_{timestamp}_Fatal.log")))?;
    let warning = bucket(
        &[Level::Warn],
        &log_dir.join(format!("process{pid}_{timestamp}_Warning.log")),
    )?;
    let notice = bucket(
        &[Level::Info, Level::Debug, Level::Trace],
        &log_dir.join(format!("process{pid}_{timestamp}_Notice.log")),
    )?;

    let sinks: Vec<Box<dyn SharedLogger>> = vec![fatal, warning, notice];
    CombinedLogger::init(sinks).map_err(Error::AlreadyInitialized)
}

/// The three file paths [`init`] will open for `log_dir`/`pid`/`timestamp`,
/// without installing anything. Useful for tests that want to assert on
/// file contents after logging.
#[must_use]
pub fn log_file_paths(log_dir: &Path, pid: u32, timestamp: &str) -> [PathBuf; 3] {
    [
        log_dir.join(format!("process{pid}_{timestamp}_Fatal.log")),
        log_dir.join(format!("process{pid}_{timestamp}_Warning.log")),
        log_dir.join(format!("process{pid}_{timestamp}_Notice.log")),
    ]
}
