// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

use std::io;
use std::path::PathBuf;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while installing the log sinks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create log directory {0}: {1}")]
    CreateLogDir(PathBuf, #[source] io::Error),

    #[error("failed to open log file {0}: {1}")]
    OpenLogFile(PathBuf, #[source] io::Error),

    #[error("a logger is already installed in this process: {0}")]
    AlreadyInitialized(#[source] log::SetLoggerError),
}
