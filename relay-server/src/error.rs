// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

use std::io;
use std::path::PathBuf;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort `relay-server` startup. Every variant here is
/// fatal: the process logs it and exits with code 1.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("failed to read config file {0}: {1}")]
    #[diagnostic(code(relay_server::read_config))]
    ReadConfig(PathBuf, #[source] io::Error),

    #[error("failed to parse config file {0}: {1}")]
    #[diagnostic(code(relay_server::parse_config))]
    ParseConfig(PathBuf, #[source] toml::de::Error),

    #[error("failed to install log sinks: {0}")]
    #[diagnostic(code(relay_server::log_init))]
    LogInit(#[from] relay_log::Error),

    #[error(transparent)]
    #[diagnostic(code(relay_server::reactor_init))]
    Reactor(#[from] relay_core::Error),
}
