// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! CLI surface plus an optional TOML file fallback, merged with CLI flags
//! taking precedence -- the same two-layer approach `r3bl_cmdr`'s binaries
//! use `clap`'s derive API for, generalized here with a `serde`/`toml` file
//! underneath it.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Which [`relay_core::multiplexer::Backend`] to build the reactor on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendChoice {
    /// `libc::poll`, portable across every target this crate builds for.
    Poll,
    /// Linux `epoll`, edge-triggered.
    Epoll,
}

/// Command-line surface for the server binary. `spec.md` §6 names `port`,
/// `log_path`, `max_task_num`, `max_pool_size`; the remaining fields are
/// `SPEC_FULL.md`'s supplemented `ServerConfig`.
#[derive(Parser, Debug)]
#[command(author, version, about = "Single-machine signal-aware RPC/HTTP reactor server")]
pub struct Cli {
    /// TOML file providing defaults for any flag not given on the command
    /// line.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port the listener binds.
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory append-only log files are written under.
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// Capacity of the bounded task queue.
    #[arg(long)]
    pub max_task_num: Option<usize>,

    /// Number of worker threads draining the task queue.
    #[arg(long)]
    pub max_pool_size: Option<usize>,

    /// Address the listening socket binds to.
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Idle-connection timeout, and the `SIGALRM` re-arm period, in seconds.
    #[arg(long)]
    pub timeout_period_secs: Option<u64>,

    /// Work directory static `GET` requests are served from.
    #[arg(long)]
    pub http_workdir: Option<PathBuf>,

    /// Directory CGI programs are resolved under.
    #[arg(long)]
    pub cgi_dir: Option<PathBuf>,

    /// Multiplexer back-end.
    #[arg(long, value_enum)]
    pub backend: Option<BackendChoice>,
}

/// Mirror of [`Cli`]'s optional fields, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FileConfig {
    port: Option<u16>,
    log_path: Option<PathBuf>,
    max_task_num: Option<usize>,
    max_pool_size: Option<usize>,
    bind_addr: Option<String>,
    timeout_period_secs: Option<u64>,
    http_workdir: Option<PathBuf>,
    cgi_dir: Option<PathBuf>,
    backend: Option<BackendChoice>,
}

/// The fully resolved server configuration, after merging `Cli` over an
/// optional `FileConfig` and applying defaults for anything still unset.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub log_dir: PathBuf,
    pub max_task_num: usize,
    pub max_pool_size: usize,
    pub bind_addr: String,
    pub timeout_period: Duration,
    pub http_workdir: PathBuf,
    pub cgi_dir: PathBuf,
    pub backend: BackendChoice,
}

impl ServerConfig {
    /// Loads the optional `--config` TOML file (if given), then overlays
    /// every CLI flag that was actually set, then fills in defaults.
    ///
    /// # Errors
    /// Returns [`Error::ReadConfig`] or [`Error::ParseConfig`] if `--config`
    /// names a file that cannot be read or parsed.
    pub fn resolve(cli: Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| Error::ReadConfig(path.clone(), e))?;
                toml::from_str(&text).map_err(|e| Error::ParseConfig(path.clone(), e))?
            }
            None => FileConfig::default(),
        };

        let http_workdir = cli
            .http_workdir
            .or(file.http_workdir)
            .unwrap_or_else(|| PathBuf::from("."));
        let cgi_dir = cli.cgi_dir.or(file.cgi_dir).unwrap_or_else(|| http_workdir.clone());

        Ok(Self {
            port: cli.port.or(file.port).unwrap_or(9527),
            log_dir: cli.log_path.or(file.log_path).unwrap_or_else(|| PathBuf::from("./logs")),
            max_task_num: cli.max_task_num.or(file.max_task_num).unwrap_or(4096),
            max_pool_size: cli.max_pool_size.or(file.max_pool_size).unwrap_or(8),
            bind_addr: cli.bind_addr.or(file.bind_addr).unwrap_or_else(|| "0.0.0.0".to_string()),
            timeout_period: Duration::from_secs(cli.timeout_period_secs.or(file.timeout_period_secs).unwrap_or(30)),
            http_workdir,
            cgi_dir,
            backend: cli.backend.or(file.backend).unwrap_or(BackendChoice::Poll),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bare_cli() -> Cli {
        Cli {
            config: None,
            port: None,
            log_path: None,
            max_task_num: None,
            max_pool_size: None,
            bind_addr: None,
            timeout_period_secs: None,
            http_workdir: None,
            cgi_dir: None,
            backend: None,
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ServerConfig::resolve(bare_cli()).unwrap();
        assert_eq!(config.port, 9527);
        assert_eq!(config.max_pool_size, 8);
        assert_eq!(config.cgi_dir, config.http_workdir);
    }

    #[test]
    fn cli_flags_take_precedence_over_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        fs::write(&path, "port = 1111\nmax-pool-size = 4\n").unwrap();

        let mut cli = bare_cli();
        cli.config = Some(path);
        cli.port = Some(2222);

        let config = ServerConfig::resolve(cli).unwrap();
        assert_eq!(config.port, 2222, "CLI flag must win over the file");
        assert_eq!(config.max_pool_size, 4, "file value used when CLI leaves it unset");
    }
}
