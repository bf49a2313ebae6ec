// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The server binary: wires a [`relay_core::Reactor`] to the RPC dispatch
//! table and the HTTP static/CGI handler, installs the log sinks, and runs
//! until `SIGINT`/`SIGTERM`.
//!
//! Grounded in `original_source/server/src/main.cpp`'s startup sequence
//! (bind, install signal handlers, log, loop) and, for the CLI/config
//! layering, `r3bl-cmdr`'s binaries.

mod config;
mod error;
mod protocol;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use config::{BackendChoice, Cli, ServerConfig};
use error::Result;
use protocol::RelayService;
use relay_core::{Backend, Connection, Reactor, ReactorConfig};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::from(1), // only returns via a graceful SIGINT/SIGTERM stop.
        Err(e) => {
            eprintln!("fatal: {e}");
            error!("fatal startup error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ServerConfig::resolve(cli)?;

    let pid = std::process::id();
    let timestamp = chrono::Local::now().format("%Y%m%dT%H%M%S").to_string();
    relay_log::init(&config.log_dir, pid, &timestamp)?;

    info!(
        "relay-server starting on port {} (workdir {:?}, cgi {:?})",
        config.port, config.http_workdir, config.cgi_dir
    );

    let backend = match config.backend {
        BackendChoice::Poll => Backend::poll()?,
        BackendChoice::Epoll => Backend::epoll()?,
    };

    let reactor_config = ReactorConfig {
        bind_addr: config.bind_addr.clone(),
        port: config.port,
        max_task_num: config.max_task_num,
        max_pool_size: config.max_pool_size,
        timeout_period: config.timeout_period,
        ..ReactorConfig::default()
    };
    let mut reactor = Reactor::new(reactor_config, backend)?;

    let service = Arc::new(RelayService::new(
        relay_rpc::procedures::standard_dispatcher(),
        config.http_workdir,
        config.cgi_dir,
    ));

    let read_service = service.clone();
    reactor.on_read(Arc::new(move |conn: &mut Connection| {
        read_service.on_read(conn);
    }));

    let timeout_service = service;
    reactor.on_timeout(Arc::new(move |conn: &mut Connection| {
        timeout_service.forget(conn.id());
    }));

    reactor.run()?;
    Ok(())
}
