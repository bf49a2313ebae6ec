// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The error taxonomy for the reactor core.
//!
//! Every variant corresponds to one of the error kinds named in the design:
//! `SOCKET_CREATE`, `BIND`, `LISTEN`, `MULTIPLEXER_INIT`, `REGISTER_INTEREST`,
//! `SIGNAL_PIPE`, `PEER_CLOSED`, `IO`, `QUEUE_FULL`. Init-time variants carry a
//! [`miette::Diagnostic`] code and actionable `help()` text, the same pattern
//! as `SubscribeError` in the resilient-reactor-thread framework this crate
//! is grounded on.

use std::io;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the reactor core.
///
/// Per the propagation policy: [`Error::SocketCreate`], [`Error::Bind`],
/// [`Error::Listen`], [`Error::MultiplexerInit`], and [`Error::SignalPipe`]
/// are fatal to server startup. [`Error::PeerClosed`], [`Error::Io`], and a
/// client-side [`Error::RegisterInterest`] close only the affected
/// connection. [`Error::QueueFull`] is logged and the event is dropped for
/// that descriptor only.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    /// Failed to create a socket.
    #[error("failed to create socket: {0}")]
    #[diagnostic(
        code(relay_core::socket_create),
        help("check available file descriptors with `ulimit -n`")
    )]
    SocketCreate(#[source] io::Error),

    /// Failed to bind the listening socket to its address.
    #[error("failed to bind: {0}")]
    #[diagnostic(
        code(relay_core::bind),
        help("check that the port is free and the process has permission to bind it")
    )]
    Bind(#[source] io::Error),

    /// Failed to put the listening socket into the listening state.
    #[error("failed to listen: {0}")]
    #[diagnostic(code(relay_core::listen))]
    Listen(#[source] io::Error),

    /// A client-side connect attempt failed.
    #[error("failed to connect: {0}")]
    #[diagnostic(code(relay_core::connect))]
    Connect(#[source] io::Error),

    /// A non-blocking client-side connect did not become writable before the
    /// deadline elapsed.
    #[error("connect timed out")]
    #[diagnostic(code(relay_core::connect_timeout))]
    ConnectTimeout,

    /// The selected multiplexer back-end failed to initialize.
    #[error("failed to initialize multiplexer: {0}")]
    #[diagnostic(
        code(relay_core::multiplexer_init),
        help("the epoll back-end requires Linux; the poll back-end works on every platform")
    )]
    MultiplexerInit(#[source] io::Error),

    /// Registering or unregistering interest for a descriptor failed.
    #[error("failed to register interest: {0}")]
    #[diagnostic(code(relay_core::register_interest))]
    RegisterInterest(#[source] io::Error),

    /// Setting up the unified-event-source self-pipe failed.
    #[error("failed to initialize signal pipe: {0}")]
    #[diagnostic(code(relay_core::signal_pipe))]
    SignalPipe(#[source] io::Error),

    /// The peer closed its end of the connection.
    #[error("peer closed the connection")]
    PeerClosed,

    /// An I/O operation failed for a reason other than would-block or
    /// interrupted.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The bounded task queue was full at submission time.
    #[error("task queue is full")]
    QueueFull,
}

impl Error {
    /// True for the errors that must abort server startup rather than close
    /// one connection.
    #[must_use]
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            Error::SocketCreate(_)
                | Error::Bind(_)
                | Error::Listen(_)
                | Error::MultiplexerInit(_)
                | Error::SignalPipe(_)
        )
    }
}
