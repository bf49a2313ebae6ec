// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The I/O multiplexer abstraction: ready-set selection over many file
//! descriptors, with interchangeable `poll`-style and `epoll`-style
//! back-ends.
//!
//! The two back-ends are modeled as a tagged [`Backend`] enum rather than a
//! trait object, chosen once at [`Reactor`](crate::reactor::Reactor)
//! construction and never switched at runtime -- the same pattern the
//! teacher uses to pick one `RRTWorker` implementation per static singleton.
//!
//! [`Backend::wait`] is called only from the loop thread. The interest-table
//! operations ([`Backend::register`], [`reregister`](Backend::reregister),
//! [`unregister`](Backend::unregister)) take `&self`, not `&mut self`: both
//! back-ends guard their registration state behind interior mutability that
//! is safe to call concurrently, because a worker thread legitimately arms
//! or disarms `WRITE` interest as the direct consequence of a buffer-state
//! change it just made in [`Connection::send`](crate::connection::Connection::send)
//! or [`Connection::flush_send_buf`](crate::connection::Connection::flush_send_buf).
//! Connection-table inserts and removes, by contrast, happen only on the
//! loop thread -- see the [`Reactor`](crate::reactor::Reactor) run loop.

mod epoll_backend;
mod poll_backend;

pub use epoll_backend::EpollMultiplexer;
pub use poll_backend::PollMultiplexer;

use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// The readiness a registration is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
    ReadWrite,
}

impl Interest {
    #[must_use]
    pub fn wants_read(self) -> bool {
        matches!(self, Interest::Read | Interest::ReadWrite)
    }

    #[must_use]
    pub fn wants_write(self) -> bool {
        matches!(self, Interest::Write | Interest::ReadWrite)
    }
}

/// The kind of readiness a [`ReadyEvent`] reports.
///
/// A descriptor registered for `READ` never generates a spurious `WRITE`
/// report and vice versa, on both back-ends. Errors and peer hangups are
/// always delivered as [`ReadyKind::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyKind {
    /// The listening socket has a pending connection.
    Acceptable,
    /// The descriptor has data to read (or, for the signal pipe, signal
    /// bytes to drain).
    Readable,
    /// The descriptor can accept more bytes without blocking.
    Writable,
    /// The descriptor reported an error or hangup.
    Error,
}

/// One entry of a ready-set returned by [`Multiplexer::wait`].
#[derive(Debug, Clone, Copy)]
pub struct ReadyEvent {
    pub fd: RawFd,
    pub kind: ReadyKind,
}

/// Interface implemented by both multiplexer back-ends.
pub trait Multiplexer: Send + Sync {
    /// Registers `fd` with `interest`. Descriptor must not already be
    /// registered. Safe to call from any thread.
    fn register(&self, fd: RawFd, interest: Interest) -> Result<()>;

    /// Changes the interest already registered for `fd`. Safe to call from
    /// any thread.
    fn reregister(&self, fd: RawFd, interest: Interest) -> Result<()>;

    /// Removes every registration for `fd`. Safe to call from any thread.
    fn unregister(&self, fd: RawFd) -> Result<()>;

    /// Marks `fd` as the listening socket: its `READ` readiness is reported
    /// as [`ReadyKind::Acceptable`] rather than [`ReadyKind::Readable`].
    fn mark_listener(&self, fd: RawFd);

    /// Blocks until at least one registered descriptor is ready, an error
    /// occurs, or `timeout` elapses (`None` blocks indefinitely). Returns
    /// the ready set in back-end-reported order. `EINTR` is retried
    /// internally and never surfaces to the caller. Called only by the loop
    /// thread.
    fn wait(&self, timeout: Option<Duration>) -> Result<Vec<ReadyEvent>>;
}

/// The selected multiplexer back-end, chosen once at construction and cheap
/// to clone (each variant wraps an `Arc`-shared registration table).
#[derive(Clone)]
pub enum Backend {
    Poll(Arc<PollMultiplexer>),
    Epoll(Arc<EpollMultiplexer>),
}

impl Backend {
    /// Builds the portable `poll`-based back-end.
    pub fn poll() -> Result<Self> {
        Ok(Backend::Poll(Arc::new(PollMultiplexer::new())))
    }

    /// Builds the Linux `epoll`-based, edge-triggered back-end.
    pub fn epoll() -> Result<Self> {
        Ok(Backend::Epoll(Arc::new(EpollMultiplexer::new()?)))
    }
}

impl Multiplexer for Backend {
    fn register(&self, fd: RawFd, interest: Interest) -> Result<()> {
        match self {
            Backend::Poll(m) => m.register(fd, interest),
            Backend::Epoll(m) => m.register(fd, interest),
        }
    }

    fn reregister(&self, fd: RawFd, interest: Interest) -> Result<()> {
        match self {
            Backend::Poll(m) => m.reregister(fd, interest),
            Backend::Epoll(m) => m.reregister(fd, interest),
        }
    }

    fn unregister(&self, fd: RawFd) -> Result<()> {
        match self {
            Backend::Poll(m) => m.unregister(fd),
            Backend::Epoll(m) => m.unregister(fd),
        }
    }

    fn mark_listener(&self, fd: RawFd) {
        match self {
            Backend::Poll(m) => m.mark_listener(fd),
            Backend::Epoll(m) => m.mark_listener(fd),
        }
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<Vec<ReadyEvent>> {
        match self {
            Backend::Poll(m) => m.wait(timeout),
            Backend::Epoll(m) => m.wait(timeout),
        }
    }
}
