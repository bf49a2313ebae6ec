// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The reactor core: a signal-aware, edge-triggered, multi-threaded event loop.
//!
//! This crate owns everything in the "in scope" list of the top-level design:
//! the [`ByteBuffer`](buffer::ByteBuffer) per-direction byte queue, the
//! [`TaskQueue`](task_queue::TaskQueue)/[`WorkerPool`](task_queue::WorkerPool)
//! pair, the [`TimerWheel`](timer_wheel::TimerWheel) idle-timeout container,
//! the [`SignalPipe`](signal_pipe::SignalPipe) unified event source, the
//! [`Multiplexer`](multiplexer::Multiplexer) abstraction over `poll`/`epoll`,
//! [`Connection`](connection::Connection), and the [`Reactor`](reactor::Reactor)
//! that ties them together. JSON framing, RPC dispatch, HTTP parsing, and log
//! formatting are out of scope here by design -- see `relay-rpc`,
//! `relay-http`, and `relay-log`.

#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

pub mod buffer;
pub mod connection;
pub mod error;
pub mod multiplexer;
pub mod reactor;
pub mod signal_pipe;
pub mod task_queue;
pub mod timer_wheel;

pub use buffer::ByteBuffer;
pub use connection::{Connection, ConnectionId, Mode};
pub use error::{Error, Result};
pub use multiplexer::{Backend, Interest, Multiplexer, ReadyEvent, ReadyKind};
pub use reactor::{Reactor, ReactorConfig};
pub use signal_pipe::SignalPipe;
pub use task_queue::{TaskQueue, WorkerPool};
pub use timer_wheel::TimerWheel;
