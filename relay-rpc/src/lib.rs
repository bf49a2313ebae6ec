// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! Sentinel-framed JSON-RPC: the wire messages, the incremental frame
//! reader, and the method dispatch table the [`relay_core::Reactor`]'s
//! `on_read` callback drives.
//!
//! Grounded in `original_source/server/src/rpc_server.hpp`'s `server`/
//! `invoker` pair, with the exception-based control flow ported to
//! [`Dispatcher::dispatch`]'s `Result`-returning procedures.

#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

mod dispatch;
mod error;
mod framing;
mod message;
pub mod procedures;

pub use dispatch::{Dispatcher, Procedure};
pub use error::{Error, Result};
pub use framing::{encode, FrameReader, SENTINEL};
pub use message::{RpcRequest, RpcResponse};
