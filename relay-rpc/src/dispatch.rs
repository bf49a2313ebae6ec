// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The method-name-to-procedure registry and request dispatch, grounded in
//! `original_source/server/src/rpc_server.hpp`'s `server::_func_list` /
//! `invoker::start`. A panicking procedure is caught and reported the same
//! way the original catches `std::exception` around the call.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::warn;
use serde_json::Value;

use crate::message::{RpcRequest, RpcResponse};

/// A registered procedure: takes the request's `parameters` array, returns
/// the JSON result or a human-readable failure message.
pub type Procedure = Arc<dyn Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync>;

/// The method registry. Cheap to clone (an `Arc`-shared map underneath via
/// each [`Procedure`]); typically built once at startup and shared across
/// every connection's worker-pool task.
#[derive(Clone, Default)]
pub struct Dispatcher {
    methods: HashMap<String, Procedure>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `procedure` under `name`, replacing any previous
    /// registration for that name.
    pub fn register(&mut self, name: impl Into<String>, procedure: Procedure) {
        self.methods.insert(name.into(), procedure);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Looks up `request.name`, invokes it with `request.parameters`, and
    /// maps the outcome onto the wire-level response shapes. A missing
    /// method or a procedure that panics or returns `Err` both become
    /// [`RpcResponse::Failure`]; the connection is never closed for either.
    #[must_use]
    pub fn dispatch(&self, request: &RpcRequest) -> RpcResponse {
        let Some(procedure) = self.methods.get(&request.name) else {
            return RpcResponse::Failure("Target method NOT found".to_string());
        };

        let procedure = procedure.clone();
        let parameters = request.parameters.clone();
        let outcome = catch_unwind(AssertUnwindSafe(|| procedure(&parameters)));

        match outcome {
            Ok(Ok(value)) => RpcResponse::Success(value),
            Ok(Err(message)) => RpcResponse::Failure(message),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "procedure panicked".to_string());
                warn!("procedure {} panicked: {message}", request.name);
                RpcResponse::Failure(message)
            }
        }
    }
}
