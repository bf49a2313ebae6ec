// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while framing or dispatching an RPC request.
///
/// None of these abort the connection: a [`ProtocolParse`](Error::ProtocolParse)
/// or [`MethodNotFound`](Error::MethodNotFound) becomes an `error_flag: true`
/// response, matching `spec.md`'s error-kind table.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed request: {0}")]
    ProtocolParse(#[source] serde_json::Error),

    #[error("Target method NOT found")]
    MethodNotFound,

    #[error("{0}")]
    UserException(String),

    #[error("response payload contains the sentinel byte '#'")]
    SentinelCollision,
}
