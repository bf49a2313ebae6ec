// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort a `relay-client` invocation before a response is
/// received. Every variant here is fatal: the process prints it and exits
/// with code 1.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("invalid JSON parameter {0:?}: {1}")]
    #[diagnostic(code(relay_client::bad_parameter))]
    BadParameter(String, #[source] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(relay_client::connect))]
    Connect(#[from] relay_core::Error),

    #[error("failed to encode request: {0}")]
    #[diagnostic(code(relay_client::encode))]
    Encode(#[source] relay_rpc::Error),

    #[error("server closed the connection before sending a complete response")]
    #[diagnostic(code(relay_client::incomplete_response))]
    IncompleteResponse,

    #[error("server response was not a well-formed RPC response object")]
    #[diagnostic(code(relay_client::malformed_response))]
    MalformedResponse,
}
