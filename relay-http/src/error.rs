// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

use std::io;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while parsing a request or serving a resource. Every
/// variant maps to one of the status codes `spec.md` §6 names
/// (400/404/500/501); none of them abort the connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed request line")]
    MalformedRequestLine,

    #[error("malformed header line: {0}")]
    MalformedHeader(String),

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("resource not found")]
    NotFound,

    #[error("path escapes the work directory")]
    PathTraversal,

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("CGI program exited with a failure: {0}")]
    CgiFailed(String),
}
