// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! HTTP/1.0 request parsing, static-file serving, and CGI execution,
//! grounded in `HTTPServer` in
//! `original_source/example/http/server/webserver.cpp`. Connection I/O and
//! keep-alive framing belong to `relay-core`'s reactor; this crate only
//! turns bytes into a [`HttpRequest`], and a [`HttpResponse`] back into
//! bytes.

#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

pub mod cgi;
pub mod error;
pub mod handler;
pub mod request;
pub mod response;
pub mod static_file;

pub use error::{Error, Result};
pub use handler::{handle, response_for_parse_error};
pub use request::{frame_length, parse, HttpRequest, Method};
pub use response::{reason_phrase, HttpResponse};
pub use static_file::{resolve, serve};
