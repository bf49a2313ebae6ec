// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! Routes a parsed [`HttpRequest`] to a static file, a CGI program, or an
//! RPC body, and maps every outcome onto an [`HttpResponse`]. Mirrors
//! `HTTPServer::http_handler`'s `get_resource`/`post_resource` branch, minus
//! the `status_table`/`ret_head_table` bookkeeping those do inline.
//!
//! This crate stays decoupled from `relay-rpc`'s types: the caller supplies
//! `rpc_handler`, a plain byte-in/byte-out function, so the RPC dispatch
//! table lives entirely in the caller (`relay-server`).

use std::path::Path;

use log::info;

use crate::cgi;
use crate::error::Error;
use crate::request::{HttpRequest, Method};
use crate::response::HttpResponse;
use crate::static_file;

/// Handles one parsed request. A plain `GET` is served as a static file
/// under `http_workdir`; a `GET` whose URL contains `?` is resolved as a
/// CGI program under `cgi_dir`. `rpc_handler` is called with a POST body
/// whose URL ends in `RPC` and should return the already-serialized
/// response bytes.
pub fn handle(
    http_workdir: &Path,
    cgi_dir: &Path,
    request: &HttpRequest,
    rpc_handler: &dyn Fn(&[u8]) -> Vec<u8>,
) -> HttpResponse {
    let (path, query) = request.path_and_query();
    match request.method {
        Method::Get => match query {
            Some(query) => response_for_cgi(cgi::run(cgi_dir, path, "GET", query)),
            None => response_for_static(static_file::serve(http_workdir, path)),
        },
        Method::Post => {
            if path.ends_with("RPC") {
                HttpResponse::ok(rpc_handler(&request.body))
            } else {
                info!("POST without RPC suffix: {path}");
                HttpResponse::status_only(400)
            }
        }
    }
}

/// Maps a request-line/header parse failure directly onto a response,
/// without ever constructing an [`HttpRequest`].
#[must_use]
pub fn response_for_parse_error(error: &Error) -> HttpResponse {
    match error {
        Error::UnsupportedMethod(method) => {
            info!("unsupported method: {method}");
            HttpResponse::status_only(501)
        }
        _ => HttpResponse::status_only(400),
    }
}

fn response_for_static(result: crate::error::Result<Vec<u8>>) -> HttpResponse {
    match result {
        Ok(body) => HttpResponse::ok(body),
        Err(Error::NotFound) => HttpResponse::status_only(404),
        Err(Error::PathTraversal) => HttpResponse::status_only(400),
        Err(other) => {
            info!("static file serving failed: {other}");
            HttpResponse::status_only(500)
        }
    }
}

fn response_for_cgi(result: crate::error::Result<Vec<u8>>) -> HttpResponse {
    match result {
        Ok(body) => HttpResponse::ok(body),
        Err(Error::NotFound) => HttpResponse::status_only(404),
        Err(Error::PathTraversal) => HttpResponse::status_only(400),
        Err(other) => {
            info!("CGI execution failed: {other}");
            HttpResponse::status_only(500)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::fs;

    fn get(url: &str) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            url: url.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    #[test]
    fn serves_static_file_for_plain_get() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), b"hi").unwrap();
        let response = handle(dir.path(), dir.path(), &get("/index.html"), &|_| Vec::new());
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"hi");
    }

    #[test]
    fn missing_static_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let response = handle(dir.path(), dir.path(), &get("/nope.html"), &|_| Vec::new());
        assert_eq!(response.status, 404);
    }

    #[test]
    fn post_to_an_rpc_url_invokes_the_rpc_handler() {
        let dir = tempfile::tempdir().unwrap();
        let request = HttpRequest {
            method: Method::Post,
            url: "/submitRPC".to_string(),
            headers: HashMap::new(),
            body: b"{\"name\":\"echo\"}".to_vec(),
        };
        let response = handle(dir.path(), dir.path(), &request, &|body| {
            assert_eq!(body, b"{\"name\":\"echo\"}");
            b"{\"error_flag\":false,\"return_value\":null}".to_vec()
        });
        assert_eq!(response.status, 200);
    }

    #[test]
    fn post_without_rpc_suffix_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let request = HttpRequest {
            method: Method::Post,
            url: "/upload".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        };
        let response = handle(dir.path(), dir.path(), &request, &|_| Vec::new());
        assert_eq!(response.status, 400);
    }
}
