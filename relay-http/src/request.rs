// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The HTTP/1.0 request parser: status line, headers, and a
//! `Content-Length`-bounded body. Case-insensitive for the method and
//! header names, matching `parser_request_line`/`parser_request_head` in
//! `original_source/example/http/server/webserver.cpp`.

use std::collections::HashMap;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully parsed HTTP/1.0 request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// The raw request target, including any `?query` suffix.
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Splits `url` into its path and, if present, its `?`-delimited query
    /// string.
    #[must_use]
    pub fn path_and_query(&self) -> (&str, Option<&str>) {
        match self.url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (&self.url, None),
        }
    }
}

/// Returns the total byte length of the first complete request at the start
/// of `bytes` (headers plus any `Content-Length`-sized body), or `None` if
/// `bytes` does not yet contain a full request. Used by callers that
/// accumulate a connection's bytes incrementally, since a non-blocking
/// `recv` may return a request split across several reads.
#[must_use]
pub fn frame_length(bytes: &[u8]) -> Option<usize> {
    let text = String::from_utf8_lossy(bytes);
    let header_end = text.find("\r\n\r\n")? + 4;

    let content_length = text[..header_end]
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let total = header_end + content_length;
    if bytes.len() >= total {
        Some(total)
    } else {
        None
    }
}

/// Parses one complete HTTP/1.0 request out of `bytes`. The body, if any, is
/// sized by a `Content-Length` header; a request with no such header (as
/// `GET` never has one) has an empty body.
///
/// # Errors
/// Returns [`Error::MalformedRequestLine`] if the first line does not match
/// `METHOD URL HTTP/1.0`, [`Error::UnsupportedMethod`] for anything but
/// `GET`/`POST`, or [`Error::MalformedHeader`] for a header line without a
/// `:` separator.
pub fn parse(bytes: &[u8]) -> Result<HttpRequest> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines = text.split("\r\n");

    let request_line = lines.next().ok_or(Error::MalformedRequestLine)?;
    let mut parts = request_line.split_whitespace();
    let method_token = parts.next().ok_or(Error::MalformedRequestLine)?;
    let url = parts.next().ok_or(Error::MalformedRequestLine)?.to_string();
    let version = parts.next().ok_or(Error::MalformedRequestLine)?;
    if version != "HTTP/1.0" {
        return Err(Error::MalformedRequestLine);
    }

    let method = match method_token.to_ascii_lowercase().as_str() {
        "get" => Method::Get,
        "post" => Method::Post,
        other => return Err(Error::UnsupportedMethod(other.to_string())),
    };

    let mut headers = HashMap::new();
    let mut body_start = request_line.len() + 2;
    for line in lines {
        body_start += line.len() + 2;
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| Error::MalformedHeader(line.to_string()))?;
        headers.insert(key.trim().to_ascii_lowercase(), value.trim_start().to_string());
    }

    let body = if let Some(len) = headers.get("content-length").and_then(|v| v.parse::<usize>().ok()) {
        let available = bytes.len().saturating_sub(body_start);
        bytes[body_start..body_start + len.min(available)].to_vec()
    } else {
        Vec::new()
    };

    Ok(HttpRequest { method, url, headers, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_simple_get_request() {
        let raw = b"GET /index.html HTTP/1.0\r\n\r\n";
        let request = parse(raw).unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "/index.html");
        assert!(request.body.is_empty());
    }

    #[test]
    fn method_and_header_names_are_case_insensitive() {
        let raw = b"get /index.html HTTP/1.0\r\nCONTENT-TYPE: text/plain\r\n\r\n";
        let request = parse(raw).unwrap();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn leading_spaces_in_header_values_are_trimmed() {
        let raw = b"GET / HTTP/1.0\r\nX-Test:    value\r\n\r\n";
        let request = parse(raw).unwrap();
        assert_eq!(request.header("x-test"), Some("value"));
    }

    #[test]
    fn parses_body_sized_by_content_length() {
        let raw = b"POST /submitRPC HTTP/1.0\r\nContent-Length: 5\r\n\r\nhello";
        let request = parse(raw).unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body, b"hello");
    }

    #[test]
    fn query_string_is_split_from_the_path() {
        let raw = b"GET /cgi-bin/add?a=1&b=2 HTTP/1.0\r\n\r\n";
        let request = parse(raw).unwrap();
        let (path, query) = request.path_and_query();
        assert_eq!(path, "/cgi-bin/add");
        assert_eq!(query, Some("a=1&b=2"));
    }

    #[test]
    fn unsupported_method_is_rejected() {
        let raw = b"DELETE / HTTP/1.0\r\n\r\n";
        match parse(raw) {
            Err(Error::UnsupportedMethod(_)) => {}
            other => panic!("expected UnsupportedMethod, got {other:?}"),
        }
    }

    #[test]
    fn frame_length_is_none_until_headers_are_complete() {
        assert_eq!(frame_length(b"GET / HTTP/1.0\r\nX: y"), None);
        assert_eq!(frame_length(b"GET / HTTP/1.0\r\n\r\n"), Some(19));
    }

    #[test]
    fn frame_length_waits_for_the_full_content_length_body() {
        let head = b"POST /submitRPC HTTP/1.0\r\nContent-Length: 5\r\n\r\n";
        assert_eq!(frame_length(head), None);
        let mut full = head.to_vec();
        full.extend_from_slice(b"hello");
        assert_eq!(frame_length(&full), Some(full.len()));
    }
}
