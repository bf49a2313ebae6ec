// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! Response status line/header/body assembly, matching
//! `HTTPServer::status_table` and the tail of `http_handler` in
//! `original_source/example/http/server/webserver.cpp`.

/// Maps a status code to its reason phrase. Only the five codes `spec.md`
/// §6 names are recognized; any other code falls back to `"Unknown"`.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "Unknown",
    }
}

/// An HTTP/1.0 response: status code plus body. Headers are fixed
/// (`Server`, `Connection`, `Content-Length`) and assembled by
/// [`HttpResponse::into_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    #[must_use]
    pub fn ok(body: Vec<u8>) -> Self {
        Self::new(200, body)
    }

    #[must_use]
    pub fn status_only(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    /// Serializes the status line, the fixed header set, a blank line, and
    /// the body, in that order.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.0 {} {}\r\nServer: jrHTTP\r\nConnection: Keep-Alive\r\nContent-Length: {}\r\n\r\n",
            self.status,
            reason_phrase(self.status),
            self.body.len()
        )
        .into_bytes();
        out.extend(self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ok_response_includes_content_length_and_body() {
        let bytes = HttpResponse::ok(b"hi".to_vec()).into_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("\r\n\r\nhi"));
    }

    #[test]
    fn not_found_response_has_no_body() {
        let bytes = HttpResponse::status_only(404).into_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.0 404 Not Found\r\n"));
        assert!(text.ends_with("Content-Length: 0\r\n\r\n"));
    }
}
