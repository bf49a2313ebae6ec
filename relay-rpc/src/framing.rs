// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! Sentinel framing: each request and response is one UTF-8 JSON object
//! terminated by the ASCII byte `#`. A reader consumes bytes until `#`,
//! parses the preceding bytes as JSON, and hands them to the dispatcher.
//!
//! Grounded in `original_source/server/src/rpc_server.hpp`'s `invoker::start`,
//! which reads one `recv` worth of bytes and parses it as a single JSON
//! document; this module generalizes that to an incremental reader so a
//! frame split across multiple `READ` events still parses correctly.

use serde_json::Value;

use crate::error::{Error, Result};

pub const SENTINEL: u8 = b'#';

/// Serializes `value` and appends the sentinel byte.
///
/// # Errors
/// Returns [`Error::SentinelCollision`] if the serialized JSON itself
/// contains a `#` byte (e.g. inside a string payload) -- the wire format has
/// no escaping for the sentinel, so such a value cannot be framed.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(value).map_err(Error::ProtocolParse)?;
    if bytes.contains(&SENTINEL) {
        return Err(Error::SentinelCollision);
    }
    bytes.push(SENTINEL);
    Ok(bytes)
}

/// Incrementally reassembles sentinel-framed JSON documents out of bytes
/// arriving from however many `READ` events it takes.
#[derive(Debug, Default)]
pub struct FrameReader {
    pending: Vec<u8>,
}

impl FrameReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends newly received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Extracts and parses the next complete frame, if the sentinel has
    /// arrived. Bytes after the sentinel stay buffered for the next call.
    ///
    /// # Errors
    /// Returns [`Error::ProtocolParse`] if the bytes preceding the sentinel
    /// are not valid JSON; the sentinel and its preceding bytes are consumed
    /// either way so a malformed frame cannot wedge the reader.
    pub fn next_frame(&mut self) -> Option<Result<Value>> {
        let sentinel_at = self.pending.iter().position(|&b| b == SENTINEL)?;
        let frame: Vec<u8> = self.pending.drain(..=sentinel_at).collect();
        let payload = &frame[..frame.len() - 1];
        Some(serde_json::from_slice(payload).map_err(Error::ProtocolParse))
    }

    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encode_appends_the_sentinel_byte() {
        let bytes = encode(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(*bytes.last().unwrap(), SENTINEL);
    }

    #[test]
    fn reader_yields_nothing_until_sentinel_arrives() {
        let mut reader = FrameReader::new();
        reader.feed(b"{\"name\":\"int_sort\"");
        assert!(reader.next_frame().is_none());
        reader.feed(b",\"parameters\":[[1]]}#");
        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame["name"], "int_sort");
    }

    #[test]
    fn reader_splits_two_frames_delivered_in_one_feed() {
        let mut reader = FrameReader::new();
        reader.feed(b"{\"a\":1}#{\"a\":2}#");
        let first = reader.next_frame().unwrap().unwrap();
        let second = reader.next_frame().unwrap().unwrap();
        assert_eq!(first["a"], 1);
        assert_eq!(second["a"], 2);
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn malformed_frame_is_reported_but_does_not_wedge_the_reader() {
        let mut reader = FrameReader::new();
        reader.feed(b"not json#{\"a\":3}#");
        assert!(reader.next_frame().unwrap().is_err());
        let recovered = reader.next_frame().unwrap().unwrap();
        assert_eq!(recovered["a"], 3);
    }
}
