// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! Glues the reactor's `on_read` callback to the two framings `spec.md` §6
//! describes on "the same port family": sentinel-framed RPC and HTTP/1.0.
//! The first bytes of a new connection decide which framing it speaks; that
//! choice is sticky for the connection's lifetime, matching the original
//! `rpc_server`/`webserver` split being two listeners on the same machine
//! collapsed onto one accept path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use log::warn;

use relay_core::{Connection, ConnectionId};
use relay_rpc::{Dispatcher, FrameReader, RpcRequest};

/// Bytes needed before protocol detection can commit to a framing. `"POST "`
/// is the longest of the prefixes checked.
const DETECTION_PREFIX_LEN: usize = 5;
/// Upper bound on one `recv` call per readiness event; large enough that a
/// single-packet RPC request or a typical HTTP request drains in one pass,
/// matching scenario E3's 1 MiB partial-write reply on the *send* side.
const READ_CHUNK: usize = 1 << 20;

enum ConnState {
    Undetermined(Vec<u8>),
    Rpc(FrameReader),
    Http(Vec<u8>),
}

/// Per-connection protocol state plus the shared RPC dispatch table and HTTP
/// work/CGI directories. One instance is shared (via `Arc`) between the
/// `on_read` and `on_timeout` callbacks registered on the [`relay_core::Reactor`].
pub struct RelayService {
    dispatcher: Dispatcher,
    http_workdir: PathBuf,
    cgi_dir: PathBuf,
    states: Mutex<HashMap<ConnectionId, ConnState>>,
}

impl RelayService {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, http_workdir: PathBuf, cgi_dir: PathBuf) -> Self {
        Self {
            dispatcher,
            http_workdir,
            cgi_dir,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Drains whatever is readable on `conn`, feeds it into that
    /// connection's protocol state, and sends back every complete
    /// response produced.
    pub fn on_read(&self, conn: &mut Connection) {
        let bytes = match conn.recv(READ_CHUNK) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("recv failed for {:?}: {e}", conn.id());
                return;
            }
        };
        if bytes.is_empty() {
            return;
        }

        let id = conn.id();
        let mut state = {
            let mut states = self.states.lock().unwrap();
            states.remove(&id).unwrap_or(ConnState::Undetermined(Vec::new()))
        };

        match state {
            ConnState::Undetermined(mut buffered) => {
                buffered.extend_from_slice(&bytes);
                match detect(&buffered) {
                    Some(true) => state = ConnState::Http(buffered),
                    Some(false) => {
                        let mut reader = FrameReader::new();
                        reader.feed(&buffered);
                        state = ConnState::Rpc(reader);
                    }
                    None => {
                        self.states.lock().unwrap().insert(id, ConnState::Undetermined(buffered));
                        return;
                    }
                }
            }
            ConnState::Rpc(ref mut reader) => reader.feed(&bytes),
            ConnState::Http(ref mut buffer) => buffer.extend_from_slice(&bytes),
        }

        match &mut state {
            ConnState::Rpc(reader) => self.drain_rpc(conn, reader),
            ConnState::Http(buffer) => self.drain_http(conn, buffer),
            ConnState::Undetermined(_) => {}
        }

        self.states.lock().unwrap().insert(id, state);
    }

    fn drain_rpc(&self, conn: &mut Connection, reader: &mut FrameReader) {
        while let Some(frame) = reader.next_frame() {
            let response = match frame.and_then(|value| {
                serde_json::from_value::<RpcRequest>(value).map_err(relay_rpc::Error::ProtocolParse)
            }) {
                Ok(request) => self.dispatcher.dispatch(&request),
                Err(e) => relay_rpc::RpcResponse::Failure(e.to_string()),
            };
            match relay_rpc::encode(&response.to_value()) {
                Ok(bytes) => {
                    if let Err(e) = conn.send(&bytes) {
                        warn!("send failed for {:?}: {e}", conn.id());
                    }
                }
                Err(e) => warn!("failed to encode RPC response: {e}"),
            }
        }
    }

    fn drain_http(&self, conn: &mut Connection, buffer: &mut Vec<u8>) {
        loop {
            let Some(len) = relay_http::frame_length(buffer) else {
                break;
            };
            let request_bytes: Vec<u8> = buffer.drain(..len).collect();

            let response = match relay_http::parse(&request_bytes) {
                Ok(request) => {
                    let dispatcher = self.dispatcher.clone();
                    relay_http::handle(&self.http_workdir, &self.cgi_dir, &request, &move |body| {
                        rpc_over_http(&dispatcher, body)
                    })
                }
                Err(e) => relay_http::response_for_parse_error(&e),
            };

            if let Err(e) = conn.send(&response.into_bytes()) {
                warn!("send failed for {:?}: {e}", conn.id());
            }
        }
    }

    /// Removes a connection's protocol state. The [`relay_core::Reactor`]
    /// calls this from the `on_timeout` callback and before a connection is
    /// otherwise torn down, so the map cannot grow unboundedly.
    pub fn forget(&self, id: ConnectionId) {
        self.states.lock().unwrap().remove(&id);
    }
}

fn rpc_over_http(dispatcher: &Dispatcher, body: &[u8]) -> Vec<u8> {
    let response = match serde_json::from_slice::<RpcRequest>(body) {
        Ok(request) => dispatcher.dispatch(&request),
        Err(e) => relay_rpc::RpcResponse::Failure(e.to_string()),
    };
    serde_json::to_vec(&response.to_value()).unwrap_or_default()
}

/// `true` => HTTP, `false` => sentinel RPC, `None` => need more bytes.
fn detect(buffered: &[u8]) -> Option<bool> {
    if buffered.len() < DETECTION_PREFIX_LEN {
        // A short RPC frame (one JSON object ending in `#`) still resolves
        // immediately if the sentinel has already arrived.
        if buffered.contains(&relay_rpc::SENTINEL) {
            return Some(false);
        }
        return None;
    }
    let prefix = buffered[..DETECTION_PREFIX_LEN].to_ascii_uppercase();
    if prefix.starts_with(b"GET ") || prefix.starts_with(b"POST ") {
        Some(true)
    } else {
        Some(false)
    }
}
