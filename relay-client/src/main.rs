// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The client binary: one sentinel-framed RPC round trip per invocation.
//!
//! Grounded in `original_source/client/src/rpc_client.hpp`'s `client::call`
//! (connect, pack `{name, parameters}`, write, read, unpack) with the
//! template-driven pack/unpack replaced by `serde_json::Value` parameters
//! and [`relay_rpc::RpcResponse`].

mod config;
mod error;

use std::process::ExitCode;

use clap::Parser;

use config::Cli;
use error::{Error, Result};
use relay_core::{Connection, ConnectionId, Mode};
use relay_rpc::{FrameReader, RpcRequest, RpcResponse};

const RECV_CHUNK: usize = 1 << 16;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(RpcResponse::Success(value)) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Ok(RpcResponse::Failure(message)) => {
            eprintln!("error: {message}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<RpcResponse> {
    let parameters = cli
        .params
        .iter()
        .map(|p| serde_json::from_str(p).map_err(|e| Error::BadParameter(p.clone(), e)))
        .collect::<Result<Vec<_>>>()?;

    let request = RpcRequest { name: cli.method, parameters };
    let request_value = serde_json::to_value(&request).map_err(|e| Error::Encode(relay_rpc::Error::ProtocolParse(e)))?;
    let bytes = relay_rpc::encode(&request_value).map_err(Error::Encode)?;

    let id = ConnectionId { fd: 0, generation: 0 };
    let mut conn = Connection::connect(id, &cli.host, cli.port, Mode::Blocking, None)?;
    conn.send(&bytes)?;

    let mut reader = FrameReader::new();
    loop {
        if let Some(frame) = reader.next_frame() {
            let value = frame.map_err(|_| Error::MalformedResponse)?;
            return RpcResponse::from_value(&value).ok_or(Error::MalformedResponse);
        }
        match conn.recv(RECV_CHUNK) {
            Ok(bytes) => reader.feed(&bytes),
            Err(relay_core::Error::PeerClosed) => return Err(Error::IncompleteResponse),
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relay_rpc::procedures::standard_dispatcher;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    #[test]
    fn round_trip_against_a_standard_dispatcher() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _peer) = listener.accept().unwrap();
            let mut buf = [0_u8; 256];
            let n = stream.read(&mut buf).unwrap();
            let mut reader = FrameReader::new();
            reader.feed(&buf[..n]);
            let value = reader.next_frame().unwrap().unwrap();
            let request: RpcRequest = serde_json::from_value(value).unwrap();
            let dispatcher = standard_dispatcher();
            let response = dispatcher.dispatch(&request);
            let bytes = relay_rpc::encode(&response.to_value()).unwrap();
            stream.write_all(&bytes).unwrap();
        });

        let cli = Cli {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
            method: "echo".to_string(),
            params: vec!["\"hi\"".to_string()],
        };
        let response = run(cli).unwrap();
        assert_eq!(response, RpcResponse::Success(serde_json::json!("hi")));

        server.join().unwrap();
    }

    #[test]
    fn unparseable_parameter_is_rejected_before_connecting() {
        let cli = Cli {
            host: "127.0.0.1".to_string(),
            port: 1,
            method: "echo".to_string(),
            params: vec!["not json".to_string()],
        };
        match run(cli) {
            Err(Error::BadParameter(_, _)) => {}
            other => panic!("expected BadParameter, got {other:?}"),
        }
    }
}
