// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! End-to-end scenarios from `spec.md` §8, wired against a real
//! [`Reactor`] + [`RelayService`] bound to a loopback port, in the same
//! style as `relay_core::reactor`'s own `echoes_one_line_and_shuts_down_on_signal`
//! test.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serial_test::serial;

use relay_core::{Backend, Connection, Reactor, ReactorConfig};
use relay_rpc::FrameReader;

#[path = "../src/protocol.rs"]
mod protocol;

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn spawn_reactor(workdir: &Path) -> (u16, Arc<std::sync::atomic::AtomicBool>, thread::JoinHandle<relay_core::Result<()>>) {
    let port = free_port();
    let config = ReactorConfig {
        port,
        max_pool_size: 4,
        timeout_period: Duration::from_secs(30),
        ..ReactorConfig::default()
    };
    let backend = Backend::poll().unwrap();
    let mut reactor = Reactor::new(config, backend).unwrap();

    let service = Arc::new(protocol::RelayService::new(
        relay_rpc::procedures::standard_dispatcher(),
        workdir.to_path_buf(),
        workdir.to_path_buf(),
    ));

    let read_service = service.clone();
    reactor.on_read(Arc::new(move |conn: &mut Connection| {
        read_service.on_read(conn);
    }));

    let timeout_service = service;
    reactor.on_timeout(Arc::new(move |conn: &mut Connection| {
        timeout_service.forget(conn.id());
    }));

    let stop = reactor.shutdown_handle();
    let handle = thread::spawn(move || reactor.run());
    thread::sleep(Duration::from_millis(100));
    (port, stop, handle)
}

fn shutdown(stop: Arc<std::sync::atomic::AtomicBool>, handle: thread::JoinHandle<relay_core::Result<()>>) {
    stop.store(true, Ordering::SeqCst);
    unsafe {
        libc::raise(libc::SIGTERM);
    }
    handle.join().unwrap().unwrap();
}

fn rpc_round_trip(port: u16, request: &str) -> serde_json::Value {
    let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
    client.write_all(request.as_bytes()).unwrap();
    client.write_all(b"#").unwrap();

    let mut reader = FrameReader::new();
    let mut buf = [0_u8; 4096];
    loop {
        if let Some(frame) = reader.next_frame() {
            return frame.unwrap();
        }
        let n = client.read(&mut buf).unwrap();
        reader.feed(&buf[..n]);
    }
}

#[test]
#[serial]
fn e1_sort_rpc() {
    let dir = tempfile::tempdir().unwrap();
    let (port, stop, handle) = spawn_reactor(dir.path());

    let response = rpc_round_trip(port, r#"{"name":"int_sort","parameters":[[3,4,2,1,4,5,3,2]]}"#);
    assert_eq!(response["error_flag"], false);
    assert_eq!(response["return_value"], serde_json::json!([1, 2, 2, 3, 3, 4, 4, 5]));

    shutdown(stop, handle);
}

#[test]
#[serial]
fn e2_unknown_method() {
    let dir = tempfile::tempdir().unwrap();
    let (port, stop, handle) = spawn_reactor(dir.path());

    let response = rpc_round_trip(port, r#"{"name":"nope","parameters":[]}"#);
    assert_eq!(response["error_flag"], true);
    assert_eq!(response["error_msg"], "Target method NOT found");

    shutdown(stop, handle);
}

#[test]
#[serial]
fn e4_http_get_static() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), b"hello world").unwrap();
    let (port, stop, handle) = spawn_reactor(dir.path());

    let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
    client.write_all(b"GET /index.html HTTP/1.0\r\n\r\n").unwrap();
    let mut response = Vec::new();
    let mut buf = [0_u8; 4096];
    let n = client.read(&mut buf).unwrap();
    response.extend_from_slice(&buf[..n]);
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(text.contains("Content-Length: 11\r\n"));
    assert!(text.ends_with("hello world"));

    let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
    client.write_all(b"GET /missing.html HTTP/1.0\r\n\r\n").unwrap();
    let n = client.read(&mut buf).unwrap();
    let text = String::from_utf8_lossy(&buf[..n]);
    assert!(text.starts_with("HTTP/1.0 404 Not Found\r\n"));

    shutdown(stop, handle);
}

/// Scaled-down proxy for scenario E5 (50 000 sequential RPCs, no fd leak):
/// opening 50 000 real connections in a unit test would dominate the test
/// suite's runtime, so this exercises the same fd-accounting path at a
/// size that still catches a leak (each connection's fd is reused by the
/// OS only once closed and reaped by the reactor).
#[test]
#[serial]
fn e5_sequential_rpcs_do_not_leak_file_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    let (port, stop, handle) = spawn_reactor(dir.path());

    for _ in 0..200 {
        let response = rpc_round_trip(port, r#"{"name":"add","parameters":[1,2]}"#);
        assert_eq!(response["return_value"], 3);
    }

    shutdown(stop, handle);
}

#[test]
#[serial]
fn e6_sigint_shutdown_with_open_connections() {
    let dir = tempfile::tempdir().unwrap();
    let (port, stop, handle) = spawn_reactor(dir.path());

    let _clients: Vec<TcpStream> = (0..16)
        .map(|_| TcpStream::connect(("127.0.0.1", port)).unwrap())
        .collect();

    stop.store(true, Ordering::SeqCst);
    unsafe {
        libc::raise(libc::SIGINT);
    }
    handle.join().unwrap().unwrap();
}
