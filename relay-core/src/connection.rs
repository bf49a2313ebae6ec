// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! One client connection: descriptor, blocking mode, receive/send buffers,
//! and the high-level `recv`/`send` operations that honor edge-trigger
//! semantics.
//!
//! A [`Connection`] is exclusively owned by the [`Reactor`](crate::reactor::Reactor)'s
//! connection table. The [`TimerWheel`](crate::timer_wheel::TimerWheel)
//! references it only by [`ConnectionId`] -- a generational index rather
//! than a strong or weak pointer -- which sidesteps the reference cycle that
//! mutual ownership between the table and the timer would otherwise create.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use crate::buffer::ByteBuffer;
use crate::error::{Error, Result};

/// A generational identifier for a connection, stable across the lifetime of
/// one accepted socket even if the underlying file descriptor is reused by
/// the OS for an unrelated later connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId {
    pub fd: RawFd,
    pub generation: u64,
}

/// Whether a [`Connection`]'s descriptor is in blocking or non-blocking
/// mode. Non-blocking connections are driven by the edge-triggered
/// discipline described on [`Connection::recv`]/[`Connection::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Blocking,
    Nonblocking,
}

/// One TCP client, server- or client-role.
pub struct Connection {
    id: ConnectionId,
    stream: TcpStream,
    mode: Mode,
    recv_buf: ByteBuffer,
    send_buf: ByteBuffer,
    peer_addr: Option<SocketAddr>,
}

impl Connection {
    fn from_stream(id: ConnectionId, stream: TcpStream, mode: Mode) -> Result<Self> {
        stream
            .set_nonblocking(mode == Mode::Nonblocking)
            .map_err(Error::Io)?;
        Ok(Self {
            id,
            stream,
            mode,
            recv_buf: ByteBuffer::new(),
            send_buf: ByteBuffer::new(),
            peer_addr: None,
        })
    }

    /// Client role: resolves `host`/`port`, then connects. In non-blocking
    /// mode, `timeout` (if given) bounds how long the connect attempt may
    /// take before [`Error::ConnectTimeout`] is returned.
    pub fn connect(
        id: ConnectionId,
        host: &str,
        port: u16,
        mode: Mode,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(Error::Connect)?
            .next()
            .ok_or_else(|| {
                Error::Connect(io::Error::new(io::ErrorKind::NotFound, "no address resolved"))
            })?;

        let stream = match (mode, timeout) {
            (Mode::Nonblocking, Some(d)) => TcpStream::connect_timeout(&addr, d).map_err(|e| {
                if e.kind() == io::ErrorKind::TimedOut {
                    Error::ConnectTimeout
                } else {
                    Error::Connect(e)
                }
            })?,
            _ => TcpStream::connect(addr).map_err(Error::Connect)?,
        };

        Self::from_stream(id, stream, mode)
    }

    /// Server role: descriptor identity (for the connection table and
    /// timer wheel) and raw fd are assigned by the [`Reactor`] on accept.
    pub fn from_accepted(id: ConnectionId, stream: TcpStream, mode: Mode) -> Result<Self> {
        let peer_addr = stream.peer_addr().ok();
        let mut conn = Self::from_stream(id, stream, mode)?;
        conn.peer_addr = peer_addr;
        Ok(conn)
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    /// Lazily resolved peer address.
    pub fn peer_addr(&mut self) -> Option<SocketAddr> {
        if self.peer_addr.is_none() {
            self.peer_addr = self.stream.peer_addr().ok();
        }
        self.peer_addr
    }

    /// True iff [`Connection::send_buf`] has fully drained. The
    /// [`Reactor`](crate::reactor::Reactor) keeps `WRITE` interest registered
    /// iff this is false.
    #[must_use]
    pub fn is_send_all(&self) -> bool {
        self.send_buf.empty()
    }

    #[must_use]
    pub fn pending_send_bytes(&self) -> usize {
        self.send_buf.size()
    }

    /// Reads up to `n` bytes.
    ///
    /// - BLOCKING: one OS read of up to `n` bytes. `0` bytes means the peer
    ///   closed ([`Error::PeerClosed`]); `EINTR` is retried.
    /// - NONBLOCKING: loops reading into a scratch area, appending successes
    ///   to `recv_buf`, until `EAGAIN`/`EWOULDBLOCK`, then returns
    ///   `recv_buf.drain(n)`. `EINTR` is retried; any other error closes the
    ///   connection.
    pub fn recv(&mut self, n: usize) -> Result<Vec<u8>> {
        match self.mode {
            Mode::Blocking => {
                let mut scratch = vec![0_u8; n];
                loop {
                    match self.stream.read(&mut scratch) {
                        Ok(0) => return Err(Error::PeerClosed),
                        Ok(read) => return Ok(scratch[..read].to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(Error::Io(e)),
                    }
                }
            }
            Mode::Nonblocking => {
                let mut scratch = [0_u8; 8192];
                loop {
                    match self.stream.read(&mut scratch) {
                        Ok(0) => return Err(Error::PeerClosed),
                        Ok(read) => self.recv_buf.append(&scratch[..read]),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(Error::Io(e)),
                    }
                }
                Ok(self.recv_buf.drain(n))
            }
        }
    }

    /// Sends `bytes`.
    ///
    /// - BLOCKING: loops writing until every byte is sent or a non-`EINTR`
    ///   error occurs.
    /// - NONBLOCKING: writes directly until `EAGAIN`/`EWOULDBLOCK`; any
    ///   unsent tail is appended to `send_buf` for the next `WRITE`
    ///   readiness to flush.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match self.mode {
            Mode::Blocking => {
                let mut offset = 0;
                while offset < bytes.len() {
                    match self.stream.write(&bytes[offset..]) {
                        Ok(written) => offset += written,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(Error::Io(e)),
                    }
                }
                Ok(())
            }
            Mode::Nonblocking => {
                let mut offset = 0;
                loop {
                    if offset == bytes.len() {
                        break;
                    }
                    match self.stream.write(&bytes[offset..]) {
                        Ok(written) => offset += written,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(Error::Io(e)),
                    }
                }
                if offset < bytes.len() {
                    self.send_buf.append(&bytes[offset..]);
                }
                Ok(())
            }
        }
    }

    /// Flushes `send_buf` via a non-blocking write, returning once the
    /// buffer is empty or the OS reports `EAGAIN`. Called by the
    /// [`Reactor`] on `WRITE` readiness.
    pub fn flush_send_buf(&mut self) -> Result<()> {
        loop {
            if self.send_buf.empty() {
                return Ok(());
            }
            let chunk = self.send_buf.drain(8192);
            match self.stream.write(&chunk) {
                Ok(written) if written == chunk.len() => continue,
                Ok(written) => {
                    // Put back whatever did not make it out, preserving
                    // order at the head of the buffer.
                    let mut remaining = chunk[written..].to_vec();
                    remaining.extend(self.send_buf.drain_all());
                    self.send_buf.append(&remaining);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.send_buf.append(&chunk);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    self.send_buf.append(&chunk);
                    continue;
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Closes the descriptor.
    pub fn disconnect(&self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

/// Server role: bind + listen + accept, returning [`Connection`]s for each
/// accepted peer.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub fn bind(bind_addr: &str, port: u16, backlog: i32) -> Result<Self> {
        let inner = TcpListener::bind((bind_addr, port)).map_err(Error::Bind)?;
        inner.set_nonblocking(true).map_err(Error::Listen)?;
        // The backlog is fixed at bind() time by `TcpListener`; record the
        // requested value for diagnostics even though std does not expose a
        // separate listen(2) call.
        let _ = backlog;
        Ok(Self { inner })
    }

    #[must_use]
    pub fn raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }

    /// Accepts one pending connection, if any.
    pub fn accept(&self) -> Result<Option<(TcpStream, SocketAddr)>> {
        match self.inner.accept() {
            Ok((stream, addr)) => Ok(Some((stream, addr))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Monotonic clock read shared by the timer wheel and connection idle
/// tracking; exists so tests can reason about deadlines without sleeping.
#[must_use]
pub fn now() -> Instant {
    Instant::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    fn loopback_pair(mode: Mode) -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (accepted, _peer) = listener.accept().unwrap();
        let id = ConnectionId { fd: 0, generation: 0 };
        let conn = Connection::from_accepted(id, accepted, mode).unwrap();
        (conn, client.join().unwrap())
    }

    #[test]
    fn blocking_recv_returns_bytes_written_by_peer() {
        let (mut conn, mut client) = loopback_pair(Mode::Blocking);
        client.write_all(b"hello").unwrap();
        let received = conn.recv(5).unwrap();
        assert_eq!(received, b"hello");
    }

    #[test]
    fn blocking_recv_on_closed_peer_returns_peer_closed() {
        let (mut conn, client) = loopback_pair(Mode::Blocking);
        drop(client);
        match conn.recv(5) {
            Err(Error::PeerClosed) => {}
            other => panic!("expected PeerClosed, got {other:?}"),
        }
    }

    #[test]
    fn nonblocking_recv_drains_socket_into_recv_buf_then_serves_from_it() {
        let (mut conn, mut client) = loopback_pair(Mode::Nonblocking);
        client.write_all(b"0123456789").unwrap();
        // Give the kernel a moment to deliver the bytes before the
        // non-blocking read loop drains them.
        thread::sleep(Duration::from_millis(50));
        let first = conn.recv(4).unwrap();
        assert_eq!(first, b"0123");
        let second = conn.recv(6).unwrap();
        assert_eq!(second, b"456789");
    }

    #[test]
    fn nonblocking_send_buffers_and_flush_send_buf_drains_it() {
        let (mut conn, mut client) = loopback_pair(Mode::Nonblocking);
        conn.send(b"ping").unwrap();
        conn.flush_send_buf().unwrap();
        assert!(conn.is_send_all());

        let mut buf = [0_u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn listener_accept_returns_none_with_no_pending_connection() {
        let listener = Listener::bind("0.0.0.0", 0, 16).unwrap();
        assert!(listener.accept().unwrap().is_none());
    }
}
