// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The Linux fast path, built on [`mio`], which edge-triggers both `READ`
//! and `WRITE` on epoll. Edge-triggering is load-bearing here: callers
//! ([`Connection`](crate::connection::Connection)) must drain read-available
//! bytes and flush the send buffer until the kernel reports `EAGAIN`, because
//! readiness fires only on transitions.

use std::collections::HashSet;
use std::io;
use std::os::fd::RawFd;
use std::sync::Mutex;
use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Events, Poll, Registry, Token};

use crate::error::{Error, Result};

use super::{Interest, ReadyEvent, ReadyKind};

const INITIAL_EVENT_CAPACITY: usize = 256;
const MAX_EVENT_CAPACITY: usize = 16 * 1024;

fn mio_interest(interest: Interest) -> mio::Interest {
    match interest {
        Interest::Read => mio::Interest::READABLE,
        Interest::Write => mio::Interest::WRITABLE,
        Interest::ReadWrite => mio::Interest::READABLE.add(mio::Interest::WRITABLE),
    }
}

/// Poll-side state touched only by the loop thread while it blocks in
/// [`EpollMultiplexer::wait`].
struct PollSide {
    poll: Poll,
    events: Events,
}

/// `epoll`-backed, edge-triggered [`Multiplexer`](super::Multiplexer)
/// implementation. [`mio::Registry`] is `Sync` and safe to call
/// register/reregister/deregister on concurrently with `poll()` running on
/// another thread, so only the event buffer and the listener-fd tag need a
/// lock.
pub struct EpollMultiplexer {
    registry: Registry,
    poll_side: Mutex<PollSide>,
    registered: Mutex<HashSet<RawFd>>,
    listener_fd: Mutex<Option<RawFd>>,
}

impl EpollMultiplexer {
    /// # Errors
    /// Returns [`Error::MultiplexerInit`] if the underlying `epoll_create1`
    /// syscall fails.
    pub fn new() -> Result<Self> {
        let poll = Poll::new().map_err(Error::MultiplexerInit)?;
        let registry = poll.registry().try_clone().map_err(Error::MultiplexerInit)?;
        Ok(Self {
            registry,
            poll_side: Mutex::new(PollSide {
                poll,
                events: Events::with_capacity(INITIAL_EVENT_CAPACITY),
            }),
            registered: Mutex::new(HashSet::new()),
            listener_fd: Mutex::new(None),
        })
    }
}

impl super::Multiplexer for EpollMultiplexer {
    fn register(&self, fd: RawFd, interest: Interest) -> Result<()> {
        let mut source = SourceFd(&fd);
        self.registry
            .register(&mut source, Token(fd as usize), mio_interest(interest))
            .map_err(Error::RegisterInterest)?;
        self.registered.lock().unwrap().insert(fd);
        Ok(())
    }

    fn reregister(&self, fd: RawFd, interest: Interest) -> Result<()> {
        let mut source = SourceFd(&fd);
        self.registry
            .reregister(&mut source, Token(fd as usize), mio_interest(interest))
            .map_err(Error::RegisterInterest)?;
        Ok(())
    }

    fn unregister(&self, fd: RawFd) -> Result<()> {
        let mut source = SourceFd(&fd);
        // A descriptor that is already closed returns an error here; that is
        // expected when the peer closed first, so it is not propagated.
        let _ = self.registry.deregister(&mut source);
        self.registered.lock().unwrap().remove(&fd);
        let mut listener_fd = self.listener_fd.lock().unwrap();
        if *listener_fd == Some(fd) {
            *listener_fd = None;
        }
        Ok(())
    }

    fn mark_listener(&self, fd: RawFd) {
        *self.listener_fd.lock().unwrap() = Some(fd);
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<Vec<ReadyEvent>> {
        let mut poll_side = self.poll_side.lock().unwrap();
        let PollSide { poll, events } = &mut *poll_side;
        loop {
            match poll.poll(events, timeout) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        if events.iter().count() == events.capacity() && events.capacity() < MAX_EVENT_CAPACITY {
            let new_capacity = (events.capacity() * 2).min(MAX_EVENT_CAPACITY);
            *events = Events::with_capacity(new_capacity);
        }

        let listener_fd = *self.listener_fd.lock().unwrap();
        let mut ready = Vec::new();
        for event in &*events {
            let fd = event.token().0 as RawFd;
            // Checked before readable/writable, and unconditionally on
            // `is_read_closed()`, so a hangup that coalesces with pending
            // readable bytes (the common case: peer sends its last request,
            // reads the reply, then closes) still terminates the connection
            // on this edge. Under edge-triggered epoll the hangup would
            // otherwise never re-fire, matching `PollMultiplexer::poll_once`
            // treating `POLLHUP` the same way `POLLIN` is checked after it.
            if event.is_error() || event.is_read_closed() {
                ready.push(ReadyEvent {
                    fd,
                    kind: ReadyKind::Error,
                });
                continue;
            }
            if event.is_readable() {
                let kind = if listener_fd == Some(fd) {
                    ReadyKind::Acceptable
                } else {
                    ReadyKind::Readable
                };
                ready.push(ReadyEvent { fd, kind });
            }
            if event.is_writable() {
                ready.push(ReadyEvent {
                    fd,
                    kind: ReadyKind::Writable,
                });
            }
        }
        Ok(ready)
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::multiplexer::Multiplexer;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn reports_readable_on_data_available() {
        let (mut a, b) = UnixStream::pair().unwrap();
        b.set_nonblocking(true).unwrap();
        let mux = EpollMultiplexer::new().unwrap();
        mux.register(b.as_raw_fd(), Interest::Read).unwrap();

        a.write_all(b"x").unwrap();
        let ready = mux.wait(Some(Duration::from_millis(500))).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].fd, b.as_raw_fd());
        assert_eq!(ready[0].kind, ReadyKind::Readable);
    }

    #[test]
    fn hangup_coalesced_with_readable_bytes_is_still_reported_as_error() {
        let (mut a, b) = UnixStream::pair().unwrap();
        b.set_nonblocking(true).unwrap();
        let mux = EpollMultiplexer::new().unwrap();
        mux.register(b.as_raw_fd(), Interest::Read).unwrap();

        // Write then close in the same instant: by the time `wait` observes
        // the fd, both unread bytes and the hangup are pending together.
        a.write_all(b"x").unwrap();
        drop(a);

        let ready = mux.wait(Some(Duration::from_millis(500))).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].fd, b.as_raw_fd());
        assert_eq!(ready[0].kind, ReadyKind::Error);
    }
}
