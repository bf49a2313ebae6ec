// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The portable back-end, built directly on `libc::poll`. Level-triggered:
//! a descriptor with unread bytes is reported ready on every call to
//! [`PollMultiplexer::wait`] until the bytes are actually read.

use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};

use super::{Interest, ReadyEvent, ReadyKind};

struct Registration {
    interest: Interest,
}

struct State {
    registrations: HashMap<RawFd, Registration>,
    listener_fd: Option<RawFd>,
}

/// `poll(2)`-backed [`Multiplexer`](super::Multiplexer) implementation.
///
/// The registration table lives behind a [`Mutex`] so that `register`,
/// `reregister`, and `unregister` are safe to call from worker threads while
/// the loop thread blocks in [`PollMultiplexer::wait`].
pub struct PollMultiplexer {
    state: Mutex<State>,
}

impl PollMultiplexer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                registrations: HashMap::new(),
                listener_fd: None,
            }),
        }
    }

    fn events_for(interest: Interest) -> libc::c_short {
        let mut events = 0;
        if interest.wants_read() {
            events |= libc::POLLIN;
        }
        if interest.wants_write() {
            events |= libc::POLLOUT;
        }
        events as libc::c_short
    }
}

impl Default for PollMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Multiplexer for PollMultiplexer {
    fn register(&self, fd: RawFd, interest: Interest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.registrations.insert(fd, Registration { interest });
        Ok(())
    }

    fn reregister(&self, fd: RawFd, interest: Interest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(reg) = state.registrations.get_mut(&fd) {
            reg.interest = interest;
            Ok(())
        } else {
            Err(Error::RegisterInterest(io::Error::new(
                io::ErrorKind::NotFound,
                "fd not registered",
            )))
        }
    }

    fn unregister(&self, fd: RawFd) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.registrations.remove(&fd);
        if state.listener_fd == Some(fd) {
            state.listener_fd = None;
        }
        Ok(())
    }

    fn mark_listener(&self, fd: RawFd) {
        self.state.lock().unwrap().listener_fd = Some(fd);
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<Vec<ReadyEvent>> {
        let (mut pollfds, listener_fd) = {
            let state = self.state.lock().unwrap();
            let pollfds: Vec<libc::pollfd> = state
                .registrations
                .iter()
                .map(|(&fd, reg)| libc::pollfd {
                    fd,
                    events: Self::events_for(reg.interest),
                    revents: 0,
                })
                .collect();
            (pollfds, state.listener_fd)
        };
        Self::poll_once(pollfds.as_mut_slice(), timeout, listener_fd)
    }
}

impl PollMultiplexer {
    fn poll_once(
        pollfds: &mut [libc::pollfd],
        timeout: Option<Duration>,
        listener_fd: Option<RawFd>,
    ) -> Result<Vec<ReadyEvent>> {
        let timeout_ms = match timeout {
            Some(d) => i32::try_from(d.as_millis()).unwrap_or(i32::MAX),
            None => -1,
        };

        loop {
            let rc =
                unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(Error::Io(err));
            }
            break;
        }

        let mut ready = Vec::new();
        for pfd in pollfds.iter() {
            if pfd.revents == 0 {
                continue;
            }
            if pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
                ready.push(ReadyEvent {
                    fd: pfd.fd,
                    kind: ReadyKind::Error,
                });
                continue;
            }
            if pfd.revents & libc::POLLIN != 0 {
                let kind = if listener_fd == Some(pfd.fd) {
                    ReadyKind::Acceptable
                } else {
                    ReadyKind::Readable
                };
                ready.push(ReadyEvent { fd: pfd.fd, kind });
            }
            if pfd.revents & libc::POLLOUT != 0 {
                ready.push(ReadyEvent {
                    fd: pfd.fd,
                    kind: ReadyKind::Writable,
                });
            }
        }
        Ok(ready)
    }
}

#[cfg(test)]
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
        let mux = PollMultiplexer::new();
        mux.register(b.as_raw_fd(), Interest::Read).unwrap();

        a.write_all(b"x").unwrap();
        let ready = mux.wait(Some(Duration::from_millis(500))).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].fd, b.as_raw_fd());
        assert_eq!(ready[0].kind, ReadyKind::Readable);
    }

    #[test]
    fn times_out_with_no_ready_descriptors() {
        let (_a, b) = UnixStream::pair().unwrap();
        let mux = PollMultiplexer::new();
        mux.register(b.as_raw_fd(), Interest::Read).unwrap();
        let ready = mux.wait(Some(Duration::from_millis(50))).unwrap();
        assert!(ready.is_empty());
    }
}
