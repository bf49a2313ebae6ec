// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The "unified event source": a self-pipe that funnels asynchronous signals
//! into the main I/O multiplexer.
//!
//! Exactly one async-signal-safe action happens inside a signal handler: a
//! one-byte `write` of the signal number to the pipe's write end. Everything
//! else -- timer expiry, graceful shutdown, user signal callbacks -- runs
//! synchronously on the loop thread after [`SignalPipe::drain`] returns.
//! Signal delivery is process-wide, so only one [`SignalPipe`] may be live in
//! a process at a time; a second [`SignalPipe::install`] call fails.

use std::collections::HashMap;
use std::io::{self, Read};
use std::os::fd::RawFd;
use std::os::unix::io::FromRawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGALRM, SIGINT, SIGPIPE, SIGTERM};

use crate::error::{Error, Result};

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Callbacks to run synchronously on the loop thread after a drain.
pub struct SignalEvents {
    /// `SIGALRM` arrived at least once since the last drain; the caller
    /// should run [`TimerWheel::tick`](crate::timer_wheel::TimerWheel::tick).
    pub timer_expired: bool,
    /// `SIGINT` or `SIGTERM` arrived; the caller should begin a graceful
    /// stop after the current ready batch.
    pub shutdown_requested: bool,
    /// User-registered signal callbacks to invoke, in arrival order.
    pub user_signal_callbacks: Vec<Arc<dyn Fn() + Send + Sync>>,
}

/// A pair of connected descriptors funneling signal numbers into a single
/// readable fd registered with the [`Multiplexer`](crate::multiplexer::Multiplexer).
pub struct SignalPipe {
    read_end: UnixStream,
    write_fd: RawFd,
    user_callbacks: HashMap<libc::c_int, Arc<dyn Fn() + Send + Sync>>,
    registered_ids: Vec<signal_hook::SigId>,
}

impl SignalPipe {
    /// Installs the self-pipe and the three fixed-signal handlers
    /// (`SIGALRM`, `SIGINT`/`SIGTERM`, `SIGPIPE`). Fails if a [`SignalPipe`]
    /// is already installed in this process.
    pub fn install() -> Result<Self> {
        if INSTALLED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::SignalPipe(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "a SignalPipe is already installed in this process",
            )));
        }

        let (read_end, write_end) = UnixStream::pair().map_err(Error::SignalPipe)?;
        read_end.set_nonblocking(true).map_err(Error::SignalPipe)?;
        write_end.set_nonblocking(true).map_err(Error::SignalPipe)?;

        let write_fd = {
            use std::os::fd::IntoRawFd;
            write_end.into_raw_fd()
        };

        let mut pipe = Self {
            read_end,
            write_fd,
            user_callbacks: HashMap::new(),
            registered_ids: Vec::new(),
        };

        for signal in [SIGALRM, SIGINT, SIGTERM, SIGPIPE] {
            pipe.register_raw(signal)?;
        }

        Ok(pipe)
    }

    fn register_raw(&mut self, signal: libc::c_int) -> Result<()> {
        let fd = self.write_fd;
        // SAFETY: the closure performs only a single async-signal-safe
        // `write(2)` syscall on a file descriptor that outlives the
        // registration (the pipe is torn down only after every signal id is
        // unregistered, see `Drop`).
        let id = unsafe {
            signal_hook::low_level::register(signal, move || {
                let byte = signal as u8;
                libc::write(fd, std::ptr::addr_of!(byte).cast(), 1);
            })
        }
        .map_err(Error::SignalPipe)?;
        self.registered_ids.push(id);
        Ok(())
    }

    /// The descriptor to register with the [`Multiplexer`] for `READ`
    /// interest.
    #[must_use]
    pub fn read_fd(&self) -> RawFd {
        use std::os::fd::AsRawFd;
        self.read_end.as_raw_fd()
    }

    /// Registers a user-defined signal callback. The signal still funnels
    /// through the same self-pipe; the callback runs on the loop thread
    /// after the next [`SignalPipe::drain`].
    pub fn on_signal(&mut self, signal: libc::c_int, callback: Arc<dyn Fn() + Send + Sync>) -> Result<()> {
        self.register_raw(signal)?;
        self.user_callbacks.insert(signal, callback);
        Ok(())
    }

    /// Reads every byte currently queued in the pipe (multiple signals
    /// arriving between loop turns concatenate into one read) and classifies
    /// them into [`SignalEvents`].
    pub fn drain(&mut self) -> Result<SignalEvents> {
        let mut events = SignalEvents {
            timer_expired: false,
            shutdown_requested: false,
            user_signal_callbacks: Vec::new(),
        };

        let mut scratch = [0_u8; 256];
        loop {
            match self.read_end.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => {
                    for &sig in &scratch[..n] {
                        let sig = libc::c_int::from(sig);
                        match sig {
                            SIGALRM => events.timer_expired = true,
                            SIGINT | SIGTERM => events.shutdown_requested = true,
                            SIGPIPE => {}
                            other => {
                                if let Some(cb) = self.user_callbacks.get(&other) {
                                    events.user_signal_callbacks.push(cb.clone());
                                }
                            }
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(events)
    }
}

impl Drop for SignalPipe {
    fn drop(&mut self) {
        for id in self.registered_ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
        // SAFETY: write_fd was created by `UnixStream::into_raw_fd` above and
        // is not used by any handler after the unregister loop completes.
        unsafe {
            let _ = UnixStream::from_raw_fd(self.write_fd);
        }
        INSTALLED.store(false, Ordering::SeqCst);
    }
}
