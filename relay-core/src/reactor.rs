// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! The reactor: owns the listening socket, the multiplexer, the signal pipe,
//! the timer wheel, the worker pool, and the connection table, and runs the
//! single-threaded dispatch loop that drives everything else in this crate.
//!
//! Grounded in the teacher's `resilient_reactor_thread` module: one thread
//! owns the blocking wait and every piece of loop-local state, user work is
//! handed off to a bounded pool, and a panic inside user code is isolated by
//! `catch_unwind` rather than taking the loop down.

use std::collections::HashMap;
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};

use crate::connection::{Connection, ConnectionId, Listener, Mode};
use crate::error::Result;
use crate::multiplexer::{Backend, Interest, Multiplexer, ReadyKind};
use crate::signal_pipe::SignalPipe;
use crate::task_queue::{TaskQueue, WorkerPool};
use crate::timer_wheel::TimerWheel;

/// Callback invoked on the worker pool when a connection becomes readable.
pub type ReadCallback = Arc<dyn Fn(&mut Connection) + Send + Sync>;
/// Callback invoked on the worker pool once a connection's send buffer
/// finishes draining.
pub type WriteCallback = Arc<dyn Fn(&mut Connection) + Send + Sync>;
/// Callback invoked on the worker pool when a connection's idle timer
/// expires.
pub type TimeoutCallback = Arc<dyn Fn(&mut Connection) + Send + Sync>;
/// Callback invoked synchronously on the loop thread for a user-registered
/// signal.
pub type UserSignalCallback = Arc<dyn Fn() + Send + Sync>;

/// Construction-time configuration for a [`Reactor`].
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    pub bind_addr: String,
    pub port: u16,
    pub backlog: i32,
    pub mode: Mode,
    pub max_task_num: usize,
    pub max_pool_size: usize,
    /// Idle timeout applied to every accepted connection, and the period at
    /// which `SIGALRM` re-arms to tick the timer wheel.
    pub timeout_period: Duration,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 0,
            backlog: 128,
            mode: Mode::Nonblocking,
            max_task_num: 4096,
            max_pool_size: 8,
            timeout_period: Duration::from_secs(30),
        }
    }
}

struct Table {
    connections: HashMap<ConnectionId, Arc<Mutex<Connection>>>,
    fd_to_id: HashMap<RawFd, ConnectionId>,
    next_generation: HashMap<RawFd, u64>,
}

impl Table {
    fn new() -> Self {
        Self {
            connections: HashMap::new(),
            fd_to_id: HashMap::new(),
            next_generation: HashMap::new(),
        }
    }

    fn next_id(&mut self, fd: RawFd) -> ConnectionId {
        let generation = self.next_generation.entry(fd).or_insert(0);
        let id = ConnectionId {
            fd,
            generation: *generation,
        };
        *generation += 1;
        id
    }

    fn insert(&mut self, conn: Connection) -> Arc<Mutex<Connection>> {
        let id = conn.id();
        let fd = conn.raw_fd();
        let handle = Arc::new(Mutex::new(conn));
        self.connections.insert(id, handle.clone());
        self.fd_to_id.insert(fd, id);
        handle
    }

    fn remove_by_fd(&mut self, fd: RawFd) -> Option<Arc<Mutex<Connection>>> {
        let id = self.fd_to_id.remove(&fd)?;
        self.connections.remove(&id)
    }

    fn get_by_fd(&self, fd: RawFd) -> Option<(ConnectionId, Arc<Mutex<Connection>>)> {
        let id = *self.fd_to_id.get(&fd)?;
        self.connections.get(&id).map(|c| (id, c.clone()))
    }

    fn get(&self, id: ConnectionId) -> Option<Arc<Mutex<Connection>>> {
        self.connections.get(&id).cloned()
    }
}

/// The event loop. Construct with [`Reactor::new`], register callbacks, then
/// call [`Reactor::run`] on the thread that should own the loop.
pub struct Reactor {
    config: ReactorConfig,
    backend: Backend,
    listener: Listener,
    signal_pipe: SignalPipe,
    table: Mutex<Table>,
    timer_wheel: Mutex<TimerWheel<ConnectionId>>,
    pool: WorkerPool,
    on_read: Option<ReadCallback>,
    on_write: Option<WriteCallback>,
    on_timeout: Option<TimeoutCallback>,
    stopping: Arc<AtomicBool>,
}

impl Reactor {
    /// Builds the reactor: binds the listener, selects `backend`, installs
    /// the signal pipe, and starts the worker pool. No I/O is dispatched
    /// until [`Reactor::run`] is called.
    pub fn new(config: ReactorConfig, backend: Backend) -> Result<Self> {
        let listener = Listener::bind(&config.bind_addr, config.port, config.backlog)?;
        let signal_pipe = SignalPipe::install()?;
        let queue = TaskQueue::new(config.max_task_num);
        let pool = WorkerPool::new(queue, config.max_pool_size);

        backend.register(listener.raw_fd(), Interest::Read)?;
        backend.mark_listener(listener.raw_fd());
        backend.register(signal_pipe.read_fd(), Interest::Read)?;

        Ok(Self {
            config,
            backend,
            listener,
            signal_pipe,
            table: Mutex::new(Table::new()),
            timer_wheel: Mutex::new(TimerWheel::new()),
            pool,
            on_read: None,
            on_write: None,
            on_timeout: None,
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Registers the callback run (on the worker pool) when a client
    /// connection becomes readable.
    pub fn on_read(&mut self, callback: ReadCallback) {
        self.on_read = Some(callback);
    }

    /// Registers the callback run (on the worker pool) once a connection's
    /// send buffer finishes draining after being armed for `WRITE`.
    pub fn on_write(&mut self, callback: WriteCallback) {
        self.on_write = Some(callback);
    }

    /// Registers the callback run (on the worker pool) when a connection's
    /// idle timer expires. The connection is removed from the table and
    /// disconnected immediately after the callback returns.
    pub fn on_timeout(&mut self, callback: TimeoutCallback) {
        self.on_timeout = Some(callback);
    }

    /// Registers a callback run synchronously on the loop thread whenever
    /// `signal` is delivered.
    pub fn on_signal(&mut self, signal: libc::c_int, callback: UserSignalCallback) -> Result<()> {
        self.signal_pipe.on_signal(signal, callback)
    }

    /// A clone-able handle that, when invoked, requests a graceful shutdown:
    /// the loop finishes dispatching the current ready batch, then returns
    /// from [`Reactor::run`].
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.stopping.clone()
    }

    /// Runs the event loop on the calling thread until a `SIGINT`/`SIGTERM`
    /// is observed or [`Reactor::shutdown_handle`] is set.
    ///
    /// # Errors
    /// Propagates any error from the multiplexer's `wait` call that is not
    /// `EINTR`.
    pub fn run(mut self) -> Result<()> {
        let timeout_secs = self.config.timeout_period.as_secs().max(1) as libc::c_uint;
        // SAFETY: alarm(2) takes no pointers; re-armed after every tick so
        // the timer wheel keeps advancing for the life of the loop.
        unsafe {
            libc::alarm(timeout_secs);
        }

        info!(
            "reactor listening on port {} ({} worker(s), {:?} backend-agnostic mode)",
            self.config.port, self.config.max_pool_size, self.config.mode
        );

        while !self.stopping.load(Ordering::SeqCst) {
            let ready = self.backend.wait(None)?;

            for event in ready {
                if event.fd == self.listener.raw_fd() {
                    self.handle_acceptable();
                    continue;
                }
                if event.fd == self.signal_pipe.read_fd() {
                    self.handle_signal_pipe_readable(timeout_secs);
                    continue;
                }
                match event.kind {
                    ReadyKind::Readable | ReadyKind::Acceptable => self.handle_client_readable(event.fd),
                    ReadyKind::Writable => self.handle_client_writable(event.fd),
                    ReadyKind::Error => self.handle_client_error(event.fd),
                }
            }
        }

        info!("reactor shutting down");
        Ok(())
    }

    fn handle_acceptable(&mut self) {
        loop {
            let accepted = match self.listener.accept() {
                Ok(Some(pair)) => pair,
                Ok(None) => break,
                Err(e) => {
                    warn!("accept failed: {e}");
                    break;
                }
            };
            let (stream, peer): (TcpStream, _) = accepted;
            let fd = stream.as_raw_fd();
            let id = {
                let mut table = self.table.lock().unwrap();
                table.next_id(fd)
            };
            let conn = match Connection::from_accepted(id, stream, self.config.mode) {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("failed to set up accepted connection from {peer}: {e}");
                    continue;
                }
            };
            debug!("accepted connection {id:?} from {peer}");

            if let Err(e) = self.backend.register(fd, Interest::Read) {
                warn!("failed to register accepted fd {fd}: {e}");
                continue;
            }

            {
                let mut table = self.table.lock().unwrap();
                table.insert(conn);
            }
            self.timer_wheel
                .lock()
                .unwrap()
                .add(id, self.config.timeout_period);
        }
    }

    fn handle_signal_pipe_readable(&mut self, timeout_secs: libc::c_uint) {
        let events = match self.signal_pipe.drain() {
            Ok(events) => events,
            Err(e) => {
                warn!("signal pipe drain failed: {e}");
                return;
            }
        };

        for callback in &events.user_signal_callbacks {
            callback();
        }

        if events.timer_expired {
            self.tick_timer_wheel();
            // SAFETY: re-arming with no pointers involved; the original
            // `alarm` is one-shot per signal so the loop must re-request it.
            unsafe {
                libc::alarm(timeout_secs);
            }
        }

        if events.shutdown_requested {
            info!("shutdown requested via signal");
            self.stopping.store(true, Ordering::SeqCst);
        }
    }

    fn tick_timer_wheel(&mut self) {
        let now = crate::connection::now();
        let mut expired = Vec::new();
        self.timer_wheel.lock().unwrap().tick(now, |id| expired.push(id));

        for id in expired {
            let handle = { self.table.lock().unwrap().get(id) };
            let Some(handle) = handle else { continue };

            if let Some(callback) = self.on_timeout.clone() {
                let fd = id.fd;
                let handle_for_task = handle.clone();
                let submitted = self.pool.queue().submit(Box::new(move || {
                    let mut conn = handle_for_task.lock().unwrap();
                    callback(&mut conn);
                }));
                if !submitted {
                    warn!("task queue full, dropping timeout callback for fd {fd}");
                }
            }
            self.close_connection(id.fd);
        }
    }

    fn handle_client_readable(&mut self, fd: RawFd) {
        let Some((id, handle)) = ({ self.table.lock().unwrap().get_by_fd(fd) }) else {
            return;
        };
        self.timer_wheel
            .lock()
            .unwrap()
            .add(id, self.config.timeout_period);

        let Some(callback) = self.on_read.clone() else {
            return;
        };
        let backend = self.backend.clone();
        let submitted = self.pool.queue().submit(Box::new(move || {
            let mut conn = handle.lock().unwrap();
            callback(&mut conn);
            if !conn.is_send_all() {
                if let Err(e) = backend.reregister(fd, Interest::ReadWrite) {
                    warn!("failed to arm WRITE interest for fd {fd}: {e}");
                }
            }
        }));
        if !submitted {
            warn!("task queue full, dropping read event for fd {fd}");
        }
    }

    fn handle_client_writable(&mut self, fd: RawFd) {
        let Some((_, handle)) = ({ self.table.lock().unwrap().get_by_fd(fd) }) else {
            return;
        };
        let callback = self.on_write.clone();
        let backend = self.backend.clone();
        let submitted = self.pool.queue().submit(Box::new(move || {
            let mut conn = handle.lock().unwrap();
            if let Err(e) = conn.flush_send_buf() {
                warn!("flush failed for fd {fd}: {e}");
                return;
            }
            if conn.is_send_all() {
                if let Err(e) = backend.reregister(fd, Interest::Read) {
                    warn!("failed to disarm WRITE interest for fd {fd}: {e}");
                }
                if let Some(callback) = &callback {
                    callback(&mut conn);
                }
            }
        }));
        if !submitted {
            warn!("task queue full, dropping write event for fd {fd}");
        }
    }

    fn handle_client_error(&mut self, fd: RawFd) {
        debug!("fd {fd} reported error/hangup, closing");
        self.close_connection(fd);
    }

    fn close_connection(&mut self, fd: RawFd) {
        let removed = { self.table.lock().unwrap().remove_by_fd(fd) };
        let Some(handle) = removed else { return };
        let _ = self.backend.unregister(fd);
        if let Ok(conn) = handle.lock() {
            conn.disconnect();
            self.timer_wheel.lock().unwrap().remove(&conn.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::{Read, Write};
    use std::net::TcpStream as StdTcpStream;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    #[serial]
    fn echoes_one_line_and_shuts_down_on_signal() {
        let port = free_port();
        let config = ReactorConfig {
            port,
            max_pool_size: 2,
            timeout_period: Duration::from_secs(5),
            ..ReactorConfig::default()
        };
        let backend = Backend::poll().unwrap();
        let mut reactor = Reactor::new(config, backend).unwrap();

        let received = Arc::new(AtomicUsize::new(0));
        let received_in_cb = received.clone();
        reactor.on_read(Arc::new(move |conn: &mut Connection| {
            let bytes = conn.recv(64).unwrap_or_default();
            if !bytes.is_empty() {
                received_in_cb.fetch_add(bytes.len(), Ordering::SeqCst);
                let _ = conn.send(&bytes);
            }
        }));

        let stop = reactor.shutdown_handle();
        let handle = thread::spawn(move || reactor.run());

        thread::sleep(Duration::from_millis(100));
        let mut client = StdTcpStream::connect(("127.0.0.1", port)).unwrap();
        client.write_all(b"ping").unwrap();
        let mut buf = [0_u8; 4];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        stop.store(true, Ordering::SeqCst);
        unsafe {
            libc::raise(libc::SIGTERM);
        }
        handle.join().unwrap().unwrap();
        assert!(received.load(Ordering::SeqCst) >= 4);
    }
}
