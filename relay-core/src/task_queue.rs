// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! A bounded FIFO of zero-argument closures, drained by a fixed set of worker
//! threads.
//!
//! Tasks are never reordered and never retried: a panicking task is caught
//! and logged at `WARN`, and the worker returns to the loop. This mirrors the
//! teacher's use of [`catch_unwind`](std::panic::catch_unwind) to keep a
//! single misbehaving callback from taking down the dedicated thread that
//! runs it.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// A task is a boxed closure with no arguments and no return value.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct State {
    queue: VecDeque<Task>,
    stopping: bool,
}

struct Shared {
    // `queue` and `stopping` share one mutex: `stop()` must be unable to set
    // `stopping` in the window between a worker's check of it and the worker
    // parking in `not_empty.wait`, or the wakeup is lost and the worker
    // blocks forever. A condvar's wait condition and the flag that ends it
    // always need the same lock.
    state: Mutex<State>,
    not_empty: Condvar,
    capacity: usize,
}

/// A bounded FIFO task queue, shared between the submitter and the worker
/// pool.
///
/// `submit` returns `false` iff the queue already holds `max_task_num` tasks
/// at call time -- the caller (the reactor loop) logs at `WARN` and drops the
/// event for that descriptor, which stays registered so the peer can retry
/// or idle-timeout.
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

impl TaskQueue {
    /// Creates a queue bounded at `max_task_num` entries.
    #[must_use]
    pub fn new(max_task_num: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    stopping: false,
                }),
                not_empty: Condvar::new(),
                capacity: max_task_num,
            }),
        }
    }

    /// Enqueues `task`, returning `false` if the queue is already at
    /// capacity. Wakes exactly one waiting worker on success.
    pub fn submit(&self, task: Task) -> bool {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.queue.len() >= self.shared.capacity {
            return false;
        }
        state.queue.push_back(task);
        self.shared.not_empty.notify_one();
        true
    }

    /// Current number of queued (not yet started) tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queue
            .len()
    }

    /// True iff the queue currently holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pop_blocking(&self) -> Option<Task> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(task) = state.queue.pop_front() {
                return Some(task);
            }
            if state.stopping {
                return None;
            }
            state = self
                .shared
                .not_empty
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    fn stop(&self) {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        state.stopping = true;
        drop(state);
        self.shared.not_empty.notify_all();
    }
}

/// A fixed set of worker threads draining a [`TaskQueue`] in strict FIFO
/// order.
///
/// There is no priority and no work-stealing: with `max_pool_size == 1`,
/// tasks execute in submission order (see the test below). On [`stop`],
/// every waiting worker wakes, the queue drains, and the threads join.
///
/// [`stop`]: WorkerPool::stop
pub struct WorkerPool {
    queue: TaskQueue,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `max_pool_size` worker threads draining `queue`.
    #[must_use]
    pub fn new(queue: TaskQueue, max_pool_size: usize) -> Self {
        let workers = (0..max_pool_size)
            .map(|index| {
                let queue = queue.clone();
                thread::Builder::new()
                    .name(format!("relay-worker-{index}"))
                    .spawn(move || Self::run(&queue))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self { queue, workers }
    }

    /// A handle that can be used to submit tasks to this pool.
    #[must_use]
    pub fn queue(&self) -> TaskQueue {
        self.queue.clone()
    }

    fn run(queue: &TaskQueue) {
        while let Some(task) = queue.pop_blocking() {
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                log::warn!("worker task panicked; continuing");
            }
        }
    }

    /// Signals every worker to stop accepting new iterations once the queue
    /// drains, then joins all worker threads.
    pub fn stop(mut self) {
        self.queue.stop();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.queue.stop();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
