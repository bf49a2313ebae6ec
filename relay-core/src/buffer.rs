// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! A monotone FIFO of bytes, owned exclusively by its [`Connection`].
//!
//! [`Connection`]: crate::connection::Connection

use std::collections::VecDeque;

/// Per-direction byte queue with append and length-bounded drain.
///
/// Invariant: total bytes appended minus total bytes drained equals
/// [`ByteBuffer::size`]. The only failure mode is allocation failure, which
/// is fatal to the owning connection, never to the reactor.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    data: VecDeque<u8>,
}

impl ByteBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: VecDeque::new(),
        }
    }

    /// Number of bytes currently queued.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// True iff [`ByteBuffer::size`] is zero.
    #[must_use]
    pub fn empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends `bytes` to the tail of the queue.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend(bytes.iter().copied());
    }

    /// Removes and returns up to `n` bytes from the head of the queue.
    ///
    /// Returns fewer than `n` bytes only when [`ByteBuffer::size`] is smaller
    /// than `n`; never blocks and never fails.
    pub fn drain(&mut self, n: usize) -> Vec<u8> {
        let take = n.min(self.data.len());
        self.data.drain(..take).collect()
    }

    /// Removes and returns every queued byte, leaving the buffer empty.
    pub fn drain_all(&mut self) -> Vec<u8> {
        self.data.drain(..).collect()
    }
}
