// Copyright (c) 2025 relay contributors. Licensed under Apache License, Version 2.0.

//! A time-ordered multiset of `(deadline, connection)` pairs.
//!
//! Despite the name this is not a classical hashed timer wheel -- it is a
//! strict ordered set, implemented with a [`BTreeSet`] keyed by `(deadline,
//! insertion sequence)` so ties on identical deadlines stay strictly
//! ordered. The wheel never schedules its own wakeups; the [`Reactor`] drives
//! [`TimerWheel::tick`] after the signal pipe reports that `SIGALRM` fired.
//!
//! [`Reactor`]: crate::reactor::Reactor

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    deadline: Instant,
    sequence: u64,
}

/// A time-ordered set of `(deadline, connection id)` entries.
///
/// Invariant: a given connection id appears at most once. [`TimerWheel::add`]
/// on an id already present replaces its entry (used when a connection's
/// activity resets its deadline).
pub struct TimerWheel<Id> {
    order: BTreeSet<Key>,
    by_id: HashMap<Id, Key>,
    next_sequence: u64,
}

impl<Id: Eq + Hash + Clone> Default for TimerWheel<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Eq + Hash + Clone> TimerWheel<Id> {
    /// Creates an empty timer wheel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            order: BTreeSet::new(),
            by_id: HashMap::new(),
            next_sequence: 0,
        }
    }

    /// Inserts `(now() + timeout, connection)`. If `connection` already has
    /// an entry, the old one is removed first, so a connection appears at
    /// most once.
    pub fn add(&mut self, connection: Id, timeout: Duration) {
        self.add_at(connection, Instant::now() + timeout);
    }

    /// As [`TimerWheel::add`], but takes the absolute deadline directly --
    /// used by tests that need deterministic deadlines.
    pub fn add_at(&mut self, connection: Id, deadline: Instant) {
        self.remove(&connection);
        let key = Key {
            deadline,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.order.insert(key);
        self.by_id.insert(connection, key);
    }

    /// Removes the entry for `connection`, if any. O(log n).
    pub fn remove(&mut self, connection: &Id) -> bool {
        if let Some(key) = self.by_id.remove(connection) {
            self.order.remove(&key);
            true
        } else {
            false
        }
    }

    /// True iff `connection` currently has a pending timer entry.
    #[must_use]
    pub fn contains(&self, connection: &Id) -> bool {
        self.by_id.contains_key(connection)
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True iff there are no pending entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Repeatedly removes and returns the minimum entry while its deadline is
    /// at or before `now`, invoking `on_expired` for each in strictly
    /// non-decreasing deadline order. A `now` earlier than the minimum
    /// deadline is a no-op: no callback runs and the wheel is unchanged.
    pub fn tick(&mut self, now: Instant, mut on_expired: impl FnMut(Id)) {
        loop {
            let Some(&min_key) = self.order.iter().next() else {
                return;
            };
            if min_key.deadline > now {
                return;
            }
            self.order.remove(&min_key);
            let id = self
                .by_id
                .iter()
                .find(|(_, key)| **key == min_key)
                .map(|(id, _)| id.clone())
                .expect("by_id and order must stay in sync");
            self.by_id.remove(&id);
            on_expired(id);
        }
    }
}
