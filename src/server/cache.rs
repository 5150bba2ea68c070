// bitwig-mcp
// Copyright (C) 2024  The bitwig-mcp authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::osc::Value;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

/// The most recent value received for every OSC address.
///
/// Writers notify all waiters on every insert, so waits block on a condition variable instead of
/// polling. There is no per-waiter queue: concurrent waiters on one address observe the same
/// slot and the last write wins.
///
/// Every write is stamped with a sequence number taken from a counter that never goes backwards,
/// not even across [`clear`](MessageCache::clear). Callers that must ignore stale values capture
/// the current sequence and wait for a newer write with
/// [`wait_for_update`](MessageCache::wait_for_update).
#[derive(Debug, Default)]
pub struct MessageCache {
    state: Mutex<State>,
    written: Condvar,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    sequence: u64,
}

#[derive(Debug)]
struct Entry {
    value: Value,
    sequence: u64,
}

impl MessageCache {
    pub fn new() -> MessageCache {
        MessageCache::default()
    }

    /// Stores a value, replacing whatever was cached for the address.
    pub fn insert(&self, addr: &str, value: Value) {
        let mut state = self.lock();
        state.sequence += 1;
        let sequence = state.sequence;
        state
            .entries
            .insert(addr.to_owned(), Entry { value, sequence });
        drop(state);
        self.written.notify_all();
    }

    /// Returns the cached value.
    ///
    /// `None` means nothing was ever received for the address. `Some(Value::Nil)` means a message
    /// arrived without a payload.
    pub fn get(&self, addr: &str) -> Option<Value> {
        self.lock().entries.get(addr).map(|entry| entry.value.clone())
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.lock().entries.contains_key(addr)
    }

    /// Removes the cached value for one address and returns the current sequence number.
    ///
    /// Any write that arrives afterwards has a strictly greater sequence number.
    pub fn remove(&self, addr: &str) -> u64 {
        let mut state = self.lock();
        state.entries.remove(addr);
        state.sequence
    }

    /// The sequence number of the most recent write.
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }

    /// Waits for the address to hold any value, stale or fresh.
    ///
    /// Returns immediately if a value is already cached. Returns `None` if the timeout elapses.
    pub fn wait_for(&self, addr: &str, timeout: Duration) -> Option<Value> {
        self.wait_until(timeout, |state| {
            state.entries.get(addr).map(|entry| entry.value.clone())
        })
    }

    /// Waits for a write to the address that is newer than the `after` sequence number.
    pub fn wait_for_update(&self, addr: &str, after: u64, timeout: Duration) -> Option<Value> {
        self.wait_until(timeout, |state| {
            state
                .entries
                .get(addr)
                .filter(|entry| entry.sequence > after)
                .map(|entry| entry.value.clone())
        })
    }

    /// Waits for a write to any address newer than the `after` sequence number.
    pub fn wait_for_any_write(&self, after: u64, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| {
            if state.sequence > after {
                Some(())
            } else {
                None
            }
        })
        .is_some()
    }

    /// Copies every cached entry whose address starts with `prefix`.
    pub fn snapshot_prefix(&self, prefix: &str) -> BTreeMap<String, Value> {
        self.lock()
            .entries
            .iter()
            .filter(|(addr, _)| addr.starts_with(prefix))
            .map(|(addr, entry)| (addr.clone(), entry.value.clone()))
            .collect()
    }

    /// Removes every cached value.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn wait_until<T, F>(&self, timeout: Duration, mut ready: F) -> Option<T>
    where
        F: FnMut(&State) -> Option<T>,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(found) = ready(&state) {
                return Some(found);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = self.written.wait_timeout(state, deadline - now).unwrap().0;
        }
    }
}
