//! A single stored file and its open/lock bookkeeping (spec.md §3).

use std::collections::VecDeque;

use super::ClientId;

/// One file held in the cache.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub pathname: String,
    pub content: Vec<u8>,
    pub openers: Vec<ClientId>,
    pub lock_owner: Option<ClientId>,
    pub lock_waiters: VecDeque<ClientId>,
    pub last_use_tick: u64,
    pub creation_tick: u64,
}

impl FileEntry {
    pub fn new(pathname: String, tick: u64) -> Self {
        FileEntry {
            pathname,
            content: Vec::new(),
            openers: Vec::new(),
            lock_owner: None,
            lock_waiters: VecDeque::new(),
            last_use_tick: tick,
            creation_tick: tick,
        }
    }

    pub fn is_opener(&self, client: ClientId) -> bool {
        self.openers.contains(&client)
    }

    pub fn add_opener(&mut self, client: ClientId) {
        if !self.is_opener(client) {
            self.openers.push(client);
        }
    }

    pub fn remove_opener(&mut self, client: ClientId) {
        self.openers.retain(|&c| c != client);
    }

    /// True when no client currently holds an exclusive lock on this entry.
    pub fn is_unlocked(&self) -> bool {
        self.lock_owner.is_none()
    }

    /// True when `client` is the exclusive lock holder.
    pub fn is_locked_by(&self, client: ClientId) -> bool {
        self.lock_owner == Some(client)
    }

    /// Eviction eligibility: an entry held under lock can never be a victim (spec.md §3).
    pub fn evictable(&self) -> bool {
        self.lock_owner.is_none()
    }

    pub fn touch(&mut self, tick: u64) {
        self.last_use_tick = tick;
    }

    /// Remove `client` from the waiter queue, e.g. on disconnect (spec.md §4.4).
    pub fn scrub_waiter(&mut self, client: ClientId) {
        self.lock_waiters.retain(|&c| c != client);
    }
}
