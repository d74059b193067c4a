//! Per-client session state, held inside the store under the same coarse lock (spec.md §3,
//! §4.6). Keeping sessions alongside entries avoids a second lock and matches the "pass a
//! store handle into every operation" rule in spec.md §9: there is exactly one lock to reason
//! about, not a store lock plus a session lock with its own ordering rules.

use std::collections::HashSet;

/// Connection identity. The resolved Open Question (SPEC_FULL.md) treats the connection fd
/// as authoritative; `pid` is carried only for logging.
pub type ClientId = i32;

/// Server-side state for one connected client, from accept to disconnect (spec.md §3).
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub pid: u32,
    pub opened: HashSet<String>,
    pub locked: HashSet<String>,
    pub waiting_on: Option<String>,
    /// Pathnames for which the immediately preceding successful op on this (client, pathname)
    /// pair was `open(O_CREATE|O_LOCK)`; consumed by the first `write`, cleared by anything
    /// else (spec.md §4.2, §9).
    pub write_tokens: HashSet<String>,
}

impl ClientSession {
    pub fn new(pid: u32) -> Self {
        ClientSession {
            pid,
            opened: HashSet::new(),
            locked: HashSet::new(),
            waiting_on: None,
            write_tokens: HashSet::new(),
        }
    }

    /// Any operation on `pathname` other than the create+lock open itself clears the write
    /// token, so a stray `read`/`lock`/second `open` in between invalidates the precondition.
    pub fn invalidate_write_token(&mut self, pathname: &str) {
        self.write_tokens.remove(pathname);
    }

    pub fn grant_write_token(&mut self, pathname: &str) {
        self.write_tokens.insert(pathname.to_owned());
    }

    pub fn has_write_token(&self, pathname: &str) -> bool {
        self.write_tokens.contains(pathname)
    }

    pub fn consume_write_token(&mut self, pathname: &str) -> bool {
        self.write_tokens.remove(pathname)
    }
}
