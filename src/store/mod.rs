//! The concurrent file-table: entries, capacity counters, sessions, and the replacement-order
//! index consulted by eviction (spec.md §3, §4.2).
//!
//! Everything in this module is reached through a single [`parking_lot::Mutex<Store>`] — see
//! [`crate::server::SharedStore`]. Handler functions take `&mut Store` directly rather than
//! touching any global state, per the "pass a store handle into every operation" rule in
//! spec.md §9.

pub mod entry;
pub mod eviction;
pub mod handler;
pub mod session;
pub mod stats;

use std::collections::HashMap;

pub use entry::FileEntry;
pub use eviction::ReplacementPolicy;
pub use session::{ClientId, ClientSession};
pub use stats::ServerStats;

use crate::wire::Response;

/// One pending delivery produced by an operation that promoted a waiter: the fd it must be
/// written to, and the response to write. The caller writes these *after* releasing the store
/// lock, then hands the fd back to the acceptor (spec.md §4.5, §9 "Suspension via parked
/// requests").
pub struct Deferred {
    pub client: ClientId,
    pub response: Response,
}

/// Everything one call into the store produced.
#[derive(Default)]
pub struct HandlerOutcome {
    /// Responses for the requesting client, in wire order: zero or more `EVICTED` frames
    /// followed by exactly one terminal response (spec.md §4.3). Empty when `parked` is true.
    pub responses: Vec<Response>,
    /// Responses for *other* clients whose parked `lockFile` request was just granted.
    pub deferred: Vec<Deferred>,
    /// True when the requesting connection's own response is not ready yet: its `lockFile`
    /// request was enqueued on a contended entry's waiter queue. The connection's fd must not
    /// be handed back to the acceptor until its own deferred delivery arrives later.
    pub parked: bool,
}

impl HandlerOutcome {
    fn immediate(response: Response) -> Self {
        HandlerOutcome { responses: vec![response], ..Default::default() }
    }

    fn parked() -> Self {
        HandlerOutcome { parked: true, ..Default::default() }
    }
}

/// The in-memory cache plus its bookkeeping (spec.md §3 `Store`).
pub struct Store {
    entries: HashMap<String, FileEntry>,
    sessions: HashMap<ClientId, ClientSession>,
    files_in_use: u64,
    bytes_in_use: u64,
    max_files: u64,
    max_bytes: u64,
    max_pathname: usize,
    max_characters: usize,
    global_tick: u64,
    policy: ReplacementPolicy,
    stats: ServerStats,
}

impl Store {
    pub fn new(
        max_files: u64,
        max_bytes: u64,
        max_pathname: usize,
        max_characters: usize,
        policy: ReplacementPolicy,
    ) -> Self {
        Store {
            entries: HashMap::new(),
            sessions: HashMap::new(),
            files_in_use: 0,
            bytes_in_use: 0,
            max_files,
            max_bytes,
            max_pathname,
            max_characters,
            global_tick: 0,
            policy,
            stats: ServerStats::default(),
        }
    }

    pub fn max_pathname(&self) -> usize {
        self.max_pathname
    }

    pub fn max_characters(&self) -> usize {
        self.max_characters
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn files_in_use(&self) -> u64 {
        self.files_in_use
    }

    pub fn bytes_in_use(&self) -> u64 {
        self.bytes_in_use
    }

    /// Handle one decoded request from `client`, mutating the store and returning whatever
    /// responses (and deferred deliveries to other clients) resulted (spec.md §4.2).
    pub fn handle(&mut self, client: ClientId, request: &crate::wire::Request) -> HandlerOutcome {
        handler::dispatch(self, client, request)
    }

    fn next_tick(&mut self) -> u64 {
        self.global_tick += 1;
        self.global_tick
    }

    /// Register a newly-accepted connection. Must be called before any request from `client`
    /// reaches the handler.
    pub fn register_session(&mut self, client: ClientId, pid: u32) {
        self.sessions.insert(client, ClientSession::new(pid));
        self.stats.note_client_connected();
    }

    /// Tear down a disconnected client: release any lock it held (promoting the next waiter,
    /// exactly as `unlock` would), drop it from every `openers` set and waiter queue, and
    /// discard any request it had parked (spec.md §4.6, §5 "Cancellation").
    ///
    /// Returns deferred deliveries for waiters promoted as a result, same as any other
    /// lock-releasing operation.
    pub fn disconnect(&mut self, client: ClientId) -> Vec<Deferred> {
        let Some(session) = self.sessions.remove(&client) else { return Vec::new() };
        self.stats.note_client_disconnected();

        let mut deferred = Vec::new();
        for pathname in session.locked.iter() {
            if let Some(promoted) = self.release_lock(pathname, client) {
                deferred.push(promoted);
            }
        }
        for pathname in session.opened.iter() {
            if let Some(entry) = self.entries.get_mut(pathname) {
                entry.remove_opener(client);
                entry.scrub_waiter(client);
            }
        }
        // A parked `lockFile` waiter sits in `entry.lock_waiters` without ever being added to
        // `session.opened` (see `handle_lock`'s contended branch), so the loop above never
        // reaches it. Left behind, the stale fd would eventually be promoted to lock owner and
        // handed an unsolicited deferred response once the OS reassigns its fd number.
        if let Some(pathname) = session.waiting_on.as_deref() {
            if let Some(entry) = self.entries.get_mut(pathname) {
                entry.scrub_waiter(client);
            }
        }
        deferred
    }

    /// Release `pathname`'s lock, currently held by `owner`, and promote the head waiter if
    /// any. Shared by `unlockFile`, `closeFile`, `removeFile`, and disconnect teardown.
    fn release_lock(&mut self, pathname: &str, owner: ClientId) -> Option<Deferred> {
        let entry = self.entries.get_mut(pathname)?;
        if entry.lock_owner != Some(owner) {
            return None;
        }
        entry.lock_owner = None;
        while let Some(next) = entry.lock_waiters.pop_front() {
            // The waiter may itself have disconnected while parked; skip it (spec.md §4.4).
            if !self.sessions.contains_key(&next) {
                continue;
            }
            entry.lock_owner = Some(next);
            if let Some(session) = self.sessions.get_mut(&next) {
                session.locked.insert(pathname.to_owned());
                session.waiting_on = None;
            }
            return Some(Deferred { client: next, response: Response::empty(crate::wire::ResponseCode::Ok) });
        }
        None
    }
}
