//! Per-command handlers: stateless(ish) mappings from one decoded [`Request`] to store
//! mutations and one or more [`Response`]s (spec.md §4.2).
//!
//! Two points in this file resolve a conflict between spec.md §4.2's operation table and its
//! own worked scenario in §8 (see DESIGN.md "Open Questions" for the writeup):
//! - `openFile` never blocks, even with `O_LOCK` set: a contended lock makes it fail
//!   immediately with `LOCKED_BY_OTHER`. Only the dedicated `lockFile` command parks.
//! - `readFile`/`readN` do not gate on lock ownership at all — a locked entry stays readable
//!   by any opener, matching §8 scenario 2 where `B` reads `x` successfully while `A` still
//!   holds the lock.

use crate::error::RequestError;
use crate::error::fatal_invariant_violation;
use crate::wire::{Command, OpenFlags, Request, Response, ResponseCode};

use super::eviction;
use super::session::ClientSession;
use super::{ClientId, Deferred, HandlerOutcome, Store};

/// Map one request to its effect on `store`. Called with the store's coarse lock already held.
pub fn dispatch(store: &mut Store, client: ClientId, req: &Request) -> HandlerOutcome {
    if req.cmd != Command::Write {
        if let Some(session) = store.sessions.get_mut(&client) {
            session.invalidate_write_token(&req.pathname);
        }
    }

    let outcome = match req.cmd {
        Command::Open => handle_open(store, client, req),
        Command::Close => handle_close(store, client, req),
        Command::Read => handle_read(store, client, req),
        Command::ReadN => handle_read_n(store, client, req),
        Command::Write => handle_write(store, client, req),
        Command::Append => handle_append(store, client, req),
        Command::Lock => handle_lock(store, client, req),
        Command::Unlock => handle_unlock(store, client, req),
        Command::Remove => handle_remove(store, client, req),
    };

    let bytes_in = req.content.len() as u64;
    let bytes_out: u64 = outcome.responses.iter().map(|r| r.content.len() as u64).sum();
    store.stats.note_op(req.cmd, bytes_in, bytes_out);
    outcome
}

fn err(e: RequestError) -> HandlerOutcome {
    HandlerOutcome::immediate(Response::empty(e.code()))
}

/// Result of running the eviction engine for one admission: the `EVICTED` responses owed to
/// the admitting client, and any deferred `REMOVED` deliveries owed to waiters on the victims.
struct AdmitOutcome {
    evicted: Vec<Response>,
    deferred: Vec<Deferred>,
}

/// Evict victims (if any) until `delta_files`/`delta_bytes` fit, per spec.md §4.3. Applies no
/// mutation at all if admission is impossible (`Err(())`), satisfying the rollback requirement.
fn admit(
    store: &mut Store,
    admitting_pathname: &str,
    delta_files: u64,
    delta_bytes: u64,
) -> Result<AdmitOutcome, ()> {
    let plan = eviction::plan_eviction(
        store.policy,
        &store.entries,
        admitting_pathname,
        store.files_in_use,
        store.bytes_in_use,
        delta_files,
        delta_bytes,
        store.max_files,
        store.max_bytes,
    )
    .ok_or(())?;

    let mut evicted = Vec::new();
    let mut deferred = Vec::new();
    for pathname in plan.victims {
        let Some(entry) = store.entries.remove(&pathname) else { continue };
        store.files_in_use -= 1;
        store.bytes_in_use -= entry.content.len() as u64;
        store.stats.note_eviction();

        for opener in &entry.openers {
            if let Some(session) = store.sessions.get_mut(opener) {
                session.opened.remove(&pathname);
                session.locked.remove(&pathname);
            }
        }
        for waiter in entry.lock_waiters {
            if let Some(session) = store.sessions.get_mut(&waiter) {
                session.waiting_on = None;
                deferred.push(Deferred { client: waiter, response: Response::empty(ResponseCode::Removed) });
            }
        }
        evicted.push(Response::new(entry.pathname.clone(), entry.content.clone(), ResponseCode::Evicted));
    }
    Ok(AdmitOutcome { evicted, deferred })
}

fn handle_open(store: &mut Store, client: ClientId, req: &Request) -> HandlerOutcome {
    let flags = OpenFlags::from_bits_truncate(req.flags.unwrap_or(0));
    let create = flags.contains(OpenFlags::O_CREATE);
    let want_lock = flags.contains(OpenFlags::O_LOCK);

    if create {
        if store.entries.contains_key(&req.pathname) {
            return err(RequestError::AlreadyExists);
        }
        let admit_outcome = match admit(store, &req.pathname, 1, 0) {
            Ok(o) => o,
            Err(()) => return err(RequestError::FileTooLarge),
        };

        let tick = store.next_tick();
        let mut entry = super::entry::FileEntry::new(req.pathname.clone(), tick);
        entry.add_opener(client);
        if want_lock {
            entry.lock_owner = Some(client);
        }
        store.entries.insert(req.pathname.clone(), entry);
        store.files_in_use += 1;
        store.stats.note_occupancy(store.files_in_use, store.bytes_in_use);

        let session = store.sessions.entry(client).or_insert_with(|| ClientSession::new(req.pid));
        session.opened.insert(req.pathname.clone());
        if want_lock {
            session.locked.insert(req.pathname.clone());
            session.grant_write_token(&req.pathname);
        }

        let mut outcome = HandlerOutcome::default();
        outcome.responses = admit_outcome.evicted;
        outcome.deferred = admit_outcome.deferred;
        outcome.responses.push(Response::empty(ResponseCode::Ok));
        return outcome;
    }

    let Some(entry) = store.entries.get_mut(&req.pathname) else {
        return err(RequestError::NotFound);
    };

    if want_lock {
        match entry.lock_owner {
            Some(owner) if owner != client => {
                return err(RequestError::LockedByOther);
            }
            _ => entry.lock_owner = Some(client),
        }
    }
    entry.add_opener(client);

    let session = store.sessions.entry(client).or_insert_with(|| ClientSession::new(req.pid));
    session.opened.insert(req.pathname.clone());
    if want_lock {
        session.locked.insert(req.pathname.clone());
    }
    HandlerOutcome::immediate(Response::empty(ResponseCode::Ok))
}

fn handle_close(store: &mut Store, client: ClientId, req: &Request) -> HandlerOutcome {
    let Some(entry) = store.entries.get_mut(&req.pathname) else {
        return err(RequestError::NotOpen);
    };
    if !entry.is_opener(client) {
        return err(RequestError::NotOpen);
    }
    entry.remove_opener(client);
    let was_owner = entry.is_locked_by(client);

    if let Some(session) = store.sessions.get_mut(&client) {
        session.opened.remove(&req.pathname);
        session.locked.remove(&req.pathname);
    }

    let mut outcome = HandlerOutcome::immediate(Response::empty(ResponseCode::Ok));
    if was_owner {
        if let Some(promoted) = store.release_lock(&req.pathname, client) {
            outcome.deferred.push(promoted);
        }
    }
    outcome
}

fn handle_read(store: &mut Store, client: ClientId, req: &Request) -> HandlerOutcome {
    let Some(entry) = store.entries.get(&req.pathname) else {
        return err(RequestError::NotOpen);
    };
    if !entry.is_opener(client) {
        return err(RequestError::NotOpen);
    }
    let response = Response::new(entry.pathname.clone(), entry.content.clone(), ResponseCode::Ok);

    let tick = store.next_tick();
    store.entries.get_mut(&req.pathname).expect("checked above").touch(tick);
    HandlerOutcome::immediate(response)
}

fn handle_read_n(store: &mut Store, client: ClientId, req: &Request) -> HandlerOutcome {
    let limit = if req.read_n <= 0 { usize::MAX } else { req.read_n as usize };

    let mut touched = Vec::new();
    let mut responses = Vec::new();
    {
        let ordered = eviction::order_all(store.policy, store.entries.values());
        for entry in ordered {
            if responses.len() >= limit {
                break;
            }
            if let Some(owner) = entry.lock_owner {
                if owner != client {
                    continue;
                }
            }
            responses.push(Response::new(entry.pathname.clone(), entry.content.clone(), ResponseCode::Ok));
            touched.push(entry.pathname.clone());
        }
    }

    let tick = store.next_tick();
    for pathname in &touched {
        if let Some(entry) = store.entries.get_mut(pathname) {
            entry.touch(tick);
        }
    }

    let count = responses.len();
    responses.push(Response::new(String::new(), count.to_string().into_bytes(), ResponseCode::End));
    HandlerOutcome { responses, ..Default::default() }
}

fn handle_write(store: &mut Store, client: ClientId, req: &Request) -> HandlerOutcome {
    let had_token = store
        .sessions
        .get_mut(&client)
        .map(|session| session.consume_write_token(&req.pathname))
        .unwrap_or(false);
    if !had_token {
        return err(RequestError::PreconditionFailed);
    }

    let Some(entry) = store.entries.get(&req.pathname) else {
        return err(RequestError::PreconditionFailed);
    };
    if entry.lock_owner != Some(client) {
        fatal_invariant_violation(
            "write token present but caller does not hold the entry's lock",
        );
    }

    let old_len = entry.content.len() as u64;
    let delta_bytes = req.content.len() as u64;

    store.bytes_in_use -= old_len;
    let admit_outcome = match admit(store, &req.pathname, 0, delta_bytes) {
        Ok(o) => o,
        Err(()) => {
            store.bytes_in_use += old_len;
            return err(RequestError::FileTooLarge);
        }
    };

    let tick = store.next_tick();
    let entry = store.entries.get_mut(&req.pathname).expect("entry present for write admission");
    entry.content = req.content.clone();
    entry.touch(tick);
    store.bytes_in_use += delta_bytes;
    store.stats.note_occupancy(store.files_in_use, store.bytes_in_use);

    let mut outcome = HandlerOutcome::default();
    outcome.responses = admit_outcome.evicted;
    outcome.deferred = admit_outcome.deferred;
    outcome.responses.push(Response::empty(ResponseCode::Ok));
    outcome
}

fn handle_append(store: &mut Store, client: ClientId, req: &Request) -> HandlerOutcome {
    let Some(entry) = store.entries.get(&req.pathname) else {
        return err(RequestError::NotOpen);
    };
    if !entry.is_opener(client) {
        return err(RequestError::NotOpen);
    }
    if let Some(owner) = entry.lock_owner {
        if owner != client {
            return err(RequestError::LockedByOther);
        }
    }

    let delta_bytes = req.content.len() as u64;
    let admit_outcome = match admit(store, &req.pathname, 0, delta_bytes) {
        Ok(o) => o,
        Err(()) => return err(RequestError::FileTooLarge),
    };

    let tick = store.next_tick();
    let entry = store.entries.get_mut(&req.pathname).expect("entry present for append admission");
    entry.content.extend_from_slice(&req.content);
    entry.touch(tick);
    store.bytes_in_use += delta_bytes;
    store.stats.note_occupancy(store.files_in_use, store.bytes_in_use);

    let mut outcome = HandlerOutcome::default();
    outcome.responses = admit_outcome.evicted;
    outcome.deferred = admit_outcome.deferred;
    outcome.responses.push(Response::empty(ResponseCode::Ok));
    outcome
}

fn handle_lock(store: &mut Store, client: ClientId, req: &Request) -> HandlerOutcome {
    let Some(entry) = store.entries.get_mut(&req.pathname) else {
        return err(RequestError::NotFound);
    };

    match entry.lock_owner {
        None => {
            entry.lock_owner = Some(client);
            entry.add_opener(client);
            let session = store.sessions.entry(client).or_insert_with(|| ClientSession::new(req.pid));
            session.opened.insert(req.pathname.clone());
            session.locked.insert(req.pathname.clone());
            HandlerOutcome::immediate(Response::empty(ResponseCode::Ok))
        }
        Some(owner) if owner == client => HandlerOutcome::immediate(Response::empty(ResponseCode::Ok)),
        Some(_other) => {
            entry.lock_waiters.push_back(client);
            if let Some(session) = store.sessions.get_mut(&client) {
                session.waiting_on = Some(req.pathname.clone());
            }
            HandlerOutcome::parked()
        }
    }
}

fn handle_unlock(store: &mut Store, client: ClientId, req: &Request) -> HandlerOutcome {
    let Some(entry) = store.entries.get(&req.pathname) else {
        return err(RequestError::NotLockedByCaller);
    };
    if entry.lock_owner != Some(client) {
        return err(RequestError::NotLockedByCaller);
    }

    if let Some(session) = store.sessions.get_mut(&client) {
        session.locked.remove(&req.pathname);
    }
    let mut outcome = HandlerOutcome::immediate(Response::empty(ResponseCode::Ok));
    if let Some(promoted) = store.release_lock(&req.pathname, client) {
        outcome.deferred.push(promoted);
    }
    outcome
}

fn handle_remove(store: &mut Store, client: ClientId, req: &Request) -> HandlerOutcome {
    let Some(entry) = store.entries.get(&req.pathname) else {
        return err(RequestError::NotFound);
    };
    if entry.lock_owner != Some(client) {
        return err(RequestError::NotLockedByCaller);
    }

    let entry = store.entries.remove(&req.pathname).expect("checked above");
    store.files_in_use -= 1;
    store.bytes_in_use -= entry.content.len() as u64;

    for opener in &entry.openers {
        if let Some(session) = store.sessions.get_mut(opener) {
            session.opened.remove(&req.pathname);
            session.locked.remove(&req.pathname);
        }
    }

    let mut outcome = HandlerOutcome::immediate(Response::empty(ResponseCode::Ok));
    for waiter in entry.lock_waiters {
        if let Some(session) = store.sessions.get_mut(&waiter) {
            session.waiting_on = None;
            outcome.deferred.push(Deferred { client: waiter, response: Response::empty(ResponseCode::Removed) });
        }
    }
    outcome
}
