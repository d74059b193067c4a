//! Literal end-to-end scenarios from spec.md §8, exercised directly against [`Store::handle`]
//! with synthetic client identities standing in for connection fds. This is the same level the
//! teacher's own `tests/integration_tests.rs` operates at: drive the real state machine, skip
//! the transport.

use fcached::store::{ClientId, ReplacementPolicy, Store};
use fcached::wire::{Command, OpenFlags, Request, ResponseCode};

const MAX_PATHNAME: usize = 256;

fn store(max_files: u64, max_bytes: u64, policy: ReplacementPolicy) -> Store {
    Store::new(max_files, max_bytes, MAX_PATHNAME, 1 << 20, policy)
}

fn req(pid: u32, cmd: Command, pathname: &str) -> Request {
    Request { pid, cmd, pathname: pathname.to_owned(), flags: None, content: Vec::new(), read_n: -1 }
}

fn open(pathname: &str, flags: Option<i32>) -> Request {
    let mut r = req(0, Command::Open, pathname);
    r.flags = flags;
    r
}

fn write(pathname: &str, content: &[u8]) -> Request {
    let mut r = req(0, Command::Write, pathname);
    r.content = content.to_vec();
    r
}

const A: ClientId = 10;
const B: ClientId = 11;
const C: ClientId = 12;
const D: ClientId = 13;

fn register(store: &mut Store, client: ClientId) {
    store.register_session(client, client as u32);
}

#[test]
fn scenario_1_create_locked_and_write() {
    let mut store = store(2, 10, ReplacementPolicy::Lru);
    register(&mut store, A);

    let outcome = store.handle(A, &open("x", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    assert_eq!(outcome.responses.last().unwrap().code, ResponseCode::Ok);

    let outcome = store.handle(A, &write("x", b"hello"));
    assert_eq!(outcome.responses.last().unwrap().code, ResponseCode::Ok);
    assert_eq!(store.bytes_in_use(), 5);
    assert_eq!(store.files_in_use(), 1);
}

#[test]
fn scenario_2_open_then_read() {
    let mut store = store(2, 10, ReplacementPolicy::Lru);
    register(&mut store, A);
    register(&mut store, B);

    store.handle(A, &open("x", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    store.handle(A, &write("x", b"hello"));

    let outcome = store.handle(B, &open("x", None));
    assert_eq!(outcome.responses[0].code, ResponseCode::Ok);

    let outcome = store.handle(B, &req(0, Command::Read, "x"));
    assert_eq!(outcome.responses[0].code, ResponseCode::Ok);
    assert_eq!(outcome.responses[0].content, b"hello");
}

#[test]
fn scenario_3_lock_blocks_then_grants_on_unlock() {
    let mut store = store(2, 10, ReplacementPolicy::Lru);
    register(&mut store, A);
    register(&mut store, B);

    store.handle(A, &open("x", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    store.handle(A, &write("x", b"hello"));
    store.handle(B, &open("x", None));

    let outcome = store.handle(B, &req(0, Command::Lock, "x"));
    assert!(outcome.parked, "lock on a contended entry must park the request, not error");

    let outcome = store.handle(A, &req(0, Command::Unlock, "x"));
    assert_eq!(outcome.responses[0].code, ResponseCode::Ok);
    assert_eq!(outcome.deferred.len(), 1);
    assert_eq!(outcome.deferred[0].client, B);
    assert_eq!(outcome.deferred[0].response.code, ResponseCode::Ok);
}

#[test]
fn scenario_4_eviction_succeeds_once_victim_is_unlocked() {
    let mut store = store(2, 10, ReplacementPolicy::Lru);
    register(&mut store, A);
    register(&mut store, B);

    store.handle(A, &open("x", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    store.handle(A, &write("x", b"hello"));
    store.handle(B, &open("x", None));
    store.handle(B, &req(0, Command::Read, "x"));
    store.handle(A, &req(0, Command::Unlock, "x"));
    store.handle(B, &req(0, Command::Close, "x"));

    store.handle(A, &open("y", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    let outcome = store.handle(A, &write("y", b"world!"));

    assert_eq!(outcome.responses.len(), 2, "one EVICTED frame then the terminal OK");
    assert_eq!(outcome.responses[0].code, ResponseCode::Evicted);
    assert_eq!(outcome.responses[0].pathname, "x");
    assert_eq!(outcome.responses[0].content, b"hello");
    assert_eq!(outcome.responses[1].code, ResponseCode::Ok);

    assert_eq!(store.bytes_in_use(), 6);
    assert_eq!(store.files_in_use(), 1);
}

#[test]
fn scenario_4_eviction_fails_while_victim_still_locked() {
    let mut store = store(2, 10, ReplacementPolicy::Lru);
    register(&mut store, A);
    register(&mut store, B);

    store.handle(A, &open("x", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    store.handle(A, &write("x", b"hello"));
    store.handle(B, &open("x", None));
    store.handle(B, &req(0, Command::Read, "x"));
    store.handle(A, &req(0, Command::Unlock, "x"));
    // B never closes "x", so B remains its lock owner once it locks it below.
    store.handle(B, &req(0, Command::Lock, "x"));

    store.handle(A, &open("y", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    let outcome = store.handle(A, &write("y", b"world!"));

    assert_eq!(outcome.responses.len(), 1, "no partial eviction may be emitted");
    assert_eq!(outcome.responses[0].code, ResponseCode::FileTooLarge);

    // Store unchanged: "x" still present with its original content, "y" still empty.
    assert_eq!(store.bytes_in_use(), 5);
    assert_eq!(store.files_in_use(), 2);
}

#[test]
fn scenario_5_open_missing_file_not_found() {
    let mut store = store(2, 10, ReplacementPolicy::Lru);
    register(&mut store, C);

    let outcome = store.handle(C, &open("nope", None));
    assert_eq!(outcome.responses[0].code, ResponseCode::NotFound);
}

#[test]
fn scenario_6_write_without_lock_is_precondition_failed() {
    let mut store = store(2, 10, ReplacementPolicy::Lru);
    register(&mut store, D);

    let outcome = store.handle(D, &open("z", Some(OpenFlags::O_CREATE.bits())));
    assert_eq!(outcome.responses.last().unwrap().code, ResponseCode::Ok);

    let outcome = store.handle(D, &write("z", b"hi"));
    assert_eq!(outcome.responses[0].code, ResponseCode::PreconditionFailed);
}

#[test]
fn disconnect_promotes_next_waiter() {
    let mut store = store(4, 100, ReplacementPolicy::Lru);
    register(&mut store, A);
    register(&mut store, B);
    register(&mut store, C);

    store.handle(A, &open("f", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    store.handle(B, &open("f", None));
    store.handle(C, &open("f", None));

    let outcome = store.handle(B, &req(0, Command::Lock, "f"));
    assert!(outcome.parked);
    let outcome = store.handle(C, &req(0, Command::Lock, "f"));
    assert!(outcome.parked);

    let deferred = store.disconnect(A);
    assert_eq!(deferred.len(), 1);
    assert_eq!(deferred[0].client, B, "FIFO fairness: B arrived before C");
    assert_eq!(deferred[0].response.code, ResponseCode::Ok);
}

#[test]
fn fifo_replacement_evicts_oldest_creation_regardless_of_touch() {
    let mut store = store(2, 10, ReplacementPolicy::Fifo);
    register(&mut store, A);

    store.handle(A, &open("x", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    store.handle(A, &write("x", b"hello"));
    store.handle(A, &req(0, Command::Unlock, "x"));
    // Touch "x" via a read so its last_use_tick is newer than "y"'s creation -- FIFO must
    // still pick "x" first since it only consults creation_tick.
    store.handle(A, &open("x", None));
    store.handle(A, &req(0, Command::Read, "x"));

    store.handle(A, &open("y", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    let outcome = store.handle(A, &write("y", b"world!"));

    assert_eq!(outcome.responses[0].code, ResponseCode::Evicted);
    assert_eq!(outcome.responses[0].pathname, "x");
}

#[test]
fn lock_idempotent_for_current_owner() {
    let mut store = store(2, 10, ReplacementPolicy::Lru);
    register(&mut store, A);

    store.handle(A, &open("x", Some(OpenFlags::O_CREATE.bits())));
    let first = store.handle(A, &req(0, Command::Lock, "x"));
    assert_eq!(first.responses[0].code, ResponseCode::Ok);
    assert!(!first.parked);

    let second = store.handle(A, &req(0, Command::Lock, "x"));
    assert_eq!(second.responses[0].code, ResponseCode::Ok);
    assert!(!second.parked, "re-locking by the current owner must not block");
}

#[test]
fn read_n_emits_all_then_end_sentinel() {
    let mut store = store(10, 1000, ReplacementPolicy::Fifo);
    register(&mut store, A);

    for name in ["a", "b", "c"] {
        store.handle(A, &open(name, Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
        store.handle(A, &write(name, b"x"));
        store.handle(A, &req(0, Command::Unlock, name));
    }

    let mut r = req(0, Command::ReadN, "");
    r.read_n = -1;
    let outcome = store.handle(A, &r);

    assert_eq!(outcome.responses.len(), 4, "3 files plus the END sentinel");
    assert_eq!(outcome.responses[3].code, ResponseCode::End);
    let names: Vec<&str> = outcome.responses[..3].iter().map(|r| r.pathname.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"], "FIFO replacement order, oldest first");
}

#[test]
fn read_n_skips_entries_locked_by_another_client() {
    let mut store = store(10, 1000, ReplacementPolicy::Fifo);
    register(&mut store, A);
    register(&mut store, B);

    store.handle(A, &open("locked", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    store.handle(A, &write("locked", b"x"));
    store.handle(B, &open("visible", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    store.handle(B, &write("visible", b"y"));
    store.handle(B, &req(0, Command::Unlock, "visible"));

    let mut r = req(0, Command::ReadN, "");
    r.read_n = -1;
    let outcome = store.handle(B, &r);

    let names: Vec<&str> = outcome.responses[..outcome.responses.len() - 1]
        .iter()
        .map(|r| r.pathname.as_str())
        .collect();
    assert_eq!(names, vec!["visible"], "B does not hold \"locked\"'s lock, so it is skipped");
}

#[test]
fn remove_requires_lock_ownership() {
    let mut store = store(2, 10, ReplacementPolicy::Lru);
    register(&mut store, A);
    register(&mut store, B);

    store.handle(A, &open("x", Some(OpenFlags::O_CREATE.bits())));
    let outcome = store.handle(B, &req(0, Command::Remove, "x"));
    assert_eq!(outcome.responses[0].code, ResponseCode::NotLockedByCaller);

    store.handle(A, &req(0, Command::Lock, "x"));
    let outcome = store.handle(A, &req(0, Command::Remove, "x"));
    assert_eq!(outcome.responses[0].code, ResponseCode::Ok);
    assert_eq!(store.files_in_use(), 0);
}

#[test]
fn invariants_hold_after_a_mixed_sequence() {
    let mut store = store(3, 20, ReplacementPolicy::Lru);
    register(&mut store, A);
    register(&mut store, B);

    store.handle(A, &open("a", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    store.handle(A, &write("a", b"12345"));
    store.handle(A, &req(0, Command::Unlock, "a"));
    store.handle(B, &open("b", Some((OpenFlags::O_CREATE | OpenFlags::O_LOCK).bits())));
    store.handle(B, &write("b", b"67890"));

    assert!(store.files_in_use() <= 3);
    assert!(store.bytes_in_use() <= 20);
    assert_eq!(store.files_in_use(), 2);
    assert_eq!(store.bytes_in_use(), 10);
}
