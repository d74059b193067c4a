//! The bounded work queue and the fixed pool of worker threads that drain it (spec.md §4.5).
//!
//! The queue itself is modeled directly on the teacher's `MtState`/`MtStateInner` bookkeeping
//! in `session_mt.rs`: a plain struct behind one `std::sync::Mutex`, signaled by one
//! `std::sync::Condvar`, with `thread::Builder::new().name(...)` spawning each worker exactly
//! as `session_mt.rs`'s `start_worker` does. Unlike the teacher's dynamic on-demand thread
//! growth, this pool is fixed-size per spec.md §4.5 ("a fixed set of OS-thread workers").

use std::collections::VecDeque;
use std::os::fd::RawFd;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::logging::OperationLog;
use crate::server::SharedStore;

use super::dispatch::{self, ReturnEvent};

struct Inner {
    queue: VecDeque<RawFd>,
    shutdown: bool,
}

/// FIFO of client fds that became readable and are awaiting a worker.
pub struct WorkQueue {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl WorkQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(WorkQueue {
            inner: Mutex::new(Inner { queue: VecDeque::new(), shutdown: false }),
            cond: Condvar::new(),
        })
    }

    pub fn push(&self, fd: RawFd) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.push_back(fd);
        self.cond.notify_one();
    }

    /// Wake every idle worker with no more work; each returns `None` from `pop` and exits.
    pub fn shut_down(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.shutdown = true;
        self.cond.notify_all();
    }

    fn pop(&self) -> Option<RawFd> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(fd) = inner.queue.pop_front() {
                return Some(fd);
            }
            if inner.shutdown {
                return None;
            }
            inner = self.cond.wait(inner).unwrap();
        }
    }
}

/// Spawn `count` worker threads, each looping on `queue.pop()` until shutdown.
pub fn spawn_workers(
    count: usize,
    queue: Arc<WorkQueue>,
    store: SharedStore,
    op_log: Arc<OperationLog>,
    return_tx: Sender<ReturnEvent>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|id| {
            let queue = queue.clone();
            let store = store.clone();
            let op_log = op_log.clone();
            let return_tx = return_tx.clone();
            thread::Builder::new()
                .name(format!("fcached-worker-{id}"))
                .spawn(move || {
                    while let Some(fd) = queue.pop() {
                        dispatch::handle_connection(&store, &op_log, fd, &return_tx);
                    }
                })
                .expect("failed to spawn worker thread")
        })
        .collect()
}
