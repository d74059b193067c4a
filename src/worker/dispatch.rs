//! Per-connection handling, run on a worker thread: read one request, invoke the store, write
//! the response(s), then tell the acceptor what to do with the fd (spec.md §4.5, §4.9).

use std::os::fd::RawFd;
use std::sync::mpsc::Sender;
use std::time::Instant;

use crate::logging::{unix_millis_now, OperationLog, OperationLogRecord};
use crate::server::SharedStore;
use crate::store::ClientId;
use crate::wire::codec;
use crate::wire::ResponseCode;

/// What a worker wants the acceptor to do with an fd once it is done touching it.
#[derive(Debug, Clone, Copy)]
pub enum ReturnEvent {
    /// The connection is idle and awaiting its next request; re-arm it in the ready-set.
    Rearm(RawFd),
    /// The connection is gone; the fd has already been closed, stop tracking it.
    Closed(RawFd),
}

/// Read exactly one request from `fd`, dispatch it against the store, write the resulting
/// response(s), and report the fd's fate on `return_tx`. A worker that encounters EOF or a
/// framing error closes the fd itself and reports `Closed` rather than `Rearm`.
pub fn handle_connection(store: &SharedStore, op_log: &OperationLog, fd: RawFd, return_tx: &Sender<ReturnEvent>) {
    let (max_pathname, max_characters) = {
        let guard = store.lock();
        (guard.max_pathname(), guard.max_characters())
    };

    let request = match codec::read_request(fd, max_pathname, max_characters) {
        Ok(Some(req)) => req,
        Ok(None) => {
            teardown(store, fd, return_tx);
            return;
        }
        Err(e) => {
            log::warn!("closing connection fd={fd} after framing error: {e}");
            teardown(store, fd, return_tx);
            return;
        }
    };

    let started = Instant::now();
    let pid = request.pid;
    let cmd = request.cmd;
    let pathname = request.pathname.clone();
    let bytes_in = request.content.len() as u64;

    let outcome = store.lock().handle(fd as ClientId, &request);

    let mut bytes_out_total = 0u64;
    let mut last_code = ResponseCode::Internal;

    if outcome.parked {
        // The requester's own response is deferred; its fd stays out of the ready-set until a
        // later `unlock`/`close`/`remove` delivers it (spec.md §4.5 "Suspension points").
    } else {
        for response in &outcome.responses {
            bytes_out_total += response.content.len() as u64;
            last_code = response.code;
            if let Err(e) = codec::write_response(fd, response) {
                log::warn!("closing connection fd={fd} after write error: {e}");
                teardown(store, fd, return_tx);
                return;
            }
        }
        let _ = return_tx.send(ReturnEvent::Rearm(fd));
    }

    for deferred in outcome.deferred {
        if let Err(e) = codec::write_response(deferred.client, &deferred.response) {
            log::warn!("dropping waiter fd={} after write error: {e}", deferred.client);
            teardown(store, deferred.client, return_tx);
            continue;
        }
        let _ = return_tx.send(ReturnEvent::Rearm(deferred.client));
    }

    op_log.append(&OperationLogRecord {
        timestamp_unix_ms: unix_millis_now(),
        client_pid: pid,
        op: cmd,
        pathname,
        bytes_in,
        bytes_out: bytes_out_total,
        code: last_code,
        duration_us: started.elapsed().as_micros(),
    });
}

/// Release whatever this client held (as if it had called `unlock` on everything), deliver any
/// resulting promotions, close the fd, and tell the acceptor to forget it (spec.md §4.6).
fn teardown(store: &SharedStore, fd: RawFd, return_tx: &Sender<ReturnEvent>) {
    let deferred = store.lock().disconnect(fd as ClientId);
    for d in deferred {
        if let Err(e) = codec::write_response(d.client, &d.response) {
            log::warn!("dropping promoted waiter fd={} after write error: {e}", d.client);
            continue;
        }
        let _ = return_tx.send(ReturnEvent::Rearm(d.client));
    }
    let _ = nix::unistd::close(fd);
    let _ = return_tx.send(ReturnEvent::Closed(fd));
}
