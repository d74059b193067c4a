//! The single acceptor thread (spec.md §4.5): owns the listening socket and the `nix::poll`
//! readiness set, so exactly one thread ever touches it. Mirrors the teacher's
//! single-thread-owns-the-channel design in `session.rs`/`session_mt.rs` (there it's the FUSE
//! device fd fanning requests out to worker channels; here it's a Unix stream socket fanning
//! client fds out to the work queue). The socket/poll calls themselves have no teacher
//! precedent — FUSE sessions never bind a socket — so they follow conventional `nix` usage,
//! noted in DESIGN.md.

use std::os::fd::{BorrowedFd, RawFd};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::socket::{accept, bind, listen, socket, AddressFamily, Backlog, SockFlag, SockType, UnixAddr};
use nix::unistd::{close, pipe, read, write};

use crate::error::ServerError;
use crate::server::SharedStore;
use crate::store::ClientId;

use super::dispatch::ReturnEvent;
use super::pool::WorkQueue;

/// A handle the signal thread uses to interrupt a blocked acceptor loop (spec.md §5).
#[derive(Clone, Copy)]
pub struct ShutdownHandle {
    wakeup_write: RawFd,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        let fd = unsafe { BorrowedFd::borrow_raw(self.wakeup_write) };
        let _ = write(fd, &[1u8]);
    }
}

pub struct Acceptor {
    listen_fd: RawFd,
    wakeup_read: RawFd,
    wakeup_write: RawFd,
}

impl Acceptor {
    /// Bind the listening socket, removing a stale socket file left over from a previous run
    /// (spec.md §6 "The server removes a stale socket file on startup and on clean shutdown").
    pub fn bind(socket_path: &Path) -> Result<Self, ServerError> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .map_err(|e| ServerError::Bind(e))?;
        }

        let fd = socket(AddressFamily::Unix, SockType::Stream, SockFlag::empty(), None)
            .map_err(|e| ServerError::Bind(std::io::Error::from(e)))?;
        let raw_listen = std::os::fd::IntoRawFd::into_raw_fd(fd);

        let addr = UnixAddr::new(socket_path).map_err(|e| ServerError::Bind(std::io::Error::from(e)))?;
        bind(raw_listen, &addr).map_err(|e| ServerError::Bind(std::io::Error::from(e)))?;
        let backlog = Backlog::new(128).unwrap_or(Backlog::new(16).expect("16 is a valid backlog"));
        listen(unsafe { &BorrowedFd::borrow_raw(raw_listen) }, backlog)
            .map_err(|e| ServerError::Bind(std::io::Error::from(e)))?;

        let (read_end, write_end) = pipe().map_err(|e| ServerError::Bind(std::io::Error::from(e)))?;
        let wakeup_read = std::os::fd::IntoRawFd::into_raw_fd(read_end);
        let wakeup_write = std::os::fd::IntoRawFd::into_raw_fd(write_end);

        Ok(Acceptor { listen_fd: raw_listen, wakeup_read, wakeup_write })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { wakeup_write: self.wakeup_write }
    }

    /// Run the accept/poll loop until the self-pipe is written to. Blocking: call this from a
    /// thread dedicated to it.
    pub fn run(self, store: SharedStore, queue: Arc<WorkQueue>, return_rx: Receiver<ReturnEvent>) {
        let mut armed: Vec<RawFd> = Vec::new();

        'outer: loop {
            let listen_bf = unsafe { BorrowedFd::borrow_raw(self.listen_fd) };
            let wakeup_bf = unsafe { BorrowedFd::borrow_raw(self.wakeup_read) };
            let armed_bf: Vec<BorrowedFd> =
                armed.iter().map(|&fd| unsafe { BorrowedFd::borrow_raw(fd) }).collect();

            let mut pollfds: Vec<PollFd> = Vec::with_capacity(armed_bf.len() + 2);
            pollfds.push(PollFd::new(listen_bf, PollFlags::POLLIN));
            pollfds.push(PollFd::new(wakeup_bf, PollFlags::POLLIN));
            for bf in &armed_bf {
                pollfds.push(PollFd::new(*bf, PollFlags::POLLIN));
            }

            match poll(&mut pollfds, PollTimeout::from(200u16)) {
                Ok(_) => {}
                Err(Errno::EINTR) => continue 'outer,
                Err(e) => {
                    log::error!("poll() failed in acceptor loop: {e}");
                    break;
                }
            }

            if revents_has(&pollfds[1], PollFlags::POLLIN) {
                let mut buf = [0u8; 64];
                let _ = read(self.wakeup_read, &mut buf);
                break;
            }

            if revents_has(&pollfds[0], PollFlags::POLLIN) {
                if let Some(fd) = self.accept_one(&store) {
                    armed.push(fd);
                }
            }

            let mut still_armed = Vec::with_capacity(armed.len());
            for (i, &fd) in armed.iter().enumerate() {
                let pfd = &pollfds[2 + i];
                if revents_has(pfd, PollFlags::POLLIN)
                    || revents_has(pfd, PollFlags::POLLHUP)
                    || revents_has(pfd, PollFlags::POLLERR)
                {
                    queue.push(fd);
                } else {
                    still_armed.push(fd);
                }
            }
            armed = still_armed;

            while let Ok(event) = return_rx.try_recv() {
                match event {
                    ReturnEvent::Rearm(fd) => armed.push(fd),
                    ReturnEvent::Closed(_) => {}
                }
            }
        }

        queue.shut_down();
        let _ = close(self.listen_fd);
        let _ = close(self.wakeup_read);
        let _ = close(self.wakeup_write);
    }

    /// Accept one pending connection, registering it with the store under a placeholder pid
    /// (the real pid arrives on the first request body and is patched in then). Returns the new
    /// fd so the caller can arm it for the next poll iteration.
    fn accept_one(&self, store: &SharedStore) -> Option<RawFd> {
        match accept(self.listen_fd) {
            Ok(client_fd) => {
                store.lock().register_session(client_fd as ClientId, 0);
                Some(client_fd)
            }
            Err(Errno::EAGAIN) | Err(Errno::EWOULDBLOCK) | Err(Errno::EINTR) => None,
            Err(e) => {
                log::warn!("accept() failed: {e}");
                None
            }
        }
    }
}

fn revents_has(pfd: &PollFd, flag: PollFlags) -> bool {
    pfd.revents().is_some_and(|r| r.contains(flag))
}
