//! Signal handling thread (spec.md §5).
//!
//! The teacher's codebase has no signal-handling precedent of its own — FUSE sessions are torn
//! down by unmount, never by a signal — so this module is grounded instead on `nix`'s
//! process/signal feature set (already in the dependency table for exactly this purpose) and
//! on the conventional `sigprocmask` + `sigwait` pattern: block the signals process-wide so the
//! default disposition never fires on a random thread, then have one dedicated thread sit in
//! `sigwait` and translate deliveries into ordinary channel messages the rest of the server
//! already knows how to select on.

use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use nix::sys::signal::{SigSet, SigmaskHow, Signal};

/// What a delivered signal means to the rest of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// `SIGINT`/`SIGQUIT`: drain in-flight work and shut down (spec.md §5).
    Shutdown,
    /// `SIGHUP`: dump current statistics and keep running.
    StatsDump,
}

fn watched_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set.add(Signal::SIGQUIT);
    set.add(Signal::SIGHUP);
    set
}

/// Block `SIGINT`/`SIGQUIT`/`SIGHUP` on the calling thread's mask. Must be called on the main
/// thread before any worker threads are spawned, since the blocked mask is inherited by every
/// thread `std::thread::spawn` creates afterwards — only the dedicated signal thread should
/// ever observe these signals, via `sigwait`.
pub fn block_handled_signals() -> nix::Result<()> {
    let set = watched_set();
    nix::sys::signal::sigprocmask(SigmaskHow::SIG_BLOCK, Some(&set), None)?;
    Ok(())
}

/// Spawn the dedicated signal-handling thread. Blocks in `sigwait` on the set established by
/// [`block_handled_signals`] and forwards each delivery as a [`SignalEvent`] until the channel's
/// receiver is dropped (at which point `send` fails and the thread exits).
pub fn spawn(tx: Sender<SignalEvent>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("fcached-signals".to_owned())
        .spawn(move || {
            let set = watched_set();
            loop {
                let signal = match set.wait() {
                    Ok(s) => s,
                    Err(e) => {
                        log::warn!("sigwait failed: {e}");
                        continue;
                    }
                };
                let event = match signal {
                    Signal::SIGINT | Signal::SIGQUIT => SignalEvent::Shutdown,
                    Signal::SIGHUP => SignalEvent::StatsDump,
                    other => {
                        log::debug!("ignoring unexpected signal {other:?}");
                        continue;
                    }
                };
                let is_shutdown = event == SignalEvent::Shutdown;
                if tx.send(event).is_err() {
                    return;
                }
                if is_shutdown {
                    return;
                }
            }
        })
        .expect("failed to spawn signal-handling thread")
}
