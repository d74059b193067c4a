//! Top-level orchestration: wires configuration, the shared store, the operation log, the
//! worker pool, the acceptor, and the signal thread together into one running server
//! (spec.md §4.5, §5, §6).

use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::logging::OperationLog;
use crate::signals::{self, SignalEvent};
use crate::store::Store;
use crate::worker::{acceptor::Acceptor, pool, ReturnEvent};

/// The one lock every thread in the process reaches through to touch the file table
/// (spec.md §9 "single coarse lock").
pub type SharedStore = Arc<Mutex<Store>>;

/// A running server: the join handles and shutdown plumbing `run` needs to bring everything
/// down cleanly when asked.
pub struct Server {
    config: ServerConfig,
    store: SharedStore,
    op_log: Arc<OperationLog>,
}

impl Server {
    /// Build the shared store and open the operation log, but do not bind or spawn anything yet.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let store = Arc::new(Mutex::new(Store::new(
            config.max_files,
            config.max_bytes,
            config.max_pathname,
            config.max_characters,
            config.replacement_policy,
        )));
        let op_log = Arc::new(OperationLog::open(&config.log_path)?);

        Ok(Server { config, store, op_log })
    }

    /// Bind the socket, spawn the worker pool and the signal thread, then block until a
    /// shutdown signal arrives or the acceptor loop exits on its own.
    pub fn run(self) -> Result<(), ServerError> {
        signals::block_handled_signals()
            .map_err(|e| ServerError::Io(std::io::Error::from(e)))?;

        let acceptor = Acceptor::bind(&self.config.socket_path)?;
        let shutdown = acceptor.shutdown_handle();

        let queue = pool::WorkQueue::new();
        let (return_tx, return_rx) = mpsc::channel::<ReturnEvent>();
        let workers = pool::spawn_workers(
            self.config.workers,
            queue.clone(),
            self.store.clone(),
            self.op_log.clone(),
            return_tx,
        );

        let (signal_tx, signal_rx) = mpsc::channel::<SignalEvent>();
        let signal_thread = signals::spawn(signal_tx);

        let store_for_acceptor = self.store.clone();
        let acceptor_thread = std::thread::Builder::new()
            .name("fcached-acceptor".to_owned())
            .spawn(move || acceptor.run(store_for_acceptor, queue, return_rx))
            .expect("failed to spawn acceptor thread");

        loop {
            match signal_rx.recv() {
                Ok(SignalEvent::StatsDump) => {
                    let store = self.store.lock();
                    log::info!(
                        "stats: files_in_use={} bytes_in_use={} {}",
                        store.files_in_use(),
                        store.bytes_in_use(),
                        store.stats().summary(),
                    );
                }
                Ok(SignalEvent::Shutdown) | Err(_) => break,
            }
        }

        shutdown.trigger();
        let _ = acceptor_thread.join();
        for worker in workers {
            let _ = worker.join();
        }
        let _ = signal_thread.join();

        let _ = std::fs::remove_file(&self.config.socket_path);

        log::info!(
            "shutdown complete: final stats {}",
            self.store.lock().stats().summary(),
        );

        Ok(())
    }
}
