//! Full-stack tests: a real `Acceptor` + worker pool bound to a temporary Unix socket, driven
//! by the actual [`fcached::client::Connection`] thin wrapper (spec.md §4.5, §4.6, §6).

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use fcached::client::Connection;
use fcached::store::{ReplacementPolicy, Store};
use fcached::wire::OpenFlags;
use fcached::worker::{acceptor::Acceptor, pool, ReturnEvent};

struct TestServer {
    shutdown: fcached::worker::acceptor::ShutdownHandle,
    socket_path: std::path::PathBuf,
    acceptor_thread: Option<std::thread::JoinHandle<()>>,
    workers: Vec<std::thread::JoinHandle<()>>,
    _tmp: TempDir,
}

impl TestServer {
    fn start(max_files: u64, max_bytes: u64) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let socket_path = tmp.path().join("fcached.sock");
        let log_path = tmp.path().join("ops.log");

        let store = Arc::new(Mutex::new(Store::new(max_files, max_bytes, 256, 1 << 20, ReplacementPolicy::Lru)));
        let op_log = Arc::new(fcached::logging::OperationLog::open(&log_path).unwrap());

        let acceptor = Acceptor::bind(&socket_path).unwrap();
        let shutdown = acceptor.shutdown_handle();

        let queue = pool::WorkQueue::new();
        let (return_tx, return_rx) = mpsc::channel::<ReturnEvent>();
        let workers = pool::spawn_workers(2, queue.clone(), store.clone(), op_log, return_tx);

        let acceptor_thread = std::thread::spawn(move || acceptor.run(store, queue, return_rx));

        // Give the acceptor a moment to start polling before the first connect.
        std::thread::sleep(Duration::from_millis(50));

        TestServer { shutdown, socket_path, acceptor_thread: Some(acceptor_thread), workers, _tmp: tmp }
    }

    fn connect(&self, pid: u32) -> Connection {
        Connection::open(&self.socket_path, pid).expect("client connect")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
        if let Some(t) = self.acceptor_thread.take() {
            let _ = t.join();
        }
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
    }
}

#[test]
fn write_then_read_round_trips_over_the_real_socket() {
    let server = TestServer::start(4, 1024);
    let mut writer = server.connect(1);

    writer.open_file("greeting", OpenFlags::O_CREATE | OpenFlags::O_LOCK).unwrap();
    writer.write_file("greeting", b"hello, world".to_vec()).unwrap();

    let mut reader = server.connect(2);
    reader.open_file("greeting", OpenFlags::empty()).unwrap();
    let content = reader.read_file("greeting").unwrap();
    assert_eq!(content, b"hello, world");
}

#[test]
fn lock_blocks_across_connections_until_unlocked() {
    let server = TestServer::start(4, 1024);
    let mut owner = server.connect(1);
    owner.open_file("shared", OpenFlags::O_CREATE | OpenFlags::O_LOCK).unwrap();
    owner.write_file("shared", b"v1".to_vec()).unwrap();

    let socket_path = server.socket_path.clone();
    let waiter_thread = std::thread::spawn(move || {
        let mut waiter = Connection::open(&socket_path, 2).unwrap();
        waiter.open_file("shared", OpenFlags::empty()).unwrap();
        waiter.lock_file("shared").unwrap();
        waiter.read_file("shared").unwrap()
    });

    // Give the waiter time to park on the lock before releasing it.
    std::thread::sleep(Duration::from_millis(100));
    owner.unlock_file("shared").unwrap();

    let content = waiter_thread.join().unwrap();
    assert_eq!(content, b"v1");
}

#[test]
fn eviction_streams_evicted_content_back_to_the_admitting_client() {
    let server = TestServer::start(2, 10);
    let mut client = server.connect(1);

    client.open_file("x", OpenFlags::O_CREATE | OpenFlags::O_LOCK).unwrap();
    client.write_file("x", b"hello".to_vec()).unwrap();
    client.unlock_file("x").unwrap();

    client.open_file("y", OpenFlags::O_CREATE | OpenFlags::O_LOCK).unwrap();
    let evicted = client.write_file("y", b"world!".to_vec()).unwrap();

    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].pathname, "x");
    assert_eq!(evicted[0].content, b"hello");
}

#[test]
fn disconnect_releases_the_lock_for_the_next_client() {
    let server = TestServer::start(4, 1024);
    {
        let mut owner = server.connect(1);
        owner.open_file("f", OpenFlags::O_CREATE | OpenFlags::O_LOCK).unwrap();
        owner.write_file("f", b"data".to_vec()).unwrap();
        // owner dropped here without unlocking; Drop closes the socket.
    }

    std::thread::sleep(Duration::from_millis(100));

    let mut next = server.connect(2);
    next.open_file("f", OpenFlags::O_LOCK).unwrap();
    next.remove_file("f").unwrap();
}

#[test]
fn read_n_files_lists_every_unlocked_entry() {
    let server = TestServer::start(10, 1024);
    let mut client = server.connect(1);

    for name in ["a", "b", "c"] {
        client.open_file(name, OpenFlags::O_CREATE | OpenFlags::O_LOCK).unwrap();
        client.write_file(name, name.as_bytes().to_vec()).unwrap();
        client.unlock_file(name).unwrap();
    }

    let files = client.read_n_files(0).unwrap();
    let mut names: Vec<&str> = files.iter().map(|(p, _)| p.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b", "c"]);
}
