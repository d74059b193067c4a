//! A minimal synchronous thin-wrapper client library (spec.md §1 "external collaborators",
//! SPEC_FULL.md §2 item 10).
//!
//! This mirrors the documented C header's call surface in spirit — one function per request
//! kind, each marshaling a [`Request`] and awaiting its [`Response`](s) — but owns none of the
//! policy the server enforces. It does not parse a config file or CLI flags (that stays out of
//! scope per spec.md §1); callers pass a socket path and a pid label directly. It also does not
//! write evicted files to a directory itself: callers receive `EvictedFile` values and decide
//! what to do with them, matching the "client writes them to a directory" note in spec.md §1,
//! which describes behavior layered *above* this library, not inside it.

use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;

use nix::sys::socket::{connect, socket, AddressFamily, SockFlag, SockType, UnixAddr};

use crate::wire::{codec, Command, OpenFlags, Request, ResponseCode};

/// Errors the client library surfaces. Wraps the connection-fatal framing error and every
/// non-OK response code the server can return, plus `EOF` for an unexpectedly closed socket.
#[derive(Debug)]
pub enum ClientError {
    /// The connection was lost or a frame could not be exchanged.
    Framing(crate::error::FramingError),
    /// The socket was closed by the server before a response arrived.
    Disconnected,
    /// The server answered with a non-`OK` status.
    Status(ResponseCode),
    /// The underlying `connect(2)` call failed.
    Connect(std::io::Error),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Framing(e) => write!(f, "{e}"),
            ClientError::Disconnected => write!(f, "server closed the connection"),
            ClientError::Status(code) => write!(f, "server returned {code:?}"),
            ClientError::Connect(e) => write!(f, "connect failed: {e}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<crate::error::FramingError> for ClientError {
    fn from(e: crate::error::FramingError) -> Self {
        ClientError::Framing(e)
    }
}

/// A file evicted to make room for an admission, streamed back to the admitting client ahead
/// of its terminal response (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct EvictedFile {
    pub pathname: String,
    pub content: Vec<u8>,
}

/// One open connection to the server. Not `Clone` or `Sync`: one socket, one in-flight request
/// at a time, exactly like the documented C API (one blocking call per operation).
#[derive(Debug)]
pub struct Connection {
    fd: RawFd,
    pid: u32,
}

impl Connection {
    /// Connect to the server listening on `socket_path`. `pid` is carried on every request as
    /// an advisory label only (see the Open Questions resolution in SPEC_FULL.md §9); the
    /// server never uses it for authorization.
    pub fn open(socket_path: &Path, pid: u32) -> Result<Self, ClientError> {
        let sock = socket(AddressFamily::Unix, SockType::Stream, SockFlag::empty(), None)
            .map_err(|e| ClientError::Connect(std::io::Error::from(e)))?;
        let fd = std::os::fd::IntoRawFd::into_raw_fd(sock);
        let addr = UnixAddr::new(socket_path).map_err(|e| ClientError::Connect(std::io::Error::from(e)))?;
        connect(fd, &addr).map_err(|e| ClientError::Connect(std::io::Error::from(e)))?;
        Ok(Connection { fd, pid })
    }

    fn roundtrip(&self, req: Request) -> Result<Vec<crate::wire::Response>, ClientError> {
        codec::write_request(self.fd, &req, -1)?;
        let mut responses = Vec::new();
        loop {
            let response = codec::read_response(self.fd)?.ok_or(ClientError::Disconnected)?;
            let terminal = !matches!(response.code, ResponseCode::Evicted);
            responses.push(response);
            if terminal {
                break;
            }
        }
        Ok(responses)
    }

    fn simple(&self, req: Request) -> Result<(), ClientError> {
        let responses = self.roundtrip(req)?;
        let last = responses.last().expect("roundtrip always yields at least one response");
        match last.code {
            ResponseCode::Ok => Ok(()),
            other => Err(ClientError::Status(other)),
        }
    }

    fn split_evictions(responses: Vec<crate::wire::Response>) -> (Vec<EvictedFile>, crate::wire::Response) {
        let mut evicted = Vec::new();
        let mut iter = responses.into_iter().peekable();
        let mut terminal = None;
        while let Some(response) = iter.next() {
            if iter.peek().is_some() {
                evicted.push(EvictedFile { pathname: response.pathname, content: response.content });
            } else {
                terminal = Some(response);
            }
        }
        (evicted, terminal.expect("roundtrip always yields a terminal response"))
    }

    fn base_request(&self, cmd: Command, pathname: &str) -> Request {
        Request {
            pid: self.pid,
            cmd,
            pathname: pathname.to_owned(),
            flags: None,
            content: Vec::new(),
            read_n: -1,
        }
    }

    /// `openFile(pathname, flags)`: `flags` combines [`OpenFlags::O_CREATE`] and
    /// [`OpenFlags::O_LOCK`] (spec.md §4.2). A creating open counts against the file-count
    /// capacity just like `write`/`append`, so it may itself evict victims to make room;
    /// those are returned the same way a `write_file`/`append_to_file` eviction is.
    pub fn open_file(&mut self, pathname: &str, flags: OpenFlags) -> Result<Vec<EvictedFile>, ClientError> {
        let mut req = self.base_request(Command::Open, pathname);
        req.flags = Some(flags.bits());
        let responses = self.roundtrip(req)?;
        let (evicted, terminal) = Self::split_evictions(responses);
        match terminal.code {
            ResponseCode::Ok => Ok(evicted),
            other => Err(ClientError::Status(other)),
        }
    }

    /// `closeFile(pathname)`.
    pub fn close_file(&mut self, pathname: &str) -> Result<(), ClientError> {
        self.simple(self.base_request(Command::Close, pathname))
    }

    /// `readFile(pathname)`: returns the file's full content (spec.md §4.2 `read`).
    pub fn read_file(&mut self, pathname: &str) -> Result<Vec<u8>, ClientError> {
        let responses = self.roundtrip(self.base_request(Command::Read, pathname))?;
        let response = responses.into_iter().next().expect("roundtrip always yields a response");
        match response.code {
            ResponseCode::Ok => Ok(response.content),
            other => Err(ClientError::Status(other)),
        }
    }

    /// `readNFiles(n)`: up to `n` files in replacement order (all if `n <= 0`), skipping
    /// entries locked by another client (spec.md §4.2 `readN`).
    pub fn read_n_files(&mut self, n: i64) -> Result<Vec<(String, Vec<u8>)>, ClientError> {
        let mut req = self.base_request(Command::ReadN, "");
        req.read_n = n;
        codec::write_request(self.fd, &req, -1)?;

        let mut files = Vec::new();
        loop {
            let response = codec::read_response(self.fd)?.ok_or(ClientError::Disconnected)?;
            match response.code {
                ResponseCode::End => break,
                ResponseCode::Ok => files.push((response.pathname, response.content)),
                other => return Err(ClientError::Status(other)),
            }
        }
        Ok(files)
    }

    /// `writeFile(pathname, content)`: only valid immediately after
    /// `openFile(pathname, O_CREATE|O_LOCK)` (spec.md §4.2 write precondition). Returns any
    /// files evicted to make room, in the order the server selected them.
    pub fn write_file(&mut self, pathname: &str, content: Vec<u8>) -> Result<Vec<EvictedFile>, ClientError> {
        let mut req = self.base_request(Command::Write, pathname);
        req.content = content;
        let responses = self.roundtrip(req)?;
        let (evicted, terminal) = Self::split_evictions(responses);
        match terminal.code {
            ResponseCode::Ok => Ok(evicted),
            other => Err(ClientError::Status(other)),
        }
    }

    /// `appendToFile(pathname, content)`: appends to the currently open, non-conflicting-locked
    /// file (spec.md §4.2 `append`). Returns any files evicted to make room.
    pub fn append_to_file(&mut self, pathname: &str, content: Vec<u8>) -> Result<Vec<EvictedFile>, ClientError> {
        let mut req = self.base_request(Command::Append, pathname);
        req.content = content;
        let responses = self.roundtrip(req)?;
        let (evicted, terminal) = Self::split_evictions(responses);
        match terminal.code {
            ResponseCode::Ok => Ok(evicted),
            other => Err(ClientError::Status(other)),
        }
    }

    /// `lockFile(pathname)`: blocks until the lock is granted or the connection is closed.
    /// Idempotent if this connection already holds the lock (spec.md §4.4).
    pub fn lock_file(&mut self, pathname: &str) -> Result<(), ClientError> {
        self.simple(self.base_request(Command::Lock, pathname))
    }

    /// `unlockFile(pathname)`.
    pub fn unlock_file(&mut self, pathname: &str) -> Result<(), ClientError> {
        self.simple(self.base_request(Command::Unlock, pathname))
    }

    /// `removeFile(pathname)`: caller must hold the lock (spec.md §4.2 `remove`).
    pub fn remove_file(&mut self, pathname: &str) -> Result<(), ClientError> {
        self.simple(self.base_request(Command::Remove, pathname))
    }

    /// `closeConnection()`: shut the socket down. Any locks this connection held are released
    /// by the server's disconnect teardown (spec.md §4.6).
    pub fn close(self) -> std::io::Result<()> {
        let result = nix::unistd::close(self.fd).map_err(std::io::Error::from);
        std::mem::forget(self);
        result
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = nix::unistd::close(self.fd);
    }
}
