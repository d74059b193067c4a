//! Typed errors for the server core (spec.md §4.9, §7).
//!
//! Three error classes, three different blast radii: a [`RequestError`] never outlives the
//! request that caused it (it becomes a [`crate::wire::ResponseCode`]); a [`FramingError`]
//! tears down the one connection it was read on; a process-fatal invariant violation is not
//! modeled as a `Result` at all — it is logged and the process aborts, exactly as spec.md §7
//! requires ("they indicate a bug, not a client error").

use crate::wire::constants::ResponseCode;
use std::fmt;

/// Per-request error. Maps 1:1 onto a [`ResponseCode`] and never closes the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    NotFound,
    AlreadyExists,
    LockedByOther,
    NotOpen,
    NotLockedByCaller,
    PreconditionFailed,
    FileTooLarge,
    Removed,
}

impl RequestError {
    pub fn code(self) -> ResponseCode {
        match self {
            RequestError::NotFound => ResponseCode::NotFound,
            RequestError::AlreadyExists => ResponseCode::AlreadyExists,
            RequestError::LockedByOther => ResponseCode::LockedByOther,
            RequestError::NotOpen => ResponseCode::NotOpen,
            RequestError::NotLockedByCaller => ResponseCode::NotLockedByCaller,
            RequestError::PreconditionFailed => ResponseCode::PreconditionFailed,
            RequestError::FileTooLarge => ResponseCode::FileTooLarge,
            RequestError::Removed => ResponseCode::Removed,
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestError::NotFound => "no such file",
            RequestError::AlreadyExists => "file already exists",
            RequestError::LockedByOther => "file is locked by another client",
            RequestError::NotOpen => "file is not open by this client",
            RequestError::NotLockedByCaller => "caller does not hold the lock",
            RequestError::PreconditionFailed => "write precondition not satisfied",
            RequestError::FileTooLarge => "file does not fit even after eviction",
            RequestError::Removed => "file was removed while waiting",
        };
        f.write_str(s)
    }
}

impl std::error::Error for RequestError {}

/// Connection-fatal framing error: short read/write, EOF mid-frame, or a malformed record.
/// Closes the one connection it was observed on; never touches the store.
#[derive(Debug)]
pub enum FramingError {
    ReadShort { wanted: usize, got: usize },
    WriteShort { wanted: usize, got: usize },
    Eof,
    Malformed(crate::wire::request::DecodeError),
    Io(std::io::Error),
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::ReadShort { wanted, got } => {
                write!(f, "short read: wanted {wanted} bytes, got {got}")
            }
            FramingError::WriteShort { wanted, got } => {
                write!(f, "short write: wanted {wanted} bytes, wrote {got}")
            }
            FramingError::Eof => write!(f, "connection closed by peer"),
            FramingError::Malformed(e) => write!(f, "malformed frame: {e}"),
            FramingError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for FramingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FramingError::Io(e) => Some(e),
            FramingError::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FramingError {
    fn from(e: std::io::Error) -> Self {
        FramingError::Io(e)
    }
}

/// Top-level server error, used by configuration and startup paths (spec.md §4.7).
#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Bind(std::io::Error),
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(msg) => write!(f, "configuration error: {msg}"),
            ServerError::Bind(e) => write!(f, "failed to bind listening socket: {e}"),
            ServerError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind(e) | ServerError::Io(e) => Some(e),
            ServerError::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Io(e)
    }
}

/// Panics after logging a full state dump. Called when a store-invariant check fails at
/// runtime — spec.md §7 requires this to be fatal, since it means a bug, not a client error.
#[track_caller]
pub fn fatal_invariant_violation(detail: &str) -> ! {
    log::error!("store invariant violated: {detail}");
    panic!("store invariant violated: {detail}");
}
