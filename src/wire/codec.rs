//! Framed-complete I/O over a raw file descriptor (spec.md §4.1).
//!
//! Reads and writes loop until the requested byte count is satisfied. A short read that
//! hits EOF, or a short write, is connection-fatal: it is reported as a [`FramingError`]
//! and the caller tears the connection down. This mirrors the ABI layer's own receive loop,
//! which treats a partial kernel read as fatal to that channel rather than something to retry
//! field-by-field.

use std::os::unix::io::RawFd;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::FramingError;
use crate::wire::request::{DecodeError, RawRequest, Request};
use crate::wire::response::{RawResponse, Response};

/// Read exactly `buf.len()` bytes from `fd`, retrying on `EINTR`.
///
/// Returns `Ok(false)` if the peer closed the connection before a single byte was read
/// (clean EOF at a frame boundary) — this is the normal way a client disconnects, not an
/// error. Any other partial read is a [`FramingError::ReadShort`].
fn read_exact_fd(fd: RawFd, buf: &mut [u8]) -> Result<bool, FramingError> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match nix::unistd::read(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, &mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(FramingError::ReadShort { wanted: buf.len(), got: filled });
            }
            Ok(n) => filled += n,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(FramingError::Io(std::io::Error::from(e))),
        }
    }
    Ok(true)
}

/// Write exactly `buf` to `fd`, retrying on `EINTR`.
fn write_all_fd(fd: RawFd, buf: &[u8]) -> Result<(), FramingError> {
    let mut written = 0usize;
    while written < buf.len() {
        match nix::unistd::write(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, &buf[written..]) {
            Ok(0) => return Err(FramingError::WriteShort { wanted: buf.len(), got: written }),
            Ok(n) => written += n,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(FramingError::Io(std::io::Error::from(e))),
        }
    }
    Ok(())
}

fn as_bytes_mut<T: FromBytes + IntoBytes + KnownLayout + Immutable>(value: &mut T) -> &mut [u8] {
    value.as_mut_bytes()
}

/// Read one complete `Request` frame from `fd`. `Ok(None)` signals a clean disconnect at a
/// frame boundary (not an error); any decode failure after a full frame was read is reported
/// as [`FramingError::Malformed`] since a malformed record is just as fatal to the connection
/// as a short read.
pub fn read_request(
    fd: RawFd,
    max_pathname: usize,
    max_characters: usize,
) -> Result<Option<Request>, FramingError> {
    let mut raw = RawRequest::empty();
    if !read_exact_fd(fd, as_bytes_mut(&mut raw))? {
        return Ok(None);
    }
    Request::decode(&raw, max_pathname, max_characters)
        .map(Some)
        .map_err(FramingError::Malformed)
}

/// Write one complete `Response` frame to `fd`.
pub fn write_response(fd: RawFd, response: &Response) -> Result<(), FramingError> {
    let raw: RawResponse = response.encode().map_err(FramingError::Malformed)?;
    write_all_fd(fd, raw.as_bytes())
}

/// Encode-and-write error path shared by the client library when it composes a request.
pub fn write_request(fd: RawFd, request: &Request, fd_client: i32) -> Result<(), FramingError> {
    let raw: RawRequest = request.encode(fd_client).map_err(FramingError::Malformed)?;
    write_all_fd(fd, raw.as_bytes())
}

/// Read one complete `Response` frame from `fd`. Used by the client library.
pub fn read_response(fd: RawFd) -> Result<Option<Response>, FramingError> {
    let mut raw = RawResponse::empty();
    if !read_exact_fd(fd, as_bytes_mut(&mut raw))? {
        return Ok(None);
    }
    Response::decode(&raw).map(Some).map_err(FramingError::Malformed)
}

impl From<DecodeError> for FramingError {
    fn from(e: DecodeError) -> Self {
        FramingError::Malformed(e)
    }
}
