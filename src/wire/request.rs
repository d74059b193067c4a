//! The fixed-layout request frame and its typed view.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::constants::{Command, MAX_CHARACTERS, MAX_PATHNAME, NO_FLAGS, NO_SIZE};

/// Raw, on-the-wire request record (spec.md §4.1).
///
/// `#[repr(C)]` plus the zerocopy traits let the codec read/write this struct as one
/// contiguous byte slice, the same technique the ABI layer this crate grew out of uses for
/// its own fixed-layout kernel records. Field order matters here: `size` (an `i64`, 8-byte
/// aligned) is placed directly after `pathname` so the struct has no interior padding — the
/// `zerocopy::IntoBytes` derive refuses any type whose layout contains padding bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawRequest {
    pub pid: u32,
    pub cmd: u8,
    _pad: [u8; 3],
    pub pathname: [u8; MAX_PATHNAME],
    /// `-1` when absent for most commands; doubles as the `N` argument of `readN`.
    pub size: i64,
    pub flags: i32,
    pub content: [u8; MAX_CHARACTERS],
    pub fd_client: i32,
}

impl RawRequest {
    pub(crate) fn empty() -> Self {
        RawRequest {
            pid: 0,
            cmd: 0,
            _pad: [0; 3],
            pathname: [0; MAX_PATHNAME],
            size: NO_SIZE,
            flags: NO_FLAGS,
            content: [0; MAX_CHARACTERS],
            fd_client: -1,
        }
    }
}

/// A decoded, validated request. Produced from a [`RawRequest`] by [`Request::decode`].
#[derive(Debug, Clone)]
pub struct Request {
    pub pid: u32,
    pub cmd: Command,
    pub pathname: String,
    pub flags: Option<i32>,
    /// Payload for `write`/`append`; empty for every other command.
    pub content: Vec<u8>,
    /// The `N` argument of `readN`; meaningless for every other command.
    pub read_n: i64,
}

/// Errors produced while decoding a raw frame into a logical [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnknownCommand(u8),
    InvalidPathname,
    PathnameTooLong,
    SizeOutOfRange,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnknownCommand(c) => write!(f, "unknown command code {c}"),
            DecodeError::InvalidPathname => write!(f, "pathname is not valid UTF-8"),
            DecodeError::PathnameTooLong => write!(f, "pathname exceeds the configured limit"),
            DecodeError::SizeOutOfRange => write!(f, "size field out of range for content buffer"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl Request {
    /// Decode a raw frame, enforcing the server's effective (possibly narrower than the
    /// physical buffer) `max_pathname`/`max_characters` limits.
    pub fn decode(
        raw: &RawRequest,
        max_pathname: usize,
        max_characters: usize,
    ) -> Result<Self, DecodeError> {
        let cmd = Command::from_u8(raw.cmd).ok_or(DecodeError::UnknownCommand(raw.cmd))?;

        let name_end = raw
            .pathname
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(raw.pathname.len());
        if name_end > max_pathname.min(MAX_PATHNAME) {
            return Err(DecodeError::PathnameTooLong);
        }
        let pathname = std::str::from_utf8(&raw.pathname[..name_end])
            .map_err(|_| DecodeError::InvalidPathname)?
            .to_owned();

        let flags = if raw.flags == NO_FLAGS { None } else { Some(raw.flags) };

        let content = if cmd == Command::ReadN || raw.size == NO_SIZE {
            Vec::new()
        } else {
            let size = usize::try_from(raw.size).map_err(|_| DecodeError::SizeOutOfRange)?;
            if size > max_characters.min(MAX_CHARACTERS) {
                return Err(DecodeError::SizeOutOfRange);
            }
            raw.content[..size].to_vec()
        };

        Ok(Request {
            pid: raw.pid,
            cmd,
            pathname,
            flags,
            content,
            read_n: raw.size,
        })
    }

    /// Encode this request back into the fixed wire layout. Used by the client library.
    pub fn encode(&self, fd_client: i32) -> Result<RawRequest, DecodeError> {
        if self.pathname.len() > MAX_PATHNAME {
            return Err(DecodeError::PathnameTooLong);
        }
        if self.content.len() > MAX_CHARACTERS {
            return Err(DecodeError::SizeOutOfRange);
        }

        let mut raw = RawRequest::empty();
        raw.pid = self.pid;
        raw.cmd = self.cmd as u8;
        raw.pathname[..self.pathname.len()].copy_from_slice(self.pathname.as_bytes());
        raw.flags = self.flags.unwrap_or(NO_FLAGS);
        raw.size = if self.cmd == Command::ReadN {
            self.read_n
        } else if self.content.is_empty() {
            NO_SIZE
        } else {
            self.content.len() as i64
        };
        raw.content[..self.content.len()].copy_from_slice(&self.content);
        raw.fd_client = fd_client;
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_unknown_command_codes() {
        let mut raw = RawRequest::empty();
        raw.cmd = 200;
        let err = Request::decode(&raw, MAX_PATHNAME, MAX_CHARACTERS).unwrap_err();
        assert_eq!(err, DecodeError::UnknownCommand(200));
    }

    #[test]
    fn decode_enforces_the_effective_pathname_limit() {
        let mut raw = RawRequest::empty();
        raw.cmd = Command::Open as u8;
        raw.pathname[..10].copy_from_slice(b"0123456789");
        let err = Request::decode(&raw, 5, MAX_CHARACTERS).unwrap_err();
        assert_eq!(err, DecodeError::PathnameTooLong);
    }

    #[test]
    fn decode_treats_no_size_sentinel_as_empty_content() {
        let mut raw = RawRequest::empty();
        raw.cmd = Command::Read as u8;
        raw.size = NO_SIZE;
        let decoded = Request::decode(&raw, MAX_PATHNAME, MAX_CHARACTERS).unwrap();
        assert!(decoded.content.is_empty());
        assert_eq!(decoded.flags, None);
    }

    #[test]
    fn encode_then_decode_preserves_every_field() {
        let request = Request {
            pid: 99,
            cmd: Command::Append,
            pathname: "some/path".to_owned(),
            flags: Some(3),
            content: b"abc".to_vec(),
            read_n: -1,
        };
        let raw = request.encode(-1).unwrap();
        let decoded = Request::decode(&raw, MAX_PATHNAME, MAX_CHARACTERS).unwrap();
        assert_eq!(decoded.pid, request.pid);
        assert_eq!(decoded.cmd, request.cmd);
        assert_eq!(decoded.pathname, request.pathname);
        assert_eq!(decoded.flags, request.flags);
        assert_eq!(decoded.content, request.content);
    }

    #[test]
    fn encode_rejects_an_oversized_pathname() {
        let request = Request {
            pid: 0,
            cmd: Command::Open,
            pathname: "x".repeat(MAX_PATHNAME + 1),
            flags: None,
            content: Vec::new(),
            read_n: -1,
        };
        assert_eq!(request.encode(-1).unwrap_err(), DecodeError::PathnameTooLong);
    }
}
