//! The fixed-layout response frame and its typed view.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::constants::{ResponseCode, MAX_CHARACTERS, MAX_PATHNAME};

/// Raw, on-the-wire response record (spec.md §4.1).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawResponse {
    pub pathname: [u8; MAX_PATHNAME],
    pub content: [u8; MAX_CHARACTERS],
    pub content_size: u64,
    pub code: i32,
    _pad: [u8; 4],
}

impl RawResponse {
    pub(crate) fn empty() -> Self {
        RawResponse {
            pathname: [0; MAX_PATHNAME],
            content: [0; MAX_CHARACTERS],
            content_size: 0,
            code: 0,
            _pad: [0; 4],
        }
    }
}

/// A decoded response, as produced by the store and consumed by the client library.
#[derive(Debug, Clone)]
pub struct Response {
    pub pathname: String,
    pub content: Vec<u8>,
    pub code: ResponseCode,
}

impl Response {
    pub fn new(pathname: impl Into<String>, content: Vec<u8>, code: ResponseCode) -> Self {
        Response { pathname: pathname.into(), content, code }
    }

    pub fn empty(code: ResponseCode) -> Self {
        Response { pathname: String::new(), content: Vec::new(), code }
    }

    /// Encode into the fixed wire layout.
    pub fn encode(&self) -> Result<RawResponse, super::request::DecodeError> {
        use super::request::DecodeError;
        if self.pathname.len() > MAX_PATHNAME {
            return Err(DecodeError::PathnameTooLong);
        }
        if self.content.len() > MAX_CHARACTERS {
            return Err(DecodeError::SizeOutOfRange);
        }
        let mut raw = RawResponse::empty();
        raw.pathname[..self.pathname.len()].copy_from_slice(self.pathname.as_bytes());
        raw.content[..self.content.len()].copy_from_slice(&self.content);
        raw.content_size = self.content.len() as u64;
        raw.code = self.code as i32;
        Ok(raw)
    }

    /// Decode from the fixed wire layout.
    pub fn decode(raw: &RawResponse) -> Result<Self, super::request::DecodeError> {
        use super::request::DecodeError;
        let name_end = raw.pathname.iter().position(|&b| b == 0).unwrap_or(raw.pathname.len());
        let pathname = std::str::from_utf8(&raw.pathname[..name_end])
            .map_err(|_| DecodeError::InvalidPathname)?
            .to_owned();
        let size = usize::try_from(raw.content_size).map_err(|_| DecodeError::SizeOutOfRange)?;
        if size > MAX_CHARACTERS {
            return Err(DecodeError::SizeOutOfRange);
        }
        let code = ResponseCode::from_i32(raw.code).unwrap_or(ResponseCode::Internal);
        Ok(Response { pathname, content: raw.content[..size].to_vec(), code })
    }
}
