//! The framed wire protocol: fixed-layout requests/responses and the codec that moves them
//! across a stream socket a complete frame at a time (spec.md §4.1).

pub mod codec;
pub mod constants;
pub mod request;
pub mod response;

pub use constants::{Command, OpenFlags, ResponseCode, MAX_CHARACTERS, MAX_PATHNAME};
pub use request::Request;
pub use response::Response;
