//! Wire-level constants shared by the codec, the store and the client library.

/// Physical width of the `pathname` field carried by every frame.
///
/// This is a compile-time bound on the wire layout, not the effective limit enforced on a
/// given pathname: [`crate::config::ServerConfig::max_pathname`] may configure a smaller
/// effective limit for testing, but it can never exceed this constant.
pub const MAX_PATHNAME: usize = 256;

/// Physical width of the `content` field carried by every frame.
///
/// Same relationship to [`crate::config::ServerConfig::max_bytes`]-style effective limits as
/// [`MAX_PATHNAME`]: the frame is always this wide; `max_characters` only narrows what the
/// store will accept.
pub const MAX_CHARACTERS: usize = 1 << 20; // 1 MiB

/// Sentinel written into `Request.size` when a request carries no payload.
pub const NO_SIZE: i64 = -1;

/// Sentinel written into `Request.flags` when a request carries no flags.
pub const NO_FLAGS: i32 = -1;

/// Request command codes, as exchanged on the wire (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum Command {
    Open = 1,
    Close = 2,
    Read = 3,
    ReadN = 4,
    Write = 5,
    Append = 6,
    Lock = 7,
    Unlock = 8,
    Remove = 9,
}

impl Command {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Command::Open),
            2 => Some(Command::Close),
            3 => Some(Command::Read),
            4 => Some(Command::ReadN),
            5 => Some(Command::Write),
            6 => Some(Command::Append),
            7 => Some(Command::Lock),
            8 => Some(Command::Unlock),
            9 => Some(Command::Remove),
            _ => None,
        }
    }
}

/// Response status codes (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResponseCode {
    Ok = 0,
    NotFound = 1,
    AlreadyExists = 2,
    LockedByOther = 3,
    NotOpen = 4,
    NotLockedByCaller = 5,
    PreconditionFailed = 6,
    FileTooLarge = 7,
    Removed = 8,
    Evicted = 9,
    End = 10,
    Internal = 99,
}

impl ResponseCode {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(ResponseCode::Ok),
            1 => Some(ResponseCode::NotFound),
            2 => Some(ResponseCode::AlreadyExists),
            3 => Some(ResponseCode::LockedByOther),
            4 => Some(ResponseCode::NotOpen),
            5 => Some(ResponseCode::NotLockedByCaller),
            6 => Some(ResponseCode::PreconditionFailed),
            7 => Some(ResponseCode::FileTooLarge),
            8 => Some(ResponseCode::Removed),
            9 => Some(ResponseCode::Evicted),
            10 => Some(ResponseCode::End),
            99 => Some(ResponseCode::Internal),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// `openFile` flag bits (spec.md §6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: i32 {
        const O_CREATE = 1;
        const O_LOCK = 2;
    }
}
