//! An in-memory, multi-client file storage cache server.
//!
//! Clients connect over a local stream socket and issue fixed-layout wire requests (open,
//! close, read, write, append, lock, unlock, remove, and a bulk read-N) against a shared table
//! of named in-memory files. The table is bounded by a file count and a total byte count; when
//! an admission would exceed either, the server evicts existing files under a configurable
//! replacement policy (LRU or FIFO) before making room, or rejects the request outright if no
//! amount of eviction would help.
//!
//! See `SPEC_FULL.md` for the full protocol and behavioral specification, and `DESIGN.md` for
//! how each piece of this crate is grounded in the codebase it was adapted from.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod signals;
pub mod store;
pub mod wire;
pub mod worker;

pub use config::ServerConfig;
pub use error::{FramingError, RequestError, ServerError};
pub use server::{Server, SharedStore};
