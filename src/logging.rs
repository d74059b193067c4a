//! Diagnostic logging and the operation-log audit trail (spec.md §4.8 / §3.1).
//!
//! These are deliberately two different streams. Diagnostics (accept/dispatch errors,
//! invariant violations, startup/shutdown banners) go through the `log` facade exactly as the
//! teacher's demo binaries wire it up (`env_logger::init()` in `demos/hello.rs`,
//! `demos/passthrough.rs`, and others). The operation log is business data — an auditable
//! record of every completed client operation — and is written directly to its own file
//! rather than through `log`, so enabling `RUST_LOG=debug` never perturbs it.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::error::ServerError;
use crate::wire::{Command, ResponseCode};

/// Initialize the `log`-facade diagnostic stream. Mirrors the teacher's demo binaries, which
/// call this once at the top of `main` and rely on `RUST_LOG` for verbosity.
pub fn init_diagnostics() {
    env_logger::init();
}

/// One completed operation, ready to be appended to the log file (spec.md §3.1).
#[derive(Debug, Clone)]
pub struct OperationLogRecord {
    pub timestamp_unix_ms: u128,
    pub client_pid: u32,
    pub op: Command,
    pub pathname: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub code: ResponseCode,
    pub duration_us: u128,
}

impl OperationLogRecord {
    fn format_line(&self) -> String {
        format!(
            "timestamp={} client_pid={} op={} pathname={:?} bytes_in={} bytes_out={} code={:?} duration_us={}\n",
            self.timestamp_unix_ms,
            self.client_pid,
            op_name(self.op),
            self.pathname,
            self.bytes_in,
            self.bytes_out,
            self.code,
            self.duration_us,
        )
    }
}

fn op_name(cmd: Command) -> &'static str {
    match cmd {
        Command::Open => "open",
        Command::Close => "close",
        Command::Read => "read",
        Command::ReadN => "readN",
        Command::Write => "write",
        Command::Append => "append",
        Command::Lock => "lock",
        Command::Unlock => "unlock",
        Command::Remove => "remove",
    }
}

/// Appends [`OperationLogRecord`]s to the configured log file, one line each. Wrapped in a
/// `parking_lot::Mutex` since multiple workers append concurrently (spec.md §5).
pub struct OperationLog {
    file: Mutex<File>,
}

impl OperationLog {
    pub fn open(path: &Path) -> Result<Self, ServerError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ServerError::Config(format!("opening log_path {}: {e}", path.display())))?;
        Ok(OperationLog { file: Mutex::new(file) })
    }

    pub fn append(&self, record: &OperationLogRecord) {
        let line = record.format_line();
        let mut file = self.file.lock();
        if let Err(e) = file.write_all(line.as_bytes()) {
            log::warn!("failed to append operation log record: {e}");
        }
    }
}

/// Milliseconds since the Unix epoch, for stamping [`OperationLogRecord::timestamp_unix_ms`].
pub fn unix_millis_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
