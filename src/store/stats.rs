//! Server-wide statistics (spec.md §3.1 / SPEC_FULL.md §3.1), dumped on `SIGHUP` and at
//! shutdown (spec.md §5, §6).

use std::collections::HashMap;

use crate::wire::Command;

/// Counters tracked across the whole lifetime of the server.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub peak_files: u64,
    pub peak_bytes: u64,
    pub evictions_total: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub per_op_counts: HashMap<&'static str, u64>,
    pub max_simultaneous_clients: u64,
    pub current_clients: u64,
}

impl ServerStats {
    pub fn note_client_connected(&mut self) {
        self.current_clients += 1;
        self.max_simultaneous_clients = self.max_simultaneous_clients.max(self.current_clients);
    }

    pub fn note_client_disconnected(&mut self) {
        self.current_clients = self.current_clients.saturating_sub(1);
    }

    pub fn note_op(&mut self, cmd: Command, bytes_in: u64, bytes_out: u64) {
        *self.per_op_counts.entry(op_name(cmd)).or_insert(0) += 1;
        self.bytes_read += bytes_in;
        self.bytes_written += bytes_out;
    }

    pub fn note_occupancy(&mut self, files: u64, bytes: u64) {
        self.peak_files = self.peak_files.max(files);
        self.peak_bytes = self.peak_bytes.max(bytes);
    }

    pub fn note_eviction(&mut self) {
        self.evictions_total += 1;
    }

    /// Shutdown summary line, formatted per spec.md §6.
    pub fn summary(&self) -> String {
        let mut per_op: Vec<_> = self.per_op_counts.iter().collect();
        per_op.sort_by_key(|(name, _)| *name);
        let per_op_str = per_op
            .iter()
            .map(|(name, count)| format!("{name}={count}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "peak_files={} peak_bytes={} evictions_total={} bytes_read={} bytes_written={} \
             per_op_counts=[{per_op_str}] max_simultaneous_clients={}",
            self.peak_files,
            self.peak_bytes,
            self.evictions_total,
            self.bytes_read,
            self.bytes_written,
            self.max_simultaneous_clients
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
