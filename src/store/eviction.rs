//! The eviction engine (spec.md §4.3).
//!
//! Victim selection is a single deterministic routine parameterized by which tick field it
//! sorts on, so LRU and FIFO share one code path (SPEC_FULL.md Open Questions resolution).

use super::entry::FileEntry;

/// Which tick field orders the victim search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacementPolicy {
    /// Evict the entry with the oldest `last_use_tick` first (default).
    #[default]
    Lru,
    /// Evict the entry with the oldest `creation_tick` first, ignoring subsequent touches.
    Fifo,
}

impl std::str::FromStr for ReplacementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LRU" => Ok(ReplacementPolicy::Lru),
            "FIFO" => Ok(ReplacementPolicy::Fifo),
            other => Err(format!("unknown replacement policy {other:?}, expected LRU or FIFO")),
        }
    }
}

impl std::fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplacementPolicy::Lru => f.write_str("LRU"),
            ReplacementPolicy::Fifo => f.write_str("FIFO"),
        }
    }
}

impl ReplacementPolicy {
    fn order_key(self, entry: &FileEntry) -> u64 {
        match self {
            ReplacementPolicy::Lru => entry.last_use_tick,
            ReplacementPolicy::Fifo => entry.creation_tick,
        }
    }

    /// Return pathnames of eligible victims, in eviction order (oldest first), for entries
    /// other than `admitting_pathname`.
    pub fn victim_order<'a>(
        self,
        entries: impl Iterator<Item = &'a FileEntry>,
        admitting_pathname: &str,
    ) -> Vec<String> {
        let mut candidates: Vec<&FileEntry> = entries
            .filter(|e| e.evictable() && e.pathname != admitting_pathname)
            .collect();
        candidates.sort_by_key(|e| self.order_key(e));
        candidates.into_iter().map(|e| e.pathname.clone()).collect()
    }
}

/// Return every entry (no filtering by lock state or evictability), oldest-first by `policy`'s
/// tick field. Used by `readN`, which streams all eligible entries in replacement order rather
/// than selecting victims for eviction.
pub fn order_all<'a>(
    policy: ReplacementPolicy,
    entries: impl Iterator<Item = &'a FileEntry>,
) -> Vec<&'a FileEntry> {
    let mut all: Vec<&FileEntry> = entries.collect();
    all.sort_by_key(|e| policy.order_key(e));
    all
}

/// Outcome of running the eviction engine for one admission.
pub struct EvictionPlan {
    /// Victims selected, in the order they should be evicted (and reported to the client).
    pub victims: Vec<String>,
}

/// Select victims until admitting `delta_bytes` additional bytes and `delta_files` additional
/// file slots would no longer breach capacity, or the eligible set is exhausted.
///
/// Returns `None` if even evicting every eligible entry would not make room: the caller must
/// abort the admission with `FILE_TOO_LARGE` and apply no eviction (spec.md §4.3 step 3).
pub fn plan_eviction(
    policy: ReplacementPolicy,
    entries: &std::collections::HashMap<String, FileEntry>,
    admitting_pathname: &str,
    current_files: u64,
    current_bytes: u64,
    delta_files: u64,
    delta_bytes: u64,
    max_files: u64,
    max_bytes: u64,
) -> Option<EvictionPlan> {
    if delta_bytes > max_bytes || delta_files > max_files {
        // The admitting item alone can never fit, regardless of what gets evicted.
        return None;
    }

    let order = policy.victim_order(entries.values(), admitting_pathname);

    let mut files = current_files;
    let mut bytes = current_bytes;
    let mut victims = Vec::new();

    for pathname in order {
        if files + delta_files <= max_files && bytes + delta_bytes <= max_bytes {
            break;
        }
        let Some(entry) = entries.get(&pathname) else { continue };
        files -= 1;
        bytes -= entry.content.len() as u64;
        victims.push(pathname);
    }

    if files + delta_files <= max_files && bytes + delta_bytes <= max_bytes {
        Some(EvictionPlan { victims })
    } else {
        None
    }
}
