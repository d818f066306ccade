use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::{ToolArgs, ToolResult};

struct Entry {
    stored_at: Instant,
    result: ToolResult,
}

/// Upper bound on live entries when none is configured.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// TTL cache for deterministic tool results.
///
/// Reads evict the entry they hit when it has expired. Inserts sweep every
/// expired entry at most once per TTL, and always when the cache is full.
/// A full cache with nothing expired drops new results instead of growing.
pub struct ToolCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
    max_entries: usize,
    last_sweep: Mutex<Instant>,
}

impl ToolCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Tool name plus canonical JSON of the arguments. `serde_json::Map` is
    /// ordered by key, so argument order in the marker does not matter.
    pub fn key(tool: &str, args: &ToolArgs) -> String {
        let args = serde_json::to_string(args.as_map()).unwrap_or_default();
        format!("{tool}:{args}")
    }

    pub fn get(&self, key: &str) -> Option<ToolResult> {
        {
            let entry = self.entries.get(key)?;
            if entry.stored_at.elapsed() < self.ttl {
                return Some(entry.result.clone());
            }
        }
        // read guard must be dropped before removing from the same shard
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: String, result: ToolResult) {
        let full = self.entries.len() >= self.max_entries;
        if full || self.sweep_due() {
            self.sweep();
        }
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            debug!(entries = self.entries.len(), "tool cache full, result not cached");
            return;
        }
        self.entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                result,
            },
        );
    }

    /// Drop every expired entry.
    pub fn sweep(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.stored_at.elapsed() < self.ttl);
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, "swept expired tool cache entries");
        }
    }

    /// True at most once per TTL. A concurrent caller that loses the lock skips.
    fn sweep_due(&self) -> bool {
        let Ok(mut last) = self.last_sweep.try_lock() else {
            return false;
        };
        if last.elapsed() < self.ttl {
            return false;
        }
        *last = Instant::now();
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
