use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use livetail_types::{ArcLogRecord, LogLevel, LogRecord};

/// Bounded ring buffer of the most recent records, in arrival order
///
/// Clones share the same storage. Every mutation happens under one write
/// lock, so a `replace_all` can never interleave with a `push`.
#[derive(Clone)]
pub struct LogBuffer {
    /// Internal storage
    inner: Arc<RwLock<Inner>>,

    /// Maximum capacity
    capacity: usize,
}

struct Inner {
    /// Records, oldest first. Arc avoids expensive clones during rendering
    entries: VecDeque<ArcLogRecord>,

    /// Ids currently buffered, for de-duplication
    ids: HashSet<String>,

    /// Incrementally maintained level counts (O(1) instead of O(n) scan)
    counts: LevelCounts,

    /// Bumped on every mutation
    revision: u64,
}

impl Inner {
    fn evict_front(&mut self) {
        if let Some(evicted) = self.entries.pop_front() {
            self.ids.remove(&evicted.id);
            self.counts.decrement(evicted.level);
        }
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.ids.clear();
        self.counts = LevelCounts::default();
    }
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                ids: HashSet::with_capacity(capacity),
                counts: LevelCounts::default(),
                revision: 0,
            })),
            capacity,
        }
    }

    /// Append a record, evicting the oldest ones past capacity
    ///
    /// Returns false when nothing was stored: the id is already buffered,
    /// or the capacity is zero.
    pub fn push(&self, record: LogRecord) -> bool {
        self.push_arc(Arc::new(record))
    }

    /// Append an already shared record
    pub fn push_arc(&self, record: ArcLogRecord) -> bool {
        if self.capacity == 0 {
            return false;
        }

        let mut inner = self.inner.write();
        if inner.ids.contains(&record.id) {
            debug!(id = %record.id, "dropping duplicate record");
            return false;
        }

        while inner.entries.len() >= self.capacity {
            inner.evict_front();
        }

        inner.ids.insert(record.id.clone());
        inner.counts.increment(record.level);
        inner.entries.push_back(record);
        inner.revision += 1;
        true
    }

    /// Discard everything and install `records` in their given order
    ///
    /// Only the newest `capacity` records are kept. Returns how many were
    /// installed.
    pub fn replace_all<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = LogRecord>,
    {
        // Build outside the lock, swap inside it
        let mut seen = HashSet::new();
        let unique: Vec<LogRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
        let skip = unique.len().saturating_sub(self.capacity);

        let mut entries = VecDeque::with_capacity(self.capacity);
        let mut ids = HashSet::with_capacity(self.capacity);
        let mut counts = LevelCounts::default();
        for record in unique.into_iter().skip(skip) {
            ids.insert(record.id.clone());
            counts.increment(record.level);
            entries.push_back(Arc::new(record));
        }
        let installed = entries.len();

        let mut inner = self.inner.write();
        inner.entries = entries;
        inner.ids = ids;
        inner.counts = counts;
        inner.revision += 1;
        installed
    }

    /// Ordered copy of the contents (Arc clones are cheap)
    pub fn snapshot(&self) -> Vec<ArcLogRecord> {
        self.inner.read().entries.iter().cloned().collect()
    }

    /// Whether a record with this id is buffered
    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().ids.contains(id)
    }

    /// Get entry count per log level
    pub fn level_counts(&self) -> LevelCounts {
        self.inner.read().counts.clone()
    }

    /// Total entry count
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Maximum number of records retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mutation counter; changes whenever the contents may have changed
    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }

    /// Clear all entries
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.reset();
        inner.revision += 1;
    }
}

/// Counts per log level
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub debug: usize,
    pub info: usize,
    pub warning: usize,
    pub error: usize,
}

impl LevelCounts {
    pub fn total(&self) -> usize {
        self.debug + self.info + self.warning + self.error
    }

    pub fn get(&self, level: LogLevel) -> usize {
        match level {
            LogLevel::Debug => self.debug,
            LogLevel::Info => self.info,
            LogLevel::Warning => self.warning,
            LogLevel::Error => self.error,
        }
    }

    fn slot(&mut self, level: LogLevel) -> &mut usize {
        match level {
            LogLevel::Debug => &mut self.debug,
            LogLevel::Info => &mut self.info,
            LogLevel::Warning => &mut self.warning,
            LogLevel::Error => &mut self.error,
        }
    }

    fn increment(&mut self, level: LogLevel) {
        *self.slot(level) += 1;
    }

    fn decrement(&mut self, level: LogLevel) {
        let slot = self.slot(level);
        *slot = slot.saturating_sub(1);
    }
}
