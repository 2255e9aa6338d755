//! Record storage with query, update and delete support

use crate::filter::LogQuery;
use crate::types::{LogRecord, NewRecord, RecordPatch};
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Storage provider used by the logger
///
/// Implementations own their records exclusively and assign ids. All methods
/// are total: unknown ids and empty matches are reported through the return
/// value, never as errors.
pub trait LogBackend: Send + Sync {
    /// Insert a record, assigning it the next id
    fn create(&self, record: NewRecord) -> LogRecord;

    /// Records matching `query`, oldest first
    fn read(&self, query: &LogQuery) -> Vec<LogRecord>;

    /// Merge `patch` into the record with `id`; `false` if there is none
    fn update(&self, id: u64, patch: RecordPatch) -> bool;

    /// Remove every record matching `query` and return how many went
    fn delete(&self, query: &LogQuery) -> usize;

    /// Distinct namespaces of the records present, in first-seen order
    fn namespaces(&self) -> Vec<String>;
}

/// Change notification sent to store subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Inserted { id: u64 },
    Updated { id: u64 },
    Deleted { ids: Vec<u64> },
    /// Oldest records dropped to respect the capacity
    Evicted { ids: Vec<u64> },
}

/// Statistics about the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Total number of records ever inserted
    pub total_inserted: u64,
    /// Number of records currently stored
    pub current: usize,
    /// Number of records dropped due to capacity
    pub evicted: u64,
    /// Storage capacity, if bounded
    pub capacity: Option<usize>,
}

struct StoreInner {
    records: VecDeque<LogRecord>,
    next_id: u64,
    total_inserted: u64,
    evicted: u64,
    capacity: Option<usize>,
}

/// In-memory record store
///
/// Records are kept in insertion order. The store is unbounded unless built
/// with [`MemoryStore::bounded`].
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
    subscribers: Mutex<Vec<Sender<StoreEvent>>>,
}

impl MemoryStore {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Create a store that evicts its oldest records beyond `capacity`
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    /// Create a store with an optional capacity
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                records: VecDeque::new(),
                next_id: 1,
                total_inserted: 0,
                evicted: 0,
                capacity,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Receive a [`StoreEvent`] for every subsequent change
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            total_inserted: inner.total_inserted,
            current: inner.records.len(),
            evicted: inner.evicted,
            capacity: inner.capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    fn notify(&self, event: StoreEvent) {
        let mut subscribers = self.subscribers.lock();
        // Drop subscribers whose receiver is gone
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBackend for MemoryStore {
    fn create(&self, record: NewRecord) -> LogRecord {
        let (stored, evicted) = {
            let mut inner = self.inner.write();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.total_inserted += 1;

            let stored = LogRecord {
                id,
                namespace: record.namespace,
                level: record.level,
                time: record.time,
                message: record.message,
                extra: record.extra,
            };
            inner.records.push_back(stored.clone());

            // Enforce capacity limit
            let mut evicted = Vec::new();
            if let Some(capacity) = inner.capacity {
                while inner.records.len() > capacity {
                    match inner.records.pop_front() {
                        Some(old) => evicted.push(old.id),
                        None => break,
                    }
                }
                inner.evicted += evicted.len() as u64;
            }
            (stored, evicted)
        };

        trace!(
            id = stored.id,
            namespace = %stored.namespace,
            level = %stored.level,
            "record inserted"
        );
        self.notify(StoreEvent::Inserted { id: stored.id });
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted records over capacity");
            self.notify(StoreEvent::Evicted { ids: evicted });
        }
        stored
    }

    fn read(&self, query: &LogQuery) -> Vec<LogRecord> {
        let mut records: Vec<LogRecord> = {
            let inner = self.inner.read();
            inner
                .records
                .iter()
                .filter(|record| query.matches(record))
                .cloned()
                .collect()
        };
        // Stable, so records with equal times keep insertion order
        records.sort_by_key(|record| record.time);
        records
    }

    fn update(&self, id: u64, patch: RecordPatch) -> bool {
        let found = {
            let mut inner = self.inner.write();
            match inner.records.iter_mut().find(|record| record.id == id) {
                Some(record) => {
                    if let Some(namespace) = patch.namespace {
                        record.namespace = namespace;
                    }
                    if let Some(level) = patch.level {
                        record.level = level;
                    }
                    if let Some(message) = patch.message {
                        record.message = message;
                    }
                    if let Some(extra) = patch.extra {
                        record.extra = extra;
                    }
                    record.time = Utc::now();
                    true
                }
                None => false,
            }
        };

        if found {
            trace!(id, "record updated");
            self.notify(StoreEvent::Updated { id });
        } else {
            debug!(id, "update for unknown record ignored");
        }
        found
    }

    fn delete(&self, query: &LogQuery) -> usize {
        let ids = {
            let mut inner = self.inner.write();
            let mut ids = Vec::new();
            inner.records.retain(|record| {
                let doomed = query.matches(record);
                if doomed {
                    ids.push(record.id);
                }
                !doomed
            });
            ids
        };

        let count = ids.len();
        if count > 0 {
            debug!(count, "records deleted");
            self.notify(StoreEvent::Deleted { ids });
        }
        count
    }

    fn namespaces(&self) -> Vec<String> {
        let inner = self.inner.read();
        let seen: IndexSet<&str> =
            inner.records.iter().map(|record| record.namespace.as_str()).collect();
        seen.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Level;
    use chrono::Duration;

    fn new_record(namespace: &str, level: Level, message: &str) -> NewRecord {
        NewRecord {
            namespace: namespace.to_string(),
            level,
            time: Utc::now(),
            message: message.to_string(),
            extra: Vec::new(),
        }
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let store = MemoryStore::new();
        let a = store.create(new_record("a", Level::Log, "one"));
        let b = store.create(new_record("a", Level::Log, "two"));

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let store = MemoryStore::new();
        store.create(new_record("a", Level::Log, "one"));
        store.delete(&LogQuery::all());
        let next = store.create(new_record("a", Level::Log, "two"));

        assert_eq!(next.id, 2);
    }

    #[test]
    fn test_read_sorts_by_time() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut late = new_record("a", Level::Log, "late");
        late.time = now + Duration::seconds(5);
        let mut early = new_record("a", Level::Log, "early");
        early.time = now;
        let mut tie = new_record("a", Level::Log, "tie");
        tie.time = now;

        store.create(late);
        store.create(early);
        store.create(tie);

        let messages: Vec<String> =
            store.read(&LogQuery::all()).into_iter().map(|r| r.message).collect();
        assert_eq!(messages, ["early", "tie", "late"]);
    }

    #[test]
    fn test_update_merges_and_refreshes_time() {
        let store = MemoryStore::new();
        let mut record = new_record("a", Level::Log, "before");
        record.time = Utc::now() - Duration::minutes(1);
        let created = store.create(record);

        let patch = RecordPatch {
            message: Some("after".to_string()),
            ..Default::default()
        };
        assert!(store.update(created.id, patch));

        let read = store.read(&LogQuery::all());
        assert_eq!(read[0].id, created.id);
        assert_eq!(read[0].message, "after");
        assert_eq!(read[0].namespace, "a");
        assert!(read[0].time > created.time);
    }

    #[test]
    fn test_update_unknown_id() {
        let store = MemoryStore::new();
        assert!(!store.update(42, RecordPatch::default()));
    }

    #[test]
    fn test_delete_returns_count() {
        let store = MemoryStore::new();
        store.create(new_record("foo", Level::Log, "1"));
        store.create(new_record("bar", Level::Log, "2"));
        store.create(new_record("foo", Level::Warn, "3"));

        assert_eq!(store.delete(&LogQuery::from("foo")), 2);
        assert_eq!(store.delete(&LogQuery::from("missing")), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_namespaces_first_seen_order() {
        let store = MemoryStore::new();
        for ns in ["zeta", "alpha", "zeta", "mid"] {
            store.create(new_record(ns, Level::Log, "x"));
        }
        assert_eq!(store.namespaces(), ["zeta", "alpha", "mid"]);

        store.delete(&LogQuery::from("alpha"));
        assert_eq!(store.namespaces(), ["zeta", "mid"]);
    }

    #[test]
    fn test_bounded_store_evicts_oldest() {
        let store = MemoryStore::bounded(2);
        store.create(new_record("old", Level::Log, "1"));
        store.create(new_record("new", Level::Log, "2"));
        store.create(new_record("new", Level::Log, "3"));

        let stats = store.stats();
        assert_eq!(stats.total_inserted, 3);
        assert_eq!(stats.current, 2);
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.capacity, Some(2));
        assert_eq!(store.namespaces(), ["new"]);
    }

    #[test]
    fn test_subscribers_receive_events() {
        let store = MemoryStore::bounded(1);
        let events = store.subscribe();

        let first = store.create(new_record("a", Level::Log, "1"));
        let second = store.create(new_record("a", Level::Log, "2"));
        store.update(second.id, RecordPatch::default());
        store.delete(&LogQuery::all());

        let received: Vec<StoreEvent> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![
                StoreEvent::Inserted { id: first.id },
                StoreEvent::Inserted { id: second.id },
                StoreEvent::Evicted { ids: vec![first.id] },
                StoreEvent::Updated { id: second.id },
                StoreEvent::Deleted { ids: vec![second.id] },
            ]
        );
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let store = MemoryStore::new();
        drop(store.subscribe());
        let live = store.subscribe();

        store.create(new_record("a", Level::Log, "1"));

        assert_eq!(store.subscribers.lock().len(), 1);
        assert_eq!(live.try_recv(), Ok(StoreEvent::Inserted { id: 1 }));
    }
}
