use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{PoisonError, RwLock};

use crate::record::Record;

/// How `latest_by_key` picks one record among those sharing a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatestPolicy {
    /// Greatest record timestamp wins. Records without a timestamp sort before any
    /// timestamped record; ties go to the earliest inserted.
    ByFieldTimestampDescending,
    /// The most recently inserted record wins.
    ByInsertionOrderLast,
}

/// How many records a store keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Retention {
    #[default]
    Unbounded,
    /// Keep at most this many records, evicting the oldest first.
    Bounded(NonZeroUsize),
}

impl Retention {
    /// Zero means unbounded, matching how the limit is configured from the environment.
    pub fn from_limit(limit: usize) -> Self {
        match NonZeroUsize::new(limit) {
            Some(limit) => Retention::Bounded(limit),
            None => Retention::Unbounded,
        }
    }
}

/// Append-oriented, concurrently readable collection of the records of one entity kind.
///
/// Writers hold the lock only for the append. Readers get a copy of the records, so a
/// snapshot never observes a torn or duplicated record.
#[derive(Debug)]
pub struct MessageStore<R> {
    records: RwLock<VecDeque<R>>,
    retention: Retention,
}

impl<R: Record> Default for MessageStore<R> {
    fn default() -> Self {
        Self::new(Retention::Unbounded)
    }
}

impl<R: Record> MessageStore<R> {
    pub fn new(retention: Retention) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            retention,
        }
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    pub fn insert(&self, record: R) {
        // Records are only ever appended or evicted whole, so a poisoned lock still
        // guards a consistent deque.
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.push_back(record);

        if let Retention::Bounded(limit) = self.retention {
            while records.len() > limit.get() {
                drop(records.pop_front());
            }
        }
    }

    /// Every record currently held, in insertion order.
    pub fn snapshot_all(&self) -> Vec<R> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.iter().cloned().collect()
    }

    /// The record judged most current for `key` under `policy`. Keys are compared
    /// ASCII case-insensitively.
    pub fn latest_by_key(&self, key: &str, policy: LatestPolicy) -> Option<R> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut matching = records
            .iter()
            .filter(|record| record.key().eq_ignore_ascii_case(key));

        let latest = match policy {
            LatestPolicy::ByInsertionOrderLast => matching.last(),
            LatestPolicy::ByFieldTimestampDescending => {
                let first = matching.next()?;
                Some(matching.fold(first, |best, candidate| {
                    if candidate.timestamp() > best.timestamp() {
                        candidate
                    } else {
                        best
                    }
                }))
            }
        };

        latest.cloned()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record. There is no per-record deletion.
    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
