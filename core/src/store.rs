use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

use crate::model::floor::{self, ToiletType};
use crate::model::record::{clamp_count, date_key, UsageRecord};

/// Immutable snapshot of every usage record.
///
/// Updates return a new store. Records that were not touched are shared
/// between the old and new snapshot through `Arc`, so a reader holding an
/// older store never observes a change.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordStore {
    records: Arc<Vec<Arc<UsageRecord>>>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::initial()
    }
}

impl RecordStore {
    /// One empty record per configured (floor, type) pair.
    pub fn initial() -> Self {
        Self::from_vec(floor::initial_records())
    }

    /// Build a store from persisted or pulled records, restoring the
    /// one-record-per-pair invariant: unknown pairs and duplicates are
    /// discarded, missing pairs are added empty, order follows the floor
    /// configuration.
    pub fn from_records(records: Vec<UsageRecord>) -> Self {
        let mut slots: Vec<Option<UsageRecord>> = vec![None; floor::configured_pairs().count()];
        let mut discarded = 0usize;

        for record in records {
            match floor::pair_index(&record.floor, record.kind) {
                Some(index) if slots[index].is_none() => slots[index] = Some(record),
                _ => discarded += 1,
            }
        }

        if discarded > 0 {
            warn!(discarded, "dropped records outside the floor configuration");
        }

        let normalized = floor::configured_pairs()
            .zip(slots)
            .map(|((floor, kind), slot)| slot.unwrap_or_else(|| UsageRecord::new(floor, kind)))
            .collect();
        Self::from_vec(normalized)
    }

    fn from_vec(records: Vec<UsageRecord>) -> Self {
        Self {
            records: Arc::new(records.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &UsageRecord> {
        self.records.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Owned copy for serialization.
    pub fn to_vec(&self) -> Vec<UsageRecord> {
        self.records().cloned().collect()
    }

    pub fn get(&self, floor: &str, kind: ToiletType) -> Option<&UsageRecord> {
        self.records().find(|r| r.matches(floor, kind))
    }

    pub fn value(&self, floor: &str, kind: ToiletType, date: NaiveDate) -> u32 {
        self.get(floor, kind).map(|r| r.value_on(date)).unwrap_or(0)
    }

    pub fn has_usage_on(&self, date: NaiveDate) -> bool {
        self.records().any(|r| r.value_on(date) > 0)
    }

    pub fn has_any_usage(&self) -> bool {
        self.records().any(|r| r.usage.values().any(|v| *v > 0))
    }

    /// Set `usage[date] = max(0, floor(value))` on the matching record.
    ///
    /// Returns `None` when the pair is not configured; the caller keeps its
    /// current store.
    pub fn with_usage(&self, floor: &str, kind: ToiletType, date: NaiveDate, value: f64) -> Option<Self> {
        let mut batch = self.batch();
        batch.set(floor, kind, date, value).then(|| batch.finish())
    }

    /// Start a multi-entry update that produces a single new snapshot.
    pub fn batch(&self) -> StoreBatch {
        StoreBatch {
            records: self.records.as_ref().clone(),
            changed: false,
        }
    }

    /// True when both stores share the record at `index` without a copy.
    pub fn shares_record_with(&self, other: &RecordStore, index: usize) -> bool {
        match (self.records.get(index), other.records.get(index)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

pub struct StoreBatch {
    records: Vec<Arc<UsageRecord>>,
    changed: bool,
}

impl StoreBatch {
    /// Returns whether a matching record was found.
    pub fn set(&mut self, floor: &str, kind: ToiletType, date: NaiveDate, value: f64) -> bool {
        let Some(slot) = self.records.iter_mut().find(|r| r.matches(floor, kind)) else {
            return false;
        };
        Arc::make_mut(slot)
            .usage
            .insert(date_key(date), clamp_count(value));
        self.changed = true;
        true
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn finish(self) -> RecordStore {
        RecordStore {
            records: Arc::new(self.records),
        }
    }
}
