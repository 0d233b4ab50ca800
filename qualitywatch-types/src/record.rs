//! History records - one line of the history file per run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{Status, UNMEASURABLE};

/// A value as stored in the history file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RecordValue {
    Number(f64),
    Text(String),
}

impl RecordValue {
    /// The stored form of an unmeasurable value.
    pub const fn unavailable() -> Self {
        RecordValue::Number(UNMEASURABLE)
    }

    /// The numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RecordValue::Number(n) => Some(*n),
            RecordValue::Text(_) => None,
        }
    }

    /// Check whether this is the stored form of an unmeasurable value.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RecordValue::Number(n) if *n == UNMEASURABLE)
    }
}

impl From<f64> for RecordValue {
    fn from(value: f64) -> Self {
        RecordValue::Number(value)
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::Text(value.to_string())
    }
}

/// A value together with the status it had and when that status began.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackedEntry {
    pub value: RecordValue,
    pub status: Status,
    /// When the metric first entered `status` without interruption.
    pub since: DateTime<Utc>,
}

/// One metric's entry in a history record.
///
/// Tracked entries serialize as objects, bare entries as plain JSON numbers
/// or strings, so the two shapes never overlap.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RecordEntry {
    Tracked(TrackedEntry),
    Bare(RecordValue),
}

impl RecordEntry {
    /// The stored value, whichever shape the entry has.
    pub fn value(&self) -> &RecordValue {
        match self {
            RecordEntry::Tracked(t) => &t.value,
            RecordEntry::Bare(v) => v,
        }
    }

    /// The recorded status, for tracked entries.
    pub fn status(&self) -> Option<Status> {
        match self {
            RecordEntry::Tracked(t) => Some(t.status),
            RecordEntry::Bare(_) => None,
        }
    }

    /// When the recorded status began, for tracked entries.
    pub fn since(&self) -> Option<DateTime<Utc>> {
        match self {
            RecordEntry::Tracked(t) => Some(t.since),
            RecordEntry::Bare(_) => None,
        }
    }

    /// Drop status information, keeping only the value.
    pub fn into_bare(self) -> RecordEntry {
        match self {
            RecordEntry::Tracked(t) => RecordEntry::Bare(t.value),
            bare => bare,
        }
    }
}

/// Everything recorded for one run.
///
/// Serialized as a single flat JSON object: a `date` key plus one key per
/// metric id. `date` is therefore not usable as a metric id.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryRecord {
    /// When the run happened.
    pub date: DateTime<Utc>,

    /// Entries keyed by metric id.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub entries: BTreeMap<String, RecordEntry>,
}

impl HistoryRecord {
    /// Create an empty record for a run at `date`.
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            date,
            entries: BTreeMap::new(),
        }
    }

    /// Create a builder for a record at `date`.
    pub fn builder(date: DateTime<Utc>) -> HistoryRecordBuilder {
        HistoryRecordBuilder::new(date)
    }

    /// Number of metric entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the record has no metric entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the entry for a metric id.
    pub fn get(&self, id: &str) -> Option<&RecordEntry> {
        self.entries.get(id)
    }

    /// Insert or replace the entry for a metric id.
    pub fn insert(&mut self, id: impl Into<String>, entry: RecordEntry) {
        self.entries.insert(id.into(), entry);
    }

    /// Value of the first id in `ids` that this record contains.
    ///
    /// `ids` lists a metric's current id followed by any former ids.
    pub fn first_value(&self, ids: &[&str]) -> Option<&RecordValue> {
        ids.iter()
            .find_map(|id| self.entries.get(*id))
            .map(RecordEntry::value)
    }

    /// Compare everything except the run date.
    pub fn same_entries(&self, other: &HistoryRecord) -> bool {
        self.entries == other.entries
    }

    /// Copy of this record with every entry reduced to its bare value.
    pub fn unwrapped(&self) -> HistoryRecord {
        HistoryRecord {
            date: self.date,
            entries: self
                .entries
                .iter()
                .map(|(id, entry)| (id.clone(), entry.clone().into_bare()))
                .collect(),
        }
    }

    /// Copy of this record keeping only the bare values of `keep`.
    pub fn compacted(&self, keep: &[&str]) -> HistoryRecord {
        HistoryRecord {
            date: self.date,
            entries: self
                .entries
                .iter()
                .filter(|(id, _)| keep.contains(&id.as_str()))
                .map(|(id, entry)| (id.clone(), entry.clone().into_bare()))
                .collect(),
        }
    }

    /// When a metric that currently has `current` status entered it.
    ///
    /// If this record (the previous run) tracked the metric with the same
    /// status, the status started when that record says it did; otherwise it
    /// starts `now`.
    pub fn status_start_date(
        &self,
        id: &str,
        current: Status,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match self.entries.get(id) {
            Some(RecordEntry::Tracked(t)) if t.status == current => t.since,
            _ => now,
        }
    }
}

/// Builder for `HistoryRecord`.
#[derive(Debug)]
pub struct HistoryRecordBuilder {
    record: HistoryRecord,
}

impl HistoryRecordBuilder {
    /// Create a new builder.
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            record: HistoryRecord::new(date),
        }
    }

    /// Add a tracked entry.
    pub fn tracked(
        mut self,
        id: impl Into<String>,
        value: RecordValue,
        status: Status,
        since: DateTime<Utc>,
    ) -> Self {
        self.record.insert(
            id,
            RecordEntry::Tracked(TrackedEntry {
                value,
                status,
                since,
            }),
        );
        self
    }

    /// Add a bare value.
    pub fn bare(mut self, id: impl Into<String>, value: RecordValue) -> Self {
        self.record.insert(id, RecordEntry::Bare(value));
        self
    }

    /// Build the record.
    pub fn build(self) -> HistoryRecord {
        self.record
    }
}
