//! Completed-task records and the set algebra used to deduplicate them.
//!
//! The client lists every task it reported within a fixed lookback window,
//! regardless of how often we ask. Consecutive polls therefore overlap, and
//! [`RecordSet`] remembers which records were already counted so each one is
//! attributed to exactly one interval.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Identity of a reported task.
///
/// The client-provided task name is preferred. Elapsed time (in whole
/// microseconds) is only a fallback for output that carries no name, and is
/// not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordId {
    Task(String),
    Elapsed(u128),
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task(name) => write!(f, "{name}"),
            Self::Elapsed(micros) => write!(f, "elapsed:{micros}us"),
        }
    }
}

/// One task the client reported as completed.
///
/// Equality and hashing use only [`Record::id`].
#[derive(Debug, Clone)]
pub struct Record {
    pub id: RecordId,
    pub elapsed: Duration,
}

impl Record {
    /// Record keyed by its task name.
    pub fn named(name: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            id: RecordId::Task(name.into()),
            elapsed,
        }
    }

    /// Record keyed by its elapsed time alone.
    pub fn unnamed(elapsed: Duration) -> Self {
        Self {
            id: RecordId::Elapsed(elapsed.as_micros()),
            elapsed,
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Membership set of record identities.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    ids: HashSet<RecordId>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, record: &Record) -> bool {
        self.ids.contains(&record.id)
    }

    /// Grow the set with `additions`. Records already present are no-ops.
    pub fn extend<'a>(&mut self, additions: impl IntoIterator<Item = &'a Record>) {
        self.ids.extend(additions.into_iter().map(|r| r.id.clone()));
    }

    /// Every element of `reported` whose identity is not in the set, in
    /// listing order. Neither input is modified; repeats in `reported` are
    /// kept.
    pub fn difference(&self, reported: &[Record]) -> Vec<Record> {
        reported
            .iter()
            .filter(|r| !self.contains(r))
            .cloned()
            .collect()
    }
}

impl<'a> FromIterator<&'a Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = &'a Record>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// Collapse repeated identities, keeping the first occurrence of each.
pub fn dedupe(records: &[Record]) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .filter(|r| seen.insert(&r.id))
        .cloned()
        .collect()
}

/// Number of distinct identities in `records`.
pub fn unique_count(records: &[Record]) -> usize {
    records.iter().map(|r| &r.id).collect::<HashSet<_>>().len()
}
