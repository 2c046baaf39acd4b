use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};

use crate::metric::{Category, MetricRecord};

/// Records of a single subject, keyed by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectMetrics {
    pub subject: usize,
    pub records: BTreeMap<Category, MetricRecord>,
}

impl SubjectMetrics {
    /// The record for `category`, or a zeroed one if nothing was recorded.
    pub fn get(&self, category: Category) -> MetricRecord {
        self.records.get(&category).copied().unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        !self.records.is_empty()
    }
}

/// Point-in-time copy of a [`MetricsLedger`], indexed by subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub subjects: Vec<SubjectMetrics>,
}

/// Streaming metrics shared by every running event.
///
/// All updates go through one coarse lock. The critical sections are a map
/// lookup and a few integer operations, and the lock is never held across an
/// `.await`.
#[derive(Debug)]
pub struct MetricsLedger {
    subjects: Mutex<Vec<BTreeMap<Category, MetricRecord>>>,
}

impl MetricsLedger {
    pub fn new(max_subjects: usize) -> Self {
        Self {
            subjects: Mutex::new(vec![BTreeMap::new(); max_subjects]),
        }
    }

    pub fn max_subjects(&self) -> usize {
        self.lock().len()
    }

    /// Fold one request into the record of (`subject`, `category`).
    pub fn record(&self, subject: usize, category: Category, elapsed_ms: u64, succeeded: bool) {
        let mut subjects = self.lock();
        let Some(records) = subjects.get_mut(subject) else {
            tracing::debug!(subject, "Ignoring metric for unknown subject");
            return;
        };
        records
            .entry(category)
            .or_default()
            .consume(elapsed_ms, succeeded);
    }

    /// Whether `subject` has recorded anything yet.
    pub fn is_active(&self, subject: usize) -> bool {
        self.lock()
            .get(subject)
            .is_some_and(|records| !records.is_empty())
    }

    /// First active subject scanning forward from `start`, wrapping around.
    ///
    /// Returns `None` once a full scan finds nothing.
    pub fn first_active_from(&self, start: usize) -> Option<usize> {
        let subjects = self.lock();
        let max = subjects.len();
        if max == 0 {
            return None;
        }
        let start = start % max;
        (0..max)
            .map(|i| (start + i) % max)
            .find(|&idx| !subjects[idx].is_empty())
    }

    pub fn get(&self, subject: usize, category: Category) -> Option<MetricRecord> {
        self.lock()
            .get(subject)
            .and_then(|records| records.get(&category).copied())
    }

    /// Copy every record out under the lock.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let subjects = self
            .lock()
            .iter()
            .enumerate()
            .map(|(subject, records)| SubjectMetrics {
                subject,
                records: records.clone(),
            })
            .collect();
        LedgerSnapshot { subjects }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BTreeMap<Category, MetricRecord>>> {
        self.subjects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
