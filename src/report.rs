use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Write as _, future::Future};

use crate::{
    error::BoxError,
    ledger::{LedgerSnapshot, SubjectMetrics},
    metric::{Category, MetricRecord},
};

/// The processed form of a [`LedgerSnapshot`].
///
/// Reports are pure data: building one does no I/O. Subjects are ordered by
/// ascending average `identify` latency. A subject that never completed an
/// identify call counts as a zeroed record and therefore sorts first; ties keep
/// subject order.
///
/// Totals merge every subject's record per category, pairwise and in report
/// order, with the same truncating weighted mean the ledger uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub subjects: Vec<SubjectMetrics>,
    pub totals: BTreeMap<Category, MetricRecord>,
}

impl From<LedgerSnapshot> for Report {
    fn from(snapshot: LedgerSnapshot) -> Self {
        let mut subjects = snapshot.subjects;
        subjects.sort_by_key(|s| s.get(Category::Identify).avg_latency_ms);

        let mut totals: BTreeMap<Category, MetricRecord> = BTreeMap::new();
        for subject in &subjects {
            for (category, record) in &subject.records {
                totals.entry(*category).or_default().merge(record);
            }
        }

        Self { subjects, totals }
    }
}

impl Report {
    pub fn total(&self, category: Category) -> MetricRecord {
        self.totals.get(&category).copied().unwrap_or_default()
    }

    /// Human-readable rendering, one line per category total and optionally
    /// one line per active subject.
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        if verbose {
            for subject in self.subjects.iter().filter(|s| s.is_active()) {
                for (category, record) in &subject.records {
                    let _ = writeln!(out, "User #{} - {category}: {record}", subject.subject);
                }
            }
        }
        for (category, record) in &self.totals {
            let _ = writeln!(out, "Total - {category}: {record}");
        }
        out
    }
}

/// A [`Reporter`] consumes a [`Report`] and performs side effects: displaying
/// it, sending it to a service, or persisting it somewhere.
///
/// # Example
/// ```rust
/// use surge::{Report, Reporter, error::BoxError};
///
/// struct CountReporter;
/// impl Reporter for CountReporter {
///     async fn report(&self, report: &Report) -> Result<(), BoxError> {
///         println!("{} subjects", report.subjects.len());
///         Ok(())
///     }
/// }
/// ```
pub trait Reporter {
    fn report(&self, report: &Report) -> impl Future<Output = Result<(), BoxError>>;
}

/// Prints the text rendering to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutReporter {
    pub verbose: bool,
}

impl Reporter for StdoutReporter {
    async fn report(&self, report: &Report) -> Result<(), BoxError> {
        print!("{}", report.render(self.verbose));
        Ok(())
    }
}

/// Prints the report as one JSON document.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    async fn report(&self, report: &Report) -> Result<(), BoxError> {
        let value = serde_json::to_string(report)?;
        println!("{value}");
        Ok(())
    }
}
