use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of remote operation a subject performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Identify,
    Publish,
    Follow,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Identify, Category::Publish, Category::Follow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Identify => "identify",
            Category::Publish => "publish",
            Category::Follow => "follow",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Streaming statistics for one (subject, category) pair.
///
/// The average is an integer running mean, truncated at every update. No
/// per-request history is kept, so memory stays constant however long a run
/// is, at the price of accumulated rounding.
///
/// # Example
/// ```rust
/// use surge::metric::MetricRecord;
///
/// let mut record = MetricRecord::default();
/// record.consume(10, true);
/// record.consume(15, false);
///
/// assert_eq!(record.avg_latency_ms, 12);
/// assert_eq!(record.requests, 2);
/// assert_eq!(record.errors, 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub avg_latency_ms: u64,
    pub requests: u64,
    pub errors: u64,
}

impl MetricRecord {
    /// Incorporate a single request.
    pub fn consume(&mut self, elapsed_ms: u64, succeeded: bool) {
        self.avg_latency_ms =
            (self.avg_latency_ms * self.requests + elapsed_ms) / (self.requests + 1);
        self.requests += 1;
        if !succeeded {
            self.errors += 1;
        }
    }

    /// Combine another record into this one, weighting each average by its
    /// request count.
    pub fn merge(&mut self, other: &Self) {
        let total = self.requests + other.requests;
        if total > 0 {
            self.avg_latency_ms = (self.avg_latency_ms * self.requests
                + other.avg_latency_ms * other.requests)
                / total;
        }
        self.requests = total;
        self.errors += other.errors;
    }

    pub fn successes(&self) -> u64 {
        self.requests - self.errors
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg={}ms requests={} errors={}",
            self.avg_latency_ms, self.requests, self.errors
        )
    }
}
