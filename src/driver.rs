use std::sync::Arc;

use tokio::time::Instant;

use crate::{
    error::BoxError,
    ledger::MetricsLedger,
    remote::{Operation, RemoteCaller},
};

pub const DEFAULT_POST_TEXT: &str = "non randomized doc for now";

/// Turns one iteration of a traffic shape into remote calls.
///
/// Every event identifies the subject, publishes a post, then follows the
/// first active subject found scanning from a random offset. The offset is
/// drawn by the caller so the driver holds no randomness of its own.
#[derive(Debug)]
pub struct EventDriver<C> {
    caller: Arc<C>,
    ledger: Arc<MetricsLedger>,
    text: String,
}

impl<C> Clone for EventDriver<C> {
    fn clone(&self) -> Self {
        Self {
            caller: self.caller.clone(),
            ledger: self.ledger.clone(),
            text: self.text.clone(),
        }
    }
}

impl<C: RemoteCaller> EventDriver<C> {
    pub fn new(caller: Arc<C>, ledger: Arc<MetricsLedger>) -> Self {
        Self {
            caller,
            ledger,
            text: DEFAULT_POST_TEXT.to_string(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn ledger(&self) -> &Arc<MetricsLedger> {
        &self.ledger
    }

    /// Run the event for `subject`.
    ///
    /// Remote failures are recorded as errors in the ledger; they do not fail
    /// the event.
    pub async fn execute(&self, subject: usize, follow_offset: usize) -> Result<(), BoxError> {
        self.call(Operation::Identify { subject }).await;
        self.call(Operation::Publish {
            subject,
            text: self.text.clone(),
        })
        .await;

        match self.ledger.first_active_from(follow_offset) {
            Some(dst) => self.call(Operation::Follow { src: subject, dst }).await,
            None => tracing::trace!(subject, "No active subject to follow"),
        }
        Ok(())
    }

    async fn call(&self, op: Operation) {
        let start = Instant::now();
        let res = self.caller.perform(&op).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if let Err(err) = &res {
            tracing::debug!(subject = op.subject(), category = %op.category(), "Request failed: {err}");
        } else {
            tracing::trace!(subject = op.subject(), category = %op.category(), elapsed_ms, "Request done");
        }
        self.ledger
            .record(op.subject(), op.category(), elapsed_ms, res.is_ok());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{error::CallError, metric::Category};
    use std::{sync::Mutex, time::Duration};

    /// Succeeds after a fixed delay, failing any operation `fails` matches.
    pub(crate) struct StubCaller {
        pub delay: Duration,
        pub fails: fn(&Operation) -> bool,
        pub seen: Mutex<Vec<Operation>>,
    }

    impl StubCaller {
        pub(crate) fn new(delay: Duration) -> Self {
            Self {
                delay,
                fails: |_| false,
                seen: Mutex::new(vec![]),
            }
        }
    }

    impl RemoteCaller for StubCaller {
        async fn perform(&self, op: &Operation) -> Result<(), CallError> {
            tokio::time::sleep(self.delay).await;
            self.seen.lock().unwrap().push(op.clone());
            if (self.fails)(op) {
                return Err(CallError::Status {
                    status: 500,
                    body: "stub failure".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn records_all_three_operations() {
        let caller = Arc::new(StubCaller::new(Duration::from_millis(10)));
        let ledger = Arc::new(MetricsLedger::new(10));
        let driver = EventDriver::new(caller.clone(), ledger.clone());

        driver.execute(4, 7).await.unwrap();

        let seen = caller.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                Operation::Identify { subject: 4 },
                Operation::Publish {
                    subject: 4,
                    text: DEFAULT_POST_TEXT.into()
                },
                // subject 4 is the only active one after identify
                Operation::Follow { src: 4, dst: 4 },
            ]
        );
        for category in Category::ALL {
            let record = ledger.get(4, category).unwrap();
            assert_eq!(record.requests, 1);
            assert_eq!(record.errors, 0);
            assert_eq!(record.avg_latency_ms, 10);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn follows_first_active_peer_from_offset() {
        let caller = Arc::new(StubCaller::new(Duration::ZERO));
        let ledger = Arc::new(MetricsLedger::new(10));
        ledger.record(8, Category::Identify, 1, true);
        let driver = EventDriver::new(caller.clone(), ledger.clone());

        driver.execute(2, 5).await.unwrap();

        let seen = caller.seen.lock().unwrap().clone();
        assert_eq!(seen.last(), Some(&Operation::Follow { src: 2, dst: 8 }));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failures_are_recorded_not_raised() {
        let mut stub = StubCaller::new(Duration::from_millis(5));
        stub.fails = |op| matches!(op, Operation::Publish { .. });
        let ledger = Arc::new(MetricsLedger::new(3));
        let driver = EventDriver::new(Arc::new(stub), ledger.clone()).with_text("hi");

        assert!(driver.execute(1, 0).await.is_ok());

        assert_eq!(ledger.get(1, Category::Publish).unwrap().errors, 1);
        assert_eq!(ledger.get(1, Category::Identify).unwrap().errors, 0);
        assert_eq!(ledger.get(1, Category::Follow).unwrap().errors, 0);
    }
}
