use std::sync::{Mutex, PoisonError};

use tokio::sync::Notify;

use crate::error::{BoxError, PoolError};

#[derive(Debug, Default)]
enum State {
    #[default]
    Empty,
    Latched(BoxError),
    Reported,
}

/// Write-once holder for the first failure of a fire-and-forget work item.
///
/// Writers never block: the first error is stored and every later one is
/// dropped. The stored error is handed out exactly once, after which every
/// check reports [`PoolError::Failed`].
#[derive(Debug, Default)]
pub struct ErrorLatch {
    state: Mutex<State>,
    notify: Notify,
}

impl ErrorLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `err` unless a failure was already latched.
    ///
    /// Returns `false` when the error was dropped.
    pub fn set(&self, err: BoxError) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, State::Empty) {
            tracing::debug!("Dropping async error, one is already latched: {err}");
            return false;
        }
        tracing::debug!("Latching async error: {err}");
        *state = State::Latched(err);
        drop(state);
        self.notify.notify_one();
        true
    }

    /// Non-blocking poll.
    pub fn check(&self) -> Result<(), PoolError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::take(&mut *state) {
            State::Empty => Ok(()),
            State::Latched(err) => {
                *state = State::Reported;
                Err(PoolError::Async(err))
            }
            State::Reported => {
                *state = State::Reported;
                Err(PoolError::Failed)
            }
        }
    }

    /// Resolves with the latched failure once there is one.
    pub async fn failed(&self) -> PoolError {
        loop {
            let notified = self.notify.notified();
            if let Err(err) = self.check() {
                return err;
            }
            notified.await;
        }
    }

    pub fn is_set(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        !matches!(*state, State::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_latch_checks_ok() {
        let latch = ErrorLatch::new();
        assert!(latch.check().is_ok());
        assert!(!latch.is_set());
    }

    #[test]
    fn first_error_wins_and_is_reported_once() {
        let latch = ErrorLatch::new();
        assert!(latch.set("first".into()));
        assert!(!latch.set("second".into()));

        match latch.check() {
            Err(PoolError::Async(err)) => assert_eq!(err.to_string(), "first"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(latch.check(), Err(PoolError::Failed)));
        assert!(matches!(latch.check(), Err(PoolError::Failed)));
    }

    #[tokio::test]
    async fn failed_wakes_on_set() {
        let latch = std::sync::Arc::new(ErrorLatch::new());
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.failed().await })
        };
        tokio::task::yield_now().await;
        latch.set("boom".into());

        let err = waiter.await.unwrap();
        assert!(matches!(err, PoolError::Async(_)));
    }
}
