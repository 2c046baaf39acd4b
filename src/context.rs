//! Cancellable run contexts.
//!
//! A [`Context`] is a [`CancellationToken`] paired with an optional deadline.
//! Children created with [`Context::with_timeout`] end when their own deadline
//! passes, when the parent's deadline passes, or when the parent is cancelled,
//! whichever comes first.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AdmissionError;

#[derive(Clone, Debug)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never ends on its own.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a child that ends after `timeout`, or earlier if `self` ends.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, own) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check, `None` while the context is still live.
    pub fn err(&self) -> Option<AdmissionError> {
        if self.token.is_cancelled() {
            return Some(AdmissionError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(AdmissionError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context has ended.
    pub async fn done(&self) -> AdmissionError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => AdmissionError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => AdmissionError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                AdmissionError::Cancelled
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
