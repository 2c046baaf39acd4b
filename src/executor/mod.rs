//! Executor: bounded-concurrency admission of work items
//!
//! [`BoundedExecutor`] admits at most `n` concurrently running work items. A
//! work item is any future resolving to `Result<T, BoxError>`. Capacity is a
//! [`tokio::sync::Semaphore`] with `n` permits: a permit is acquired before a
//! work item starts and dropped when it finishes, whatever the outcome.
//!
//! # Submission modes
//! - [`BoundedExecutor::submit`]: fire-and-forget. Waits for a slot, spawns the
//!   work and returns. A failure is written to the [`ErrorLatch`] and surfaces
//!   on the next `submit`, `run` or `drain`.
//! - [`BoundedExecutor::run`]: call-and-block. Same admission rules, but the
//!   work runs in the caller's task and its error is returned directly.
//!
//! # Admission order
//! 1. Latch fast path: a latched failure is returned without touching the
//!    semaphore. Workers never block on reporting, so the submitter cannot
//!    deadlock on a pool whose slots are held by failed workers.
//! 2. Context check: an already ended context fails immediately, even if a
//!    permit happens to be free.
//! 3. A drained executor rejects new work with [`PoolError::Closed`].
//! 4. Wait for a permit or for the context to end.
//!
//! # Lifecycle
//! `Open → Running → Draining → Closed`. An executor is meant for one cycle:
//! once drained it stays closed and a fresh instance must be built. Work is
//! never retried here, retry belongs to whatever the work item calls.
//!
//! # Drain
//! [`BoundedExecutor::drain`] closes admission and waits for outstanding work,
//! the first latched failure, or the end of the context. Returning on the
//! context does not abort running work, it only stops waiting for it.
pub mod latch;
pub use latch::ErrorLatch;

use std::{future::Future, sync::Arc};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;

use crate::{
    context::Context,
    error::{BoxError, PoolError},
};

/// A pool of `n` execution slots for one concurrency cycle.
#[derive(Debug)]
pub struct BoundedExecutor {
    slots: Arc<Semaphore>,
    limit: usize,
    latch: Arc<ErrorLatch>,
    tracker: TaskTracker,
}

impl BoundedExecutor {
    /// Create an executor with `n` slots. `n == 0` is treated as 1.
    pub fn new(n: usize) -> Self {
        let limit = n.max(1);
        Self {
            slots: Arc::new(Semaphore::new(limit)),
            limit,
            latch: Arc::new(ErrorLatch::new()),
            tracker: TaskTracker::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Admitted work items that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Admit `work` and run it on its own task.
    ///
    /// Returns as soon as the work is spawned. A failure of `work` is latched
    /// and reported by a later call on this executor.
    pub async fn submit<Fut>(&self, ctx: &Context, work: Fut) -> Result<(), PoolError>
    where
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let permit = self.admit(ctx).await?;
        let latch = self.latch.clone();
        self.tracker.spawn(async move {
            // released when the work finishes, success or not
            let _permit = permit;
            if let Err(err) = work.await {
                latch.set(err);
            }
        });
        Ok(())
    }

    /// Admit `work` and await it on the caller's task.
    pub async fn run<T, Fut>(&self, ctx: &Context, work: Fut) -> Result<T, PoolError>
    where
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let permit = self.admit(ctx).await?;
        let res = self.tracker.track_future(work).await;
        drop(permit);
        res.map_err(PoolError::Work)
    }

    /// Wait for every admitted work item, or the first failure, or the end
    /// of `ctx`.
    pub async fn drain(&self, ctx: &Context) -> Result<(), PoolError> {
        self.latch.check()?;
        self.tracker.close();
        tracing::debug!(
            outstanding = self.tracker.len(),
            limit = self.limit,
            "Draining executor"
        );

        tokio::select! {
            biased;
            _ = self.tracker.wait() => self.latch.check(),
            err = self.latch.failed() => Err(err),
            err = ctx.done() => Err(err.into()),
        }
    }

    async fn admit(&self, ctx: &Context) -> Result<OwnedSemaphorePermit, PoolError> {
        self.latch.check()?;
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }
        if self.tracker.is_closed() {
            return Err(PoolError::Closed);
        }

        tokio::select! {
            biased;
            err = ctx.done() => Err(err.into()),
            permit = self.slots.clone().acquire_owned() => {
                permit.map_err(|_| PoolError::Closed)
            }
        }
    }
}
