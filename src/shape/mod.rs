//! Traffic shapes: how load intensity changes over a run
//!
//! A shape is a [`Schedule`] of [`Cycle`]s. Every cycle holds one concurrency
//! target `k` for a bounded time. [`run_cycles`] turns a schedule into load:
//!
//! 1. Check, without blocking, whether the run is already over; if so stop
//!    before starting another cycle.
//! 2. Build a fresh [`BoundedExecutor`] with `k` slots. Executors are never
//!    resized, a new level gets a new executor.
//! 3. Derive a cycle context that ends at the cycle length or with the run,
//!    whichever comes first.
//! 4. Submit one event per admitted slot for subject
//!    `iteration mod max_subjects` until admission fails.
//! 5. Drain the executor with the cycle context.
//!
//! The three built-in shapes:
//! - [`Shape::Flat`]: `k = concurrency` for the whole run.
//! - [`Shape::Cyclical`]: a triangle wave `1..=concurrency` and back, one step
//!   per fixed-length cycle.
//! - [`Shape::Bursty`]: idle at `k = 1` for a random 1 to 4 cycle lengths, then
//!   a spike at `k = concurrency` for exactly one cycle length.
pub mod schedule;
pub use schedule::{Burst, Cycle, Flat, Schedule, Triangle, MIN_CYCLE_LENGTH};

use std::{fmt, str::FromStr, time::Duration};

use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    context::Context, driver::EventDriver, error::ConfigError, executor::BoundedExecutor,
    remote::RemoteCaller,
};

/// Default length of a cyclical or bursty cycle.
pub const DEFAULT_CYCLE_LENGTH: Duration = Duration::from_secs(120);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Flat,
    Cyclical,
    Bursty,
}

impl Shape {
    pub fn schedule(&self, concurrency: usize, cycle_length: Duration) -> Box<dyn Schedule> {
        match self {
            Shape::Flat => Box::new(Flat::new(concurrency)),
            Shape::Cyclical => Box::new(Triangle::new(concurrency, cycle_length)),
            Shape::Bursty => Box::new(Burst::new(concurrency, cycle_length)),
        }
    }
}

impl FromStr for Shape {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "max" | "flat" => Ok(Shape::Flat),
            "cyclical" => Ok(Shape::Cyclical),
            "bursty" => Ok(Shape::Bursty),
            other => Err(ConfigError::Traffic(other.to_string())),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Flat => "flat",
            Shape::Cyclical => "cyclical",
            Shape::Bursty => "bursty",
        };
        f.write_str(name)
    }
}

/// A cycle as it actually ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub cycle: Cycle,
    /// Events admitted during the cycle.
    pub events: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub cycles: Vec<CycleSummary>,
    /// Events admitted over the whole run.
    pub iterations: u64,
}

impl RunSummary {
    /// Concurrency target of every cycle, in order.
    pub fn concurrency_levels(&self) -> Vec<usize> {
        self.cycles.iter().map(|c| c.cycle.concurrency).collect()
    }
}

/// Drive `driver` with the cycles of `schedule` until the schedule or `ctx`
/// ends.
pub async fn run_cycles<C, S>(
    ctx: &Context,
    schedule: &mut S,
    driver: &EventDriver<C>,
    max_subjects: usize,
    rng: &mut StdRng,
) -> RunSummary
where
    C: RemoteCaller,
    S: Schedule + ?Sized,
{
    let max_subjects = max_subjects.max(1);
    let mut summary = RunSummary::default();

    loop {
        if let Some(err) = ctx.err() {
            tracing::info!("Run ended: {err}");
            break;
        }
        let Some(mut cycle) = schedule.next_cycle(rng) else {
            tracing::info!("Schedule exhausted");
            break;
        };
        cycle.duration = cycle.duration.max(MIN_CYCLE_LENGTH);

        let executor = BoundedExecutor::new(cycle.concurrency);
        let cycle_ctx = ctx.with_timeout(cycle.duration);
        tracing::info!(
            concurrency = cycle.concurrency,
            duration = ?cycle.duration,
            "Starting cycle"
        );

        let mut events = 0;
        loop {
            let subject = (summary.iterations % max_subjects as u64) as usize;
            let follow_offset = rng.gen_range(0..max_subjects);
            let driver = driver.clone();
            let work = async move { driver.execute(subject, follow_offset).await };

            if let Err(err) = executor.submit(&cycle_ctx, work).await {
                tracing::info!("Cycle {} ended: {err}", cycle.concurrency);
                break;
            }
            summary.iterations += 1;
            events += 1;
        }

        if let Err(err) = executor.drain(&cycle_ctx).await {
            tracing::debug!(
                outstanding = executor.outstanding(),
                "Stopped waiting for cycle {}: {err}",
                cycle.concurrency
            );
        }
        summary.cycles.push(CycleSummary { cycle, events });
    }

    summary
}
