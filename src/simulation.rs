use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::Mutex;
use typed_builder::TypedBuilder;

use crate::{
    context::Context,
    driver::{EventDriver, DEFAULT_POST_TEXT},
    ledger::MetricsLedger,
    report::Report,
    remote::RemoteCaller,
    shape::{run_cycles, RunSummary, Shape, DEFAULT_CYCLE_LENGTH},
};

/// Parameters of a simulation.
///
/// ```rust
/// use std::time::Duration;
/// use surge::SimParams;
///
/// let params = SimParams::builder()
///     .base_target("http://localhost:8080/")
///     .concurrency(5)
///     .run_duration(Duration::from_secs(60))
///     .build();
/// assert_eq!(params.max_subjects, 100);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct SimParams {
    /// Where the remote service lives. Informational for the core, the
    /// [`RemoteCaller`] decides what to do with it.
    #[builder(setter(into))]
    pub base_target: String,
    /// Upper bound of concurrently running events.
    pub concurrency: usize,
    #[builder(default = 100)]
    pub max_subjects: usize,
    pub run_duration: Duration,
    #[builder(default = DEFAULT_CYCLE_LENGTH)]
    pub cycle_length: Duration,
    /// Seed of the run's random generator. Unset means seeded from entropy.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
    /// Body of every published post.
    #[builder(default = DEFAULT_POST_TEXT.to_string(), setter(into))]
    pub post_text: String,
}

/// A load simulation against one remote service.
///
/// The three `run_*` entry points drive the same event loop with different
/// traffic shapes and can be called in sequence; metrics accumulate in one
/// ledger until [`Simulation::report`] is taken.
pub struct Simulation<C> {
    params: SimParams,
    driver: EventDriver<C>,
    ledger: Arc<MetricsLedger>,
    rng: Mutex<StdRng>,
}

impl<C: RemoteCaller> Simulation<C> {
    pub fn new(params: SimParams, caller: C) -> Self {
        Self::with_caller(params, Arc::new(caller))
    }

    pub fn with_caller(mut params: SimParams, caller: Arc<C>) -> Self {
        params.concurrency = params.concurrency.max(1);
        params.max_subjects = params.max_subjects.max(1);

        let ledger = Arc::new(MetricsLedger::new(params.max_subjects));
        let driver = EventDriver::new(caller, ledger.clone()).with_text(params.post_text.clone());
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            params,
            driver,
            ledger,
            rng: Mutex::new(rng),
        }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn ledger(&self) -> &Arc<MetricsLedger> {
        &self.ledger
    }

    /// Full concurrency until the run ends.
    pub async fn run_flat(&self, ctx: &Context) -> RunSummary {
        self.run(ctx, Shape::Flat).await
    }

    /// Concurrency going up and down one step per cycle.
    pub async fn run_cyclical(&self, ctx: &Context) -> RunSummary {
        self.run(ctx, Shape::Cyclical).await
    }

    /// Idle periods of random length broken by spikes at full concurrency.
    pub async fn run_bursty(&self, ctx: &Context) -> RunSummary {
        self.run(ctx, Shape::Bursty).await
    }

    /// Run `shape` for at most the configured run duration, or until `ctx`
    /// ends.
    pub async fn run(&self, ctx: &Context, shape: Shape) -> RunSummary {
        let run_ctx = ctx.with_timeout(self.params.run_duration);
        let mut schedule = shape.schedule(self.params.concurrency, self.params.cycle_length);
        let mut rng = self.rng.lock().await;

        tracing::info!(
            %shape,
            target = %self.params.base_target,
            concurrency = self.params.concurrency,
            subjects = self.params.max_subjects,
            duration = ?self.params.run_duration,
            "Starting simulation"
        );
        let summary = run_cycles(
            &run_ctx,
            &mut *schedule,
            &self.driver,
            self.params.max_subjects,
            &mut rng,
        )
        .await;
        tracing::info!(
            %shape,
            cycles = summary.cycles.len(),
            events = summary.iterations,
            "Simulation finished"
        );
        summary
    }

    /// Sorted and aggregated statistics of everything recorded so far.
    pub fn report(&self) -> Report {
        Report::from(self.ledger.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{driver::tests::StubCaller, metric::Category, remote::Operation};

    fn params(concurrency: usize, run: Duration) -> SimParams {
        SimParams::builder()
            .base_target("http://stub/")
            .concurrency(concurrency)
            .run_duration(run)
            .cycle_length(Duration::from_secs(1))
            .seed(7)
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn flat_end_to_end() {
        let sim = Simulation::new(
            params(5, Duration::from_secs(2)),
            StubCaller::new(Duration::from_millis(10)),
        );

        let summary = sim.run_flat(&Context::background()).await;
        // let the last admitted events finish
        tokio::time::sleep(Duration::from_millis(100)).await;
        let report = sim.report();

        let identify = report.total(Category::Identify);
        // 5 slots, 30ms per event over 2s
        assert!(identify.requests >= 300, "only {} identify calls", identify.requests);
        assert_eq!(identify.requests, summary.iterations);
        assert_eq!(identify.avg_latency_ms, 10);
        for category in Category::ALL {
            assert_eq!(report.total(category).errors, 0);
        }
        assert_eq!(report.subjects.len(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn cyclical_entry_point() {
        let sim = Simulation::new(
            params(4, Duration::from_millis(9_500)),
            StubCaller::new(Duration::from_millis(10)),
        );

        let summary = sim.run_cyclical(&Context::background()).await;

        assert!(summary
            .concurrency_levels()
            .starts_with(&[1, 2, 3, 4, 3, 2, 1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn bursty_entry_point() {
        let sim = Simulation::new(
            params(3, Duration::from_secs(12)),
            StubCaller::new(Duration::from_millis(10)),
        );

        let summary = sim.run_bursty(&Context::background()).await;

        for c in &summary.cycles {
            match c.cycle.concurrency {
                3 => assert_eq!(c.cycle.duration, Duration::from_secs(1)),
                1 => {
                    let secs = c.cycle.duration.as_secs();
                    assert!((1..=4).contains(&secs));
                    assert_eq!(c.cycle.duration, Duration::from_secs(secs));
                }
                k => panic!("unexpected concurrency {k}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn caller_context_cuts_run_short() {
        let sim = Simulation::new(
            params(2, Duration::from_secs(3600)),
            StubCaller::new(Duration::from_millis(10)),
        );
        let ctx = Context::background().with_timeout(Duration::from_secs(1));

        let start = tokio::time::Instant::now();
        sim.run_flat(&ctx).await;

        assert!(start.elapsed() <= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_show_up_in_report() {
        let mut stub = StubCaller::new(Duration::from_millis(10));
        stub.fails = |op| matches!(op, Operation::Follow { .. });
        let sim = Simulation::new(params(2, Duration::from_millis(500)), stub);

        sim.run_flat(&Context::background()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        let report = sim.report();

        let follow = report.total(Category::Follow);
        assert!(follow.requests > 0);
        assert_eq!(follow.errors, follow.requests);
        assert_eq!(report.total(Category::Publish).errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_configured_text() {
        let caller = Arc::new(StubCaller::new(Duration::from_millis(10)));
        let mut p = params(1, Duration::from_millis(100));
        p.post_text = "hello feed".to_string();
        let sim = Simulation::with_caller(p, caller.clone());

        sim.run_flat(&Context::background()).await;

        let seen = caller.seen.lock().unwrap();
        let texts: Vec<&str> = seen
            .iter()
            .filter_map(|op| match op {
                Operation::Publish { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert!(!texts.is_empty());
        assert!(texts.iter().all(|t| *t == "hello feed"));
    }

    #[test]
    fn zero_sizes_are_clamped() {
        let mut p = params(0, Duration::from_secs(1));
        p.max_subjects = 0;
        let sim = Simulation::new(p, StubCaller::new(Duration::ZERO));

        assert_eq!(sim.params().concurrency, 1);
        assert_eq!(sim.params().max_subjects, 1);
        assert_eq!(sim.ledger().max_subjects(), 1);
    }
}
