use std::time::Duration;

use clap::Parser;
use surge::{
    BoxError, Context, HttpCaller, JsonReporter, Reporter, Shape, SimConfig, Simulation,
    StdoutReporter,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "surge")]
#[command(about = "Simulate user traffic against the feed web app")]
struct Args {
    /// Base url for the web app (or SIM_URL)
    #[arg(long)]
    url: Option<String>,

    /// How long to run for, e.g. 90s, 30m, 2h (or SIM_DURATION)
    #[arg(short = 'd', long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Traffic shape: max, flat, cyclical or bursty (or SIM_TRAFFIC_TYPE)
    #[arg(long)]
    traffic: Option<Shape>,

    /// Maximum concurrent events (or SIM_THREADS)
    #[arg(long)]
    threads: Option<usize>,

    /// Number of simulated users (or SIM_SUBJECTS)
    #[arg(long)]
    subjects: Option<usize>,

    /// Length of one cyclical or bursty cycle (or SIM_CYCLE_SECS)
    #[arg(long, value_parser = humantime::parse_duration)]
    cycle: Option<Duration>,

    /// Seed for the random generator (or SIM_SEED)
    #[arg(long)]
    seed: Option<u64>,

    /// Body of every published post (or SIM_POST_TEXT)
    #[arg(long)]
    text: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Include per-user lines in the text report
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(self, config: &mut SimConfig) {
        if let Some(url) = self.url {
            config.url = Some(url);
        }
        if let Some(duration) = self.duration {
            config.duration = duration;
        }
        if let Some(traffic) = self.traffic {
            config.traffic = traffic;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(subjects) = self.subjects {
            config.subjects = subjects;
        }
        if let Some(cycle) = self.cycle {
            config.cycle_length = cycle;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(text) = self.text {
            config.post_text = text;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let (json, verbose) = (args.json, args.verbose);
    let mut config = SimConfig::from_env();
    args.apply(&mut config);
    tracing::info!(config = %serde_json::to_string(&config)?, "Loaded configuration");

    let params = config.params()?;
    let caller = HttpCaller::new(&params.base_target)?;
    let sim = Simulation::new(params, caller);

    let ctx = Context::background();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping the run");
            interrupt.cancel();
        }
    });

    sim.run(&ctx, config.traffic).await;

    let report = sim.report();
    if json {
        JsonReporter.report(&report).await?;
    } else {
        StdoutReporter { verbose }.report(&report).await?;
    }

    tracing::info!("Exited successfully");
    Ok(())
}
