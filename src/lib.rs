//! Surge: synthetic traffic for a social feed service.
//!
//! Surge drives simulated users against a remote service with realistic load
//! shapes and keeps per-user, per-operation latency and error statistics
//! while the load runs.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`BoundedExecutor`]: admits at most `n` concurrently running work items,
//!   with fire-and-forget and call-and-block submission, and a drain that
//!   relays the first asynchronous failure.
//! - [`Shape`]: flat, cyclical and bursty traffic, each a schedule of cycles
//!   that holds one concurrency target for a bounded time.
//! - [`EventDriver`]: turns one iteration into remote calls for a subject:
//!   identify, publish, follow.
//! - [`MetricsLedger`]: running latency averages and request/error counts per
//!   (subject, category), behind one lock.
//! - [`Report`] and [`Reporter`]: the sorted and aggregated view of a ledger,
//!   and where it is sent.
//! - [`RemoteCaller`]: the boundary to the service under load. [`HttpCaller`]
//!   is the built-in implementation.
//! - [`Simulation`]: glue that ties everything together.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use surge::{BoxError, Context, HttpCaller, Reporter, SimParams, Simulation, StdoutReporter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let params = SimParams::builder()
//!         .base_target("http://localhost:8080/")
//!         .concurrency(5)
//!         .run_duration(Duration::from_secs(60))
//!         .build();
//!     let caller = HttpCaller::new(&params.base_target)?;
//!     let sim = Simulation::new(params, caller);
//!
//!     sim.run_cyclical(&Context::background()).await;
//!
//!     StdoutReporter::default().report(&sim.report()).await?;
//!     Ok(())
//! }
//! ```

/// Configuration loaded from the environment
pub mod config;
/// Cancellable contexts with deadlines
pub mod context;
/// Turns iterations into remote calls
pub mod driver;
/// Error types
pub mod error;
/// Bounded-concurrency admission of work
pub mod executor;
/// Concurrent metric storage
pub mod ledger;
/// Per-operation statistics
pub mod metric;
/// The service under load
pub mod remote;
/// Reports and Reporters
pub mod report;
/// Traffic shapes and the cycle loop
pub mod shape;
/// Main module that glues everything together
pub mod simulation;

pub use config::SimConfig;
pub use context::Context;
pub use driver::EventDriver;
pub use error::{AdmissionError, BoxError, CallError, ConfigError, PoolError};
pub use executor::BoundedExecutor;
pub use ledger::MetricsLedger;
pub use metric::{Category, MetricRecord};
pub use remote::{HttpCaller, Operation, RemoteCaller};
pub use report::{JsonReporter, Report, Reporter, StdoutReporter};
pub use shape::{RunSummary, Shape};
pub use simulation::{SimParams, Simulation};
