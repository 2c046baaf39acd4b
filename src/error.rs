use thiserror::Error;

/// Boxed error produced by a unit of work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a context stopped admitting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Errors surfaced by [`crate::executor::BoundedExecutor`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// The context ended before a slot could be acquired.
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    /// The executor was drained and accepts no more work.
    #[error("executor is closed")]
    Closed,

    /// First failure of a fire-and-forget work item.
    #[error("caught async error: {0}")]
    Async(#[source] BoxError),

    /// The latched failure has already been reported once.
    #[error("executor is in a failed state")]
    Failed,

    /// Failure of a work item run with [`crate::executor::BoundedExecutor::run`].
    #[error("work execution error: {0}")]
    Work(#[source] BoxError),
}

impl PoolError {
    /// True when the error only means the cycle or run is over.
    pub fn is_admission(&self) -> bool {
        matches!(self, PoolError::Admission(_) | PoolError::Closed)
    }
}

/// Errors from the remote service.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("received HTTP status {status} with body: {body}")]
    Status { status: u16, body: String },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cycle length must be greater than zero")]
    ZeroCycleLength,

    #[error("unknown traffic type '{0}', use 'max', 'flat', 'cyclical' or 'bursty'")]
    Traffic(String),

    #[error("no target url, pass --url or set SIM_URL")]
    MissingUrl,
}
