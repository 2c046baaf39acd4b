//! Configuration from the environment.
//!
//! Every field has a default. A missing variable falls back quietly (info
//! log); a variable that does not parse falls back with a warning. Command
//! line flags in the binary override whatever is loaded here.

use std::{env, str::FromStr, time::Duration};

use serde::Serialize;

use crate::{
    driver::DEFAULT_POST_TEXT,
    error::ConfigError,
    shape::{Shape, DEFAULT_CYCLE_LENGTH},
    simulation::SimParams,
};

pub const ENV_URL: &str = "SIM_URL";
pub const ENV_THREADS: &str = "SIM_THREADS";
pub const ENV_TRAFFIC_TYPE: &str = "SIM_TRAFFIC_TYPE";
pub const ENV_SUBJECTS: &str = "SIM_SUBJECTS";
pub const ENV_DURATION: &str = "SIM_DURATION";
pub const ENV_CYCLE_SECS: &str = "SIM_CYCLE_SECS";
pub const ENV_SEED: &str = "SIM_SEED";
pub const ENV_POST_TEXT: &str = "SIM_POST_TEXT";

pub const DEFAULT_THREADS: usize = 5;
pub const DEFAULT_SUBJECTS: usize = 100;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimConfig {
    pub url: Option<String>,
    pub threads: usize,
    pub traffic: Shape,
    pub subjects: usize,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    #[serde(with = "humantime_serde")]
    pub cycle_length: Duration,
    pub seed: Option<u64>,
    pub post_text: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            url: None,
            threads: DEFAULT_THREADS,
            traffic: Shape::Flat,
            subjects: DEFAULT_SUBJECTS,
            duration: DEFAULT_DURATION,
            cycle_length: DEFAULT_CYCLE_LENGTH,
            seed: None,
            post_text: DEFAULT_POST_TEXT.to_string(),
        }
    }
}

impl SimConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let duration: humantime::Duration = load(&lookup, ENV_DURATION, defaults.duration.into());
        Self {
            url: lookup(ENV_URL).filter(|url| !url.is_empty()),
            threads: load(&lookup, ENV_THREADS, defaults.threads),
            traffic: load(&lookup, ENV_TRAFFIC_TYPE, defaults.traffic),
            subjects: load(&lookup, ENV_SUBJECTS, defaults.subjects),
            duration: duration.into(),
            cycle_length: Duration::from_secs(load(
                &lookup,
                ENV_CYCLE_SECS,
                defaults.cycle_length.as_secs(),
            )),
            seed: lookup(ENV_SEED).and_then(|raw| match raw.parse() {
                Ok(seed) => Some(seed),
                Err(_) => {
                    tracing::warn!("Invalid {ENV_SEED} field '{raw}', using a random seed");
                    None
                }
            }),
            post_text: lookup(ENV_POST_TEXT)
                .filter(|text| !text.is_empty())
                .unwrap_or(defaults.post_text),
        }
    }

    /// Turn the configuration into simulation parameters.
    pub fn params(&self) -> Result<SimParams, ConfigError> {
        let url = self.url.clone().ok_or(ConfigError::MissingUrl)?;
        if self.cycle_length.is_zero() {
            return Err(ConfigError::ZeroCycleLength);
        }
        let params = SimParams {
            base_target: url,
            concurrency: self.threads,
            max_subjects: self.subjects,
            run_duration: self.duration,
            cycle_length: self.cycle_length,
            seed: self.seed,
            post_text: self.post_text.clone(),
        };
        Ok(params)
    }
}

fn load<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => {
            tracing::info!("No {key} field, defaulting to {default}");
            default
        }
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {key} field '{raw}', defaulting to {default}");
            default
        }),
    }
}
