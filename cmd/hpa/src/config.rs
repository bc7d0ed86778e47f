use anyhow::{anyhow, Context, Result};

const DEFAULT_TOLERANCE: f64 = 0.1;
const DEFAULT_CPU_INITIALIZATION_PERIOD_SECS: i64 = 300;
const DEFAULT_INITIAL_READINESS_DELAY_SECS: i64 = 30;
const DEFAULT_METRICS_ENDPOINT: &str = "http://127.0.0.1:9443";

/// Runtime configuration from environment variables. Every variable has a
/// default; only a present-but-unparseable value is fatal.
#[derive(Debug, Clone)]
pub struct Config {
    /// Dead band around a usage ratio of 1.0 (`tolerance`).
    pub tolerance: f64,
    /// CPU grace window in seconds (`cpuInitializationPeriod`).
    pub cpu_initialization_period_secs: i64,
    /// Initial-readiness grace window in seconds (`initialReadinessDelay`).
    pub initial_readiness_delay_secs: i64,
    /// Base URL of the metrics collector API (`metricsEndpoint`).
    pub metrics_endpoint: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            tolerance: parse_env("tolerance", DEFAULT_TOLERANCE)
                .context("Invalid tolerance provided")?,
            cpu_initialization_period_secs: parse_env(
                "cpuInitializationPeriod",
                DEFAULT_CPU_INITIALIZATION_PERIOD_SECS,
            )
            .context("Invalid CPU initialization period provided")?,
            initial_readiness_delay_secs: parse_env(
                "initialReadinessDelay",
                DEFAULT_INITIAL_READINESS_DELAY_SECS,
            )
            .context("Invalid initial readiness delay provided")?,
            metrics_endpoint: std::env::var("metricsEndpoint")
                .unwrap_or_else(|_| DEFAULT_METRICS_ENDPOINT.to_string()),
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| anyhow!("failed to parse {name}={value:?}: {e}")),
        Err(_) => Ok(default),
    }
}
