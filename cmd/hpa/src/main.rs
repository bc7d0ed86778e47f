//! Horizontal Pod Autoscaler control-plane stages as a stdin/stdout tool.
//!
//! Two modes, invoked independently by the outer control loop:
//! `--mode metric` gathers the metrics named in the `metrics` environment
//! variable for the workload fed on stdin and writes them as JSON;
//! `--mode evaluate` takes previously gathered metrics on stdin and writes
//! the target replica count. All state lives within a single invocation.

use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, ensure, Context, Result};
use chrono::Duration;
use clap::Parser;
use serde::Deserialize;
use tracing::{debug, info};

use pkg_client::{HttpMetricsClient, HttpPodLister};
use pkg_evaluate::Evaluator;
use pkg_gather::Gatherer;
use pkg_types::{Evaluation, GatheredMetric, MetricSpec, Workload};

mod config;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "hpa", about = "Horizontal Pod Autoscaler metric gathering and evaluation")]
struct Cli {
    /// Command mode, either metric or evaluate
    #[arg(long, default_value = "no_mode")]
    mode: String,
}

/// Stdin document for metric mode.
#[derive(Debug, Deserialize)]
struct GatherInput {
    resource: Workload,
    #[serde(default, rename = "runType")]
    run_type: String,
}

/// Stdin document for evaluate mode. Gathered metrics arrive embedded as
/// a JSON string under `metrics[].value`.
#[derive(Debug, Deserialize)]
struct EvaluateInput {
    #[serde(default)]
    metrics: Vec<SerializedMetrics>,
    resource: Workload,
    #[serde(default, rename = "runType")]
    run_type: String,
}

#[derive(Debug, Deserialize)]
struct SerializedMetrics {
    value: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries the result document, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut stdin = String::new();
    std::io::stdin()
        .read_to_string(&mut stdin)
        .context("failed to read stdin")?;

    match cli.mode.as_str() {
        "metric" => gather(&stdin).await,
        "evaluate" => evaluate(&stdin).await,
        mode => bail!("Unknown command mode: {mode}"),
    }
}

async fn gather(stdin: &str) -> Result<()> {
    let input: GatherInput =
        serde_yaml::from_str(stdin).context("failed to parse metric gathering input")?;
    debug!("gathering for run type {:?}", input.run_type);

    let specs_value = std::env::var("metrics").map_err(|_| anyhow::anyhow!("Metric specs not supplied"))?;
    let specs: Vec<MetricSpec> =
        serde_yaml::from_str(&specs_value).context("failed to parse metric specs")?;
    ensure!(!specs.is_empty(), "Metric specs not supplied");

    let config = Config::from_env()?;
    let metrics_client = Arc::new(HttpMetricsClient::new(&config.metrics_endpoint));
    let pod_lister = Arc::new(HttpPodLister::new(&config.metrics_endpoint));

    let gatherer = Gatherer::new(
        metrics_client,
        pod_lister,
        Duration::seconds(config.cpu_initialization_period_secs),
        Duration::seconds(config.initial_readiness_delay_secs),
    );

    let gathered = gatherer.gather(&specs, &input.resource).await?;
    info!(
        "gathered {} of {} metrics for {}",
        gathered.len(),
        specs.len(),
        input.resource.metadata.name
    );

    print!("{}", serde_json::to_string(&gathered)?);
    Ok(())
}

async fn evaluate(stdin: &str) -> Result<()> {
    let input: EvaluateInput =
        serde_yaml::from_str(stdin).context("failed to parse evaluation input")?;
    debug!("evaluating for run type {:?}", input.run_type);

    let embedded = input
        .metrics
        .first()
        .ok_or_else(|| anyhow::anyhow!("No metrics provided"))?;
    let gathered: Vec<GatheredMetric> =
        serde_yaml::from_str(&embedded.value).context("failed to parse gathered metrics")?;
    ensure!(!gathered.is_empty(), "No metrics provided");

    let target = input.resource.scale_target()?;
    let config = Config::from_env()?;

    let evaluator = Evaluator::new(config.tolerance);
    let evaluation: Evaluation = evaluator.evaluate(&gathered, target.replicas)?;
    info!(
        "{} -> {} replicas for {}",
        target.replicas, evaluation.target_replicas, target.name
    );

    print!("{}", serde_json::to_string(&evaluation)?);
    Ok(())
}
