//! Metric gathering: collects per-pod and scalar samples for each metric
//! spec, classifying pods into ready / ignored / missing along the way.
//! Per-spec failures are tolerated; gathering only fails outright when
//! every spec fails.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use pkg_client::{ClientError, MetricsClient, PodLister};
use pkg_types::selector::ParseError;
use pkg_types::{
    GatheredMetric, Measurement, MetricIdentifier, MetricSpec, ResourceName, ScaleTarget, Selector,
    Workload, WorkloadError,
};

pub mod external;
pub mod object;
pub mod pods;
pub mod podutil;
pub mod resource;

pub use external::ExternalGatherer;
pub use object::ObjectGatherer;
pub use pods::PodsGatherer;
pub use podutil::PodReadyCounter;
pub use resource::ResourceGatherer;

#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    /// The spec's target shape is not understood for its source kind.
    #[error("{0}")]
    InvalidSpec(String),

    #[error(transparent)]
    SelectorParse(#[from] ParseError),

    #[error(transparent)]
    UnsupportedResource(#[from] WorkloadError),

    #[error("unable to get metric {name}: {cause}")]
    MetricFetch {
        name: String,
        #[source]
        cause: ClientError,
    },

    #[error("unable to get metrics for resource {resource}: {cause}")]
    ResourceFetch {
        resource: ResourceName,
        #[source]
        cause: ClientError,
    },

    #[error("unable to get pods while calculating replica count: {cause}")]
    PodList {
        #[source]
        cause: ClientError,
    },

    #[error("no pods returned by selector while calculating replica count")]
    NoPods,

    #[error("missing request for {0}")]
    MissingRequest(ResourceName),

    #[error("failed to get {kind} metric: {cause}")]
    Source {
        kind: &'static str,
        #[source]
        cause: Box<GatherError>,
    },

    #[error("no metric specs supplied")]
    NoSpecs,

    #[error("invalid metrics ({invalid} invalid out of {total}), first error is: {first}")]
    AllInvalid {
        invalid: usize,
        total: usize,
        first: Box<GatherError>,
    },
}

impl GatherError {
    fn for_source(kind: &'static str, cause: GatherError) -> GatherError {
        GatherError::Source {
            kind,
            cause: Box::new(cause),
        }
    }
}

/// Dispatches metric specs to the per-source gatherers and collects the
/// results in spec order.
pub struct Gatherer {
    resource: ResourceGatherer,
    pods: PodsGatherer,
    object: ObjectGatherer,
    external: ExternalGatherer,
}

impl Gatherer {
    pub fn new(
        metrics_client: Arc<dyn MetricsClient>,
        pod_lister: Arc<dyn PodLister>,
        cpu_initialization_period: Duration,
        initial_readiness_delay: Duration,
    ) -> Self {
        let ready_counter = PodReadyCounter::new(pod_lister.clone());
        Gatherer {
            resource: ResourceGatherer::new(
                metrics_client.clone(),
                pod_lister.clone(),
                cpu_initialization_period,
                initial_readiness_delay,
            ),
            pods: PodsGatherer::new(metrics_client.clone(), pod_lister),
            object: ObjectGatherer::new(metrics_client.clone(), ready_counter.clone()),
            external: ExternalGatherer::new(metrics_client, ready_counter),
        }
    }

    /// Gather every spec against the workload's scale target. Individual
    /// spec failures are logged and skipped; the call fails only when the
    /// workload kind is unsupported or every spec fails.
    pub async fn gather(
        &self,
        specs: &[MetricSpec],
        workload: &Workload,
    ) -> Result<Vec<GatheredMetric>, GatherError> {
        let target = workload.scale_target()?;
        if specs.is_empty() {
            return Err(GatherError::NoSpecs);
        }

        let now = Utc::now();
        let mut gathered = Vec::with_capacity(specs.len());
        let mut first_error: Option<GatherError> = None;
        let mut invalid = 0usize;

        for spec in specs {
            match self.gather_spec(spec, &target, now).await {
                Ok(measurement) => {
                    debug!(
                        "gathered {} metric for {}/{}",
                        spec.source_kind(),
                        target.namespace,
                        target.name
                    );
                    gathered.push(GatheredMetric {
                        current_replicas: target.replicas,
                        spec: spec.clone(),
                        measurement,
                    });
                }
                Err(err) => {
                    warn!("skipping {} metric: {}", spec.source_kind(), err);
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    invalid += 1;
                }
            }
        }

        if let Some(first) = first_error {
            if invalid >= specs.len() {
                return Err(GatherError::AllInvalid {
                    invalid,
                    total: specs.len(),
                    first: Box::new(first),
                });
            }
        }

        Ok(gathered)
    }

    async fn gather_spec(
        &self,
        spec: &MetricSpec,
        target: &ScaleTarget,
        now: DateTime<Utc>,
    ) -> Result<Measurement, GatherError> {
        match spec {
            MetricSpec::Resource {
                name,
                target: metric_target,
            } => {
                if metric_target.average_value.is_some() {
                    let measurement = self
                        .resource
                        .gather_raw(*name, &target.namespace, &target.selector, now)
                        .await
                        .map_err(|e| GatherError::for_source("resource", e))?;
                    Ok(Measurement::Resource(measurement))
                } else if metric_target.average_utilization.is_some() {
                    let measurement = self
                        .resource
                        .gather(*name, &target.namespace, &target.selector, now)
                        .await
                        .map_err(|e| GatherError::for_source("resource", e))?;
                    Ok(Measurement::Resource(measurement))
                } else {
                    Err(GatherError::InvalidSpec(
                        "invalid resource metric source: neither a utilization target nor a value target was set"
                            .to_string(),
                    ))
                }
            }

            MetricSpec::Pods { metric, .. } => {
                let metric_selector =
                    parse_metric_selector(metric).map_err(|e| GatherError::for_source("pods", e))?;
                let measurement = self
                    .pods
                    .gather(
                        &metric.name,
                        &target.namespace,
                        &target.selector,
                        &metric_selector,
                        now,
                    )
                    .await
                    .map_err(|e| GatherError::for_source("pods", e))?;
                Ok(Measurement::Pods(measurement))
            }

            MetricSpec::Object {
                described_object,
                metric,
                target: metric_target,
            } => {
                let metric_selector = parse_metric_selector(metric)
                    .map_err(|e| GatherError::for_source("object", e))?;
                if metric_target.value.is_some() {
                    let measurement = self
                        .object
                        .gather_value(
                            &metric.name,
                            &target.namespace,
                            described_object,
                            &target.selector,
                            &metric_selector,
                        )
                        .await
                        .map_err(|e| GatherError::for_source("object", e))?;
                    Ok(Measurement::Object(measurement))
                } else if metric_target.average_value.is_some() {
                    let measurement = self
                        .object
                        .gather_per_pod(
                            &metric.name,
                            &target.namespace,
                            described_object,
                            &metric_selector,
                        )
                        .await
                        .map_err(|e| GatherError::for_source("object", e))?;
                    Ok(Measurement::Object(measurement))
                } else {
                    Err(GatherError::InvalidSpec(
                        "invalid object metric source: neither a value target nor an average value target was set"
                            .to_string(),
                    ))
                }
            }

            MetricSpec::External {
                metric,
                target: metric_target,
            } => {
                let metric_selector = parse_metric_selector(metric)
                    .map_err(|e| GatherError::for_source("external", e))?;
                if metric_target.average_value.is_some() {
                    let measurement = self
                        .external
                        .gather_per_pod(&metric.name, &target.namespace, &metric_selector)
                        .await
                        .map_err(|e| GatherError::for_source("external", e))?;
                    Ok(Measurement::External(measurement))
                } else if metric_target.value.is_some() {
                    let measurement = self
                        .external
                        .gather_value(
                            &metric.name,
                            &target.namespace,
                            &metric_selector,
                            &target.selector,
                        )
                        .await
                        .map_err(|e| GatherError::for_source("external", e))?;
                    Ok(Measurement::External(measurement))
                } else {
                    Err(GatherError::InvalidSpec(
                        "invalid external metric source: neither a value target nor an average value target was set"
                            .to_string(),
                    ))
                }
            }
        }
    }
}

fn parse_metric_selector(metric: &MetricIdentifier) -> Result<Selector, GatherError> {
    Ok(metric.selector.as_deref().unwrap_or("").parse()?)
}
