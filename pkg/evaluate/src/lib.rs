//! Evaluation: turns gathered metrics into a single target replica count.
//! Each metric proposes a count; the maximum of the successful proposals
//! wins. Per-metric failures are tolerated; evaluation only fails outright
//! when every metric fails.

use tracing::{debug, warn};

use pkg_types::{Evaluation, GatheredMetric, MetricSpec};

pub mod calculate;
pub mod external;
pub mod object;
pub mod pods;
pub mod resource;

pub use calculate::ReplicaCalculator;
pub use external::{ExternalEvaluate, ExternalEvaluator};
pub use object::{ObjectEvaluate, ObjectEvaluator};
pub use pods::{PodsEvaluate, PodsEvaluator};
pub use resource::{ResourceEvaluate, ResourceEvaluator};

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    /// The spec's target shape is not understood for its source kind.
    #[error("{0}")]
    InvalidSpec(String),

    /// The augmented sample set shares no pod with the request map.
    #[error("no metrics returned matched known pods")]
    NoMatchingPods,

    /// The gathered metric carries a different source's measurement.
    #[error("gathered metric does not contain a {0} measurement")]
    MissingMeasurement(&'static str),

    /// A Value-target evaluation needs the ready pod count the gatherer
    /// did not record.
    #[error("gathered metric does not contain a ready pod count")]
    MissingReadyPodCount,

    #[error("no metrics provided to evaluate")]
    NoMetrics,

    /// Every supplied metric failed to evaluate.
    #[error("invalid evaluations ({invalid} invalid out of {total}), first error is: {first}")]
    AllInvalid {
        invalid: usize,
        total: usize,
        first: Box<EvaluateError>,
    },
}

/// Dispatches gathered metrics to the per-source evaluators and aggregates
/// the proposals by maximum.
pub struct Evaluator {
    resource: Box<dyn ResourceEvaluator>,
    pods: Box<dyn PodsEvaluator>,
    object: Box<dyn ObjectEvaluator>,
    external: Box<dyn ExternalEvaluator>,
}

impl Evaluator {
    /// Wire up the standard per-source evaluators sharing one tolerance.
    pub fn new(tolerance: f64) -> Self {
        let calculator = ReplicaCalculator::new(tolerance);
        Evaluator {
            resource: Box::new(ResourceEvaluate { calculator }),
            pods: Box::new(PodsEvaluate { calculator }),
            object: Box::new(ObjectEvaluate { calculator }),
            external: Box::new(ExternalEvaluate { calculator }),
        }
    }

    /// An evaluator with injected per-source evaluators, for tests and
    /// alternative wirings.
    pub fn with_evaluators(
        resource: Box<dyn ResourceEvaluator>,
        pods: Box<dyn PodsEvaluator>,
        object: Box<dyn ObjectEvaluator>,
        external: Box<dyn ExternalEvaluator>,
    ) -> Self {
        Evaluator {
            resource,
            pods,
            object,
            external,
        }
    }

    /// Evaluate every gathered metric against `current_replicas` and
    /// return the maximum proposed replica count. Individual failures are
    /// logged and skipped; the call fails only when every metric fails.
    pub fn evaluate(
        &self,
        metrics: &[GatheredMetric],
        current_replicas: i32,
    ) -> Result<Evaluation, EvaluateError> {
        let mut best: Option<Evaluation> = None;
        let mut first_error: Option<EvaluateError> = None;
        let mut invalid = 0usize;

        for metric in metrics {
            match self.single(current_replicas, metric) {
                Ok(proposed) => {
                    debug!(
                        "{} metric proposes {} replicas",
                        metric.spec.source_kind(),
                        proposed.target_replicas
                    );
                    best = Some(match best {
                        Some(current) if current.target_replicas >= proposed.target_replicas => {
                            current
                        }
                        _ => proposed,
                    });
                }
                Err(err) => {
                    warn!(
                        "skipping {} metric evaluation: {}",
                        metric.spec.source_kind(),
                        err
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    invalid += 1;
                }
            }
        }

        if let Some(first) = first_error {
            if invalid >= metrics.len() {
                return Err(EvaluateError::AllInvalid {
                    invalid,
                    total: metrics.len(),
                    first: Box::new(first),
                });
            }
        }

        best.ok_or(EvaluateError::NoMetrics)
    }

    fn single(
        &self,
        current_replicas: i32,
        metric: &GatheredMetric,
    ) -> Result<Evaluation, EvaluateError> {
        match &metric.spec {
            MetricSpec::Resource { .. } => self.resource.evaluation(current_replicas, metric),
            MetricSpec::Pods { .. } => self.pods.evaluation(current_replicas, metric),
            MetricSpec::Object { .. } => self.object.evaluation(current_replicas, metric),
            MetricSpec::External { .. } => self.external.evaluation(current_replicas, metric),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::{
        ExternalMeasurement, Measurement, MetricIdentifier, MetricTarget, ObjectMeasurement,
        ObjectReference, PodSample, PodSampleMap, PodsMeasurement, Quantity, ResourceMeasurement,
        ResourceName,
    };
    use std::collections::BTreeSet;

    /// Reactor-style fake, usable for any of the per-source slots.
    struct FakeEvaluator {
        reactor: Box<dyn Fn(i32, &GatheredMetric) -> Result<Evaluation, EvaluateError> + Send + Sync>,
    }

    impl FakeEvaluator {
        fn proposing(target_replicas: i32) -> Box<Self> {
            Box::new(FakeEvaluator {
                reactor: Box::new(move |_, _| Ok(Evaluation { target_replicas })),
            })
        }

        fn failing(message: &'static str) -> Box<Self> {
            Box::new(FakeEvaluator {
                reactor: Box::new(move |_, _| {
                    Err(EvaluateError::InvalidSpec(message.to_string()))
                }),
            })
        }
    }

    impl ResourceEvaluator for FakeEvaluator {
        fn evaluation(
            &self,
            current_replicas: i32,
            metric: &GatheredMetric,
        ) -> Result<Evaluation, EvaluateError> {
            (self.reactor)(current_replicas, metric)
        }
    }
    impl PodsEvaluator for FakeEvaluator {
        fn evaluation(
            &self,
            current_replicas: i32,
            metric: &GatheredMetric,
        ) -> Result<Evaluation, EvaluateError> {
            (self.reactor)(current_replicas, metric)
        }
    }
    impl ObjectEvaluator for FakeEvaluator {
        fn evaluation(
            &self,
            current_replicas: i32,
            metric: &GatheredMetric,
        ) -> Result<Evaluation, EvaluateError> {
            (self.reactor)(current_replicas, metric)
        }
    }
    impl ExternalEvaluator for FakeEvaluator {
        fn evaluation(
            &self,
            current_replicas: i32,
            metric: &GatheredMetric,
        ) -> Result<Evaluation, EvaluateError> {
            (self.reactor)(current_replicas, metric)
        }
    }

    fn resource_metric() -> GatheredMetric {
        GatheredMetric {
            current_replicas: 2,
            spec: MetricSpec::Resource {
                name: ResourceName::Cpu,
                target: MetricTarget {
                    average_utilization: Some(50),
                    ..MetricTarget::default()
                },
            },
            measurement: Measurement::Resource(ResourceMeasurement::default()),
        }
    }

    fn pods_metric() -> GatheredMetric {
        GatheredMetric {
            current_replicas: 2,
            spec: MetricSpec::Pods {
                metric: MetricIdentifier {
                    name: "tps".to_string(),
                    selector: None,
                },
                target: MetricTarget {
                    average_value: Some(Quantity::from_milli(20_000)),
                    ..MetricTarget::default()
                },
            },
            measurement: Measurement::Pods(PodsMeasurement::default()),
        }
    }

    fn object_metric() -> GatheredMetric {
        GatheredMetric {
            current_replicas: 2,
            spec: MetricSpec::Object {
                described_object: ObjectReference {
                    api_version: None,
                    kind: "Ingress".to_string(),
                    name: "main".to_string(),
                },
                metric: MetricIdentifier {
                    name: "rps".to_string(),
                    selector: None,
                },
                target: MetricTarget {
                    value: Some(Quantity::from_units(10)),
                    ..MetricTarget::default()
                },
            },
            measurement: Measurement::Object(ObjectMeasurement {
                utilization: 0,
                ready_pod_count: Some(1),
                timestamp: Default::default(),
            }),
        }
    }

    fn external_metric() -> GatheredMetric {
        GatheredMetric {
            current_replicas: 2,
            spec: MetricSpec::External {
                metric: MetricIdentifier {
                    name: "queue-depth".to_string(),
                    selector: None,
                },
                target: MetricTarget {
                    average_value: Some(Quantity::from_units(30)),
                    ..MetricTarget::default()
                },
            },
            measurement: Measurement::External(ExternalMeasurement {
                utilization: 0,
                ready_pod_count: None,
                timestamp: Default::default(),
            }),
        }
    }

    #[test]
    fn aggregates_by_maximum() {
        let evaluator = Evaluator::with_evaluators(
            FakeEvaluator::proposing(5),
            FakeEvaluator::proposing(-25),
            FakeEvaluator::proposing(3),
            FakeEvaluator::proposing(9),
        );
        let metrics = vec![
            resource_metric(),
            pods_metric(),
            object_metric(),
            external_metric(),
        ];
        let evaluation = evaluator.evaluate(&metrics, 2).unwrap();
        assert_eq!(evaluation.target_replicas, 9);
    }

    #[test]
    fn one_failure_among_successes_is_tolerated() {
        let evaluator = Evaluator::with_evaluators(
            FakeEvaluator::proposing(5),
            FakeEvaluator::failing("fail to evaluate"),
            FakeEvaluator::proposing(3),
            FakeEvaluator::proposing(4),
        );
        let metrics = vec![
            resource_metric(),
            pods_metric(),
            object_metric(),
            external_metric(),
        ];
        let evaluation = evaluator.evaluate(&metrics, 2).unwrap();
        assert_eq!(evaluation.target_replicas, 5);
    }

    #[test]
    fn all_failures_fail_with_the_first_error() {
        let evaluator = Evaluator::with_evaluators(
            FakeEvaluator::failing("resource broke"),
            FakeEvaluator::failing("pods broke"),
            FakeEvaluator::proposing(3),
            FakeEvaluator::proposing(4),
        );
        let metrics = vec![resource_metric(), pods_metric()];
        let err = evaluator.evaluate(&metrics, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid evaluations (2 invalid out of 2), first error is: resource broke"
        );
    }

    #[test]
    fn no_metrics_is_an_error() {
        let evaluator = Evaluator::new(0.1);
        let err = evaluator.evaluate(&[], 2).unwrap_err();
        assert!(matches!(err, EvaluateError::NoMetrics));
    }

    #[test]
    fn end_to_end_resource_utilization() {
        // Two pods at 100% of requests against a 50% target: double.
        let samples: PodSampleMap = [
            ("pod-1".to_string(), PodSample::with_value(10)),
            ("pod-2".to_string(), PodSample::with_value(10)),
        ]
        .into();
        let metric = GatheredMetric {
            current_replicas: 2,
            spec: MetricSpec::Resource {
                name: ResourceName::Cpu,
                target: MetricTarget {
                    average_utilization: Some(50),
                    ..MetricTarget::default()
                },
            },
            measurement: Measurement::Resource(ResourceMeasurement {
                samples,
                requests: [("pod-1".to_string(), 10), ("pod-2".to_string(), 10)].into(),
                ready_pod_count: 2,
                ignored_pods: BTreeSet::new(),
                missing_pods: BTreeSet::new(),
                total_pods: 2,
                timestamp: Default::default(),
            }),
        };

        let evaluator = Evaluator::new(0.1);
        let evaluation = evaluator.evaluate(&[metric], 2).unwrap();
        assert_eq!(evaluation.target_replicas, 4);
    }
}
