use pkg_types::{Evaluation, GatheredMetric, Measurement, MetricSpec};

use crate::calculate::ReplicaCalculator;
use crate::EvaluateError;

/// Produces an evaluation from an Object measurement.
pub trait ObjectEvaluator: Send + Sync {
    fn evaluation(
        &self,
        current_replicas: i32,
        metric: &GatheredMetric,
    ) -> Result<Evaluation, EvaluateError>;
}

pub struct ObjectEvaluate {
    pub calculator: ReplicaCalculator,
}

impl ObjectEvaluator for ObjectEvaluate {
    fn evaluation(
        &self,
        current_replicas: i32,
        metric: &GatheredMetric,
    ) -> Result<Evaluation, EvaluateError> {
        let MetricSpec::Object { target, .. } = &metric.spec else {
            return Err(EvaluateError::InvalidSpec(
                "invalid object metric source: spec is not an object spec".to_string(),
            ));
        };
        let Measurement::Object(measurement) = &metric.measurement else {
            return Err(EvaluateError::MissingMeasurement("object"));
        };

        if let Some(value) = &target.value {
            let usage_ratio = measurement.utilization as f64 / value.milli_value() as f64;
            let ready_pod_count = measurement
                .ready_pod_count
                .ok_or(EvaluateError::MissingReadyPodCount)?;
            let target_replicas =
                self.calculator
                    .usage_ratio_replica_count(current_replicas, usage_ratio, ready_pod_count);
            return Ok(Evaluation { target_replicas });
        }

        if let Some(average_value) = &target.average_value {
            let target_replicas = self.calculator.per_pod_average_replica_count(
                measurement.utilization,
                average_value.milli_value(),
                current_replicas,
            );
            return Ok(Evaluation { target_replicas });
        }

        Err(EvaluateError::InvalidSpec(
            "invalid object metric source: neither a value target nor an average value target was set"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::{
        MetricIdentifier, MetricTarget, ObjectMeasurement, ObjectReference, Quantity,
    };

    fn make_metric(target: MetricTarget, utilization: i64, ready: Option<i64>) -> GatheredMetric {
        GatheredMetric {
            current_replicas: 0,
            spec: MetricSpec::Object {
                described_object: ObjectReference {
                    api_version: None,
                    kind: "Ingress".to_string(),
                    name: "main-route".to_string(),
                },
                metric: MetricIdentifier {
                    name: "requests-per-second".to_string(),
                    selector: None,
                },
                target,
            },
            measurement: Measurement::Object(ObjectMeasurement {
                utilization,
                ready_pod_count: ready,
                timestamp: Default::default(),
            }),
        }
    }

    fn make_evaluator(tolerance: f64) -> ObjectEvaluate {
        ObjectEvaluate {
            calculator: ReplicaCalculator::new(tolerance),
        }
    }

    #[test]
    fn value_target_scales_by_ready_pods() {
        let evaluator = make_evaluator(0.1);
        let metric = make_metric(
            MetricTarget {
                value: Some(Quantity::from_milli(20_000)),
                ..MetricTarget::default()
            },
            40_000,
            Some(3),
        );
        let evaluation = evaluator.evaluation(3, &metric).unwrap();
        assert_eq!(evaluation.target_replicas, 6);
    }

    #[test]
    fn value_target_scales_from_zero_replicas() {
        let evaluator = make_evaluator(0.1);
        let metric = make_metric(
            MetricTarget {
                value: Some(Quantity::from_milli(20_000)),
                ..MetricTarget::default()
            },
            40_000,
            Some(0),
        );
        let evaluation = evaluator.evaluation(0, &metric).unwrap();
        assert_eq!(evaluation.target_replicas, 2);
    }

    #[test]
    fn average_value_target_spreads_over_replicas() {
        let evaluator = make_evaluator(0.1);
        let metric = make_metric(
            MetricTarget {
                average_value: Some(Quantity::from_milli(20_000)),
                ..MetricTarget::default()
            },
            90_000,
            None,
        );
        let evaluation = evaluator.evaluation(3, &metric).unwrap();
        assert_eq!(evaluation.target_replicas, 5);
    }

    #[test]
    fn value_target_without_ready_count_is_an_error() {
        let evaluator = make_evaluator(0.1);
        let metric = make_metric(
            MetricTarget {
                value: Some(Quantity::from_milli(20_000)),
                ..MetricTarget::default()
            },
            40_000,
            None,
        );
        let err = evaluator.evaluation(3, &metric).unwrap_err();
        assert!(err.to_string().contains("ready pod count"));
    }

    #[test]
    fn no_applicable_target_shape_is_invalid() {
        let evaluator = make_evaluator(0.1);
        let metric = make_metric(
            MetricTarget {
                average_utilization: Some(50),
                ..MetricTarget::default()
            },
            40_000,
            Some(3),
        );
        let err = evaluator.evaluation(3, &metric).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid object metric source: neither a value target nor an average value target was set"
        );
    }
}
