use pkg_types::{Evaluation, GatheredMetric, Measurement, MetricSpec};

use crate::calculate::ReplicaCalculator;
use crate::EvaluateError;

/// Produces an evaluation from an External measurement.
pub trait ExternalEvaluator: Send + Sync {
    fn evaluation(
        &self,
        current_replicas: i32,
        metric: &GatheredMetric,
    ) -> Result<Evaluation, EvaluateError>;
}

pub struct ExternalEvaluate {
    pub calculator: ReplicaCalculator,
}

impl ExternalEvaluator for ExternalEvaluate {
    fn evaluation(
        &self,
        current_replicas: i32,
        metric: &GatheredMetric,
    ) -> Result<Evaluation, EvaluateError> {
        let MetricSpec::External { target, .. } = &metric.spec else {
            return Err(EvaluateError::InvalidSpec(
                "invalid external metric source: spec is not an external spec".to_string(),
            ));
        };
        let Measurement::External(measurement) = &metric.measurement else {
            return Err(EvaluateError::MissingMeasurement("external"));
        };

        if let Some(average_value) = &target.average_value {
            let target_replicas = self.calculator.per_pod_average_replica_count(
                measurement.utilization,
                average_value.milli_value(),
                current_replicas,
            );
            return Ok(Evaluation { target_replicas });
        }

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

        Err(EvaluateError::InvalidSpec(
            "invalid external metric source: neither a value target nor an average value target was set"
                .to_string(),
        ))
    }
}
