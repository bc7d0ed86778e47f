use pkg_types::{Evaluation, GatheredMetric, Measurement, MetricSpec};

use crate::calculate::ReplicaCalculator;
use crate::EvaluateError;

/// Produces an evaluation from a Pods measurement.
pub trait PodsEvaluator: Send + Sync {
    fn evaluation(
        &self,
        current_replicas: i32,
        metric: &GatheredMetric,
    ) -> Result<Evaluation, EvaluateError>;
}

pub struct PodsEvaluate {
    pub calculator: ReplicaCalculator,
}

impl PodsEvaluator for PodsEvaluate {
    fn evaluation(
        &self,
        current_replicas: i32,
        metric: &GatheredMetric,
    ) -> Result<Evaluation, EvaluateError> {
        let MetricSpec::Pods { target, .. } = &metric.spec else {
            return Err(EvaluateError::InvalidSpec(
                "invalid pods metric source: spec is not a pods spec".to_string(),
            ));
        };
        let Measurement::Pods(measurement) = &metric.measurement else {
            return Err(EvaluateError::MissingMeasurement("pods"));
        };
        let Some(average_value) = &target.average_value else {
            return Err(EvaluateError::InvalidSpec(
                "invalid pods metric source: no average value target was set".to_string(),
            ));
        };

        let target_replicas = self.calculator.plain_metric_replica_count(
            &measurement.samples,
            current_replicas,
            average_value.milli_value(),
            measurement.ready_pod_count,
            &measurement.missing_pods,
            &measurement.ignored_pods,
        );
        Ok(Evaluation { target_replicas })
    }
}
