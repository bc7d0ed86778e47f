use pkg_types::{Evaluation, GatheredMetric, Measurement, MetricSpec};

use crate::calculate::ReplicaCalculator;
use crate::EvaluateError;

/// Produces an evaluation from a Resource measurement.
pub trait ResourceEvaluator: Send + Sync {
    fn evaluation(
        &self,
        current_replicas: i32,
        metric: &GatheredMetric,
    ) -> Result<Evaluation, EvaluateError>;
}

pub struct ResourceEvaluate {
    pub calculator: ReplicaCalculator,
}

impl ResourceEvaluator for ResourceEvaluate {
    fn evaluation(
        &self,
        current_replicas: i32,
        metric: &GatheredMetric,
    ) -> Result<Evaluation, EvaluateError> {
        let MetricSpec::Resource { target, .. } = &metric.spec else {
            return Err(EvaluateError::InvalidSpec(
                "invalid resource metric source: spec is not a resource spec".to_string(),
            ));
        };
        let Measurement::Resource(measurement) = &metric.measurement else {
            return Err(EvaluateError::MissingMeasurement("resource"));
        };

        if let Some(average_value) = &target.average_value {
            let target_replicas = self.calculator.plain_metric_replica_count(
                &measurement.samples,
                current_replicas,
                average_value.milli_value(),
                measurement.ready_pod_count,
                &measurement.missing_pods,
                &measurement.ignored_pods,
            );
            return Ok(Evaluation { target_replicas });
        }

        if let Some(target_utilization) = target.average_utilization {
            let target_replicas = self.calculator.utilization_replica_count(
                &measurement.samples,
                &measurement.requests,
                current_replicas,
                target_utilization,
                measurement.ready_pod_count,
                &measurement.missing_pods,
                &measurement.ignored_pods,
            )?;
            return Ok(Evaluation { target_replicas });
        }

        Err(EvaluateError::InvalidSpec(
            "invalid resource metric source: neither a utilization target nor a value target was set"
                .to_string(),
        ))
    }
}
