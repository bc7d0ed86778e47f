use std::sync::Arc;

use pkg_client::MetricsClient;
use pkg_types::{ObjectMeasurement, ObjectReference, Selector};

use crate::podutil::PodReadyCounter;
use crate::GatherError;

/// Gathers a scalar metric describing another object in the cluster
/// (for example hits-per-second on an Ingress).
pub struct ObjectGatherer {
    metrics_client: Arc<dyn MetricsClient>,
    ready_counter: PodReadyCounter,
}

impl ObjectGatherer {
    pub fn new(metrics_client: Arc<dyn MetricsClient>, ready_counter: PodReadyCounter) -> Self {
        ObjectGatherer {
            metrics_client,
            ready_counter,
        }
    }

    /// Gather for a Value target: the evaluator will spread the scalar
    /// over the ready pods, so the ready count is gathered alongside.
    pub async fn gather_value(
        &self,
        metric_name: &str,
        namespace: &str,
        object_ref: &ObjectReference,
        pod_selector: &Selector,
        metric_selector: &Selector,
    ) -> Result<ObjectMeasurement, GatherError> {
        let (utilization, timestamp) = self
            .fetch(metric_name, namespace, object_ref, metric_selector)
            .await?;
        let ready_pod_count = self
            .ready_counter
            .ready_pod_count(namespace, pod_selector)
            .await?;

        Ok(ObjectMeasurement {
            utilization,
            ready_pod_count: Some(ready_pod_count),
            timestamp,
        })
    }

    /// Gather for an AverageValue target: replicas are derived from the
    /// per-pod average, no ready count needed.
    pub async fn gather_per_pod(
        &self,
        metric_name: &str,
        namespace: &str,
        object_ref: &ObjectReference,
        metric_selector: &Selector,
    ) -> Result<ObjectMeasurement, GatherError> {
        let (utilization, timestamp) = self
            .fetch(metric_name, namespace, object_ref, metric_selector)
            .await?;

        Ok(ObjectMeasurement {
            utilization,
            ready_pod_count: None,
            timestamp,
        })
    }

    async fn fetch(
        &self,
        metric_name: &str,
        namespace: &str,
        object_ref: &ObjectReference,
        metric_selector: &Selector,
    ) -> Result<(i64, chrono::DateTime<chrono::Utc>), GatherError> {
        self.metrics_client
            .object_metric(metric_name, namespace, object_ref, metric_selector)
            .await
            .map_err(|cause| GatherError::MetricFetch {
                name: metric_name.to_string(),
                cause,
            })
    }
}
