use std::sync::Arc;

use pkg_client::MetricsClient;
use pkg_types::{ExternalMeasurement, Selector};

use crate::podutil::PodReadyCounter;
use crate::GatherError;

/// Gathers a metric from outside the cluster (queue length in a cloud
/// messaging service, load balancer QPS, ...). Samples matching the metric
/// selector are summed into a single scalar.
pub struct ExternalGatherer {
    metrics_client: Arc<dyn MetricsClient>,
    ready_counter: PodReadyCounter,
}

impl ExternalGatherer {
    pub fn new(metrics_client: Arc<dyn MetricsClient>, ready_counter: PodReadyCounter) -> Self {
        ExternalGatherer {
            metrics_client,
            ready_counter,
        }
    }

    /// Gather for a Value target: includes the ready pod count behind the
    /// workload's own selector.
    pub async fn gather_value(
        &self,
        metric_name: &str,
        namespace: &str,
        metric_selector: &Selector,
        pod_selector: &Selector,
    ) -> Result<ExternalMeasurement, GatherError> {
        let (utilization, timestamp) = self.fetch(metric_name, namespace, metric_selector).await?;
        let ready_pod_count = self
            .ready_counter
            .ready_pod_count(namespace, pod_selector)
            .await?;

        Ok(ExternalMeasurement {
            utilization,
            ready_pod_count: Some(ready_pod_count),
            timestamp,
        })
    }

    /// Gather for an AverageValue target: the scalar alone suffices.
    pub async fn gather_per_pod(
        &self,
        metric_name: &str,
        namespace: &str,
        metric_selector: &Selector,
    ) -> Result<ExternalMeasurement, GatherError> {
        let (utilization, timestamp) = self.fetch(metric_name, namespace, metric_selector).await?;

        Ok(ExternalMeasurement {
            utilization,
            ready_pod_count: None,
            timestamp,
        })
    }

    async fn fetch(
        &self,
        metric_name: &str,
        namespace: &str,
        metric_selector: &Selector,
    ) -> Result<(i64, chrono::DateTime<chrono::Utc>), GatherError> {
        let (values, timestamp) = self
            .metrics_client
            .external_metric(metric_name, namespace, metric_selector)
            .await
            .map_err(|cause| GatherError::MetricFetch {
                name: metric_name.to_string(),
                cause,
            })?;
        Ok((values.iter().sum(), timestamp))
    }
}
