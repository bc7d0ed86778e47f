use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use pkg_client::{MetricsClient, PodLister};
use pkg_types::{PodsMeasurement, Selector};

use crate::podutil;
use crate::GatherError;

/// Gathers per-pod samples of an arbitrary named metric.
pub struct PodsGatherer {
    metrics_client: Arc<dyn MetricsClient>,
    pod_lister: Arc<dyn PodLister>,
}

impl PodsGatherer {
    pub fn new(metrics_client: Arc<dyn MetricsClient>, pod_lister: Arc<dyn PodLister>) -> Self {
        PodsGatherer {
            metrics_client,
            pod_lister,
        }
    }

    /// Gather the metric across the selected pods. An empty pod list is
    /// not an error here: the evaluator can still decide on a zeroed
    /// measurement.
    pub async fn gather(
        &self,
        metric_name: &str,
        namespace: &str,
        selector: &Selector,
        metric_selector: &Selector,
        now: DateTime<Utc>,
    ) -> Result<PodsMeasurement, GatherError> {
        let (samples, timestamp) = self
            .metrics_client
            .raw_metric(metric_name, namespace, selector, metric_selector)
            .await
            .map_err(|cause| GatherError::MetricFetch {
                name: metric_name.to_string(),
                cause,
            })?;

        let pods = self
            .pod_lister
            .list(namespace, selector)
            .await
            .map_err(|cause| GatherError::PodList { cause })?;
        if pods.is_empty() {
            return Ok(PodsMeasurement {
                timestamp,
                ..PodsMeasurement::default()
            });
        }

        // An arbitrary pods metric has no CPU warm-up cost: no pod is ever
        // ignored, only missing.
        let classification = podutil::group_pods(
            &pods,
            &samples,
            None,
            Duration::zero(),
            Duration::zero(),
            now,
        );

        Ok(PodsMeasurement {
            samples,
            ready_pod_count: classification.ready_count,
            ignored_pods: classification.ignored,
            missing_pods: classification.missing,
            total_pods: pods.len(),
            timestamp,
        })
    }
}
