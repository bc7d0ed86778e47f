use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use pkg_client::{MetricsClient, PodLister};
use pkg_types::{PodRecord, ResourceMeasurement, ResourceName, Selector};

use crate::podutil;
use crate::GatherError;

/// Gathers per-pod samples of a cluster resource (cpu, memory) together
/// with the readiness classification and, for utilization targets, the
/// per-pod requests to compute utilization against.
pub struct ResourceGatherer {
    metrics_client: Arc<dyn MetricsClient>,
    pod_lister: Arc<dyn PodLister>,
    cpu_initialization_period: Duration,
    initial_readiness_delay: Duration,
}

impl ResourceGatherer {
    pub fn new(
        metrics_client: Arc<dyn MetricsClient>,
        pod_lister: Arc<dyn PodLister>,
        cpu_initialization_period: Duration,
        initial_readiness_delay: Duration,
    ) -> Self {
        ResourceGatherer {
            metrics_client,
            pod_lister,
            cpu_initialization_period,
            initial_readiness_delay,
        }
    }

    /// Gather for an average-utilization target: samples plus requests.
    pub async fn gather(
        &self,
        resource: ResourceName,
        namespace: &str,
        selector: &Selector,
        now: DateTime<Utc>,
    ) -> Result<ResourceMeasurement, GatherError> {
        self.measure(resource, namespace, selector, now, true).await
    }

    /// Gather for an average-value target: samples only.
    pub async fn gather_raw(
        &self,
        resource: ResourceName,
        namespace: &str,
        selector: &Selector,
        now: DateTime<Utc>,
    ) -> Result<ResourceMeasurement, GatherError> {
        self.measure(resource, namespace, selector, now, false).await
    }

    async fn measure(
        &self,
        resource: ResourceName,
        namespace: &str,
        selector: &Selector,
        now: DateTime<Utc>,
        with_requests: bool,
    ) -> Result<ResourceMeasurement, GatherError> {
        let (mut samples, timestamp) = self
            .metrics_client
            .resource_metric(resource, namespace, selector)
            .await
            .map_err(|cause| GatherError::ResourceFetch { resource, cause })?;

        let pods = self
            .pod_lister
            .list(namespace, selector)
            .await
            .map_err(|cause| GatherError::PodList { cause })?;
        if pods.is_empty() {
            return Err(GatherError::NoPods);
        }

        let classification = podutil::group_pods(
            &pods,
            &samples,
            Some(resource),
            self.cpu_initialization_period,
            self.initial_readiness_delay,
            now,
        );
        podutil::remove_sample_entries(&mut samples, &classification.ignored);

        let requests = if with_requests {
            pod_requests(&pods, resource)?
        } else {
            HashMap::new()
        };

        Ok(ResourceMeasurement {
            samples,
            requests,
            ready_pod_count: classification.ready_count,
            ignored_pods: classification.ignored,
            missing_pods: classification.missing,
            total_pods: pods.len(),
            timestamp,
        })
    }
}

/// Per-pod resource requests in milli-units, summed across containers.
/// Fails when any container of any pod does not declare a request for the
/// resource.
fn pod_requests(
    pods: &[PodRecord],
    resource: ResourceName,
) -> Result<HashMap<String, i64>, GatherError> {
    let mut requests = HashMap::with_capacity(pods.len());
    for pod in pods {
        let total = pod
            .total_request(resource)
            .ok_or(GatherError::MissingRequest(resource))?;
        requests.insert(pod.name.clone(), total);
    }
    Ok(requests)
}
