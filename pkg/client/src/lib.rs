use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pkg_types::{ObjectReference, PodRecord, PodSampleMap, ResourceName, Selector};

pub mod fake;
pub mod http;

pub use fake::{FakeMetricsClient, FakePodLister};
pub use http::{HttpMetricsClient, HttpPodLister};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: reqwest::Error,
    },
    #[error("{0}")]
    Other(String),
}

/// Access to the metrics APIs: per-pod samples for resource and arbitrary
/// metrics, scalars for object and external metrics.
#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// Per-pod samples of an arbitrary named metric.
    async fn raw_metric(
        &self,
        name: &str,
        namespace: &str,
        pod_selector: &Selector,
        metric_selector: &Selector,
    ) -> Result<(PodSampleMap, DateTime<Utc>), ClientError>;

    /// Per-pod samples of a cluster resource (cpu, memory).
    async fn resource_metric(
        &self,
        resource: ResourceName,
        namespace: &str,
        pod_selector: &Selector,
    ) -> Result<(PodSampleMap, DateTime<Utc>), ClientError>;

    /// A scalar metric describing a single named object.
    async fn object_metric(
        &self,
        name: &str,
        namespace: &str,
        object_ref: &ObjectReference,
        metric_selector: &Selector,
    ) -> Result<(i64, DateTime<Utc>), ClientError>;

    /// Samples of a metric from outside the cluster.
    async fn external_metric(
        &self,
        name: &str,
        namespace: &str,
        metric_selector: &Selector,
    ) -> Result<(Vec<i64>, DateTime<Utc>), ClientError>;
}

/// Lists the pods behind a label selector.
#[async_trait]
pub trait PodLister: Send + Sync {
    async fn list(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<PodRecord>, ClientError>;
}
