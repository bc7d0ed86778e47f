//! Reactor-style fakes for the collaborator traits: each call delegates to
//! a closure field, so tests can insert behavior per call site.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pkg_types::{ObjectReference, PodRecord, PodSampleMap, ResourceName, Selector};

use crate::{ClientError, MetricsClient, PodLister};

type RawMetricReactor = dyn Fn(&str, &str, &Selector, &Selector) -> Result<(PodSampleMap, DateTime<Utc>), ClientError>
    + Send
    + Sync;
type ResourceMetricReactor = dyn Fn(ResourceName, &str, &Selector) -> Result<(PodSampleMap, DateTime<Utc>), ClientError>
    + Send
    + Sync;
type ObjectMetricReactor = dyn Fn(&str, &str, &ObjectReference, &Selector) -> Result<(i64, DateTime<Utc>), ClientError>
    + Send
    + Sync;
type ExternalMetricReactor =
    dyn Fn(&str, &str, &Selector) -> Result<(Vec<i64>, DateTime<Utc>), ClientError> + Send + Sync;
type ListReactor =
    dyn Fn(&str, &Selector) -> Result<Vec<PodRecord>, ClientError> + Send + Sync;

pub struct FakeMetricsClient {
    pub raw_metric_reactor: Box<RawMetricReactor>,
    pub resource_metric_reactor: Box<ResourceMetricReactor>,
    pub object_metric_reactor: Box<ObjectMetricReactor>,
    pub external_metric_reactor: Box<ExternalMetricReactor>,
}

impl Default for FakeMetricsClient {
    fn default() -> Self {
        FakeMetricsClient {
            raw_metric_reactor: Box::new(|_, _, _, _| {
                Err(ClientError::Other("unexpected raw_metric call".to_string()))
            }),
            resource_metric_reactor: Box::new(|_, _, _| {
                Err(ClientError::Other(
                    "unexpected resource_metric call".to_string(),
                ))
            }),
            object_metric_reactor: Box::new(|_, _, _, _| {
                Err(ClientError::Other(
                    "unexpected object_metric call".to_string(),
                ))
            }),
            external_metric_reactor: Box::new(|_, _, _| {
                Err(ClientError::Other(
                    "unexpected external_metric call".to_string(),
                ))
            }),
        }
    }
}

#[async_trait]
impl MetricsClient for FakeMetricsClient {
    async fn raw_metric(
        &self,
        name: &str,
        namespace: &str,
        pod_selector: &Selector,
        metric_selector: &Selector,
    ) -> Result<(PodSampleMap, DateTime<Utc>), ClientError> {
        (self.raw_metric_reactor)(name, namespace, pod_selector, metric_selector)
    }

    async fn resource_metric(
        &self,
        resource: ResourceName,
        namespace: &str,
        pod_selector: &Selector,
    ) -> Result<(PodSampleMap, DateTime<Utc>), ClientError> {
        (self.resource_metric_reactor)(resource, namespace, pod_selector)
    }

    async fn object_metric(
        &self,
        name: &str,
        namespace: &str,
        object_ref: &ObjectReference,
        metric_selector: &Selector,
    ) -> Result<(i64, DateTime<Utc>), ClientError> {
        (self.object_metric_reactor)(name, namespace, object_ref, metric_selector)
    }

    async fn external_metric(
        &self,
        name: &str,
        namespace: &str,
        metric_selector: &Selector,
    ) -> Result<(Vec<i64>, DateTime<Utc>), ClientError> {
        (self.external_metric_reactor)(name, namespace, metric_selector)
    }
}

pub struct FakePodLister {
    pub list_reactor: Box<ListReactor>,
}

impl Default for FakePodLister {
    fn default() -> Self {
        FakePodLister {
            list_reactor: Box::new(|_, _| {
                Err(ClientError::Other("unexpected list call".to_string()))
            }),
        }
    }
}

impl FakePodLister {
    /// A lister that always returns the given pods.
    pub fn returning(pods: Vec<PodRecord>) -> Self {
        FakePodLister {
            list_reactor: Box::new(move |_, _| Ok(pods.clone())),
        }
    }
}

#[async_trait]
impl PodLister for FakePodLister {
    async fn list(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<PodRecord>, ClientError> {
        (self.list_reactor)(namespace, selector)
    }
}
