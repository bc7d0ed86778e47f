use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use pkg_types::{ObjectReference, PodRecord, PodSampleMap, ResourceName, Selector};

use crate::{ClientError, MetricsClient, PodLister};

#[derive(Deserialize)]
struct PodSamplesResponse {
    samples: PodSampleMap,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ScalarResponse {
    value: i64,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ScalarListResponse {
    values: Vec<i64>,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct PodListResponse {
    pods: Vec<PodRecord>,
}

/// Metrics API client over the collector's JSON REST endpoints.
#[derive(Clone)]
pub struct HttpMetricsClient {
    http: reqwest::Client,
    base: String,
}

impl HttpMetricsClient {
    pub fn new(base: &str) -> Self {
        HttpMetricsClient {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status { url, status });
        }

        response
            .json()
            .await
            .map_err(|source| ClientError::Decode { url, source })
    }
}

fn selector_query(params: &mut Vec<(&'static str, String)>, key: &'static str, selector: &Selector) {
    if !selector.is_empty() {
        params.push((key, selector.to_string()));
    }
}

#[async_trait]
impl MetricsClient for HttpMetricsClient {
    async fn raw_metric(
        &self,
        name: &str,
        namespace: &str,
        pod_selector: &Selector,
        metric_selector: &Selector,
    ) -> Result<(PodSampleMap, DateTime<Utc>), ClientError> {
        let url = format!(
            "{}/api/v1/namespaces/{}/metrics/pods/{}",
            self.base, namespace, name
        );
        let mut query = Vec::new();
        selector_query(&mut query, "labelSelector", pod_selector);
        selector_query(&mut query, "metricSelector", metric_selector);
        let response: PodSamplesResponse = self.get_json(url, &query).await?;
        Ok((response.samples, response.timestamp))
    }

    async fn resource_metric(
        &self,
        resource: ResourceName,
        namespace: &str,
        pod_selector: &Selector,
    ) -> Result<(PodSampleMap, DateTime<Utc>), ClientError> {
        let url = format!(
            "{}/api/v1/namespaces/{}/metrics/resource/{}",
            self.base, namespace, resource
        );
        let mut query = Vec::new();
        selector_query(&mut query, "labelSelector", pod_selector);
        let response: PodSamplesResponse = self.get_json(url, &query).await?;
        Ok((response.samples, response.timestamp))
    }

    async fn object_metric(
        &self,
        name: &str,
        namespace: &str,
        object_ref: &ObjectReference,
        metric_selector: &Selector,
    ) -> Result<(i64, DateTime<Utc>), ClientError> {
        let url = format!(
            "{}/api/v1/namespaces/{}/metrics/object/{}/{}/{}",
            self.base, namespace, object_ref.kind, object_ref.name, name
        );
        let mut query = Vec::new();
        selector_query(&mut query, "metricSelector", metric_selector);
        let response: ScalarResponse = self.get_json(url, &query).await?;
        Ok((response.value, response.timestamp))
    }

    async fn external_metric(
        &self,
        name: &str,
        namespace: &str,
        metric_selector: &Selector,
    ) -> Result<(Vec<i64>, DateTime<Utc>), ClientError> {
        let url = format!(
            "{}/api/v1/namespaces/{}/metrics/external/{}",
            self.base, namespace, name
        );
        let mut query = Vec::new();
        selector_query(&mut query, "metricSelector", metric_selector);
        let response: ScalarListResponse = self.get_json(url, &query).await?;
        Ok((response.values, response.timestamp))
    }
}

/// Pod lister over the collector's JSON REST endpoints.
#[derive(Clone)]
pub struct HttpPodLister {
    http: reqwest::Client,
    base: String,
}

impl HttpPodLister {
    pub fn new(base: &str) -> Self {
        HttpPodLister {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PodLister for HttpPodLister {
    async fn list(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<PodRecord>, ClientError> {
        let url = format!("{}/api/v1/namespaces/{}/pods", self.base, namespace);
        debug!("GET {}", url);

        let mut request = self.http.get(&url);
        if !selector.is_empty() {
            request = request.query(&[("labelSelector", selector.to_string())]);
        }

        let response = request.send().await.map_err(|source| ClientError::Request {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status { url, status });
        }

        let body: PodListResponse = response
            .json()
            .await
            .map_err(|source| ClientError::Decode { url, source })?;
        Ok(body.pods)
    }
}
