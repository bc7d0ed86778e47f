use serde::{Deserialize, Serialize};

use crate::pod::ResourceName;
use crate::quantity::Quantity;

/// Target shape of a metric spec. Exactly one of the fields is expected to
/// be set; which ones are accepted depends on the source kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_value: Option<Quantity>,
    /// Target average utilization as a percentage of requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_utilization: Option<i32>,
}

/// Names a metric, optionally narrowed by a label selector expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricIdentifier {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// Cross-resource reference used by the Object source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub kind: String,
    pub name: String,
}

/// What to measure and what to hit, one variant per metric source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MetricSpec {
    /// A resource known to the cluster (cpu, memory), measured per pod.
    Resource {
        name: ResourceName,
        target: MetricTarget,
    },
    /// An arbitrary metric describing each pod in the scale target.
    Pods {
        metric: MetricIdentifier,
        target: MetricTarget,
    },
    /// A metric describing a single other object in the cluster.
    #[serde(rename_all = "camelCase")]
    Object {
        described_object: ObjectReference,
        metric: MetricIdentifier,
        target: MetricTarget,
    },
    /// A metric from outside the cluster.
    External {
        metric: MetricIdentifier,
        target: MetricTarget,
    },
}

impl MetricSpec {
    /// Short name of the source kind, for log and error messages.
    pub fn source_kind(&self) -> &'static str {
        match self {
            MetricSpec::Resource { .. } => "resource",
            MetricSpec::Pods { .. } => "pods",
            MetricSpec::Object { .. } => "object",
            MetricSpec::External { .. } => "external",
        }
    }
}
