use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::spec::MetricSpec;

/// One pod's instantaneous measurement, in milli-units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSample {
    pub value: i64,
    pub timestamp: DateTime<Utc>,
    /// Length of the collection window the sample was averaged over.
    #[serde(default)]
    pub window_seconds: i64,
}

impl PodSample {
    /// A synthetic sample carrying only a value, used by the fill-in
    /// correction for pods that were never actually sampled.
    pub fn with_value(value: i64) -> Self {
        PodSample {
            value,
            timestamp: DateTime::UNIX_EPOCH,
            window_seconds: 0,
        }
    }
}

pub type PodSampleMap = HashMap<String, PodSample>;

/// Output of the pod classifier: how many pods are ready, and which pods
/// were ignored (still initializing) or missing (no sample).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodClassification {
    pub ready_count: i64,
    pub ignored: BTreeSet<String>,
    pub missing: BTreeSet<String>,
}

// --- Per-source measurements ---

/// Measurement for the Resource source (cpu/memory of each pod).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceMeasurement {
    #[serde(default)]
    pub samples: PodSampleMap,
    /// Per-pod resource requests in milli-units; only populated for
    /// utilization targets.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub requests: HashMap<String, i64>,
    pub ready_pod_count: i64,
    #[serde(default)]
    pub ignored_pods: BTreeSet<String>,
    #[serde(default)]
    pub missing_pods: BTreeSet<String>,
    pub total_pods: usize,
    #[serde(default = "epoch")]
    pub timestamp: DateTime<Utc>,
}

/// Measurement for the Pods source (an arbitrary per-pod metric).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodsMeasurement {
    #[serde(default)]
    pub samples: PodSampleMap,
    pub ready_pod_count: i64,
    #[serde(default)]
    pub ignored_pods: BTreeSet<String>,
    #[serde(default)]
    pub missing_pods: BTreeSet<String>,
    pub total_pods: usize,
    #[serde(default = "epoch")]
    pub timestamp: DateTime<Utc>,
}

/// Measurement for the Object source (a scalar on another object).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeasurement {
    /// Scalar reading in milli-units.
    pub utilization: i64,
    /// Ready pods behind the target selector; only gathered for Value
    /// targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_pod_count: Option<i64>,
    #[serde(default = "epoch")]
    pub timestamp: DateTime<Utc>,
}

/// Measurement for the External source (a scalar from outside the
/// cluster, summed across its samples).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalMeasurement {
    pub utilization: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_pod_count: Option<i64>,
    #[serde(default = "epoch")]
    pub timestamp: DateTime<Utc>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// The measurement payload of a gathered metric, one variant per source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measurement {
    Resource(ResourceMeasurement),
    Pods(PodsMeasurement),
    Object(ObjectMeasurement),
    External(ExternalMeasurement),
}

/// A metric gathered for one spec: the spec itself, the replica count at
/// gather time, and the per-source measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatheredMetric {
    pub current_replicas: i32,
    pub spec: MetricSpec,
    #[serde(flatten)]
    pub measurement: Measurement,
}

/// The evaluator's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub target_replicas: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{MetricIdentifier, MetricTarget};
    use crate::Quantity;

    #[test]
    fn gathered_metric_encodes_measurement_inline() {
        let metric = GatheredMetric {
            current_replicas: 3,
            spec: MetricSpec::Pods {
                metric: MetricIdentifier {
                    name: "tps".to_string(),
                    selector: None,
                },
                target: MetricTarget {
                    average_value: Some(Quantity::from_milli(20_000)),
                    ..MetricTarget::default()
                },
            },
            measurement: Measurement::Pods(PodsMeasurement {
                samples: PodSampleMap::new(),
                ready_pod_count: 3,
                ignored_pods: BTreeSet::new(),
                missing_pods: BTreeSet::new(),
                total_pods: 3,
                timestamp: DateTime::UNIX_EPOCH,
            }),
        };

        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["current_replicas"], 3);
        assert!(json.get("pods").is_some());
        assert!(json.get("resource").is_none());

        let back: GatheredMetric = serde_json::from_value(json).unwrap();
        assert!(matches!(back.measurement, Measurement::Pods(_)));
    }

    #[test]
    fn evaluation_serializes_target_replicas() {
        let json = serde_json::to_string(&Evaluation { target_replicas: 7 }).unwrap();
        assert_eq!(json, r#"{"target_replicas":7}"#);
    }

    #[test]
    fn synthetic_sample_carries_value_only() {
        let sample = PodSample::with_value(250);
        assert_eq!(sample.value, 250);
        assert_eq!(sample.window_seconds, 0);
    }
}
