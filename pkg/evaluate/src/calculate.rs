use std::collections::{BTreeSet, HashMap};

use pkg_types::{PodSample, PodSampleMap};

use crate::EvaluateError;

/// The ratio arithmetic shared by the per-source evaluators: usage ratios,
/// the tolerance dead band, and the direction-aware fill-in correction for
/// missing and ignored pods.
///
/// A usage ratio of 1.0 means the observed aggregate sits exactly on
/// target; above 1.0 calls for scaling up, below for scaling down.
#[derive(Debug, Clone, Copy)]
pub struct ReplicaCalculator {
    pub tolerance: f64,
}

impl ReplicaCalculator {
    pub fn new(tolerance: f64) -> Self {
        ReplicaCalculator { tolerance }
    }

    fn within_tolerance(&self, usage_ratio: f64) -> bool {
        (1.0 - usage_ratio).abs() <= self.tolerance
    }

    /// Replica count for a plain per-pod metric (Pods source and
    /// Resource/AverageValue): every pod is expected to sit at `target`
    /// milli-units.
    ///
    /// Missing pods are filled in pessimistically on scale-down (assumed
    /// at 100% of target) and optimistically on scale-up (assumed at 0).
    /// When ignored pods exist and the ratio points up, they are filled
    /// with 0 as well so a wave of still-initializing pods cannot inflate
    /// the scale-up. If the corrected ratio lands in the tolerance band or
    /// flips direction across 1.0, the current replica count stands.
    pub fn plain_metric_replica_count(
        &self,
        samples: &PodSampleMap,
        current_replicas: i32,
        target: i64,
        ready_pod_count: i64,
        missing: &BTreeSet<String>,
        ignored: &BTreeSet<String>,
    ) -> i32 {
        let usage_ratio = metric_utilization_ratio(samples, target);

        let rebalance_ignored = !ignored.is_empty() && usage_ratio > 1.0;
        if !rebalance_ignored && missing.is_empty() {
            if self.within_tolerance(usage_ratio) {
                return current_replicas;
            }
            return ceil_i32(usage_ratio * ready_pod_count as f64);
        }

        let mut samples = samples.clone();
        if !missing.is_empty() {
            if usage_ratio < 1.0 {
                for name in missing {
                    samples.insert(name.clone(), PodSample::with_value(target));
                }
            } else if usage_ratio > 1.0 {
                for name in missing {
                    samples.insert(name.clone(), PodSample::with_value(0));
                }
            }
        }
        if rebalance_ignored {
            for name in ignored {
                samples.insert(name.clone(), PodSample::with_value(0));
            }
        }

        let new_usage_ratio = metric_utilization_ratio(&samples, target);
        if self.within_tolerance(new_usage_ratio) || flips_direction(usage_ratio, new_usage_ratio) {
            return current_replicas;
        }

        ceil_i32(new_usage_ratio * samples.len() as f64)
    }

    /// Replica count for Resource/AverageUtilization: observed usage is
    /// compared against the summed requests of the sampled pods, and the
    /// resulting average utilization against the target percentage.
    ///
    /// The fill-in protocol matches the plain path, except a missing pod
    /// on scale-down is assumed at 100% of its own request.
    pub fn utilization_replica_count(
        &self,
        samples: &PodSampleMap,
        requests: &HashMap<String, i64>,
        current_replicas: i32,
        target_utilization: i32,
        ready_pod_count: i64,
        missing: &BTreeSet<String>,
        ignored: &BTreeSet<String>,
    ) -> Result<i32, EvaluateError> {
        let usage_ratio = resource_utilization_ratio(samples, requests, target_utilization)?;

        let rebalance_ignored = !ignored.is_empty() && usage_ratio > 1.0;
        if !rebalance_ignored && missing.is_empty() {
            if self.within_tolerance(usage_ratio) {
                return Ok(current_replicas);
            }
            return Ok(ceil_i32(usage_ratio * ready_pod_count as f64));
        }

        let mut samples = samples.clone();
        if !missing.is_empty() {
            if usage_ratio < 1.0 {
                for name in missing {
                    let request = requests.get(name).copied().unwrap_or(0);
                    samples.insert(name.clone(), PodSample::with_value(request));
                }
            } else if usage_ratio > 1.0 {
                for name in missing {
                    samples.insert(name.clone(), PodSample::with_value(0));
                }
            }
        }
        if rebalance_ignored {
            for name in ignored {
                samples.insert(name.clone(), PodSample::with_value(0));
            }
        }

        let new_usage_ratio = resource_utilization_ratio(&samples, requests, target_utilization)?;
        if self.within_tolerance(new_usage_ratio) || flips_direction(usage_ratio, new_usage_ratio) {
            return Ok(current_replicas);
        }

        Ok(ceil_i32(new_usage_ratio * samples.len() as f64))
    }

    /// Replica count straight from a usage ratio and the ready pod count
    /// (Object/Value and External/Value). With zero current replicas the
    /// ratio itself decides, so a workload can scale up from zero.
    pub fn usage_ratio_replica_count(
        &self,
        current_replicas: i32,
        usage_ratio: f64,
        ready_pod_count: i64,
    ) -> i32 {
        if current_replicas != 0 {
            if self.within_tolerance(usage_ratio) {
                return current_replicas;
            }
            ceil_i32(usage_ratio * ready_pod_count as f64)
        } else {
            ceil_i32(usage_ratio)
        }
    }

    /// Replica count from a per-pod average target (Object/AverageValue
    /// and External/AverageValue): the scalar is spread over the current
    /// replicas and compared against the per-pod target.
    pub fn per_pod_average_replica_count(
        &self,
        utilization: i64,
        target_per_pod: i64,
        current_replicas: i32,
    ) -> i32 {
        let usage_ratio =
            utilization as f64 / (target_per_pod as f64 * current_replicas as f64);
        if !self.within_tolerance(usage_ratio) {
            return ceil_i32(utilization as f64 / target_per_pod as f64);
        }
        current_replicas
    }
}

/// Ratio of the average sample to the per-pod target. An empty sample map
/// reads as zero usage.
fn metric_utilization_ratio(samples: &PodSampleMap, target: i64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: i64 = samples.values().map(|s| s.value).sum();
    let average = total as f64 / samples.len() as f64;
    average / target as f64
}

/// Ratio of observed usage to requested capacity, against the target
/// utilization percentage. Only pods present in both maps participate;
/// fails when the sample and request sets are disjoint.
fn resource_utilization_ratio(
    samples: &PodSampleMap,
    requests: &HashMap<String, i64>,
    target_utilization: i32,
) -> Result<f64, EvaluateError> {
    let mut samples_total = 0i64;
    let mut requests_total = 0i64;
    for (name, sample) in samples {
        if let Some(request) = requests.get(name) {
            samples_total += sample.value;
            requests_total += request;
        }
    }
    if requests_total == 0 {
        return Err(EvaluateError::NoMatchingPods);
    }

    let current_utilization = samples_total as f64 * 100.0 / requests_total as f64;
    Ok(current_utilization / target_utilization as f64)
}

fn flips_direction(usage_ratio: f64, new_usage_ratio: f64) -> bool {
    (usage_ratio < 1.0 && new_usage_ratio > 1.0) || (usage_ratio > 1.0 && new_usage_ratio < 1.0)
}

fn ceil_i32(value: f64) -> i32 {
    value.ceil() as i32
}
