use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use pkg_client::PodLister;
use pkg_types::{
    ConditionStatus, PodClassification, PodRecord, PodSampleMap, ResourceName, Selector,
};

use crate::GatherError;

/// Partition a pod snapshot into ready / ignored / missing buckets.
///
/// Pods being deleted or in phase Failed are not counted at all. A pod
/// with no sample is missing. For CPU the sample is additionally gated on
/// the pod's readiness history: within `cpu_initialization_period` of the
/// pod's start we require a full-window sample collected since the last
/// transition into readiness; past that window we only drop pods that have
/// never been ready (readiness flipped within `initial_readiness_delay` of
/// start and is still False). Other resources and non-resource metrics
/// have no warm-up cost, so every sampled pod is ready.
///
/// `now` is injected so the gating is reproducible.
pub fn group_pods(
    pods: &[PodRecord],
    samples: &PodSampleMap,
    resource: Option<ResourceName>,
    cpu_initialization_period: Duration,
    initial_readiness_delay: Duration,
    now: DateTime<Utc>,
) -> PodClassification {
    let mut classification = PodClassification::default();

    for pod in pods {
        if !pod.is_counted() {
            continue;
        }

        let sample = match samples.get(&pod.name) {
            Some(sample) => sample,
            None => {
                classification.missing.insert(pod.name.clone());
                continue;
            }
        };

        if resource == Some(ResourceName::Cpu) {
            let ignore = match (&pod.ready, pod.start_time) {
                (Some(ready), Some(started)) => {
                    if started + cpu_initialization_period > now {
                        ready.status == ConditionStatus::False
                            || sample.timestamp
                                < ready.last_transition + Duration::seconds(sample.window_seconds)
                    } else {
                        ready.status == ConditionStatus::False
                            && started + initial_readiness_delay > ready.last_transition
                    }
                }
                // No ready condition or no start time yet: still initializing.
                _ => true,
            };
            if ignore {
                classification.ignored.insert(pod.name.clone());
                continue;
            }
        }

        classification.ready_count += 1;
    }

    classification
}

/// Drop the named entries from a sample map. The gatherers use this to
/// strip ignored pods before the ratio arithmetic sees the samples.
pub fn remove_sample_entries(samples: &mut PodSampleMap, names: &BTreeSet<String>) {
    for name in names {
        samples.remove(name);
    }
}

/// Number of pods in the snapshot that are Running with Ready == True.
pub fn count_ready_pods(pods: &[PodRecord]) -> i64 {
    pods.iter().filter(|pod| pod.is_ready()).count() as i64
}

/// Counts ready pods behind a selector, for the Object and External
/// sources where readiness is consulted without gathering per-pod samples.
#[derive(Clone)]
pub struct PodReadyCounter {
    pod_lister: Arc<dyn PodLister>,
}

impl PodReadyCounter {
    pub fn new(pod_lister: Arc<dyn PodLister>) -> Self {
        PodReadyCounter { pod_lister }
    }

    pub async fn ready_pod_count(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<i64, GatherError> {
        let pods = self
            .pod_lister
            .list(namespace, selector)
            .await
            .map_err(|cause| GatherError::PodList { cause })?;
        if pods.is_empty() {
            return Err(GatherError::NoPods);
        }
        Ok(count_ready_pods(&pods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pkg_client::FakePodLister;
    use pkg_types::{PodPhase, PodSample, ReadyCondition};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn make_pod(name: &str) -> PodRecord {
        PodRecord {
            name: name.to_string(),
            phase: PodPhase::Running,
            deleting: false,
            start_time: Some(now() - Duration::seconds(3600)),
            ready: Some(ReadyCondition {
                status: ConditionStatus::True,
                last_transition: now() - Duration::seconds(3000),
            }),
            labels: Default::default(),
            containers: vec![],
        }
    }

    fn make_sample(value: i64, age_seconds: i64) -> PodSample {
        PodSample {
            value,
            timestamp: now() - Duration::seconds(age_seconds),
            window_seconds: 30,
        }
    }

    fn samples_for(names: &[&str]) -> PodSampleMap {
        names
            .iter()
            .map(|name| (name.to_string(), make_sample(100, 10)))
            .collect()
    }

    fn classify(
        pods: &[PodRecord],
        samples: &PodSampleMap,
        resource: Option<ResourceName>,
    ) -> PodClassification {
        group_pods(
            pods,
            samples,
            resource,
            Duration::seconds(300),
            Duration::seconds(30),
            now(),
        )
    }

    #[test]
    fn deleting_and_failed_pods_are_not_counted() {
        let mut deleting = make_pod("deleting");
        deleting.deleting = true;
        let mut failed = make_pod("failed");
        failed.phase = PodPhase::Failed;

        let classification = classify(
            &[deleting, failed],
            &samples_for(&["deleting", "failed"]),
            Some(ResourceName::Cpu),
        );
        assert_eq!(classification, PodClassification::default());
    }

    #[test]
    fn unsampled_pods_are_missing() {
        let pods = vec![make_pod("pod-1"), make_pod("pod-2")];
        let classification = classify(&pods, &samples_for(&["pod-1"]), Some(ResourceName::Cpu));
        assert_eq!(classification.ready_count, 1);
        assert!(classification.missing.contains("pod-2"));
        assert!(classification.ignored.is_empty());
    }

    #[test]
    fn non_cpu_resources_skip_readiness_gating() {
        let mut pod = make_pod("pod-1");
        pod.ready = None;
        pod.start_time = None;

        for resource in [Some(ResourceName::Memory), None] {
            let classification =
                classify(std::slice::from_ref(&pod), &samples_for(&["pod-1"]), resource);
            assert_eq!(classification.ready_count, 1, "resource {:?}", resource);
            assert!(classification.ignored.is_empty());
        }
    }

    #[test]
    fn cpu_without_condition_or_start_time_is_ignored() {
        let mut no_condition = make_pod("no-condition");
        no_condition.ready = None;
        let mut no_start = make_pod("no-start");
        no_start.start_time = None;

        let classification = classify(
            &[no_condition, no_start],
            &samples_for(&["no-condition", "no-start"]),
            Some(ResourceName::Cpu),
        );
        assert_eq!(classification.ready_count, 0);
        assert_eq!(classification.ignored.len(), 2);
    }

    #[test]
    fn cpu_within_init_window_unready_is_ignored() {
        let mut pod = make_pod("pod-1");
        pod.start_time = Some(now() - Duration::seconds(100));
        pod.ready = Some(ReadyCondition {
            status: ConditionStatus::False,
            last_transition: now() - Duration::seconds(100),
        });

        let classification = classify(&[pod], &samples_for(&["pod-1"]), Some(ResourceName::Cpu));
        assert!(classification.ignored.contains("pod-1"));
    }

    #[test]
    fn cpu_within_init_window_needs_full_window_since_transition() {
        let mut pod = make_pod("pod-1");
        pod.start_time = Some(now() - Duration::seconds(100));
        pod.ready = Some(ReadyCondition {
            status: ConditionStatus::True,
            last_transition: now() - Duration::seconds(40),
        });

        // Sample collected 10s ago with a 30s window: the window opened at
        // transition time, so the sample is acceptable.
        let mut samples = PodSampleMap::new();
        samples.insert("pod-1".to_string(), make_sample(100, 10));
        let classification = classify(
            std::slice::from_ref(&pod),
            &samples,
            Some(ResourceName::Cpu),
        );
        assert_eq!(classification.ready_count, 1);

        // Sample collected 20s ago: its window started before the pod
        // became ready, so it is discarded.
        samples.insert("pod-1".to_string(), make_sample(100, 20));
        let classification = classify(&[pod], &samples, Some(ResourceName::Cpu));
        assert!(classification.ignored.contains("pod-1"));
    }

    #[test]
    fn cpu_past_init_window_ignores_only_never_ready_pods() {
        // Flipped to False right after start and never recovered.
        let mut never_ready = make_pod("never-ready");
        never_ready.start_time = Some(now() - Duration::seconds(3600));
        never_ready.ready = Some(ReadyCondition {
            status: ConditionStatus::False,
            last_transition: now() - Duration::seconds(3590),
        });

        // Currently unready, but the transition happened well after the
        // initial readiness window: it was ready once.
        let mut was_ready = make_pod("was-ready");
        was_ready.start_time = Some(now() - Duration::seconds(3600));
        was_ready.ready = Some(ReadyCondition {
            status: ConditionStatus::False,
            last_transition: now() - Duration::seconds(60),
        });

        let classification = classify(
            &[never_ready, was_ready],
            &samples_for(&["never-ready", "was-ready"]),
            Some(ResourceName::Cpu),
        );
        assert!(classification.ignored.contains("never-ready"));
        assert_eq!(classification.ready_count, 1);
    }

    #[test]
    fn partition_covers_every_counted_pod() {
        let mut pods = vec![
            make_pod("ready-1"),
            make_pod("ready-2"),
            make_pod("missing-1"),
        ];
        let mut ignored = make_pod("ignored-1");
        ignored.ready = None;
        pods.push(ignored);
        let mut failed = make_pod("failed-1");
        failed.phase = PodPhase::Failed;
        pods.push(failed);

        let samples = samples_for(&["ready-1", "ready-2", "ignored-1"]);
        let classification = classify(&pods, &samples, Some(ResourceName::Cpu));

        let counted = pods.iter().filter(|p| p.is_counted()).count() as i64;
        assert_eq!(
            classification.ready_count
                + classification.ignored.len() as i64
                + classification.missing.len() as i64,
            counted
        );
    }

    #[test]
    fn remove_sample_entries_strips_named_pods() {
        let mut samples = samples_for(&["a", "b", "c"]);
        let names: BTreeSet<String> = ["a".to_string(), "c".to_string()].into();
        remove_sample_entries(&mut samples, &names);
        assert_eq!(samples.len(), 1);
        assert!(samples.contains_key("b"));
    }

    #[tokio::test]
    async fn ready_counter_counts_running_ready_pods() {
        let mut unready = make_pod("unready");
        unready.ready = Some(ReadyCondition {
            status: ConditionStatus::False,
            last_transition: now(),
        });
        let mut pending = make_pod("pending");
        pending.phase = PodPhase::Pending;

        let lister = FakePodLister::returning(vec![make_pod("ready"), unready, pending]);
        let counter = PodReadyCounter::new(Arc::new(lister));
        let count = counter
            .ready_pod_count("default", &Selector::everything())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn ready_counter_fails_on_empty_pod_list() {
        let counter = PodReadyCounter::new(Arc::new(FakePodLister::returning(vec![])));
        let err = counter
            .ready_pod_count("default", &Selector::everything())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no pods returned by selector while calculating replica count"
        );
    }
}
