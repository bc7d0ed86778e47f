use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Measured resources ---

/// Resource kind known to the metrics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceName {
    Cpu,
    Memory,
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceName::Cpu => write!(f, "cpu"),
            ResourceName::Memory => write!(f, "memory"),
        }
    }
}

// --- Pod lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// The pod's Ready condition: its current status and when it last flipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyCondition {
    pub status: ConditionStatus,
    pub last_transition: DateTime<Utc>,
}

// --- Pod observation ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub name: String,
    /// Declared resource requests in milli-units, keyed by resource.
    #[serde(default)]
    pub requests: HashMap<ResourceName, i64>,
}

/// Snapshot of one pod's lifecycle as observed at gather time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodRecord {
    pub name: String,
    pub phase: PodPhase,
    /// Whether deletion is in progress.
    #[serde(default)]
    pub deleting: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Ready condition; absent on pods that never reported one.
    #[serde(default)]
    pub ready: Option<ReadyCondition>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub containers: Vec<ContainerRecord>,
}

impl PodRecord {
    /// Whether the pod counts toward a classification at all: pods being
    /// deleted or in phase Failed are skipped entirely.
    pub fn is_counted(&self) -> bool {
        !self.deleting && self.phase != PodPhase::Failed
    }

    /// Whether the pod is ready for serving: Running with Ready == True.
    pub fn is_ready(&self) -> bool {
        self.phase == PodPhase::Running
            && self
                .ready
                .as_ref()
                .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Sum of the pod's container requests for `resource`, or `None` when
    /// any container does not declare one.
    pub fn total_request(&self, resource: ResourceName) -> Option<i64> {
        let mut total = 0i64;
        for container in &self.containers {
            total += container.requests.get(&resource)?;
        }
        Some(total)
    }
}
