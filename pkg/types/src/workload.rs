use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::selector::Selector;

/// Workload kinds whose replica count this autoscaler understands.
const SUPPORTED_KINDS: &[&str] = &[
    "Deployment",
    "ReplicaSet",
    "StatefulSet",
    "ReplicationController",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkloadError {
    #[error("Unsupported resource of type {0}")]
    UnsupportedResource(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSpec {
    #[serde(default)]
    pub match_labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadSpec {
    #[serde(default)]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub selector: Option<SelectorSpec>,
}

/// The deployment-like resource being autoscaled, as fed on stdin. Only
/// the fields the control loop needs are modelled; everything else in the
/// document is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkloadSpec,
}

/// The scale subresource view of a workload: what the gatherer and
/// evaluator actually consume.
#[derive(Debug, Clone)]
pub struct ScaleTarget {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
    pub selector: Selector,
}

impl Workload {
    /// Resolve the scale subresource for this workload. Fails before any
    /// metric is considered when the kind is not a supported workload.
    pub fn scale_target(&self) -> Result<ScaleTarget, WorkloadError> {
        if !SUPPORTED_KINDS.contains(&self.kind.as_str()) {
            return Err(WorkloadError::UnsupportedResource(self.kind.clone()));
        }

        let selector = match &self.spec.selector {
            Some(spec) if !spec.match_labels.is_empty() => {
                Selector::from_labels(&spec.match_labels)
            }
            _ => Selector::from_labels(&self.metadata.labels),
        };

        let namespace = if self.metadata.namespace.is_empty() {
            "default".to_string()
        } else {
            self.metadata.namespace.clone()
        };

        Ok(ScaleTarget {
            name: self.metadata.name.clone(),
            namespace,
            replicas: self.spec.replicas.unwrap_or(0),
            selector,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_workload(kind: &str) -> Workload {
        Workload {
            api_version: "apps/v1".to_string(),
            kind: kind.to_string(),
            metadata: ObjectMeta {
                name: "app".to_string(),
                namespace: "team-a".to_string(),
                labels: [("app".to_string(), "nginx".to_string())].into(),
            },
            spec: WorkloadSpec {
                replicas: Some(4),
                selector: None,
            },
        }
    }

    #[test]
    fn resolves_supported_kinds() {
        for kind in ["Deployment", "ReplicaSet", "StatefulSet", "ReplicationController"] {
            let target = make_workload(kind).scale_target().unwrap();
            assert_eq!(target.replicas, 4);
            assert_eq!(target.namespace, "team-a");
        }
    }

    #[test]
    fn rejects_unsupported_kind() {
        let err = make_workload("DaemonSet").scale_target().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported resource of type DaemonSet");
    }

    #[test]
    fn selector_prefers_match_labels() {
        let mut workload = make_workload("Deployment");
        workload.spec.selector = Some(SelectorSpec {
            match_labels: [("tier".to_string(), "web".to_string())].into(),
        });
        let target = workload.scale_target().unwrap();
        assert_eq!(target.selector.to_string(), "tier=web");
    }

    #[test]
    fn selector_falls_back_to_resource_labels() {
        let target = make_workload("Deployment").scale_target().unwrap();
        assert_eq!(target.selector.to_string(), "app=nginx");
    }

    #[test]
    fn missing_replicas_resolve_to_zero() {
        let mut workload = make_workload("Deployment");
        workload.spec.replicas = None;
        assert_eq!(workload.scale_target().unwrap().replicas, 0);
    }

    #[test]
    fn parses_a_deployment_document() {
        let workload: Workload = serde_json::from_str(
            r#"{
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "api", "namespace": "prod", "labels": {"app": "api"}},
                "spec": {"replicas": 2, "selector": {"matchLabels": {"app": "api"}}}
            }"#,
        )
        .unwrap();
        let target = workload.scale_target().unwrap();
        assert_eq!(target.name, "api");
        assert_eq!(target.replicas, 2);
        assert_eq!(target.selector.to_string(), "app=api");
    }

    #[test]
    fn empty_namespace_defaults() {
        let mut workload = make_workload("Deployment");
        workload.metadata.namespace = String::new();
        assert_eq!(workload.scale_target().unwrap().namespace, "default");
    }
}
