//! `createExperiment` documents and matching against existing experiments

use super::UsageRow;
use crate::models::{
    experiment_name, CreateExperiment, ExperimentContainer, ExperimentObject,
    RecommendationSettings, TrialSettings, API_VERSION,
};
use serde::{Deserialize, Serialize};

/// Experiment-wide settings that do not come from the metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSettings {
    pub cluster_name: String,
    pub performance_profile: String,
    pub mode: String,
    pub target_cluster: String,
    pub measurement_duration: String,
    pub threshold: String,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            cluster_name: "default".to_string(),
            performance_profile: "resource-optimization-openshift".to_string(),
            mode: "monitor".to_string(),
            target_cluster: "remote".to_string(),
            measurement_duration: "15min".to_string(),
            threshold: "0.1".to_string(),
        }
    }
}

/// The container an experiment tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadIdentity {
    pub k8_object_type: String,
    pub k8_object_name: String,
    pub namespace: String,
    pub container_name: String,
}

impl CreateExperiment {
    /// Experiment for a single container, named like the `updateResults`
    /// records for the same workload
    pub fn for_container(
        settings: &ExperimentSettings,
        identity: &WorkloadIdentity,
        container_image_name: &str,
    ) -> Self {
        Self {
            version: API_VERSION.to_string(),
            experiment_name: experiment_name(
                &identity.k8_object_name,
                &identity.k8_object_type,
                &identity.namespace,
            ),
            cluster_name: settings.cluster_name.clone(),
            performance_profile: settings.performance_profile.clone(),
            mode: settings.mode.clone(),
            target_cluster: settings.target_cluster.clone(),
            kubernetes_objects: vec![ExperimentObject {
                kind: identity.k8_object_type.clone(),
                name: identity.k8_object_name.clone(),
                namespace: identity.namespace.clone(),
                containers: vec![ExperimentContainer {
                    container_image_name: container_image_name.to_string(),
                    container_name: identity.container_name.clone(),
                }],
            }],
            trial_settings: TrialSettings {
                measurement_duration: settings.measurement_duration.clone(),
            },
            recommendation_settings: RecommendationSettings {
                threshold: settings.threshold.clone(),
            },
        }
    }

    pub fn from_usage(settings: &ExperimentSettings, usage: &UsageRow) -> Self {
        Self::for_container(settings, &usage.identity(), &usage.image_name)
    }

    /// Identities of every container this experiment tracks
    pub fn identities(&self) -> impl Iterator<Item = WorkloadIdentity> + '_ {
        self.kubernetes_objects.iter().flat_map(|object| {
            object.containers.iter().map(move |c| WorkloadIdentity {
                k8_object_type: object.kind.clone(),
                k8_object_name: object.name.clone(),
                namespace: object.namespace.clone(),
                container_name: c.container_name.clone(),
            })
        })
    }
}

/// One experiment per workload, covering each of its containers once.
///
/// Rows arrive once per container and interval; experiments keep the order
/// in which their workload first appears.
pub fn experiments_for_rows(
    settings: &ExperimentSettings,
    rows: &[UsageRow],
) -> Vec<CreateExperiment> {
    let mut experiments: Vec<CreateExperiment> = Vec::new();

    for usage in rows {
        let name = usage.experiment_name();
        let container = ExperimentContainer {
            container_image_name: usage.image_name.clone(),
            container_name: usage.container_name.clone(),
        };

        match experiments.iter_mut().find(|e| e.experiment_name == name) {
            Some(existing) => {
                let object = &mut existing.kubernetes_objects[0];
                if !object
                    .containers
                    .iter()
                    .any(|c| c.container_name == container.container_name)
                {
                    object.containers.push(container);
                }
            }
            None => experiments.push(CreateExperiment::from_usage(settings, usage)),
        }
    }

    experiments
}

/// Experiment as reported by `listExperiments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub experiment_name: String,
    #[serde(default)]
    pub kubernetes_objects: Vec<SummaryObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryObject {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub containers: Vec<SummaryContainer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryContainer {
    pub container_name: String,
}

impl ExperimentSummary {
    pub fn identities(&self) -> impl Iterator<Item = WorkloadIdentity> + '_ {
        self.kubernetes_objects.iter().flat_map(|object| {
            object.containers.iter().map(move |c| WorkloadIdentity {
                k8_object_type: object.kind.clone(),
                k8_object_name: object.name.clone(),
                namespace: object.namespace.clone(),
                container_name: c.container_name.clone(),
            })
        })
    }
}

/// How closely an existing experiment matches a workload. Variants are
/// ordered strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExperimentMatch {
    /// Same name, type, namespace and container
    Exact,
    DifferentContainer,
    DifferentType,
    DifferentNamespace,
    NameOnly,
    NoMatch,
}

impl ExperimentMatch {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Exact => "The experiment exists with the same name, type, namespace and container",
            Self::DifferentContainer => {
                "The experiment exists with the same name, type, namespace. Container is different."
            }
            Self::DifferentType => {
                "The experiment exists with the same name, namespace and container. But the type is different"
            }
            Self::DifferentNamespace => {
                "The experiment exists with the same name, type, container. But on a different namespace"
            }
            Self::NameOnly => "The experiment exists with the same name",
            Self::NoMatch => "The experiment is not matching with any existing ones",
        }
    }
}

/// Classify `existing` against `candidate`; object types compare
/// case-insensitively
pub fn match_workload(existing: &WorkloadIdentity, candidate: &WorkloadIdentity) -> ExperimentMatch {
    if existing.k8_object_name != candidate.k8_object_name {
        return ExperimentMatch::NoMatch;
    }

    let same_type = existing
        .k8_object_type
        .eq_ignore_ascii_case(&candidate.k8_object_type);
    let same_namespace = existing.namespace == candidate.namespace;
    let same_container = existing.container_name == candidate.container_name;

    match (same_type, same_namespace, same_container) {
        (true, true, true) => ExperimentMatch::Exact,
        (true, true, false) => ExperimentMatch::DifferentContainer,
        (false, true, true) => ExperimentMatch::DifferentType,
        (true, false, true) => ExperimentMatch::DifferentNamespace,
        _ => ExperimentMatch::NameOnly,
    }
}

/// Strongest match of `candidate` among all listed experiments
pub fn find_match(existing: &[ExperimentSummary], candidate: &WorkloadIdentity) -> ExperimentMatch {
    existing
        .iter()
        .flat_map(ExperimentSummary::identities)
        .map(|identity| match_workload(&identity, candidate))
        .min()
        .unwrap_or(ExperimentMatch::NoMatch)
}
