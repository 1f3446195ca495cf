//! Argo CD application descriptors.
//!
//! An application points Argo CD at a directory of Kubernetes manifests in a
//! git repository and the namespace they should be deployed to.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::pipeline::namespaced;

pub const ARGOCD_API_VERSION: &str = "argoproj.io/v1alpha1";

/// API server address of the cluster Argo CD itself runs in.
pub const IN_CLUSTER_SERVER: &str = "https://kubernetes.default.svc";

pub const DEFAULT_PROJECT: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoApplication {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ApplicationSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub project: String,
    pub destination: ApplicationDestination,
    pub source: ApplicationSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_policy: Option<SyncPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDestination {
    pub namespace: String,
    pub server: String,
}

/// Where the manifests live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision: Option<String>,
}

/// Sync policy for an application. Absent means manual sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automated: Option<AutomatedSync>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedSync {
    /// Delete resources no longer in git
    pub prune: bool,
    /// Revert changes made in the cluster
    pub self_heal: bool,
}

impl SyncPolicy {
    /// Auto-sync with pruning and self-healing.
    pub fn automated() -> Self {
        Self {
            automated: Some(AutomatedSync {
                prune: true,
                self_heal: true,
            }),
        }
    }
}

impl ArgoApplication {
    /// An auto-syncing application deploying `source` into the `destination`
    /// namespace of the local cluster.
    pub fn new(namespace: &str, name: &str, destination: &str, source: ApplicationSource) -> Self {
        Self {
            api_version: ARGOCD_API_VERSION.to_string(),
            kind: "Application".to_string(),
            metadata: namespaced(namespace, name),
            spec: ApplicationSpec {
                project: DEFAULT_PROJECT.to_string(),
                destination: ApplicationDestination {
                    namespace: destination.to_string(),
                    server: IN_CLUSTER_SERVER.to_string(),
                },
                source,
                sync_policy: Some(SyncPolicy::automated()),
            },
        }
    }
}
