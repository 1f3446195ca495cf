//! The resource mapping every builder produces.

use std::collections::BTreeMap;

use derive_more::From;
use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use k8s_openapi::api::rbac::v1::RoleBinding;
use serde::{Deserialize, Serialize};

use crate::application::ArgoApplication;
use crate::pipeline::{EventListener, TriggerBinding};
use crate::secret::SealedSecret;

/// Repository-relative path to the object stored there.
pub type Resources = BTreeMap<String, Resource>;

/// One generated file.
#[derive(Debug, Clone, PartialEq, Serialize, From)]
#[serde(untagged)]
pub enum Resource {
    Kustomization(Kustomization),
    Namespace(Namespace),
    ServiceAccount(ServiceAccount),
    RoleBinding(RoleBinding),
    SealedSecret(SealedSecret),
    TriggerBinding(TriggerBinding),
    EventListener(EventListener),
    ArgoApplication(ArgoApplication),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Kustomization(_) => "Kustomization",
            Resource::Namespace(_) => "Namespace",
            Resource::ServiceAccount(_) => "ServiceAccount",
            Resource::RoleBinding(_) => "RoleBinding",
            Resource::SealedSecret(_) => "SealedSecret",
            Resource::TriggerBinding(_) => "TriggerBinding",
            Resource::EventListener(_) => "EventListener",
            Resource::ArgoApplication(_) => "Application",
        }
    }

    pub fn as_kustomization(&self) -> Option<&Kustomization> {
        match self {
            Resource::Kustomization(k) => Some(k),
            _ => None,
        }
    }
}

/// A kustomize composition file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kustomization {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
}

impl Kustomization {
    pub fn with_bases<I, S>(bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bases: bases.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_resources<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resources: resources.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// Union of two mappings where entries of `from` replace those of `to`.
/// Neither input is modified.
pub fn merge(from: &Resources, to: &Resources) -> Resources {
    let mut merged = to.clone();
    merged.extend(from.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
