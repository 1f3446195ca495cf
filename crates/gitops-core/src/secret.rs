//! Sealed secrets and the capability that produces them.

use std::collections::BTreeMap;
use std::sync::Mutex;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::pipeline::namespaced;
use crate::{Error, Result};

pub const SEALED_SECRETS_API_VERSION: &str = "bitnami.com/v1alpha1";

/// Key under which webhook interceptors look up the shared secret.
pub const WEBHOOK_SECRET_KEY: &str = "webhook-secret-key";

/// Secret authenticating webhooks from the GitOps repository.
pub const GITOPS_WEBHOOK_SECRET: &str = "gitops-webhook-secret";

/// A secret whose payload only the in-cluster controller can decrypt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecret {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: SealedSecretSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecretSpec {
    pub encrypted_data: BTreeMap<String, String>,
    pub template: SecretTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretTemplate {
    pub metadata: ObjectMeta,
}

impl SealedSecret {
    /// Wrap an already-encrypted value for `key`.
    pub fn new(namespace: &str, name: &str, key: &str, encrypted: String) -> Self {
        Self {
            api_version: SEALED_SECRETS_API_VERSION.to_string(),
            kind: "SealedSecret".to_string(),
            metadata: namespaced(namespace, name),
            spec: SealedSecretSpec {
                encrypted_data: BTreeMap::from([(key.to_string(), encrypted)]),
                template: SecretTemplate {
                    metadata: namespaced(namespace, name),
                },
            },
        }
    }
}

/// Trait for secret sealing backends.
pub trait SecretSealer: Send + Sync {
    /// Encrypt `value` under `key` into a secret named `name` in `namespace`.
    fn seal(&self, namespace: &str, name: &str, key: &str, value: &str) -> Result<SealedSecret>;
}

/// Deterministic sealer that does not encrypt. Records every call.
#[derive(Debug, Default)]
pub struct MemorySealer {
    sealed: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl MemorySealer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sealer that rejects the secret called `name`.
    pub fn failing_on(name: impl Into<String>) -> Self {
        Self {
            fail_on: Some(name.into()),
            ..Self::default()
        }
    }

    /// `namespace/name` of every secret sealed so far, in call order.
    pub fn sealed(&self) -> Vec<String> {
        self.sealed.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SecretSealer for MemorySealer {
    fn seal(&self, namespace: &str, name: &str, key: &str, value: &str) -> Result<SealedSecret> {
        if self.fail_on.as_deref() == Some(name) {
            return Err(Error::Sealing {
                name: name.to_string(),
                message: "rejected by memory sealer".to_string(),
            });
        }
        if let Ok(mut sealed) = self.sealed.lock() {
            sealed.push(format!("{}/{}", namespace, name));
        }
        let encrypted: String = value.chars().rev().collect();
        Ok(SealedSecret::new(namespace, name, key, encrypted))
    }
}
