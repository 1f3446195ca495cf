//! Tekton Triggers objects: bindings, event listeners and their triggers.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

pub const TRIGGERS_API_VERSION: &str = "triggers.tekton.dev/v1alpha1";

/// Service account the event listener and pipeline runs use.
pub const PIPELINE_SERVICE_ACCOUNT: &str = "pipeline";

/// Maps fields of a webhook payload onto trigger parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerBinding {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: TriggerBindingSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerBindingSpec {
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

impl TriggerBinding {
    pub fn new(namespace: &str, name: &str, params: Vec<Param>) -> Self {
        Self {
            api_version: TRIGGERS_API_VERSION.to_string(),
            kind: "TriggerBinding".to_string(),
            metadata: namespaced(namespace, name),
            spec: TriggerBindingSpec { params },
        }
    }
}

/// Receives webhooks and routes them to triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListener {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: EventListenerSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListenerSpec {
    pub service_account_name: String,
    pub triggers: Vec<EventListenerTrigger>,
}

impl EventListener {
    pub fn new(namespace: &str, name: &str, triggers: Vec<EventListenerTrigger>) -> Self {
        Self {
            api_version: TRIGGERS_API_VERSION.to_string(),
            kind: "EventListener".to_string(),
            metadata: namespaced(namespace, name),
            spec: EventListenerSpec {
                service_account_name: PIPELINE_SERVICE_ACCOUNT.to_string(),
                triggers,
            },
        }
    }
}

/// One routing rule of an event listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventListenerTrigger {
    pub name: String,
    pub interceptors: Vec<Interceptor>,
    pub bindings: Vec<NamedRef>,
    pub template: NamedRef,
}

impl EventListenerTrigger {
    pub fn new(
        name: &str,
        interceptors: Vec<Interceptor>,
        template: &str,
        bindings: &[String],
    ) -> Self {
        Self {
            name: name.to_string(),
            interceptors,
            bindings: bindings.iter().map(|b| NamedRef::new(b)).collect(),
            template: NamedRef::new(template),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

impl NamedRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// Pre-processing applied to an inbound event before a trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interceptor {
    Github(WebhookInterceptor),
    Gitlab(WebhookInterceptor),
    Cel(CelInterceptor),
}

/// Verifies the webhook against a shared secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookInterceptor {
    pub secret_ref: SecretRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub secret_name: String,
    pub secret_key: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CelInterceptor {
    pub filter: String,
}

pub(crate) fn namespaced(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}
