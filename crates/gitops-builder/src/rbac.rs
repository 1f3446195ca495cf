//! Namespaces, service accounts and role bindings.

use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Cluster role granted to the CI/CD identity in every environment.
pub const EDIT_CLUSTER_ROLE: &str = "edit";

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn service_account(namespace: &str, name: &str) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Bind `cluster_role` within `namespace` to a service account.
pub fn role_binding(
    name: &str,
    namespace: &str,
    cluster_role: &str,
    account: &ServiceAccount,
) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: cluster_role.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: account.metadata.name.clone().unwrap_or_default(),
            namespace: account.metadata.namespace.clone(),
            ..Default::default()
        }]),
    }
}

/// Grant the CI/CD pipeline account edit access to `env`.
pub fn pipeline_edit_binding(env: &str, account: &ServiceAccount) -> RoleBinding {
    role_binding(
        &format!("pipeline-edit-{}", env),
        env,
        EDIT_CLUSTER_ROLE,
        account,
    )
}
