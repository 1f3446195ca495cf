//! The manifest model.
//!
//! A manifest describes environments, the services deployed into each of them
//! and the applications grouping those services. Two environments may be
//! marked as special: the one hosting the CI/CD controller and the one hosting
//! the Argo CD controller.

use serde::{Deserialize, Serialize};

use crate::paths;

/// Root of the deployment description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// URL of the repository the generated tree is committed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitops_url: Option<String>,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Config>,
}

/// Global controller configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipelines: Option<PipelinesConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argocd: Option<ArgoCdConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelinesConfig {
    /// Name of the CI/CD namespace.
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgoCdConfig {
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    /// Default pipeline template/bindings for services in this environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipelines: Option<Pipelines>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub apps: Vec<Application>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_cicd: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_argocd: bool,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Special environments host controllers rather than workloads.
    pub fn is_special(&self) -> bool {
        self.is_cicd || self.is_argocd
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    /// Names of services in the same environment.
    #[serde(default, rename = "services", skip_serializing_if = "Vec::is_empty")]
    pub service_refs: Vec<String>,
    /// Externally hosted configuration, used instead of service references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_repo: Option<Repository>,
}

/// Reference to configuration held in another repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub url: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<Webhook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipelines: Option<Pipelines>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The source URL, treating an empty string as absent.
    pub fn source(&self) -> Option<&str> {
        self.source_url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn webhook_secret(&self) -> Option<&Secret> {
        self.webhook.as_ref().and_then(|w| w.secret.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<Secret>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipelines {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<TemplateBinding>,
}

/// A trigger template and the bindings feeding it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBinding {
    pub template: String,
    #[serde(default)]
    pub bindings: Vec<String>,
}

impl Manifest {
    /// The GitOps repository URL, treating an empty string as absent.
    pub fn gitops_url(&self) -> Option<&str> {
        self.gitops_url.as_deref().filter(|u| !u.is_empty())
    }

    /// The environment flagged as hosting the CI/CD controller.
    pub fn cicd_environment(&self) -> Option<&Environment> {
        self.environments.iter().find(|e| e.is_cicd)
    }

    /// The environment flagged as hosting the Argo CD controller.
    pub fn argocd_environment(&self) -> Option<&Environment> {
        self.environments.iter().find(|e| e.is_argocd)
    }

    /// Name of the CI/CD namespace, if a CI/CD controller is configured.
    pub fn cicd_name(&self) -> Option<&str> {
        self.config
            .as_ref()
            .and_then(|c| c.pipelines.as_ref())
            .map(|p| p.name.as_str())
            .filter(|n| !n.is_empty())
            .or_else(|| self.cicd_environment().map(|e| e.name.as_str()))
    }

    /// Namespace of the Argo CD controller, if one is configured.
    pub fn argocd_namespace(&self) -> Option<&str> {
        self.config
            .as_ref()
            .and_then(|c| c.argocd.as_ref())
            .map(|a| a.namespace.as_str())
            .filter(|n| !n.is_empty())
            .or_else(|| self.argocd_environment().map(|e| e.name.as_str()))
    }
}

/// `environments/<env>`
pub fn path_for_environment(env: &Environment) -> String {
    paths::join(&[paths::ENVIRONMENTS_DIR, &env.name])
}

/// `environments/<env>/apps/<app>`
pub fn path_for_application(env: &Environment, app: &Application) -> String {
    paths::join(&[&path_for_environment(env), paths::APPS_DIR, &app.name])
}

/// `environments/<env>/services/<svc>`
pub fn path_for_service(env: &Environment, service: &str) -> String {
    paths::join(&[&path_for_environment(env), paths::SERVICES_DIR, service])
}

/// `environments/<env>/env`
pub fn path_for_environment_config(env: &Environment) -> String {
    paths::join(&[&path_for_environment(env), paths::ENV_DIR])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Manifest {
        Manifest {
            gitops_url: Some("https://github.com/org/gitops".to_string()),
            environments: vec![
                Environment::new("dev"),
                Environment {
                    is_cicd: true,
                    ..Environment::new("tools")
                },
            ],
            config: None,
        }
    }

    #[test]
    fn test_cicd_name_from_flagged_environment() {
        assert_eq!(manifest().cicd_name(), Some("tools"));
    }

    #[test]
    fn test_cicd_name_prefers_config() {
        let mut m = manifest();
        m.config = Some(Config {
            pipelines: Some(PipelinesConfig {
                name: "cicd".to_string(),
            }),
            argocd: None,
        });
        assert_eq!(m.cicd_name(), Some("cicd"));
    }

    #[test]
    fn test_no_argocd_configured() {
        assert_eq!(manifest().argocd_namespace(), None);
    }

    #[test]
    fn test_empty_gitops_url_is_absent() {
        let mut m = manifest();
        m.gitops_url = Some(String::new());
        assert_eq!(m.gitops_url(), None);
    }

    #[test]
    fn test_paths() {
        let env = Environment::new("dev");
        let app = Application {
            name: "app1".to_string(),
            ..Default::default()
        };
        assert_eq!(path_for_environment(&env), "environments/dev");
        assert_eq!(path_for_application(&env, &app), "environments/dev/apps/app1");
        assert_eq!(path_for_service(&env, "svc1"), "environments/dev/services/svc1");
        assert_eq!(path_for_environment_config(&env), "environments/dev/env");
    }
}
