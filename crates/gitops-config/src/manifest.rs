//! Manifest parsing.

use std::path::Path;

use gitops_core::manifest::{
    Application, ArgoCdConfig, Config, Environment, Manifest, Pipelines, PipelinesConfig,
    Repository, Secret, Service, TemplateBinding, Webhook,
};
use kdl::{KdlDocument, KdlNode};

use crate::{ConfigError, ConfigResult};

/// Read and parse a manifest file.
pub fn load_manifest(path: impl AsRef<Path>) -> ConfigResult<Manifest> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_manifest(&text)
}

/// Parse a manifest from KDL text.
///
/// Only structure is checked here; naming and cross-reference rules are
/// enforced by [`Manifest::validate`].
pub fn parse_manifest(kdl: &str) -> ConfigResult<Manifest> {
    let doc: KdlDocument = kdl.parse()?;

    let mut manifest = Manifest::default();

    for node in doc.nodes() {
        match node.name().value() {
            "gitops-url" => {
                manifest.gitops_url = Some(
                    get_first_string_arg(node)
                        .ok_or_else(|| ConfigError::MissingField("gitops-url value".to_string()))?,
                );
            }
            "config" => {
                manifest.config = Some(parse_config(node));
            }
            "environment" => {
                manifest.environments.push(parse_environment(node)?);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(manifest)
}

fn parse_config(node: &KdlNode) -> Config {
    let mut config = Config::default();
    for child in child_nodes(node) {
        match child.name().value() {
            "pipelines" => {
                config.pipelines =
                    get_string_prop(child, "name").map(|name| PipelinesConfig { name });
            }
            "argocd" => {
                config.argocd =
                    get_string_prop(child, "namespace").map(|namespace| ArgoCdConfig { namespace });
            }
            _ => {}
        }
    }
    config
}

fn parse_environment(node: &KdlNode) -> ConfigResult<Environment> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("environment name".to_string()))?;

    let mut env = Environment {
        is_cicd: get_flag(node, "cicd")?,
        is_argocd: get_flag(node, "argocd")?,
        ..Environment::new(name)
    };

    for child in child_nodes(node) {
        match child.name().value() {
            "pipelines" => env.pipelines = Some(parse_pipelines(child)?),
            "service" => env.services.push(parse_service(child)?),
            "app" => env.apps.push(parse_application(child)?),
            _ => {}
        }
    }

    Ok(env)
}

fn parse_service(node: &KdlNode) -> ConfigResult<Service> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("service name".to_string()))?;

    let mut svc = Service {
        source_url: get_string_prop(node, "source-url"),
        ..Service::new(name)
    };

    for child in child_nodes(node) {
        match child.name().value() {
            "webhook" => {
                let secret = get_string_prop(child, "secret").map(|name| Secret {
                    name,
                    namespace: get_string_prop(child, "namespace").unwrap_or_default(),
                });
                svc.webhook = Some(Webhook { secret });
            }
            "pipelines" => svc.pipelines = Some(parse_pipelines(child)?),
            _ => {}
        }
    }

    Ok(svc)
}

fn parse_application(node: &KdlNode) -> ConfigResult<Application> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("app name".to_string()))?;

    let mut app = Application {
        name,
        ..Default::default()
    };

    for child in child_nodes(node) {
        match child.name().value() {
            "services" | "service" => app.service_refs.extend(get_all_string_args(child)),
            "config-repo" => {
                app.config_repo = Some(Repository {
                    url: get_string_prop(child, "url").unwrap_or_default(),
                    path: get_string_prop(child, "path").unwrap_or_default(),
                    target_revision: get_string_prop(child, "revision"),
                });
            }
            _ => {}
        }
    }

    Ok(app)
}

fn parse_pipelines(node: &KdlNode) -> ConfigResult<Pipelines> {
    let mut pipelines = Pipelines::default();
    for child in child_nodes(node) {
        if child.name().value() != "integration" {
            continue;
        }
        let template = get_string_prop(child, "template")
            .ok_or_else(|| ConfigError::MissingField("integration template".to_string()))?;
        let bindings = child_nodes(child)
            .filter(|n| n.name().value() == "binding")
            .flat_map(get_all_string_args)
            .collect();
        pipelines.integration = Some(TemplateBinding { template, bindings });
    }
    Ok(pipelines)
}

// Helper functions for extracting values from KDL nodes

fn child_nodes(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|c| c.nodes())
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

/// A boolean property, false when absent.
fn get_flag(node: &KdlNode, name: &str) -> ConfigResult<bool> {
    match node.get(name) {
        None => Ok(false),
        Some(v) => v.as_bool().ok_or_else(|| ConfigError::InvalidValue {
            field: name.to_string(),
            message: format!("expected #true or #false, got {}", v),
        }),
    }
}
