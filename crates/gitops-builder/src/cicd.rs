//! Composition skeleton for the CI/CD controller configuration.

use std::collections::BTreeSet;

use gitops_core::paths::{self, BASE_DIR, KUSTOMIZATION, OVERLAYS_DIR, PIPELINES_DIR};
use gitops_core::pipeline::PIPELINE_SERVICE_ACCOUNT;
use gitops_core::{Kustomization, Manifest, Resources, Result};
use tracing::debug;

use crate::listing::FileLister;
use crate::rbac;

pub const NAMESPACES_DIR: &str = "01-namespaces";
pub const SERVICE_ACCOUNTS_DIR: &str = "02-serviceaccount";

/// Build the CI/CD namespace, its pipeline account and the composition files
/// tying `config/<cicd>` together.
///
/// The pipelines index covers every file `generated` places under the
/// pipelines directory plus whatever already exists there on disk, so this
/// runs after every other builder.
pub fn build(
    manifest: &Manifest,
    lister: &dyn FileLister,
    generated: &Resources,
) -> Result<Resources> {
    let Some(cicd) = manifest.cicd_name() else {
        return Ok(Resources::new());
    };

    let config = paths::cicd_config_path(cicd);
    let base = paths::join(&[&config, BASE_DIR]);
    let overlays = paths::join(&[&config, OVERLAYS_DIR]);
    let pipelines = paths::pipelines_path(cicd);

    let mut files = Resources::new();
    files.insert(
        paths::join(&[&pipelines, NAMESPACES_DIR, &format!("{}-environment.yaml", cicd)]),
        rbac::namespace(cicd).into(),
    );
    files.insert(
        paths::join(&[&pipelines, SERVICE_ACCOUNTS_DIR, "serviceaccount.yaml"]),
        rbac::service_account(cicd, PIPELINE_SERVICE_ACCOUNT).into(),
    );

    let mut resources: BTreeSet<String> = lister.list(&pipelines)?;
    let prefix = format!("{}/", pipelines);
    resources.extend(
        generated
            .keys()
            .chain(files.keys())
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|k| *k != KUSTOMIZATION)
            .map(str::to_string),
    );
    debug!(cicd = %cicd, resources = resources.len(), "Indexed pipelines");

    files.insert(
        paths::join(&[&pipelines, KUSTOMIZATION]),
        Kustomization::with_resources(resources).into(),
    );
    files.insert(
        paths::join(&[&base, KUSTOMIZATION]),
        Kustomization::with_bases([format!("./{}", PIPELINES_DIR)]).into(),
    );
    files.insert(
        paths::join(&[&overlays, KUSTOMIZATION]),
        Kustomization::with_bases([paths::relative_path(&overlays, &base)]).into(),
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::MemoryLister;
    use gitops_core::{Environment, Resource};

    fn manifest() -> Manifest {
        Manifest {
            environments: vec![Environment {
                is_cicd: true,
                ..Environment::new("cicd")
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_skeleton_indexes_generated_and_existing() {
        let generated = Resources::from([(
            "config/cicd/base/pipelines/06-bindings/github-pr-binding.yaml".to_string(),
            Resource::from(Kustomization::default()),
        )]);
        let lister = MemoryLister::new()
            .with_file("config/cicd/base/pipelines/kustomization.yaml")
            .with_file("config/cicd/base/pipelines/04-tasks/deploy.yaml");

        let files = build(&manifest(), &lister, &generated).unwrap();

        let index = files["config/cicd/base/pipelines/kustomization.yaml"]
            .as_kustomization()
            .unwrap();
        assert_eq!(
            index.resources,
            vec![
                "01-namespaces/cicd-environment.yaml",
                "02-serviceaccount/serviceaccount.yaml",
                "04-tasks/deploy.yaml",
                "06-bindings/github-pr-binding.yaml",
            ]
        );
        assert_eq!(
            files["config/cicd/base/kustomization.yaml"].as_kustomization().unwrap().bases,
            vec!["./pipelines"]
        );
        assert_eq!(
            files["config/cicd/overlays/kustomization.yaml"].as_kustomization().unwrap().bases,
            vec!["../base"]
        );
        assert!(
            !files.contains_key("config/cicd/base/pipelines/06-bindings/github-pr-binding.yaml")
        );
    }

    #[test]
    fn test_no_cicd_is_empty() {
        let files = build(&Manifest::default(), &MemoryLister::new(), &Resources::new()).unwrap();
        assert!(files.is_empty());
    }
}
