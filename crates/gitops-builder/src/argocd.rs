//! Argo CD applications, one per environment and application.

use std::collections::BTreeSet;

use gitops_core::application::{ApplicationSource, ArgoApplication};
use gitops_core::manifest::path_for_application;
use gitops_core::paths::{self, BASE_DIR, KUSTOMIZATION};
use gitops_core::{Application, Environment, Kustomization, Manifest, Resources, Result, Visitor};
use tracing::debug;

/// Build application descriptors and their index. Empty unless both a GitOps
/// repository URL and an Argo CD namespace are configured.
pub fn build(manifest: &Manifest) -> Result<Resources> {
    let (Some(repo_url), Some(namespace)) = (manifest.gitops_url(), manifest.argocd_namespace())
    else {
        debug!("No GitOps URL or Argo CD namespace, skipping applications");
        return Ok(Resources::new());
    };

    let mut builder = ArgoCdBuilder {
        repo_url,
        namespace,
        files: Resources::new(),
    };
    manifest.walk(&mut builder)?;

    let config = paths::argocd_config_path();
    let index: BTreeSet<String> = builder
        .files
        .keys()
        .map(|k| paths::file_name(k).to_string())
        .collect();
    builder.files.insert(
        paths::join(&[&config, KUSTOMIZATION]),
        Kustomization::with_resources(index).into(),
    );
    Ok(builder.files)
}

struct ArgoCdBuilder<'a> {
    repo_url: &'a str,
    namespace: &'a str,
    files: Resources,
}

impl Visitor for ArgoCdBuilder<'_> {
    fn application(&mut self, env: &Environment, app: &Application) -> Result<()> {
        if env.is_special() {
            return Ok(());
        }
        let source = match &app.config_repo {
            Some(repo) => ApplicationSource {
                repo_url: repo.url.clone(),
                path: repo.path.clone(),
                target_revision: repo.target_revision.clone(),
            },
            None => ApplicationSource {
                repo_url: self.repo_url.to_string(),
                path: paths::join(&[&path_for_application(env, app), BASE_DIR]),
                target_revision: None,
            },
        };

        let name = format!("{}-{}", env.name, app.name);
        self.files.insert(
            paths::join(&[&paths::argocd_config_path(), &format!("{}-app.yaml", name)]),
            ArgoApplication::new(self.namespace, &name, &env.name, source).into(),
        );
        Ok(())
    }
}
