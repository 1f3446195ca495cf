//! Composition skeleton for environments, applications and services.
//!
//! Every service and application directory gets a base/overlays split with a
//! top-level composition pointing at the overlays. Each non-special
//! environment gets its namespace, its CI/CD role binding when a CI/CD
//! controller exists, and a base index enumerating everything in the base
//! directory, including files other tools placed there. The environment base
//! composes the overlays of its applications.

use std::collections::{BTreeMap, BTreeSet};

use gitops_core::manifest::{
    path_for_application, path_for_environment_config, path_for_service,
};
use gitops_core::paths::{self, BASE_DIR, KUSTOMIZATION, OVERLAYS_DIR};
use gitops_core::pipeline::PIPELINE_SERVICE_ACCOUNT;
use gitops_core::{
    Application, Environment, Kustomization, Manifest, Resources, Result, Service, Visitor,
};
use k8s_openapi::api::core::v1::ServiceAccount;
use tracing::{debug, warn};

use crate::listing::FileLister;
use crate::rbac;

/// Sub-layer of a service base holding its workload objects.
const SERVICE_CONFIG_DIR: &str = "./config";

/// Build the skeleton for every non-special environment.
pub fn build(manifest: &Manifest, lister: &dyn FileLister) -> Result<Resources> {
    let mut builder = EnvironmentBuilder {
        lister,
        pipeline_account: manifest
            .cicd_name()
            .map(|cicd| rbac::service_account(cicd, PIPELINE_SERVICE_ACCOUNT)),
        files: Resources::new(),
        service_paths: BTreeMap::new(),
    };
    manifest.walk(&mut builder)?;
    Ok(builder.files)
}

struct EnvironmentBuilder<'a> {
    lister: &'a dyn FileLister,
    /// Identity granted access to each environment, if CI/CD is configured.
    pipeline_account: Option<ServiceAccount>,
    files: Resources,
    /// Service directories of the environment being walked, by name.
    service_paths: BTreeMap<String, String>,
}

impl Visitor for EnvironmentBuilder<'_> {
    fn service(&mut self, env: &Environment, svc: &Service) -> Result<()> {
        if env.is_special() {
            return Ok(());
        }
        let svc_path = path_for_service(env, &svc.name);
        self.add_skeleton(&svc_path, Kustomization::with_bases([SERVICE_CONFIG_DIR]));
        self.service_paths.insert(svc.name.clone(), svc_path);
        self.thread_role_binding(env);
        Ok(())
    }

    fn application(&mut self, env: &Environment, app: &Application) -> Result<()> {
        if env.is_special() || app.config_repo.is_some() {
            return Ok(());
        }
        let app_path = path_for_application(env, app);
        let app_base = paths::join(&[&app_path, BASE_DIR]);

        let mut bases = Vec::with_capacity(app.service_refs.len());
        for name in &app.service_refs {
            match self.service_paths.get(name) {
                Some(svc_path) => bases.push(paths::relative_path(&app_base, svc_path)),
                None => warn!(
                    env = %env.name,
                    app = %app.name,
                    service = %name,
                    "Skipping unknown service reference"
                ),
            }
        }
        self.add_skeleton(&app_path, Kustomization::with_bases(bases));
        Ok(())
    }

    fn environment(&mut self, env: &Environment) -> Result<()> {
        self.service_paths.clear();
        if env.is_special() {
            return Ok(());
        }

        let env_path = path_for_environment_config(env);
        let base = paths::join(&[&env_path, BASE_DIR]);
        let overlays = paths::join(&[&env_path, OVERLAYS_DIR]);

        let namespace_file = format!("{}-environment.yaml", env.name);
        self.files.insert(
            paths::join(&[&base, &namespace_file]),
            rbac::namespace(&env.name).into(),
        );

        let mut resources: BTreeSet<String> = self.lister.list(&base)?;
        let prefix = format!("{}/", base);
        resources.extend(
            self.files
                .keys()
                .filter_map(|k| k.strip_prefix(&prefix))
                .filter(|k| *k != KUSTOMIZATION)
                .map(str::to_string),
        );
        let app_overlays: Vec<String> = env
            .apps
            .iter()
            .filter(|app| app.config_repo.is_none())
            .map(|app| {
                let overlays = paths::join(&[&path_for_application(env, app), OVERLAYS_DIR]);
                paths::relative_path(&base, &overlays)
            })
            .collect();
        debug!(
            env = %env.name,
            resources = resources.len(),
            apps = app_overlays.len(),
            "Indexed environment base"
        );

        self.files.insert(
            paths::join(&[&base, KUSTOMIZATION]),
            Kustomization {
                resources: resources.into_iter().collect(),
                bases: app_overlays,
            }
            .into(),
        );
        self.files.insert(
            paths::join(&[&overlays, KUSTOMIZATION]),
            Kustomization::with_bases([paths::relative_path(&overlays, &base)]).into(),
        );
        Ok(())
    }
}

impl EnvironmentBuilder<'_> {
    /// Top-level, base and overlays composition files for `dir`.
    fn add_skeleton(&mut self, dir: &str, base: Kustomization) {
        let base_dir = paths::join(&[dir, BASE_DIR]);
        let overlays_dir = paths::join(&[dir, OVERLAYS_DIR]);

        self.files.insert(
            paths::join(&[dir, KUSTOMIZATION]),
            Kustomization::with_bases([OVERLAYS_DIR]).into(),
        );
        self.files
            .insert(paths::join(&[&base_dir, KUSTOMIZATION]), base.into());
        self.files.insert(
            paths::join(&[&overlays_dir, KUSTOMIZATION]),
            Kustomization::with_bases([paths::relative_path(&overlays_dir, &base_dir)]).into(),
        );
    }

    /// Emit the environment's CI/CD role binding once, however many services
    /// need it.
    fn thread_role_binding(&mut self, env: &Environment) {
        let Some(account) = &self.pipeline_account else {
            return;
        };
        let path = paths::join(&[
            &path_for_environment_config(env),
            BASE_DIR,
            &format!("{}-rolebinding.yaml", env.name),
        ]);
        if self.files.contains_key(&path) {
            return;
        }
        debug!(env = %env.name, path = %path, "Adding pipeline role binding");
        self.files
            .insert(path, rbac::pipeline_edit_binding(&env.name, account).into());
    }
}
