//! Manifest validation.
//!
//! A single walk collects every problem instead of stopping at the first, so
//! users can fix a manifest in one round.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::manifest::{
    Application, Environment, Manifest, Pipelines, Repository, Service, Webhook,
    path_for_application, path_for_environment, path_for_service,
};
use crate::repository::GitProvider;
use crate::walk::Visitor;
use crate::{Error, FieldError, Result, ValidationErrors};

const DNS1035_LABEL_MAX_LENGTH: usize = 63;

const DNS1035_LABEL_FORMAT: &str = "[a-z]([-a-z0-9]*[a-z0-9])?";

static DNS1035_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{}$", DNS1035_LABEL_FORMAT)).unwrap());

impl Manifest {
    /// Check the whole manifest, reporting every problem found.
    pub fn validate(&self) -> Result<()> {
        validate(self).map_err(Error::from)
    }
}

/// Check the whole manifest, reporting every problem found.
pub fn validate(manifest: &Manifest) -> std::result::Result<(), ValidationErrors> {
    let mut validator = Validator::default();
    if let Err(e) = manifest.walk(&mut validator) {
        validator.errors.push(FieldError::new(e.to_string(), Vec::new()));
    }
    validator.check_source_urls(manifest.gitops_url());

    if validator.errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(validator.errors))
    }
}

/// Why `name` is not a valid DNS-1035 label, if it isn't.
pub fn dns1035_label_error(name: &str) -> Option<String> {
    if name.len() > DNS1035_LABEL_MAX_LENGTH {
        return Some(format!(
            "must be no more than {} characters",
            DNS1035_LABEL_MAX_LENGTH
        ));
    }
    if !DNS1035_LABEL_REGEX.is_match(name) {
        return Some(format!(
            "a DNS-1035 label must consist of lower case alphanumeric characters or '-', start with an alphabetic character, and end with an alphanumeric character (e.g. 'my-name', or 'abc-123', regex used for validation is '{}')",
            DNS1035_LABEL_FORMAT
        ));
    }
    None
}

#[derive(Default)]
struct Validator {
    errors: Vec<FieldError>,
    /// Dotted paths seen so far, at every level.
    seen: BTreeSet<String>,
    /// Services declared in the environment currently being walked.
    service_names: BTreeSet<String>,
    /// Source URLs in first-seen order with every service path using them.
    source_urls: Vec<(String, Vec<String>)>,
}

impl Visitor for Validator {
    fn service(&mut self, env: &Environment, svc: &Service) -> Result<()> {
        let path = yaml_path(&path_for_service(env, &svc.name));
        if env.is_special() {
            self.errors.push(invalid_environment(
                &env.name,
                "A special environment cannot contain services.",
                &path,
            ));
        }
        if let Some(url) = svc.source() {
            match self.source_urls.iter_mut().find(|(u, _)| u == url) {
                Some((_, paths)) => paths.push(path.clone()),
                None => self.source_urls.push((url.to_string(), vec![path.clone()])),
            }
        }
        self.check_duplicate(&path);
        self.check_name(&svc.name, &path);
        if let Some(hook) = &svc.webhook {
            self.check_webhook(hook, &path);
        }
        if let Some(pipelines) = &svc.pipelines {
            self.check_pipelines(pipelines, &path);
        }
        self.service_names.insert(svc.name.clone());
        Ok(())
    }

    fn application(&mut self, env: &Environment, app: &Application) -> Result<()> {
        let path = yaml_path(&path_for_application(env, app));
        if env.is_special() {
            self.errors.push(invalid_environment(
                &env.name,
                "A special environment cannot contain applications.",
                &path,
            ));
        }
        self.check_duplicate(&path);
        self.check_name(&app.name, &path);

        match (app.service_refs.is_empty(), &app.config_repo) {
            (true, None) => self
                .errors
                .push(missing_fields(&["services", "config_repo"], &path)),
            (false, Some(_)) => self.errors.push(FieldError::new(
                "expected exactly one, got both",
                vec![yaml_join(&path, &["services"]), yaml_join(&path, &["config_repo"])],
            )),
            _ => {}
        }

        if let Some(repo) = &app.config_repo {
            self.check_config_repo(repo, &yaml_join(&path, &["config_repo"]));
        }
        for svc in &app.service_refs {
            if !self.service_names.contains(svc) {
                self.errors.push(FieldError::new(
                    format!("missing service {:?} in app {:?}", svc, app.name),
                    vec![path.clone()],
                ));
            }
        }
        Ok(())
    }

    fn environment(&mut self, env: &Environment) -> Result<()> {
        let path = yaml_path(&path_for_environment(env));
        self.check_duplicate(&path);
        self.check_name(&env.name, &path);
        if let Some(pipelines) = &env.pipelines {
            self.check_pipelines(pipelines, &path);
        }
        self.service_names.clear();
        Ok(())
    }
}

impl Validator {
    fn check_duplicate(&mut self, path: &str) {
        if !self.seen.insert(path.to_string()) {
            let field = path.rsplit('.').next().unwrap_or(path);
            self.errors.push(FieldError::new(
                format!("duplicate field(s) {:?}", field),
                vec![path.to_string()],
            ));
        }
    }

    fn check_name(&mut self, name: &str, path: &str) {
        if let Some(details) = dns1035_label_error(name) {
            self.errors.push(
                FieldError::new(format!("invalid name {:?}", name), vec![path.to_string()])
                    .with_details(details),
            );
        }
    }

    fn check_webhook(&mut self, hook: &Webhook, path: &str) {
        let Some(secret) = &hook.secret else {
            self.errors
                .push(missing_fields(&["secret"], &yaml_join(path, &["webhook"])));
            return;
        };
        self.check_name(&secret.name, &yaml_join(path, &["webhook", "secret", "name"]));
        self.check_name(
            &secret.namespace,
            &yaml_join(path, &["webhook", "secret", "namespace"]),
        );
    }

    fn check_pipelines(&mut self, pipelines: &Pipelines, path: &str) {
        let Some(integration) = &pipelines.integration else {
            self.errors
                .push(missing_fields(&["integration"], &yaml_join(path, &["pipelines"])));
            return;
        };
        let binding_path = yaml_join(path, &["pipelines", "integration", "binding"]);
        for name in &integration.bindings {
            self.check_name(name, &binding_path);
        }
    }

    fn check_config_repo(&mut self, repo: &Repository, path: &str) {
        let mut missing = Vec::new();
        if repo.url.is_empty() {
            missing.push("url");
        }
        if repo.path.is_empty() {
            missing.push("path");
        }
        if !missing.is_empty() {
            self.errors.push(missing_fields(&missing, path));
        }
    }

    /// Every source URL must share one provider family, and no two services
    /// may build from the same repository.
    fn check_source_urls(&mut self, gitops_url: Option<&str>) {
        let mut reference = None;
        if let Some(url) = gitops_url {
            match GitProvider::detect(url) {
                Ok(provider) => reference = Some(provider),
                Err(e) => self
                    .errors
                    .push(FieldError::new(e.to_string(), vec!["gitops_url".to_string()])),
            }
        }

        for (url, paths) in &self.source_urls {
            match GitProvider::detect(url) {
                Ok(provider) => {
                    let expected = *reference.get_or_insert(provider);
                    if expected != provider {
                        self.errors.push(FieldError::new(
                            format!("service URL must be a {} repository: {}", expected, url),
                            paths.clone(),
                        ));
                    }
                }
                Err(e) => self.errors.push(FieldError::new(e.to_string(), paths.clone())),
            }
            if paths.len() > 1 {
                self.errors.push(FieldError::new(
                    format!("duplicate source {}", url),
                    paths.clone(),
                ));
            }
        }
    }
}

fn yaml_path(path: &str) -> String {
    path.replace('/', ".")
}

fn yaml_join(base: &str, parts: &[&str]) -> String {
    std::iter::once(base)
        .chain(parts.iter().copied())
        .collect::<Vec<_>>()
        .join(".")
}

fn invalid_environment(name: &str, details: &str, path: &str) -> FieldError {
    FieldError::new(format!("invalid environment {:?}", name), vec![path.to_string()])
        .with_details(details)
}

fn missing_fields(fields: &[&str], path: &str) -> FieldError {
    let quoted: Vec<String> = fields.iter().map(|f| format!("{:?}", f)).collect();
    FieldError::new(
        format!("missing field(s) {}", quoted.join(",")),
        vec![path.to_string()],
    )
}
