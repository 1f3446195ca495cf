//! Webhook triggers routed through the CI/CD event listener.

use std::collections::BTreeMap;

use gitops_core::paths;
use gitops_core::pipeline::{EventListener, EventListenerTrigger};
use gitops_core::repository::{GitProvider, SourceRepository};
use gitops_core::secret::GITOPS_WEBHOOK_SECRET;
use gitops_core::{Environment, Manifest, Resources, Result, Service, TemplateBinding, Visitor};
use tracing::debug;

pub const EVENT_LISTENER_NAME: &str = "cicd-event-listener";

pub const BINDINGS_DIR: &str = "06-bindings";
pub const EVENT_LISTENERS_DIR: &str = "08-eventlisteners";

const DEFAULT_CI_TEMPLATE: &str = "app-ci-template";
const DRYRUN_TRIGGER: &str = "ci-dryrun-from-pr";
const DRYRUN_TEMPLATE: &str = "ci-dryrun-from-pr-template";
const DEPLOY_TRIGGER: &str = "cd-deploy-from-push";
const DEPLOY_TEMPLATE: &str = "cd-deploy-from-push-template";

/// Build the event listener and provider bindings. Empty when no CI/CD
/// controller is configured.
pub fn build(manifest: &Manifest) -> Result<Resources> {
    let Some(cicd) = manifest.cicd_name() else {
        return Ok(Resources::new());
    };

    let mut builder = TriggersBuilder {
        cicd,
        triggers: Vec::new(),
        repos: BTreeMap::new(),
    };

    if let Some(url) = manifest.gitops_url() {
        builder.add_gitops_triggers(url)?;
    }
    manifest.walk(&mut builder)?;

    let pipelines = paths::pipelines_path(cicd);
    let mut files = Resources::new();

    for repo in builder.repos.values() {
        for binding in [repo.pr_binding(cicd), repo.push_binding(cicd)] {
            let name = binding.metadata.name.clone().unwrap_or_default();
            files.insert(
                paths::join(&[&pipelines, BINDINGS_DIR, &format!("{}.yaml", name)]),
                binding.into(),
            );
        }
    }

    debug!(cicd = %cicd, triggers = builder.triggers.len(), "Built event listener");
    files.insert(
        paths::join(&[
            &pipelines,
            EVENT_LISTENERS_DIR,
            &format!("{}.yaml", EVENT_LISTENER_NAME),
        ]),
        EventListener::new(cicd, EVENT_LISTENER_NAME, builder.triggers).into(),
    );
    Ok(files)
}

struct TriggersBuilder<'a> {
    cicd: &'a str,
    /// In traversal order; never re-sorted.
    triggers: Vec<EventListenerTrigger>,
    /// First repository seen for each provider family, for its bindings.
    repos: BTreeMap<GitProvider, SourceRepository>,
}

impl TriggersBuilder<'_> {
    /// Dry-run on pull requests and deploy on pushes to the GitOps repository.
    fn add_gitops_triggers(&mut self, url: &str) -> Result<()> {
        let repo = SourceRepository::parse(url)?;
        self.triggers.push(repo.ci_trigger(
            DRYRUN_TRIGGER,
            self.cicd,
            GITOPS_WEBHOOK_SECRET,
            DRYRUN_TEMPLATE,
            &[repo.provider.pr_binding_name()],
        ));
        self.triggers.push(repo.cd_trigger(
            DEPLOY_TRIGGER,
            self.cicd,
            GITOPS_WEBHOOK_SECRET,
            DEPLOY_TEMPLATE,
            &[repo.provider.push_binding_name()],
        ));
        self.repos.entry(repo.provider).or_insert(repo);
        Ok(())
    }
}

impl Visitor for TriggersBuilder<'_> {
    fn service(&mut self, env: &Environment, svc: &Service) -> Result<()> {
        if env.is_special() {
            return Ok(());
        }
        let Some(url) = svc.source() else {
            return Ok(());
        };
        let repo = SourceRepository::parse(url)?;

        let (template, bindings) = match integration(env, svc) {
            Some(tb) => (tb.template.clone(), tb.bindings.clone()),
            None => (
                DEFAULT_CI_TEMPLATE.to_string(),
                vec![repo.provider.pr_binding_name()],
            ),
        };
        let (secret_namespace, secret_name) = webhook_secret(self.cicd, env, svc);

        let name = format!("{}-{}-ci-build-from-pr", env.name, svc.name);
        debug!(
            trigger = %name,
            repo = %repo.path,
            provider = %repo.provider,
            "Adding service trigger"
        );
        self.triggers.push(repo.ci_trigger(
            &name,
            &secret_namespace,
            &secret_name,
            &template,
            &bindings,
        ));
        self.repos.entry(repo.provider).or_insert(repo);
        Ok(())
    }
}

/// The service's own integration pipeline, else its environment's.
fn integration<'a>(env: &'a Environment, svc: &'a Service) -> Option<&'a TemplateBinding> {
    svc.pipelines
        .as_ref()
        .and_then(|p| p.integration.as_ref())
        .or_else(|| env.pipelines.as_ref().and_then(|p| p.integration.as_ref()))
}

/// Namespace and name of the secret authenticating a service's webhooks.
pub fn webhook_secret(cicd: &str, env: &Environment, svc: &Service) -> (String, String) {
    match svc.webhook_secret() {
        Some(secret) => (secret.namespace.clone(), secret.name.clone()),
        None => (
            cicd.to_string(),
            format!("webhook-secret-{}-{}", env.name, svc.name),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitops_core::pipeline::Interceptor;
    use gitops_core::{Config, Pipelines, PipelinesConfig, Resource, Secret, Webhook};

    const LISTENER: &str = "config/cicd/base/pipelines/08-eventlisteners/cicd-event-listener.yaml";

    fn svc(name: &str, url: &str) -> Service {
        Service {
            source_url: Some(url.to_string()),
            ..Service::new(name)
        }
    }

    fn manifest(services: Vec<Service>) -> Manifest {
        Manifest {
            gitops_url: Some("https://github.com/org/gitops".to_string()),
            config: Some(Config {
                pipelines: Some(PipelinesConfig {
                    name: "cicd".to_string(),
                }),
                argocd: None,
            }),
            environments: vec![
                Environment {
                    services,
                    ..Environment::new("dev")
                },
                Environment {
                    is_cicd: true,
                    ..Environment::new("cicd")
                },
            ],
        }
    }

    fn listener(files: &Resources) -> &EventListener {
        match &files[LISTENER] {
            Resource::EventListener(el) => el,
            other => panic!("unexpected resource {}", other.kind()),
        }
    }

    #[test]
    fn test_gitops_triggers_come_first() {
        let files = build(&manifest(vec![
            svc("svc1", "https://github.com/org/svc1"),
            Service::new("no-source"),
            svc("svc2", "https://github.com/org/svc2.git"),
        ]))
        .unwrap();

        let names: Vec<&str> = listener(&files)
            .spec
            .triggers
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "ci-dryrun-from-pr",
                "cd-deploy-from-push",
                "dev-svc1-ci-build-from-pr",
                "dev-svc2-ci-build-from-pr",
            ]
        );
        assert!(
            files.contains_key("config/cicd/base/pipelines/06-bindings/github-pr-binding.yaml")
        );
        assert!(
            files.contains_key("config/cicd/base/pipelines/06-bindings/github-push-binding.yaml")
        );
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_service_trigger_defaults() {
        let files = build(&manifest(vec![svc("svc1", "https://github.com/org/svc1")])).unwrap();
        let trigger = &listener(&files).spec.triggers[2];

        assert_eq!(trigger.template.name, "app-ci-template");
        assert_eq!(trigger.bindings[0].name, "github-pr-binding");
        match &trigger.interceptors[0] {
            Interceptor::Github(hook) => {
                assert_eq!(hook.secret_ref.secret_name, "webhook-secret-dev-svc1");
                assert_eq!(hook.secret_ref.namespace, "cicd");
            }
            other => panic!("unexpected interceptor {:?}", other),
        }
    }

    #[test]
    fn test_service_pipelines_override_environment() {
        let mut s1 = svc("svc1", "https://github.com/org/svc1");
        s1.pipelines = Some(Pipelines {
            integration: Some(TemplateBinding {
                template: "svc-template".to_string(),
                bindings: vec!["svc-binding".to_string()],
            }),
        });
        s1.webhook = Some(Webhook {
            secret: Some(Secret {
                name: "svc1-hook".to_string(),
                namespace: "hooks".to_string(),
            }),
        });
        let s2 = svc("svc2", "https://github.com/org/svc2");

        let mut m = manifest(vec![s1, s2]);
        m.environments[0].pipelines = Some(Pipelines {
            integration: Some(TemplateBinding {
                template: "env-template".to_string(),
                bindings: vec!["env-binding".to_string()],
            }),
        });

        let files = build(&m).unwrap();
        let triggers = &listener(&files).spec.triggers;
        assert_eq!(triggers[2].template.name, "svc-template");
        assert_eq!(triggers[2].bindings[0].name, "svc-binding");
        assert_eq!(triggers[3].template.name, "env-template");
        assert_eq!(triggers[3].bindings[0].name, "env-binding");
        match &triggers[2].interceptors[0] {
            Interceptor::Github(hook) => {
                assert_eq!(hook.secret_ref.secret_name, "svc1-hook");
                assert_eq!(hook.secret_ref.namespace, "hooks");
            }
            other => panic!("unexpected interceptor {:?}", other),
        }
    }

    #[test]
    fn test_no_cicd_is_empty() {
        let mut m = manifest(vec![svc("svc1", "https://github.com/org/svc1")]);
        m.config = None;
        m.environments.retain(|e| !e.is_cicd);
        assert!(build(&m).unwrap().is_empty());
    }

    #[test]
    fn test_bad_url_aborts() {
        let err = build(&manifest(vec![svc("svc1", "https://example.com/org/svc1")])).unwrap_err();
        assert!(matches!(err, gitops_core::Error::UnsupportedHost { .. }));

        let err = build(&manifest(vec![svc("svc1", "https://github.com/org")])).unwrap_err();
        assert!(matches!(err, gitops_core::Error::InvalidRepoPath { .. }));
    }

    #[test]
    fn test_without_gitops_url_only_service_triggers() {
        let mut m = manifest(vec![svc("svc1", "https://gitlab.com/group/svc1")]);
        m.gitops_url = None;
        let files = build(&m).unwrap();

        let triggers = &listener(&files).spec.triggers;
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].bindings[0].name, "gitlab-pr-binding");
        assert!(
            files.contains_key("config/cicd/base/pipelines/06-bindings/gitlab-push-binding.yaml")
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let m = manifest(vec![
            svc("b", "https://github.com/org/b"),
            svc("a", "https://github.com/org/a"),
        ]);
        assert_eq!(build(&m).unwrap(), build(&m).unwrap());
    }
}
