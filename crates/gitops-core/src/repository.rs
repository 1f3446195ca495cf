//! Source-control provider families and the repositories they host.
//!
//! A provider family decides how a repository URL is read and how webhook
//! payloads from that provider are filtered and bound to trigger parameters.
//! Supporting a new provider means adding a variant and a host suffix to
//! [`GitProvider::ALL`]; the trigger builder only talks to
//! [`SourceRepository`].

use serde::{Deserialize, Serialize};
use url::Url;

use crate::pipeline::{
    CelInterceptor, EventListenerTrigger, Interceptor, Param, SecretRef, TriggerBinding,
    WebhookInterceptor,
};
use crate::secret::WEBHOOK_SECRET_KEY;
use crate::{Error, Result};

/// Git provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    Github,
    Gitlab,
}

impl std::fmt::Display for GitProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitProvider::Github => write!(f, "github"),
            GitProvider::Gitlab => write!(f, "gitlab"),
        }
    }
}

impl GitProvider {
    /// Registered providers and the host suffix identifying each.
    pub const ALL: &'static [(GitProvider, &'static str)] = &[
        (GitProvider::Github, "github.com"),
        (GitProvider::Gitlab, "gitlab.com"),
    ];

    /// Match a host against the registered suffixes.
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.to_lowercase();
        Self::ALL.iter().find_map(|(provider, suffix)| {
            let matches = host == *suffix
                || host
                    .strip_suffix(suffix)
                    .is_some_and(|prefix| prefix.ends_with('.'));
            matches.then_some(*provider)
        })
    }

    /// Determine the provider family of a raw repository URL.
    pub fn detect(raw_url: &str) -> Result<Self> {
        let url = parse_url(raw_url)?;
        host_provider(&url, raw_url)
    }

    /// Extract the repository path (e.g. `org/repo`) from a parsed URL.
    pub fn repository_path(self, url: &Url) -> Result<String> {
        let components: Vec<&str> = url
            .path()
            .trim_matches('/')
            .trim_end_matches(".git")
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let valid = match self {
            GitProvider::Github => components.len() == 2,
            // `-` separates a project from its sub-pages, so it can never be
            // part of the project path itself.
            GitProvider::Gitlab => {
                components.len() >= 2
                    && !components[..components.len() - 1].contains(&"-")
            }
        };

        if !valid {
            return Err(Error::InvalidRepoPath {
                provider: self.to_string(),
                path: url.path().to_string(),
            });
        }
        Ok(components.join("/"))
    }

    pub fn pr_binding_name(self) -> String {
        format!("{}-pr-binding", self)
    }

    pub fn push_binding_name(self) -> String {
        format!("{}-push-binding", self)
    }

    /// Parameters extracted from a pull/merge request opened or updated event.
    pub fn pr_binding_params(self) -> Vec<Param> {
        match self {
            GitProvider::Github => vec![
                Param::new("gitref", "$(body.pull_request.head.ref)"),
                Param::new("gitsha", "$(body.pull_request.head.sha)"),
                Param::new("gitrepositoryurl", "$(body.repository.clone_url)"),
                Param::new("fullname", "$(body.repository.full_name)"),
            ],
            GitProvider::Gitlab => vec![
                Param::new("gitref", "$(body.object_attributes.source_branch)"),
                Param::new("gitsha", "$(body.object_attributes.last_commit.id)"),
                Param::new("gitrepositoryurl", "$(body.project.git_http_url)"),
                Param::new("fullname", "$(body.project.path_with_namespace)"),
            ],
        }
    }

    /// Parameters extracted from a push event.
    pub fn push_binding_params(self) -> Vec<Param> {
        match self {
            GitProvider::Github => vec![
                Param::new("gitref", "$(body.ref)"),
                Param::new("gitsha", "$(body.head_commit.id)"),
                Param::new("gitrepositoryurl", "$(body.repository.clone_url)"),
            ],
            GitProvider::Gitlab => vec![
                Param::new("gitref", "$(body.ref)"),
                Param::new("gitsha", "$(body.after)"),
                Param::new("gitrepositoryurl", "$(body.project.git_http_url)"),
            ],
        }
    }

    /// CEL filter matching pull/merge requests against `path`.
    pub fn pr_filter(self, path: &str) -> String {
        match self {
            GitProvider::Github => format!(
                "header.match('X-GitHub-Event', 'pull_request') && (body.action == 'opened' || body.action == 'synchronize') && body.pull_request.head.repo.full_name == '{}'",
                path
            ),
            GitProvider::Gitlab => format!(
                "header.match('X-Gitlab-Event', 'Merge Request Hook') && body.object_attributes.state == 'opened' && body.project.path_with_namespace == '{}' && body.project.default_branch == body.object_attributes.target_branch",
                path
            ),
        }
    }

    /// CEL filter matching pushes to the default branch of `path`.
    pub fn push_filter(self, path: &str) -> String {
        match self {
            GitProvider::Github => format!(
                "header.match('X-GitHub-Event', 'push') && body.repository.full_name == '{}' && body.ref == 'refs/heads/' + body.repository.default_branch",
                path
            ),
            GitProvider::Gitlab => format!(
                "header.match('X-Gitlab-Event', 'Push Hook') && body.project.path_with_namespace == '{}' && body.ref == 'refs/heads/' + body.project.default_branch",
                path
            ),
        }
    }

    /// Interceptor authenticating inbound webhooks with a shared secret.
    pub fn interceptor(self, secret_namespace: &str, secret_name: &str) -> Interceptor {
        let hook = WebhookInterceptor {
            secret_ref: SecretRef {
                secret_name: secret_name.to_string(),
                secret_key: WEBHOOK_SECRET_KEY.to_string(),
                namespace: secret_namespace.to_string(),
            },
        };
        match self {
            GitProvider::Github => Interceptor::Github(hook),
            GitProvider::Gitlab => Interceptor::Gitlab(hook),
        }
    }
}

/// A repository hosted by a recognised provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRepository {
    pub url: String,
    /// Provider-specific repository path, e.g. `org/repo`.
    pub path: String,
    pub provider: GitProvider,
}

impl SourceRepository {
    pub fn parse(raw_url: &str) -> Result<Self> {
        let url = parse_url(raw_url)?;
        let provider = host_provider(&url, raw_url)?;
        let path = provider.repository_path(&url)?;
        Ok(Self {
            url: raw_url.to_string(),
            path,
            provider,
        })
    }

    pub fn pr_binding(&self, namespace: &str) -> TriggerBinding {
        TriggerBinding::new(
            namespace,
            &self.provider.pr_binding_name(),
            self.provider.pr_binding_params(),
        )
    }

    pub fn push_binding(&self, namespace: &str) -> TriggerBinding {
        TriggerBinding::new(
            namespace,
            &self.provider.push_binding_name(),
            self.provider.push_binding_params(),
        )
    }

    /// A trigger firing on pull/merge requests to this repository.
    pub fn ci_trigger(
        &self,
        name: &str,
        secret_namespace: &str,
        secret_name: &str,
        template: &str,
        bindings: &[String],
    ) -> EventListenerTrigger {
        self.trigger(
            name,
            secret_namespace,
            secret_name,
            self.provider.pr_filter(&self.path),
            template,
            bindings,
        )
    }

    /// A trigger firing on pushes to the default branch of this repository.
    pub fn cd_trigger(
        &self,
        name: &str,
        secret_namespace: &str,
        secret_name: &str,
        template: &str,
        bindings: &[String],
    ) -> EventListenerTrigger {
        self.trigger(
            name,
            secret_namespace,
            secret_name,
            self.provider.push_filter(&self.path),
            template,
            bindings,
        )
    }

    fn trigger(
        &self,
        name: &str,
        secret_namespace: &str,
        secret_name: &str,
        filter: String,
        template: &str,
        bindings: &[String],
    ) -> EventListenerTrigger {
        let interceptors = vec![
            self.provider.interceptor(secret_namespace, secret_name),
            Interceptor::Cel(CelInterceptor { filter }),
        ];
        EventListenerTrigger::new(name, interceptors, template, bindings)
    }
}

fn parse_url(raw_url: &str) -> Result<Url> {
    Url::parse(raw_url).map_err(|e| Error::InvalidUrl {
        url: raw_url.to_string(),
        reason: e.to_string(),
    })
}

fn host_provider(url: &Url, raw_url: &str) -> Result<GitProvider> {
    let host = url.host_str().ok_or_else(|| Error::InvalidUrl {
        url: raw_url.to_string(),
        reason: "missing host".to_string(),
    })?;
    GitProvider::from_host(host).ok_or_else(|| Error::UnsupportedHost {
        url: raw_url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_provider() {
        assert_eq!(
            GitProvider::detect("https://github.com/org/repo.git").unwrap(),
            GitProvider::Github
        );
        assert_eq!(
            GitProvider::detect("https://gitlab.com/group/sub/repo").unwrap(),
            GitProvider::Gitlab
        );
        assert_eq!(
            GitProvider::detect("https://api.github.com/org/repo").unwrap(),
            GitProvider::Github
        );
    }

    #[test]
    fn test_unrecognised_host() {
        let err = GitProvider::detect("https://example.com/org/repo").unwrap_err();
        assert!(matches!(err, Error::UnsupportedHost { .. }));

        let err = GitProvider::detect("https://notgithub.com/org/repo").unwrap_err();
        assert!(matches!(err, Error::UnsupportedHost { .. }));
    }

    #[test]
    fn test_malformed_url() {
        let err = SourceRepository::parse("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_github_path() {
        let repo = SourceRepository::parse("https://github.com/org/repo.git").unwrap();
        assert_eq!(repo.path, "org/repo");
        assert_eq!(repo.provider, GitProvider::Github);
    }

    #[test]
    fn test_github_path_segment_count() {
        for url in ["https://github.com/org", "https://github.com/org/repo/extra"] {
            let err = SourceRepository::parse(url).unwrap_err();
            assert!(
                matches!(err, Error::InvalidRepoPath { ref provider, .. } if provider == "github"),
                "{url}: {err}"
            );
        }
    }

    #[test]
    fn test_gitlab_nested_groups() {
        let repo = SourceRepository::parse("https://gitlab.com/group/sub/repo.git").unwrap();
        assert_eq!(repo.path, "group/sub/repo");
    }

    #[test]
    fn test_gitlab_rejects_subpage_marker() {
        let err = SourceRepository::parse("https://gitlab.com/group/-/repo").unwrap_err();
        assert!(matches!(err, Error::InvalidRepoPath { .. }));

        let err = SourceRepository::parse("https://gitlab.com/group").unwrap_err();
        assert!(matches!(err, Error::InvalidRepoPath { .. }));
    }

    #[test]
    fn test_ci_trigger_uses_provider_interceptor_and_filter() {
        let repo = SourceRepository::parse("https://gitlab.com/team/svc").unwrap();
        let trigger = repo.ci_trigger(
            "dev-svc-ci-build-from-pr",
            "cicd",
            "svc-hook",
            "app-ci-template",
            &["gitlab-pr-binding".to_string()],
        );
        assert_eq!(trigger.interceptors.len(), 2);
        match &trigger.interceptors[0] {
            Interceptor::Gitlab(hook) => {
                assert_eq!(hook.secret_ref.secret_name, "svc-hook");
                assert_eq!(hook.secret_ref.namespace, "cicd");
            }
            other => panic!("unexpected interceptor {:?}", other),
        }
        match &trigger.interceptors[1] {
            Interceptor::Cel(cel) => {
                assert!(cel.filter.contains("Merge Request Hook"));
                assert!(cel.filter.contains("'team/svc'"));
            }
            other => panic!("unexpected interceptor {:?}", other),
        }
        assert_eq!(trigger.template.name, "app-ci-template");
    }

    #[test]
    fn test_cd_trigger_filters_default_branch_pushes() {
        let repo = SourceRepository::parse("https://github.com/org/gitops").unwrap();
        let trigger = repo.cd_trigger(
            "cd-deploy-from-push",
            "cicd",
            "gitops-webhook-secret",
            "cd-deploy-from-push-template",
            &[GitProvider::Github.push_binding_name()],
        );
        match &trigger.interceptors[1] {
            Interceptor::Cel(cel) => {
                assert!(cel.filter.contains("'push'"));
                assert!(cel.filter.contains("body.repository.default_branch"));
                assert!(cel.filter.contains("'org/gitops'"));
            }
            other => panic!("unexpected interceptor {:?}", other),
        }
        assert_eq!(trigger.bindings[0].name, "github-push-binding");
    }

    #[test]
    fn test_bindings_differ_by_provider() {
        let gh = SourceRepository::parse("https://github.com/a/b").unwrap();
        let gl = SourceRepository::parse("https://gitlab.com/a/b").unwrap();
        let gh_binding = gh.push_binding("cicd");
        let gl_binding = gl.push_binding("cicd");
        assert_eq!(gh_binding.metadata.name.as_deref(), Some("github-push-binding"));
        assert_eq!(gl_binding.metadata.name.as_deref(), Some("gitlab-push-binding"));
        assert_ne!(gh_binding.spec.params, gl_binding.spec.params);
    }
}
