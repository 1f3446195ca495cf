//! Sealed webhook secrets.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use gitops_core::paths;
use gitops_core::secret::{GITOPS_WEBHOOK_SECRET, SealedSecret, SecretSealer, WEBHOOK_SECRET_KEY};
use gitops_core::{Environment, Error, Manifest, Resources, Result, Service, Visitor};
use tracing::{debug, info, warn};

use crate::triggers::webhook_secret;

pub const SECRETS_DIR: &str = "03-secrets";

/// Plaintext webhook secrets supplied by the caller, and the sealer used to
/// encrypt them.
pub struct WebhookSecrets<'a> {
    sealer: &'a dyn SecretSealer,
    values: BTreeMap<String, String>,
}

impl<'a> WebhookSecrets<'a> {
    pub fn new(sealer: &'a dyn SecretSealer) -> Self {
        Self {
            sealer,
            values: BTreeMap::new(),
        }
    }

    /// Supply the plaintext for the secret called `name`.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

/// Seal every webhook secret the triggers reference and a value was
/// supplied for. Empty when no CI/CD controller is configured.
pub fn build(manifest: &Manifest, secrets: &WebhookSecrets<'_>) -> Result<Resources> {
    let Some(cicd) = manifest.cicd_name() else {
        return Ok(Resources::new());
    };

    let mut wanted = Vec::new();
    if manifest.gitops_url().is_some() {
        wanted.push((cicd.to_string(), GITOPS_WEBHOOK_SECRET.to_string()));
    }
    let mut collector = SecretCollector { cicd, wanted };
    manifest.walk(&mut collector)?;

    let dir = paths::join(&[&paths::pipelines_path(cicd), SECRETS_DIR]);
    let mut files = Resources::new();
    for (namespace, name) in collector.wanted {
        let path = paths::join(&[&dir, &format!("{}.yaml", name)]);
        if files.contains_key(&path) {
            continue;
        }
        let Some(value) = secrets.values.get(&name) else {
            debug!(secret = %name, "No value supplied, leaving secret as is");
            continue;
        };
        let sealed = secrets
            .sealer
            .seal(&namespace, &name, WEBHOOK_SECRET_KEY, value)
            .map_err(|e| match e {
                Error::Sealing { .. } => e,
                other => Error::Sealing {
                    name: name.clone(),
                    message: other.to_string(),
                },
            })?;
        info!(secret = %name, namespace = %namespace, "Sealed webhook secret");
        files.insert(path, sealed.into());
    }
    Ok(files)
}

/// Namespace and name of every webhook secret, in traversal order.
struct SecretCollector<'a> {
    cicd: &'a str,
    wanted: Vec<(String, String)>,
}

impl Visitor for SecretCollector<'_> {
    fn service(&mut self, env: &Environment, svc: &Service) -> Result<()> {
        if !env.is_special() && svc.source().is_some() {
            self.wanted.push(webhook_secret(self.cicd, env, svc));
        }
        Ok(())
    }
}

/// Seals secrets by invoking the `kubeseal` binary in raw mode.
#[derive(Debug, Clone)]
pub struct KubesealSealer {
    binary: PathBuf,
    controller_namespace: Option<String>,
}

impl Default for KubesealSealer {
    fn default() -> Self {
        Self::new("kubeseal")
    }
}

impl KubesealSealer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            controller_namespace: None,
        }
    }

    /// Namespace the sealed-secrets controller runs in, when not the default.
    pub fn with_controller_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.controller_namespace = Some(namespace.into());
        self
    }

    fn failure(name: &str, message: impl Into<String>) -> Error {
        Error::Sealing {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

impl SecretSealer for KubesealSealer {
    fn seal(&self, namespace: &str, name: &str, key: &str, value: &str) -> Result<SealedSecret> {
        let mut command = Command::new(&self.binary);
        command.args([
            "--raw",
            "--scope",
            "strict",
            "--namespace",
            namespace,
            "--name",
            name,
            "--from-file=/dev/stdin",
        ]);
        if let Some(controller) = &self.controller_namespace {
            command.args(["--controller-namespace", controller]);
        }

        debug!(binary = %self.binary.display(), secret = %name, "Running kubeseal");

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Self::failure(
                    name,
                    format!("failed to run {}: {}", self.binary.display(), e),
                )
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(value.as_bytes())
                .map_err(|e| Self::failure(name, e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Self::failure(name, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Don't log stderr, it may echo the plaintext
            warn!(secret = %name, "kubeseal failed");
            let stderr = if value.is_empty() {
                stderr.to_string()
            } else {
                stderr.replace(value, "[REDACTED]")
            };
            return Err(Self::failure(name, stderr.trim().to_string()));
        }

        let encrypted = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if encrypted.is_empty() {
            return Err(Self::failure(name, "kubeseal produced no output"));
        }
        Ok(SealedSecret::new(namespace, name, key, encrypted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitops_core::secret::MemorySealer;
    use gitops_core::{Config, PipelinesConfig, Resource, Secret, Webhook};

    fn manifest() -> Manifest {
        let mut hooked = Service {
            source_url: Some("https://github.com/org/svc1".to_string()),
            ..Service::new("svc1")
        };
        hooked.webhook = Some(Webhook {
            secret: Some(Secret {
                name: "svc1-hook".to_string(),
                namespace: "hooks".to_string(),
            }),
        });
        Manifest {
            gitops_url: Some("https://github.com/org/gitops".to_string()),
            config: Some(Config {
                pipelines: Some(PipelinesConfig {
                    name: "cicd".to_string(),
                }),
                argocd: None,
            }),
            environments: vec![Environment {
                services: vec![
                    hooked,
                    Service {
                        source_url: Some("https://github.com/org/svc2".to_string()),
                        ..Service::new("svc2")
                    },
                    Service::new("no-source"),
                ],
                ..Environment::new("dev")
            }],
        }
    }

    #[test]
    fn test_only_supplied_secrets_are_sealed() {
        let sealer = MemorySealer::new();
        let secrets = WebhookSecrets::new(&sealer)
            .with_value("gitops-webhook-secret", "s3cret")
            .with_value("svc1-hook", "hook")
            .with_value("unrelated", "x");

        let files = build(&manifest(), &secrets).unwrap();
        let keys: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "config/cicd/base/pipelines/03-secrets/gitops-webhook-secret.yaml",
                "config/cicd/base/pipelines/03-secrets/svc1-hook.yaml",
            ]
        );
        assert_eq!(sealer.sealed(), vec!["cicd/gitops-webhook-secret", "hooks/svc1-hook"]);
        assert!(matches!(
            files["config/cicd/base/pipelines/03-secrets/svc1-hook.yaml"],
            Resource::SealedSecret(_)
        ));
    }

    #[test]
    fn test_default_service_secret_name() {
        let sealer = MemorySealer::new();
        let secrets = WebhookSecrets::new(&sealer).with_value("webhook-secret-dev-svc2", "v");
        let files = build(&manifest(), &secrets).unwrap();
        assert!(
            files.contains_key("config/cicd/base/pipelines/03-secrets/webhook-secret-dev-svc2.yaml")
        );
        assert_eq!(sealer.sealed(), vec!["cicd/webhook-secret-dev-svc2"]);
    }

    #[test]
    fn test_sealer_failure_names_secret() {
        let sealer = MemorySealer::failing_on("svc1-hook");
        let secrets = WebhookSecrets::new(&sealer).with_value("svc1-hook", "v");
        let err = build(&manifest(), &secrets).unwrap_err();
        assert!(matches!(err, Error::Sealing { ref name, .. } if name == "svc1-hook"));
    }

    #[test]
    fn test_gitops_secret_needs_gitops_url() {
        let mut m = manifest();
        m.gitops_url = None;
        let sealer = MemorySealer::new();
        let secrets = WebhookSecrets::new(&sealer)
            .with_value("gitops-webhook-secret", "s3cret")
            .with_value("svc1-hook", "hook");

        let files = build(&m, &secrets).unwrap();
        assert!(
            !files.contains_key("config/cicd/base/pipelines/03-secrets/gitops-webhook-secret.yaml")
        );
        assert_eq!(sealer.sealed(), vec!["hooks/svc1-hook"]);
    }

    #[test]
    fn test_no_cicd_is_empty() {
        let mut m = manifest();
        m.config = None;
        let sealer = MemorySealer::new();
        let secrets = WebhookSecrets::new(&sealer).with_value("gitops-webhook-secret", "v");
        assert!(build(&m, &secrets).unwrap().is_empty());
        assert!(sealer.sealed().is_empty());
    }

    #[test]
    fn test_kubeseal_missing_binary() {
        let sealer = KubesealSealer::new("/nonexistent/kubeseal");
        let err = sealer.seal("cicd", "hook", WEBHOOK_SECRET_KEY, "v").unwrap_err();
        assert!(matches!(err, Error::Sealing { ref name, .. } if name == "hook"));
    }
}
