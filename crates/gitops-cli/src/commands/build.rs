//! `gitops build`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use gitops_builder::{FsLister, KubesealSealer, WebhookSecrets, build_all};
use gitops_core::Resources;
use tracing::info;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Root of the GitOps repository to write into
    #[arg(long, env = "GITOPS_OUTPUT", default_value = ".")]
    pub output: PathBuf,

    /// Webhook secret value to seal, as NAME=VALUE (repeatable)
    #[arg(long = "webhook-secret", value_parser = parse_secret)]
    pub webhook_secrets: Vec<(String, String)>,

    /// Path to the kubeseal binary
    #[arg(long, env = "GITOPS_KUBESEAL", default_value = "kubeseal")]
    pub kubeseal: PathBuf,

    /// Namespace of the sealed-secrets controller
    #[arg(long, env = "GITOPS_SEALED_SECRETS_NAMESPACE")]
    pub sealed_secrets_namespace: Option<String>,

    /// Print the paths that would be written without writing them
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(manifest_path: &Path, args: &BuildArgs) -> Result<()> {
    let manifest = super::load(manifest_path)?;
    if let Err(e) = manifest.validate() {
        bail!("{}", e);
    }

    let mut sealer = KubesealSealer::new(&args.kubeseal);
    if let Some(ns) = &args.sealed_secrets_namespace {
        sealer = sealer.with_controller_namespace(ns);
    }
    let secrets = args
        .webhook_secrets
        .iter()
        .fold(WebhookSecrets::new(&sealer), |s, (name, value)| {
            s.with_value(name, value)
        });

    let lister = FsLister::new(&args.output);
    let files = build_all(&manifest, &lister, &secrets).context("failed to build resource tree")?;

    if args.dry_run {
        for path in files.keys() {
            println!("{}", path);
        }
        return Ok(());
    }

    write_tree(&args.output, &files)?;
    info!(output = %args.output.display(), files = files.len(), "Wrote resource tree");
    println!("Wrote {} files to {}", files.len(), args.output.display());
    Ok(())
}

/// Serialize each resource as YAML to its path under `root`.
pub fn write_tree(root: &Path, files: &Resources) -> Result<()> {
    for (path, resource) in files {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(resource)
            .with_context(|| format!("failed to serialize {}", path))?;
        std::fs::write(&target, yaml)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }
    Ok(())
}

fn parse_secret(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got {:?}", s)),
    }
}
