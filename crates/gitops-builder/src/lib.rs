//! Builders that compile a manifest into a layered resource tree.
//!
//! Each builder walks the manifest on its own and returns a fresh
//! [`Resources`] mapping. [`build_all`] runs them in a fixed order and merges
//! the results so that later, more specific builders win on shared paths.

pub mod argocd;
pub mod cicd;
pub mod environments;
pub mod listing;
pub mod rbac;
pub mod secrets;
pub mod triggers;

pub use listing::{FileLister, FsLister, MemoryLister, RecordingLister};
pub use secrets::{KubesealSealer, WebhookSecrets};

use gitops_core::{Manifest, Resources, Result, merge};
use tracing::info;

/// Build the complete tree for `manifest`.
///
/// Order: environments, webhook secrets, triggers, Argo CD applications,
/// then the CI/CD skeleton indexing everything placed under its pipelines
/// directory.
pub fn build_all(
    manifest: &Manifest,
    lister: &dyn FileLister,
    secrets: &WebhookSecrets<'_>,
) -> Result<Resources> {
    let mut files = environments::build(manifest, lister)?;
    files = merge(&secrets::build(manifest, secrets)?, &files);
    files = merge(&triggers::build(manifest)?, &files);
    files = merge(&argocd::build(manifest)?, &files);
    files = merge(&cicd::build(manifest, lister, &files)?, &files);

    info!(
        environments = manifest.environments.len(),
        files = files.len(),
        "Built resource tree"
    );
    Ok(files)
}
