//! CLI command implementations.

pub mod build;

use std::path::Path;

use anyhow::{Context, Result};
use gitops_core::{Error, Manifest};

/// Parse the manifest at `path`.
pub fn load(path: &Path) -> Result<Manifest> {
    gitops_config::load_manifest(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))
}

pub fn validate(path: &Path) -> Result<()> {
    let manifest = load(path)?;
    match manifest.validate() {
        Ok(()) => {
            println!("Manifest is valid");
            Ok(())
        }
        Err(Error::Validation(errs)) => {
            println!("Manifest has {} problem(s):", errs.len());
            for err in errs.iter() {
                println!("  - {}", err);
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
