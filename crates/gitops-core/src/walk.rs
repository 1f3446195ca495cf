//! Post-order traversal of a manifest.

use crate::Result;
use crate::manifest::{Application, Environment, Manifest, Service};

/// Callbacks invoked by [`Manifest::walk`].
///
/// Every method defaults to a no-op, so a visitor only implements the levels
/// it cares about.
pub trait Visitor {
    fn service(&mut self, _env: &Environment, _svc: &Service) -> Result<()> {
        Ok(())
    }

    fn application(&mut self, _env: &Environment, _app: &Application) -> Result<()> {
        Ok(())
    }

    fn environment(&mut self, _env: &Environment) -> Result<()> {
        Ok(())
    }
}

impl Manifest {
    /// Environments in traversal order: ascending by name, with CI/CD
    /// environments after all others.
    pub fn sorted_environments(&self) -> Vec<&Environment> {
        let mut envs: Vec<&Environment> = self.environments.iter().collect();
        envs.sort_by(|a, b| (a.is_cicd, &a.name).cmp(&(b.is_cicd, &b.name)));
        envs
    }

    /// Visit every service, then every application, then the environment
    /// itself, for each environment in [`Manifest::sorted_environments`]
    /// order. The first error aborts the walk.
    pub fn walk(&self, visitor: &mut dyn Visitor) -> Result<()> {
        for env in self.sorted_environments() {
            for svc in &env.services {
                visitor.service(env, svc)?;
            }
            for app in &env.apps {
                visitor.application(env, app)?;
            }
            visitor.environment(env)?;
        }
        Ok(())
    }
}
