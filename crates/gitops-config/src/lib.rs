//! KDL manifest parsing for GitOps tree generation.
//!
//! The manifest (`pipelines.kdl`) lists environments, the services they
//! build and the applications grouping them.

pub mod error;
pub mod manifest;

pub use error::{ConfigError, ConfigResult};
pub use manifest::{load_manifest, parse_manifest};
