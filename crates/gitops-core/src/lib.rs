//! Core domain types for GitOps resource tree generation.
//!
//! This crate contains:
//! - The manifest model (environments, applications, services)
//! - The post-order traversal protocol and its visitor trait
//! - Manifest validation
//! - The resource mapping and its merge operation
//! - Source-control provider families and Tekton trigger types
//! - Argo CD application and sealed secret types

pub mod application;
pub mod error;
pub mod manifest;
pub mod paths;
pub mod pipeline;
pub mod repository;
pub mod resources;
pub mod secret;
pub mod validate;
pub mod walk;

pub use error::{Error, FieldError, Result, ValidationErrors};
pub use manifest::{
    Application, ArgoCdConfig, Config, Environment, Manifest, Pipelines, PipelinesConfig,
    Repository, Secret, Service, TemplateBinding, Webhook,
};
pub use resources::{Kustomization, Resource, Resources, merge};
pub use walk::Visitor;
