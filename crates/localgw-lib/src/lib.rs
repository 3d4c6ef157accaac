//! localgw library entry points.
//!
//! This crate reads infrastructure templates (declarative serverless
//! templates and synthesized cloud-assembly templates), evaluates their
//! intrinsic functions, classifies the resulting resources, and emits the
//! normalized configuration consumed by the local API mock. Front ends (the
//! CLI, tests) should only depend on the functions exported here instead of
//! reimplementing behavior.

pub mod auth;
pub mod classify;
pub mod config;
pub mod emit;
pub mod error;
pub mod expr;
pub mod hash_index;
pub mod image;
pub mod refs;
pub mod resolve;
pub mod template;

use std::path::Path;

use serde_json::{Map, Value};

pub use auth::{AuthType, EventType};
pub use classify::{classify, ClassificationBuckets};
pub use config::{ApiResponse, ApiRoute, MockConfig};
pub use emit::{emit, write_config, write_sample_config, SAMPLE_CONFIG};
pub use error::{Error, Result};
pub use expr::Expression;
pub use hash_index::ContentIndex;
pub use image::ContainerDescriptor;
pub use refs::{build_refs, ReferenceEntry, ReferenceTable};
pub use resolve::{ParameterTable, Resolver};
pub use template::{load_template, Dialect, ResolvedTemplate, Resource, TemplateOptions};

/// Result of [`generate_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedConfig {
    /// The document that was written.
    pub document: Map<String, Value>,
    /// Number of (path, method) routes classified from the template.
    pub routes: usize,
}

/// Load, classify, and write a template's configuration in one call.
pub fn generate_config(
    template: &Path,
    dialect: Dialect,
    options: &TemplateOptions,
    output: &Path,
    overwrite: bool,
) -> Result<GeneratedConfig> {
    let resolved = load_template(template, dialect, options)?;
    let buckets = classify(&resolved)?;
    let document = write_config(output, &buckets, overwrite)?;
    Ok(GeneratedConfig {
        document,
        routes: buckets.route_count(),
    })
}
