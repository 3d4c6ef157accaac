//! `init` command handler: template → configuration document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use localgw_lib::{generate_config, write_sample_config, Dialect, TemplateOptions};

use crate::discovery::{discover_template, DiscoveredTemplate};

/// Inputs of the `init` command.
#[derive(Debug, Clone)]
pub struct InitRequest {
    /// Explicit template path; discovered from `project_dir` when absent.
    pub template: Option<PathBuf>,
    /// Treat an explicit template as a synthesized (cloud assembly) template.
    pub cloud_assembly: bool,
    pub output: PathBuf,
    pub region: String,
    pub overwrite: bool,
    pub project_dir: PathBuf,
}

/// What `init` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InitOutcome {
    /// A template was classified and its configuration written.
    Generated {
        template: PathBuf,
        output: PathBuf,
        routes: usize,
    },
    /// The named template does not exist; a sample configuration was written.
    Sample { output: PathBuf },
    /// No template was named or discovered; nothing was written.
    NoTemplate,
}

/// Handle the init subcommand.
pub fn handle_init(request: &InitRequest) -> Result<InitOutcome> {
    let found = match &request.template {
        Some(path) if !path.exists() => {
            warn!(
                template = %path.display(),
                "template not found; writing a sample configuration you need to edit"
            );
            write_sample_config(&request.output).with_context(|| {
                format!("failed to write sample configuration to {}", request.output.display())
            })?;
            return Ok(InitOutcome::Sample {
                output: request.output.clone(),
            });
        }
        Some(path) => DiscoveredTemplate {
            path: path.clone(),
            dialect: if request.cloud_assembly {
                Dialect::CloudAssembly
            } else {
                Dialect::Serverless
            },
        },
        None => match discover_template(&request.project_dir) {
            Some(found) => found,
            None => {
                warn!(
                    dir = %request.project_dir.display(),
                    "no template.yaml or cdk.out/*template.json found"
                );
                return Ok(InitOutcome::NoTemplate);
            }
        },
    };

    let options = TemplateOptions::default().with_region(request.region.clone());
    let generated = generate_config(
        &found.path,
        found.dialect,
        &options,
        &request.output,
        request.overwrite,
    )
    .with_context(|| {
        format!(
            "failed to generate {} from {}",
            request.output.display(),
            found.path.display()
        )
    })?;
    Ok(InitOutcome::Generated {
        template: found.path,
        output: request.output.clone(),
        routes: generated.routes,
    })
}
