//! `routes` command handler: list the routes of a configuration document.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use localgw_lib::{ApiRoute, MockConfig};

/// Output format for route listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RoutesFormat {
    #[default]
    Text,
    Json,
}

/// Flattened route for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteLine {
    pub method: String,
    pub path: String,
    pub handler: String,
    pub code_uri: String,
    pub auth_type: String,
}

impl From<&ApiRoute> for RouteLine {
    fn from(route: &ApiRoute) -> Self {
        Self {
            method: route.method.to_ascii_uppercase(),
            path: route.path.clone(),
            handler: route.handler.clone(),
            code_uri: route.code_uri.clone(),
            auth_type: route.auth_type.clone().unwrap_or_else(|| "NONE".to_string()),
        }
    }
}

/// Handle the routes subcommand.
pub fn handle_routes(config: &Path, format: RoutesFormat, out: &mut impl Write) -> Result<()> {
    let config = MockConfig::load(config)
        .with_context(|| format!("failed to read configuration {}", config.display()))?;
    let lines: Vec<RouteLine> = config.routes().iter().map(RouteLine::from).collect();
    render(&lines, format, out)
}

fn render(lines: &[RouteLine], format: RoutesFormat, out: &mut impl Write) -> Result<()> {
    match format {
        RoutesFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, lines).context("failed to encode routes")?;
            writeln!(out)?;
        }
        RoutesFormat::Text => {
            if lines.is_empty() {
                writeln!(out, "No routes configured.")?;
            }
            for line in lines {
                writeln!(
                    out,
                    "{:<7} {} -> {} ({}, auth {})",
                    line.method, line.path, line.handler, line.code_uri, line.auth_type
                )?;
            }
        }
    }
    Ok(())
}
