//! Template discovery in a project directory.

use std::fs;
use std::path::{Path, PathBuf};

use localgw_lib::Dialect;

/// Declarative template names, in lookup order.
pub const TEMPLATE_NAMES: [&str; 2] = ["template.yaml", "template.yml"];
/// Directory holding synthesized templates.
pub const ASSEMBLY_DIR: &str = "cdk.out";

/// A template file and the dialect it is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTemplate {
    pub path: PathBuf,
    pub dialect: Dialect,
}

/// Find a template under `dir`: a declarative `template.yaml`/`template.yml`
/// first, then the first `*template.json` in `cdk.out/` (by name).
pub fn discover_template(dir: &Path) -> Option<DiscoveredTemplate> {
    if let Some(path) = TEMPLATE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
    {
        return Some(DiscoveredTemplate {
            path,
            dialect: Dialect::Serverless,
        });
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(dir.join(ASSEMBLY_DIR))
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with("template.json"))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next().map(|path| DiscoveredTemplate {
        path,
        dialect: Dialect::CloudAssembly,
    })
}
