//! Shared helpers for the integration tests.
//!
//! Each test writes its template (and any project files the template points
//! at) into a fresh temporary directory.

use std::fs;
use std::path::{Path, PathBuf};

use localgw_lib::{load_template, Dialect, ResolvedTemplate, TemplateOptions};
use tempfile::TempDir;

/// A throwaway project directory.
pub struct Project {
    _temp_dir: TempDir,
    pub root: PathBuf,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl Project {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write project file");
        path
    }

    /// Write a declarative template as `template.yaml` and load it.
    pub fn serverless(&self, yaml: &str) -> ResolvedTemplate {
        let path = self.write("template.yaml", yaml);
        load(&path, Dialect::Serverless)
    }

    /// Write a synthesized template as `cdk.out/Stack.template.json` and load it.
    pub fn assembly(&self, json: &serde_json::Value) -> ResolvedTemplate {
        let text = serde_json::to_string_pretty(json).expect("encode template");
        let path = self.write("cdk.out/Stack.template.json", &text);
        load(&path, Dialect::CloudAssembly)
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

#[allow(dead_code)]
pub fn load(path: &Path, dialect: Dialect) -> ResolvedTemplate {
    load_template(path, dialect, &TemplateOptions::default()).expect("load template")
}

/// Path to the static fixtures shipped with the repository.
#[allow(dead_code)]
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}
