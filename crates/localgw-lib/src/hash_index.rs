//! Content-hash index of a project tree.
//!
//! Synthesized templates point at anonymized asset folders inside the
//! assembly output directory. Hashing every project file once lets those
//! assets be traced back to the source directory they were copied from.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

const SKIPPED_DIRS: &[&str] = &["node_modules"];
const INIT_MODULE: &str = "__init__.py";

/// Hex SHA-256 digest → project-relative path (`/`-separated).
#[derive(Debug, Clone, Default)]
pub struct ContentIndex {
    assembly_dir: PathBuf,
    by_hash: HashMap<String, String>,
}

impl ContentIndex {
    /// Hash every regular file under the parent of `assembly_dir`, skipping
    /// `assembly_dir` itself, hidden entries, and `node_modules`. The first
    /// file in sorted walk order wins when contents collide.
    pub fn build(assembly_dir: &Path) -> Result<Self> {
        let root = match assembly_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut index = Self {
            assembly_dir: assembly_dir.to_path_buf(),
            by_hash: HashMap::new(),
        };
        index.walk(&root)?;
        debug!(
            root = %root.display(),
            files = index.by_hash.len(),
            "built content hash index"
        );
        Ok(index)
    }

    fn walk(&mut self, root: &Path) -> Result<()> {
        let assembly_dir = self.assembly_dir.clone();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| entry.depth() == 0 || !skipped(entry, &assembly_dir));
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(relative) = relative_path(root, entry.path()) else {
                continue;
            };
            let digest = hash_file(entry.path())?;
            self.by_hash.entry(digest).or_insert(relative);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Project-relative path of the file with this digest.
    pub fn lookup(&self, digest: &str) -> Option<&str> {
        self.by_hash.get(digest).map(String::as_str)
    }

    /// Recover the source directory of a function asset.
    ///
    /// The handler file is located inside the asset folder (by the handler's
    /// module part and the runtime's file extensions, or the first source
    /// file when there is no handler), hashed, and looked up. Falls back to
    /// `<assembly-dir-name>/<asset>/` when nothing matches.
    pub fn code_uri(&self, asset: &str, handler: Option<&str>, runtime: Option<&str>) -> String {
        let origin = self.assembly_dir.join(asset);
        let language = Language::from_runtime(runtime);
        let candidate = match handler.and_then(handler_module) {
            Some(module) => language.find_module(&origin, &module),
            None => language.first_source(&origin),
        };
        candidate
            .and_then(|relative| self.recover(&origin, &relative))
            .unwrap_or_else(|| self.fallback(asset))
    }

    /// Recover the source directory of a layer asset (its `python` folder).
    pub fn layer_uri(&self, asset: &str) -> String {
        let asset = format!("{}/python", asset.trim_end_matches('/'));
        let origin = self.assembly_dir.join(&asset);
        first_file_recursive(&origin)
            .and_then(|relative| self.recover(&origin, &relative))
            .unwrap_or_else(|| self.fallback(&asset))
    }

    // `relative` is the candidate's path inside `origin`; the matched
    // project path minus that suffix is the source directory.
    fn recover(&self, origin: &Path, relative: &str) -> Option<String> {
        let digest = hash_file(&origin.join(relative)).ok()?;
        let matched = self.lookup(&digest)?;
        let dir = match matched.strip_suffix(relative) {
            Some(prefix) if prefix.is_empty() || prefix.ends_with('/') => prefix,
            _ => matched.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(""),
        };
        Some(with_trailing_slash(dir))
    }

    fn fallback(&self, asset: &str) -> String {
        let dir_name = self
            .assembly_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cdk.out".to_string());
        with_trailing_slash(&format!("{dir_name}/{}", asset.trim_end_matches('/')))
    }
}

/// Hex SHA-256 digest of a file's contents.
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|err| Error::project_read(path, err))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn with_trailing_slash(dir: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        "./".to_string()
    } else {
        format!("{dir}/")
    }
}

/// Module part of a handler (`pkg/app.handler` → `pkg/app`).
fn handler_module(handler: &str) -> Option<String> {
    let (module, _) = handler.rsplit_once('.')?;
    (!module.is_empty()).then(|| module.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    Python,
    Node,
    Other,
}

impl Language {
    fn from_runtime(runtime: Option<&str>) -> Self {
        match runtime {
            Some(r) if r.starts_with("python") => Language::Python,
            Some(r) if r.starts_with("nodejs") => Language::Node,
            _ => Language::Other,
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py"],
            Language::Node => &["js", "mjs", "cjs"],
            Language::Other => &[],
        }
    }

    fn matches(self, path: &Path) -> bool {
        let extensions = self.extensions();
        extensions.is_empty()
            || path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
    }

    fn find_module(self, origin: &Path, module: &str) -> Option<String> {
        let module = match self {
            Language::Python => module.replace('.', "/"),
            _ => module.to_string(),
        };
        if self == Language::Other {
            let (dir, stem) = match module.rsplit_once('/') {
                Some((dir, stem)) => (dir.to_string(), stem),
                None => (String::new(), module.as_str()),
            };
            return sorted_files(&origin.join(&dir))
                .into_iter()
                .find(|name| Path::new(name).file_stem().is_some_and(|s| s == stem))
                .map(|name| join_relative(&dir, &name));
        }
        self.extensions()
            .iter()
            .map(|ext| format!("{module}.{ext}"))
            .find(|relative| origin.join(relative).is_file())
    }

    fn first_source(self, origin: &Path) -> Option<String> {
        sorted_files(origin)
            .into_iter()
            .find(|name| name != INIT_MODULE && self.matches(Path::new(name)))
    }
}

fn sorted_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// First file under `dir`, depth first, with each directory's files ahead of
/// its subdirectories. Hidden entries, `__pycache__` and package markers are
/// passed over.
fn first_file_recursive(dir: &Path) -> Option<String> {
    WalkDir::new(dir)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !(is_hidden(entry) || entry.file_name() == "__pycache__")
        })
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() != INIT_MODULE)
        .and_then(|entry| relative_path(dir, entry.path()))
}

// Hidden entries, `node_modules`, and the assembly dir itself.
fn skipped(entry: &DirEntry, assembly_dir: &Path) -> bool {
    is_hidden(entry)
        || (entry.file_type().is_dir()
            && (SKIPPED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref())
                || same_dir(entry.path(), assembly_dir)))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// `/`-separated path of `path` below `root`.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

fn join_relative(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
