//! Container-descriptor reader.
//!
//! Image-packaged functions declare a build context and a Dockerfile in their
//! resource metadata. The reader follows `COPY`, `ENV`, `WORKDIR` and `CMD`
//! closely enough to recover the handler, the source directory holding the
//! entry module, extra directories copied next to it (treated as layers) and
//! the default environment.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::expr::dig_str;

/// What an image-packaged function looks like once unpacked locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    /// `CMD` handler, e.g. `app.lambda_handler`.
    pub handler: String,
    /// Project-relative directory holding the entry module, ending in `/`.
    pub code_uri: String,
    /// Project-relative directories copied under the entry root.
    pub layers: Vec<String>,
    pub environment: IndexMap<String, String>,
}

impl ContainerDescriptor {
    /// Read the Dockerfile named by `metadata` (`DockerContext`,
    /// `Dockerfile`), resolving relative paths against `root`.
    pub fn read(metadata: &Value, root: &Path) -> Result<Self> {
        let context = dig_str(metadata, &["DockerContext"])
            .ok_or_else(|| Error::container("metadata has no DockerContext"))?;
        let dockerfile = dig_str(metadata, &["Dockerfile"]).unwrap_or("Dockerfile");

        let root = canonical(root)?;
        let context = canonical(&root.join(context))?;
        let dockerfile = canonical(&context.join(dockerfile))?;
        let text = fs::read_to_string(&dockerfile)
            .map_err(|err| Error::container(format!("{}: {err}", dockerfile.display())))?;

        let mut reader = DockerfileReader::new(context);
        reader.read(&text)?;
        reader.finish(&root)
    }
}

fn canonical(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|err| Error::container(format!("{}: {err}", path.display())))
}

struct DockerfileReader {
    context: PathBuf,
    work_dir: PathBuf,
    environment: IndexMap<String, String>,
    /// Destination inside the image → source on disk, in instruction order.
    copies: IndexMap<PathBuf, PathBuf>,
    handler: Option<String>,
}

impl DockerfileReader {
    fn new(context: PathBuf) -> Self {
        let environment = IndexMap::from([
            ("LAMBDA_TASK_ROOT".to_string(), "/var/task".to_string()),
            ("LAMBDA_RUNTIME_DIR".to_string(), "/var/runtime".to_string()),
        ]);
        Self {
            context,
            work_dir: PathBuf::from("/"),
            environment,
            copies: IndexMap::new(),
            handler: None,
        }
    }

    fn read(&mut self, text: &str) -> Result<()> {
        for line in logical_lines(text) {
            let mut words = split_words(&line).into_iter();
            let Some(instruction) = words.next() else {
                continue;
            };
            let args: Vec<String> = words.collect();
            match instruction.to_ascii_uppercase().as_str() {
                "COPY" => self.copy(&args)?,
                "ENV" => self.env(&args),
                "CMD" => {
                    let handler = parse_list(&args.concat()).into_iter().next();
                    self.handler = handler.map(|h| h.replace('"', "")).filter(|h| !h.is_empty());
                }
                "WORKDIR" => {
                    if let Some(dir) = args.first() {
                        self.work_dir = self.work_dir.join(dir);
                    }
                }
                "ADD" => warn!("ADD instructions are not followed; use COPY instead"),
                other @ ("ENTRYPOINT" | "ARG") => {
                    warn!(instruction = %other, "Dockerfile instruction is not supported and was ignored");
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn copy(&mut self, args: &[String]) -> Result<()> {
        let mut args = parse_list(&args.join(" "));
        let Some(dst) = args.pop() else {
            return Ok(());
        };
        let dst_is_dir = dst.ends_with('/');
        let dst = self.work_dir.join(&dst);

        for src in args.iter().filter(|src| !src.is_empty()) {
            if src.starts_with("--from") {
                return Err(Error::container(format!(
                    "COPY {src} (multi-stage copies) is not supported"
                )));
            }
            if src.starts_with("--") {
                continue;
            }
            if src.contains(&['*', '?'][..]) {
                for matched in glob(&self.context, src) {
                    self.copy_source(&matched, &dst, true);
                }
            } else {
                let source = self.context.join(src);
                self.copy_source(&source, &dst, dst_is_dir);
            }
        }
        Ok(())
    }

    fn copy_source(&mut self, source: &Path, dst: &Path, dst_is_dir: bool) {
        if source.is_file() {
            let target = match (dst_is_dir, source.file_name()) {
                (true, Some(name)) => dst.join(name),
                _ => dst.to_path_buf(),
            };
            self.copies.insert(target, source.to_path_buf());
        } else if source.is_dir() {
            // Directory sources copy their contents, not the directory itself.
            for (relative, file) in files_under(source) {
                self.copies.insert(dst.join(relative), file);
            }
        } else {
            debug!(source = %source.display(), "COPY source does not exist");
        }
    }

    fn env(&mut self, args: &[String]) {
        let mut pending: Option<&str> = None;
        for word in args {
            if let Some(key) = pending.take() {
                self.environment.insert(trim_quotes(key), trim_quotes(word));
            } else if let Some((key, value)) = word.split_once('=') {
                self.environment.insert(trim_quotes(key), trim_quotes(value));
            } else {
                pending = Some(word);
            }
        }
    }

    fn finish(self, root: &Path) -> Result<ContainerDescriptor> {
        let handler = self
            .handler
            .ok_or_else(|| Error::container("lambda handler not found (no CMD)"))?;
        let entry = match handler.rsplit_once('.') {
            Some((module, _)) if !module.is_empty() => format!("{}.py", module.replace('.', "/")),
            _ => return Err(Error::container(format!("handler '{handler}' has no module part"))),
        };
        debug!(%handler, entry = %entry, "reading container entry point");

        let (entry_dst, entry_src) = self
            .copies
            .iter()
            .find(|(dst, _)| dst.ends_with(&entry))
            .ok_or_else(|| Error::container(format!("entry point {entry} is not copied into the image")))?;
        let entry_root = entry_dst
            .ancestors()
            .nth(Path::new(&entry).components().count())
            .unwrap_or_else(|| Path::new("/"))
            .to_path_buf();

        let code_uri = project_relative(root, entry_src)
            .and_then(|src| src.strip_suffix(&entry).map(str::to_string))
            .ok_or_else(|| {
                Error::container(format!(
                    "entry point {} is outside the project",
                    entry_src.display()
                ))
            })?;

        let mut layers = BTreeSet::new();
        for (dst, src) in &self.copies {
            let Ok(relative) = dst.strip_prefix(&entry_root) else {
                continue;
            };
            let relative = to_slash(relative);
            if relative.is_empty() || relative == entry {
                continue;
            }
            let layer = project_relative(root, src)
                .and_then(|src| src.strip_suffix(&relative).map(str::to_string))
                .ok_or_else(|| {
                    Error::container(
                        "the container build changes the directory tree; this layout is not supported",
                    )
                })?;
            if !layer.is_empty() && layer != code_uri {
                layers.insert(layer);
            }
        }

        Ok(ContainerDescriptor {
            handler,
            code_uri,
            layers: layers.into_iter().collect(),
            environment: self.environment,
        })
    }
}

/// Join backslash continuations and drop blank and comment lines.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if let Some(head) = line.strip_suffix('\\') {
            pending.push_str(head);
            continue;
        }
        pending.push_str(line);
        let joined = std::mem::take(&mut pending);
        if !joined.trim().is_empty() {
            lines.push(joined);
        }
    }
    if !pending.trim().is_empty() {
        lines.push(pending);
    }
    lines
}

/// Split on spaces outside double quotes. Backslashes escape the next
/// character and are removed from the words.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaping = false;
    for c in line.chars() {
        if escaping {
            escaping = false;
            current.push(c);
            continue;
        }
        match c {
            '\\' => escaping = true,
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ' ' | '\t' if !in_quotes => {
                let word = current.trim();
                if !word.is_empty() {
                    words.push(word.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let word = current.trim();
    if !word.is_empty() {
        words.push(word.to_string());
    }
    words
}

/// `["a", 'b']` exec form or space-separated shell form.
fn parse_list(text: &str) -> Vec<String> {
    let text = text.trim().replace('\'', "\"");
    match text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        Some(inner) => inner
            .split(',')
            .map(|item| item.replace('"', "").trim().to_string())
            .collect(),
        None => split_words(&text),
    }
}

fn trim_quotes(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Expand a pattern whose last component contains `*` or `?`.
fn glob(context: &Path, pattern: &str) -> Vec<PathBuf> {
    let (dir, name_pattern) = match pattern.rsplit_once('/') {
        Some((dir, name)) => (context.join(dir), name),
        None => (context.to_path_buf(), pattern),
    };
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| wildcard_match(name_pattern, &entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches
}

fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some('?') => {
                p += 1;
                n += 1;
            }
            Some(c) if *c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    n = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

/// Every regular file below `dir` with its `/`-separated relative path.
fn files_under(dir: &Path) -> Vec<(String, PathBuf)> {
    WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = project_relative(dir, entry.path())?;
            Some((relative, entry.into_path()))
        })
        .collect()
}

fn project_relative(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(to_slash)
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn metadata() -> Value {
        json!({"DockerContext": "./app", "Dockerfile": "Dockerfile", "DockerTag": "python3.12-v1"})
    }

    #[test]
    fn reads_handler_code_uri_and_environment() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app/app.py", "def lambda_handler(e, c): pass");
        write(tmp.path(), "app/requirements.txt", "requests");
        write(
            tmp.path(),
            "app/Dockerfile",
            "FROM public.ecr.aws/lambda/python:3.12\n\
             # comment\n\
             COPY app.py requirements.txt ./\n\
             ENV TABLE_NAME=items STAGE=\"dev\"\n\
             ENV REGION us-east-1\n\
             RUN python3.12 -m pip install -r requirements.txt -t .\n\
             CMD [\"app.lambda_handler\"]\n",
        );

        let descriptor = ContainerDescriptor::read(&metadata(), tmp.path()).unwrap();
        assert_eq!(descriptor.handler, "app.lambda_handler");
        assert_eq!(descriptor.code_uri, "app/");
        assert!(descriptor.layers.is_empty());
        assert_eq!(descriptor.environment["TABLE_NAME"], "items");
        assert_eq!(descriptor.environment["STAGE"], "dev");
        assert_eq!(descriptor.environment["REGION"], "us-east-1");
        assert_eq!(descriptor.environment["LAMBDA_TASK_ROOT"], "/var/task");
    }

    #[test]
    fn directories_copied_beside_the_entry_become_layers() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app/src/main.py", "def handler(e, c): pass");
        write(tmp.path(), "app/libs/shared/util.py", "X = 1");
        write(
            tmp.path(),
            "app/Dockerfile",
            "FROM base\nWORKDIR /var/task\nCOPY src/*.py ./\nCOPY libs/ \\\n  ./\nCMD main.handler\n",
        );

        let descriptor = ContainerDescriptor::read(&metadata(), tmp.path()).unwrap();
        assert_eq!(descriptor.code_uri, "app/src/");
        assert_eq!(descriptor.layers, vec!["app/libs/".to_string()]);
    }

    #[test]
    fn missing_cmd_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app/app.py", "");
        write(tmp.path(), "app/Dockerfile", "FROM base\nCOPY app.py ./\n");
        let err = ContainerDescriptor::read(&metadata(), tmp.path()).unwrap_err();
        assert!(err.to_string().contains("handler not found"));
    }

    #[test]
    fn multi_stage_copy_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "app/Dockerfile",
            "FROM base\nCOPY --from=build /out ./\nCMD [\"app.handler\"]\n",
        );
        let err = ContainerDescriptor::read(&metadata(), tmp.path()).unwrap_err();
        assert!(matches!(err, Error::ContainerDescriptor { .. }));
    }

    #[test]
    fn renamed_copies_are_rejected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "app/app.py", "");
        write(tmp.path(), "app/settings.py", "");
        write(
            tmp.path(),
            "app/Dockerfile",
            "COPY app.py ./\nCOPY settings.py ./config.py\nCMD app.handler\n",
        );
        let err = ContainerDescriptor::read(&metadata(), tmp.path()).unwrap_err();
        assert!(err.to_string().contains("directory tree"));
    }

    #[test]
    fn split_words_respects_quotes_and_escapes() {
        assert_eq!(
            split_words(r#"ENV A="x y" B=z\ w"#),
            vec!["ENV", "A=\"x y\"", "B=z w"]
        );
    }

    #[test]
    fn parse_list_accepts_exec_and_shell_forms() {
        assert_eq!(parse_list("['app.handler', '--flag']"), vec!["app.handler", "--flag"]);
        assert_eq!(parse_list("app.handler --flag"), vec!["app.handler", "--flag"]);
    }

    #[test]
    fn wildcards_match_names() {
        assert!(wildcard_match("*.py", "app.py"));
        assert!(wildcard_match("a?p.*", "app.py"));
        assert!(!wildcard_match("*.py", "app.js"));
        assert!(wildcard_match("*", ""));
    }

    #[test]
    fn files_under_lists_nested_files_in_name_order() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "libs/b.py", "");
        write(tmp.path(), "libs/a/inner.py", "");

        let names: Vec<String> = files_under(&tmp.path().join("libs"))
            .into_iter()
            .map(|(relative, _)| relative)
            .collect();
        assert_eq!(names, ["a/inner.py", "b.py"]);
    }
}
