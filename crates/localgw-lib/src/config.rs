//! Reader for emitted configuration documents.
//!
//! The mock server consumes the document written by [`crate::emit`]; this
//! module turns its `paths` section into typed routes with their example
//! responses.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::template::yaml_to_expression;

/// A configuration document loaded from disk.
#[derive(Debug, Clone)]
pub struct MockConfig {
    path: PathBuf,
    document: Map<String, Value>,
}

impl MockConfig {
    /// Load a `.json`, `.yaml` or `.yml` configuration document.
    pub fn load(path: &Path) -> Result<Self> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let text = || {
            fs::read_to_string(path).map_err(|source| Error::ConfigRead {
                path: path.to_path_buf(),
                source,
            })
        };
        let value = match format.as_deref() {
            Some("json") => serde_json::from_str::<Value>(&text()?)?,
            Some("yaml" | "yml") => yaml_to_expression(serde_yaml::from_str(&text()?)?),
            _ => {
                return Err(Error::ConfigFormat {
                    path: path.to_path_buf(),
                })
            }
        };
        Self::from_value(path, value)
    }

    /// Wrap an already parsed document.
    pub fn from_value(path: &Path, value: Value) -> Result<Self> {
        match value {
            Value::Object(document) if document.contains_key("paths") => Ok(Self {
                path: path.to_path_buf(),
                document,
            }),
            _ => Err(Error::ConfigMissingPaths {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every configured route, in document order.
    pub fn routes(&self) -> Vec<ApiRoute> {
        let Some(paths) = self.document.get("paths").and_then(Value::as_object) else {
            return Vec::new();
        };
        paths
            .iter()
            .filter_map(|(path, methods)| Some((path, methods.as_object()?)))
            .flat_map(|(path, methods)| {
                methods
                    .iter()
                    .map(move |(method, entry)| ApiRoute::from_entry(path, method, entry))
            })
            .collect()
    }

    /// Route for `path` and `method` (case-insensitive method).
    pub fn route(&self, path: &str, method: &str) -> Option<ApiRoute> {
        self.routes()
            .into_iter()
            .find(|route| route.path == path && route.method.eq_ignore_ascii_case(method))
    }

    /// The `triggered` section (storage triggers keyed by bucket).
    pub fn triggered(&self) -> Map<String, Value> {
        self.service("triggered")
    }

    /// A raw top-level section such as `s3` or `dynamodb`; empty when absent.
    pub fn service(&self, name: &str) -> Map<String, Value> {
        self.document
            .get(name)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }
}

/// One HTTP route of the configuration document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRoute {
    pub path: String,
    /// Lowercase HTTP method.
    pub method: String,
    pub code_uri: String,
    pub handler: String,
    pub layers: Vec<String>,
    pub runtime: String,
    pub event_type: Option<String>,
    pub auth_type: Option<String>,
    pub environment: IndexMap<String, String>,
    pub responses: IndexMap<String, ApiResponse>,
}

impl ApiRoute {
    fn from_entry(path: &str, method: &str, entry: &Value) -> Self {
        let props = entry.get("Properties").cloned().unwrap_or_else(|| json!({}));
        let text = |key: &str| props.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
        let layers = props
            .get("Layers")
            .and_then(Value::as_array)
            .map(|layers| layers.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let environment = props
            .get("Environment")
            .and_then(|env| env.get("Variables"))
            .and_then(Value::as_object)
            .map(|vars| {
                vars.iter()
                    .map(|(key, value)| (key.clone(), env_text(value)))
                    .collect()
            })
            .unwrap_or_default();
        let optional = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            path: path.to_string(),
            method: method.to_ascii_lowercase(),
            code_uri: text("CodeUri"),
            handler: text("Handler"),
            layers,
            runtime: text("Runtime"),
            event_type: optional("EventType"),
            auth_type: optional("AuthType"),
            environment,
            responses: responses(entry.get("responses")),
        }
    }

    /// Dotted import path of the handler module, prefixed by the code
    /// location (`lambda/greeting/` + `app.handler` → `lambda.greeting.app`).
    pub fn handler_module(&self) -> String {
        let mut parts: Vec<&str> = self.code_uri.split('/').filter(|p| !p.is_empty()).collect();
        if let Some((module, _)) = self.handler.rsplit_once('.') {
            parts.push(module);
        }
        parts.join(".")
    }

    /// Function name part of the handler.
    pub fn handler_function(&self) -> &str {
        self.handler
            .rsplit_once('.')
            .map(|(_, function)| function)
            .unwrap_or(self.handler.as_str())
    }

    /// Response registered for a status code.
    pub fn response(&self, code: &str) -> Option<&ApiResponse> {
        self.responses.get(code)
    }
}

fn env_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

const DEFAULT_CODES: [&str; 4] = ["200", "300", "400", "500"];

fn responses(section: Option<&Value>) -> IndexMap<String, ApiResponse> {
    let mut responses: IndexMap<String, ApiResponse> = section
        .and_then(Value::as_object)
        .map(|section| {
            section
                .iter()
                .map(|(code, value)| (code.clone(), ApiResponse::new(code, value)))
                .collect()
        })
        .unwrap_or_default();

    for default in DEFAULT_CODES {
        if responses.contains_key(default) {
            continue;
        }
        let class = &default[..2];
        let example = responses
            .iter()
            .find(|(code, _)| code.starts_with(class))
            .map(|(_, response)| response.example.clone())
            .unwrap_or_else(|| json!({}));
        responses.insert(
            default.to_string(),
            ApiResponse {
                code: default.to_string(),
                example,
            },
        );
    }
    responses
}

/// Example response for one status code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub code: String,
    pub example: Value,
}

impl ApiResponse {
    pub fn new(code: &str, section: &Value) -> Self {
        Self {
            code: code.to_string(),
            example: find_example(section).cloned().unwrap_or_else(|| json!({})),
        }
    }

    /// Numeric status code, when the key is one.
    pub fn status_code(&self) -> Option<u16> {
        self.code.parse().ok()
    }

    /// Proxy-integration style payload carrying the example as body text.
    pub fn mock_payload(&self) -> Value {
        let status = self
            .status_code()
            .map(Value::from)
            .unwrap_or_else(|| json!(self.code));
        json!({
            "statusCode": status,
            "body": self.example.to_string(),
        })
    }
}

/// Depth-first search for a key literally named `example`.
fn find_example(value: &Value) -> Option<&Value> {
    let map = value.as_object()?;
    if let Some(example) = map.get("example") {
        return Some(example);
    }
    map.values().find_map(find_example)
}
