use std::path::{Path, PathBuf};

use thiserror::Error;

/// Convenient result alias for the localgw library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Template file could not be read from disk.
    #[error("failed to read template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template file is not valid YAML. The source error carries line and column.
    #[error("failed to parse template {path}: {source}")]
    TemplateYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Template file is not valid JSON. The source error carries line and column.
    #[error("failed to parse template {path}: {source}")]
    TemplateJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Raised when the template document is not a mapping at the top level.
    #[error("template {path} must be a mapping at the top level")]
    TemplateNotMapping { path: PathBuf },

    /// Raised when `Fn::Select` indexes past the end of its list.
    #[error("Fn::Select index {index} is out of range for a list of {len} items")]
    SelectOutOfRange { index: i64, len: usize },

    /// Raised when a route key is not of the form `METHOD /path`.
    #[error("route {resource} has malformed RouteKey '{route_key}'")]
    MalformedRouteKey { resource: String, route_key: String },

    /// Raised when a route targets an integration that is not declared.
    #[error("route {resource} targets missing integration '{integration}'")]
    MissingIntegration {
        resource: String,
        integration: String,
    },

    /// Raised when an integration points at a lambda that is not declared.
    #[error("{resource} references missing lambda function '{lambda}'")]
    MissingLambda { resource: String, lambda: String },

    /// Raised when a method references an API resource that is not declared.
    #[error("method {resource} references missing API resource '{api_resource}'")]
    MissingApiResource {
        resource: String,
        api_resource: String,
    },

    /// Raised when an API resource path cannot be derived from synthesis metadata.
    #[error("API resource {resource} has unusable path metadata '{path}'")]
    MalformedResourcePath { resource: String, path: String },

    /// Raised when a lambda-typed integration has no invocation URI.
    #[error("method {resource} has a lambda integration without a Uri")]
    MissingIntegrationUri { resource: String },

    /// Raised when a resource lacks a property its dialect requires.
    #[error("resource {resource} is missing required property {property}")]
    MissingProperty { resource: String, property: String },

    /// Raised when a container descriptor cannot be interpreted.
    #[error("container descriptor could not be interpreted: {message}")]
    ContainerDescriptor { message: String },

    /// A project file or directory could not be read while indexing.
    #[error("failed to read project path {path}: {source}")]
    ProjectRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration document could not be read from disk.
    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration document has an unsupported file extension.
    #[error("configuration {path} must be a .json, .yaml, or .yml file")]
    ConfigFormat { path: PathBuf },

    /// Configuration document has no `paths` section.
    #[error("configuration {path} has no paths section")]
    ConfigMissingPaths { path: PathBuf },

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for YAML errors.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn container(message: impl Into<String>) -> Self {
        Error::ContainerDescriptor {
            message: message.into(),
        }
    }

    pub(crate) fn project_read(path: &Path, source: std::io::Error) -> Self {
        Error::ProjectRead {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|path| path.to_path_buf()).unwrap_or_default();
        Error::ProjectRead {
            path,
            source: err.into(),
        }
    }
}
