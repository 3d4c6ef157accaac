//! Template loading.
//!
//! [`load_template`] parses a template file, seeds the parameter table with
//! pseudo-parameters and declared defaults, builds the reference table from
//! the raw resources, and resolves `Parameters`, `Mappings`, `Conditions`,
//! `Resources`, and finally the whole document, in that order. There is no
//! fixpoint iteration: each section sees the sections resolved before it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::expr::dig;
use crate::refs::{build_refs, ArnContext, ReferenceTable};
use crate::resolve::{ParameterTable, Resolver};

/// Template family. The two dialects share the expression language but
/// express HTTP routes and invocation metadata differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Declarative stack template with serverless functions and inline events.
    Serverless,
    /// Low-level resources synthesized by a higher-level toolchain
    /// (a cloud assembly output directory).
    CloudAssembly,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Dialect::Serverless => "serverless",
            Dialect::CloudAssembly => "cloud-assembly",
        };
        f.write_str(value)
    }
}

/// Account coordinates and stack identity used for pseudo-parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateOptions {
    pub region: String,
    pub account_id: String,
    pub stack_name: String,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            account_id: "123456789012".to_string(),
            stack_name: "teststack".to_string(),
        }
    }
}

impl TemplateOptions {
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// ARN coordinates derived from these options.
    pub fn arn_context(&self) -> ArnContext {
        ArnContext {
            partition: "aws".to_string(),
            region: self.region.clone(),
            account_id: self.account_id.clone(),
        }
    }

    /// Built-in parameters available to every template.
    pub fn pseudo_parameters(&self) -> ParameterTable {
        let stack_id = format!(
            "arn:aws:cloudformation:{}:{}:stack/{}/51af3dc0-da77-11e4-872e-1234567db123",
            self.region, self.account_id, self.stack_name
        );
        ParameterTable::from([
            ("AWS::AccountId".to_string(), json!(self.account_id)),
            ("AWS::Region".to_string(), json!(self.region)),
            (
                "AWS::NotificationARNs".to_string(),
                json!(["arn1", "arn2", "arn3"]),
            ),
            ("AWS::NoValue".to_string(), Value::Null),
            ("AWS::Partition".to_string(), json!("aws")),
            ("AWS::StackId".to_string(), json!(stack_id)),
            ("AWS::StackName".to_string(), json!(self.stack_name)),
            ("AWS::URLSuffix".to_string(), json!("amazonaws.com")),
        ])
    }
}

/// One declared resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub logical_id: String,
    pub resource_type: String,
    /// `Properties`, or an empty mapping when absent.
    pub properties: Value,
    /// `Metadata`, or an empty mapping when absent.
    pub metadata: Value,
    /// The full declaration as written (or as resolved).
    pub declaration: Value,
}

impl Resource {
    pub fn from_declaration(logical_id: impl Into<String>, declaration: &Value) -> Self {
        let section = |key: &str| {
            declaration
                .get(key)
                .filter(|value| value.is_object())
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()))
        };
        Self {
            logical_id: logical_id.into(),
            resource_type: declaration
                .get("Type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            properties: section("Properties"),
            metadata: section("Metadata"),
            declaration: declaration.clone(),
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Property as a string, if present and a string.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(Value::as_str)
    }

    /// Owned copy of the properties mapping.
    pub fn properties_map(&self) -> Map<String, Value> {
        self.properties.as_object().cloned().unwrap_or_default()
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// A template after every supported intrinsic function has been evaluated.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    pub source: PathBuf,
    pub dialect: Dialect,
    /// Whole resolved document.
    pub document: Map<String, Value>,
    pub parameters: ParameterTable,
    pub mappings: Map<String, Value>,
    pub conditions: Map<String, Value>,
    pub resources: IndexMap<String, Resource>,
    pub refs: ReferenceTable,
}

impl ResolvedTemplate {
    /// Directory holding the template file.
    pub fn root(&self) -> &Path {
        match self.source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// `Globals.<section>` of the resolved document, or an empty mapping.
    pub fn globals(&self, section: &str) -> Map<String, Value> {
        self.document
            .get("Globals")
            .and_then(|globals| globals.get(section))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }
}

/// Read, parse, and resolve a template file.
pub fn load_template(
    path: &Path,
    dialect: Dialect,
    options: &TemplateOptions,
) -> Result<ResolvedTemplate> {
    let text = fs::read_to_string(path).map_err(|source| Error::TemplateRead {
        path: path.to_path_buf(),
        source,
    })?;
    let document = parse_document(path, &text)?;
    resolve_document(path, document, dialect, options)
}

/// Parse template text. Files ending in `.json` are read as JSON, anything
/// else as YAML with short-form intrinsic tags.
pub fn parse_document(path: &Path, text: &str) -> Result<Map<String, Value>> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let value = if is_json {
        serde_json::from_str::<Value>(text).map_err(|source| Error::TemplateJson {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|source| Error::TemplateYaml {
                path: path.to_path_buf(),
                source,
            })?;
        yaml_to_expression(yaml)
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::TemplateNotMapping {
            path: path.to_path_buf(),
        }),
    }
}

/// Resolve a parsed document.
pub fn resolve_document(
    source: &Path,
    document: Map<String, Value>,
    dialect: Dialect,
    options: &TemplateOptions,
) -> Result<ResolvedTemplate> {
    let section = |name: &str| {
        document
            .get(name)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    };

    let raw_resources: Vec<Resource> = section("Resources")
        .iter()
        .map(|(id, declaration)| Resource::from_declaration(id.clone(), declaration))
        .collect();
    let refs = build_refs(&raw_resources, dialect, &options.arn_context());

    let mut parameters = options.pseudo_parameters();
    let declared = section("Parameters");
    for (name, declaration) in &declared {
        if let Some(default) = dig(declaration, &["Default"]) {
            parameters.insert(name.clone(), default.clone());
        }
    }
    let mut mappings = section("Mappings");

    let declared = resolve_section(&refs, &parameters, &mappings, &declared)?;
    for (name, declaration) in &declared {
        if let Some(default) = dig(declaration, &["Default"]) {
            parameters.insert(name.clone(), default.clone());
        }
    }
    mappings = resolve_section(&refs, &parameters, &mappings, &mappings)?;
    let conditions = resolve_section(&refs, &parameters, &mappings, &section("Conditions"))?;
    let resolved_resources = resolve_section(&refs, &parameters, &mappings, &section("Resources"))?;
    let document = resolve_section(&refs, &parameters, &mappings, &document)?;

    let resources: IndexMap<String, Resource> = resolved_resources
        .iter()
        .map(|(id, declaration)| (id.clone(), Resource::from_declaration(id.clone(), declaration)))
        .collect();

    debug!(
        template = %source.display(),
        %dialect,
        resources = resources.len(),
        parameters = parameters.len(),
        "resolved template"
    );

    Ok(ResolvedTemplate {
        source: source.to_path_buf(),
        dialect,
        document,
        parameters,
        mappings,
        conditions,
        resources,
        refs,
    })
}

fn resolve_section(
    refs: &ReferenceTable,
    parameters: &ParameterTable,
    mappings: &Map<String, Value>,
    section: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let resolver = Resolver::new(refs, parameters, mappings);
    match resolver.resolve(&Value::Object(section.clone()))? {
        Value::Object(map) => Ok(map),
        // A top-level mapping that is itself a single function call resolves
        // to a non-mapping; keep the original section in that case.
        _ => Ok(section.clone()),
    }
}

/// Convert parsed YAML into an expression, expanding short-form tags
/// (`!Ref`, `!GetAtt`, `!Sub`, ...) into their long-form mappings.
pub fn yaml_to_expression(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!(i)
            } else if let Some(u) = n.as_u64() {
                json!(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_expression).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(key, value)| (yaml_key(key), yaml_to_expression(value)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            expand_tag(tag.trim_start_matches('!'), yaml_to_expression(tagged.value))
        }
    }
}

fn expand_tag(name: &str, value: Value) -> Value {
    let mut call = Map::new();
    match name {
        "Ref" | "Condition" => {
            call.insert(name.to_string(), value);
        }
        "GetAtt" => {
            let args = match value {
                Value::String(dotted) => match dotted.split_once('.') {
                    Some((id, attr)) => json!([id, attr]),
                    None => Value::String(dotted),
                },
                other => other,
            };
            call.insert("Fn::GetAtt".to_string(), args);
        }
        other => {
            call.insert(format!("Fn::{other}"), value);
        }
    }
    Value::Object(call)
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => s,
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|text| text.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_yaml(text: &str) -> Map<String, Value> {
        parse_document(Path::new("template.yaml"), text).expect("yaml parses")
    }

    #[test]
    fn short_form_tags_expand() {
        let doc = parse_yaml(
            r#"
Resources:
  Fn:
    Properties:
      Bucket: !Ref Uploads
      Arn: !GetAtt Uploads.Arn
      Name: !Sub "${AWS::StackName}-fn"
      Zones: !GetAZs ""
      Joined: !Join [",", [a, b]]
"#,
        );
        let props = &doc["Resources"]["Fn"]["Properties"];
        assert_eq!(props["Bucket"], json!({"Ref": "Uploads"}));
        assert_eq!(props["Arn"], json!({"Fn::GetAtt": ["Uploads", "Arn"]}));
        assert_eq!(props["Name"], json!({"Fn::Sub": "${AWS::StackName}-fn"}));
        assert_eq!(props["Zones"], json!({"Fn::GetAZs": ""}));
        assert_eq!(props["Joined"], json!({"Fn::Join": [",", ["a", "b"]]}));
    }

    #[test]
    fn non_string_keys_are_stringified() {
        let doc = parse_yaml("responses:\n  200:\n    ok: true\n");
        assert_eq!(doc["responses"]["200"]["ok"], json!(true));
    }

    #[test]
    fn document_order_is_preserved() {
        let doc = parse_yaml("b: 1\na: 2\nc: 3\n");
        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn non_mapping_document_is_rejected() {
        let err = parse_document(Path::new("t.yaml"), "- a\n- b\n").expect_err("list rejected");
        assert!(matches!(err, Error::TemplateNotMapping { .. }));
    }

    #[test]
    fn malformed_yaml_reports_location() {
        let err = parse_document(Path::new("t.yaml"), "a: [1, 2\nb: 3\n").expect_err("bad yaml");
        assert!(matches!(err, Error::TemplateYaml { .. }));
        assert!(err.to_string().contains("line"));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = parse_document(Path::new("t.json"), "{\"a\": ").expect_err("bad json");
        assert!(matches!(err, Error::TemplateJson { .. }));
    }

    #[test]
    fn parameters_use_declared_defaults() {
        let doc = parse_yaml(
            r#"
Parameters:
  Stage:
    Type: String
    Default: dev
  NoDefault:
    Type: String
Resources:
  Queue:
    Type: AWS::SQS::Queue
    Properties:
      QueueName: !Sub "${Stage}-queue"
      Other: !Ref NoDefault
"#,
        );
        let resolved = resolve_document(
            Path::new("template.yaml"),
            doc,
            Dialect::Serverless,
            &TemplateOptions::default(),
        )
        .expect("resolves");

        assert_eq!(resolved.parameters["Stage"], json!("dev"));
        let queue = &resolved.resources["Queue"];
        assert_eq!(queue.property_str("QueueName"), Some("dev-queue"));
        assert_eq!(queue.property_str("Other"), Some(""));
    }

    #[test]
    fn pseudo_parameters_follow_options() {
        let options = TemplateOptions::default().with_region("eu-west-1");
        let params = options.pseudo_parameters();
        assert_eq!(params["AWS::Region"], json!("eu-west-1"));
        assert_eq!(params["AWS::NoValue"], Value::Null);
        assert_eq!(
            params["AWS::StackId"],
            json!("arn:aws:cloudformation:eu-west-1:123456789012:stack/teststack/51af3dc0-da77-11e4-872e-1234567db123")
        );
    }

    #[test]
    fn mappings_are_resolved_before_resources() {
        let doc = parse_yaml(
            r#"
Mappings:
  Env:
    us-east-1:
      Name: !Sub "${AWS::StackName}-east"
Resources:
  Table:
    Type: AWS::DynamoDB::Table
    Properties:
      TableName: !FindInMap [Env, !Ref "AWS::Region", Name]
"#,
        );
        let resolved = resolve_document(
            Path::new("template.yaml"),
            doc,
            Dialect::Serverless,
            &TemplateOptions::default(),
        )
        .expect("resolves");
        assert_eq!(
            resolved.resources["Table"].property_str("TableName"),
            Some("teststack-east")
        );
        assert_eq!(
            resolved.document["Resources"]["Table"]["Properties"]["TableName"],
            json!("teststack-east")
        );
    }
}
