//! Reference table construction.
//!
//! Every resource gets one [`ReferenceEntry`]: the attributes other
//! expressions may query through `Ref` and `Fn::GetAtt`. Entries are built
//! from *unresolved* properties before any expression is evaluated, so a
//! resource whose identifying property depends on another resource's
//! resolved properties is not followed. Values are resolved lazily when an
//! expression looks them up.
//!
//! Rules are looked up by resource type: the dialect table first, then the
//! base table, and each rule overlays the generic `{Ref, Arn}` entry.

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::template::{Dialect, Resource};

/// Attribute name → unresolved value for one resource.
pub type ReferenceEntry = IndexMap<String, Value>;

/// Reference entries keyed by logical id. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    entries: IndexMap<String, ReferenceEntry>,
}

impl ReferenceTable {
    /// Entry for a logical id.
    pub fn get(&self, logical_id: &str) -> Option<&ReferenceEntry> {
        self.entries.get(logical_id)
    }

    /// Unresolved value of one attribute of one resource.
    pub fn attribute(&self, logical_id: &str, attribute: &str) -> Option<&Value> {
        self.entries.get(logical_id)?.get(attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ReferenceEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, ReferenceEntry)> for ReferenceTable {
    fn from_iter<T: IntoIterator<Item = (String, ReferenceEntry)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Account coordinates used to mint synthetic ARNs.
///
/// The emulator never calls AWS, so ARNs only need to be internally
/// consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArnContext {
    pub partition: String,
    pub region: String,
    pub account_id: String,
}

impl ArnContext {
    /// `arn:<partition>:lambda:<region>:<account>:<kind>/<id>`
    pub fn arn(&self, kind: &str, logical_id: &str) -> String {
        format!(
            "arn:{}:lambda:{}:{}:{}/{}",
            self.partition, self.region, self.account_id, kind, logical_id
        )
    }
}

type RefRule = fn(&mut ReferenceEntry, &Resource, &ArnContext);

const BASE_RULES: &[(&str, RefRule)] = &[
    ("AWS::S3::Bucket", bucket_rule),
    ("AWS::DynamoDB::Table", table_rule),
    ("AWS::DynamoDB::GlobalTable", table_rule),
];

const SERVERLESS_RULES: &[(&str, RefRule)] = &[
    ("AWS::Serverless::Function", serverless_function_rule),
    ("AWS::Serverless::Api", logical_id_rule),
    ("AWS::Serverless::HttpApi", logical_id_rule),
    ("AWS::Serverless::Application", application_rule),
    ("AWS::Serverless::LayerVersion", layer_content_rule),
    ("AWS::Serverless::SimpleTable", simple_table_rule),
    ("AWS::Serverless::StateMachine", state_machine_rule),
];

const ASSEMBLY_RULES: &[(&str, RefRule)] = &[
    ("AWS::ApiGatewayV2::Integration", logical_id_rule),
    ("AWS::Lambda::Function", pass_logical_id_rule),
    ("AWS::Lambda::LayerVersion", pass_logical_id_rule),
    ("AWS::ApiGateway::Resource", pass_logical_id_rule),
    ("AWS::ApiGateway::RestApi", rest_api_rule),
];

fn dialect_rules(dialect: Dialect) -> &'static [(&'static str, RefRule)] {
    match dialect {
        Dialect::Serverless => SERVERLESS_RULES,
        Dialect::CloudAssembly => ASSEMBLY_RULES,
    }
}

fn lookup_rule(dialect: Dialect, resource_type: &str) -> Option<RefRule> {
    dialect_rules(dialect)
        .iter()
        .chain(BASE_RULES)
        .find(|(ty, _)| *ty == resource_type)
        .map(|(_, rule)| *rule)
}

/// Build the reference table for a template's raw resources.
pub fn build_refs<'a>(
    resources: impl IntoIterator<Item = &'a Resource>,
    dialect: Dialect,
    arns: &ArnContext,
) -> ReferenceTable {
    resources
        .into_iter()
        .map(|resource| {
            (
                resource.logical_id.clone(),
                reference_entry(resource, dialect, arns),
            )
        })
        .collect()
}

/// Compute one resource's entry: generic fallback overlaid by its type rule.
pub fn reference_entry(resource: &Resource, dialect: Dialect, arns: &ArnContext) -> ReferenceEntry {
    let id = resource.logical_id.as_str();
    let mut entry = ReferenceEntry::new();
    entry.insert("Ref".into(), json!(id));
    entry.insert("Arn".into(), json!(arns.arn("other", id)));
    if let Some(rule) = lookup_rule(dialect, &resource.resource_type) {
        rule(&mut entry, resource, arns);
    }
    entry
}

fn property_or_id(resource: &Resource, property: &str) -> Value {
    resource
        .property(property)
        .cloned()
        .unwrap_or_else(|| json!(resource.logical_id))
}

fn bucket_rule(entry: &mut ReferenceEntry, resource: &Resource, _: &ArnContext) {
    entry.insert("Ref".into(), property_or_id(resource, "BucketName"));
}

fn table_rule(entry: &mut ReferenceEntry, resource: &Resource, arns: &ArnContext) {
    entry.insert("Ref".into(), property_or_id(resource, "TableName"));
    entry.insert(
        "Arn".into(),
        json!(arns.arn("dynamo", &resource.logical_id)),
    );
}

fn serverless_function_rule(entry: &mut ReferenceEntry, resource: &Resource, arns: &ArnContext) {
    entry.insert(
        "Arn".into(),
        json!(arns.arn("function", &resource.logical_id)),
    );
}

fn logical_id_rule(entry: &mut ReferenceEntry, resource: &Resource, _: &ArnContext) {
    entry.insert("Ref".into(), json!(resource.logical_id));
}

fn application_rule(entry: &mut ReferenceEntry, _: &Resource, _: &ArnContext) {
    entry.insert(
        "Outputs.ApplicationOutputName".into(),
        json!("dummyOutputName"),
    );
}

fn layer_content_rule(entry: &mut ReferenceEntry, resource: &Resource, _: &ArnContext) {
    entry.insert("Ref".into(), property_or_id(resource, "ContentUri"));
}

fn simple_table_rule(entry: &mut ReferenceEntry, resource: &Resource, _: &ArnContext) {
    entry.insert("Ref".into(), property_or_id(resource, "TableName"));
}

fn state_machine_rule(entry: &mut ReferenceEntry, resource: &Resource, arns: &ArnContext) {
    entry.insert(
        "Ref".into(),
        json!(arns.arn("stateMachine", &resource.logical_id)),
    );
}

// The synthesized dialect decodes lambda, layer, and API resource ids back
// out of Ref/GetAtt results, so both attributes carry the bare logical id.
fn pass_logical_id_rule(entry: &mut ReferenceEntry, resource: &Resource, _: &ArnContext) {
    entry.insert("Ref".into(), json!(resource.logical_id));
    entry.insert("Arn".into(), json!(resource.logical_id));
}

fn rest_api_rule(entry: &mut ReferenceEntry, resource: &Resource, _: &ArnContext) {
    entry.insert(
        "RootResourceId".into(),
        json!(root_resource_id(&resource.logical_id)),
    );
}

/// Synthetic identifier standing for a RestApi's root resource (`/`).
pub fn root_resource_id(rest_api_id: &str) -> String {
    format!("{rest_api_id}.RootResourceId")
}
