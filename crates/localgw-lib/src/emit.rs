//! Configuration emitter.
//!
//! Turns classification buckets into the normalized configuration document
//! and writes it as YAML. A prior document at the output path is merged at
//! the top level: keys produced by this run replace the old values, every
//! other key is kept as it was.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::classify::{Bucket, ClassificationBuckets};
use crate::error::Result;
use crate::template::yaml_to_expression;

/// Configuration written when no template is available, for hand editing.
pub const SAMPLE_CONFIG: &str = r#"paths:
  /hello_world: # your API path
    post:       # your API method
      Properties:  # Lambda properties, as in a serverless template
        CodeUri: lambda/greeting/     # required
        Handler: app.lambda_handler   # required
        Architectures:
        - x86_64
        Environment:
          Variables:
            BucketName: test-bucket
            TableName: test-table
        Layers:
        - my_layer/
        Runtime: python3.9
        Timeout: 3
s3:            # required when the handler uses a bucket
  MyBucket:
    BucketName: MyBucket
dynamodb:      # required when the handler uses a table
  MyTable:
    TableName: MyTable
    AttributeDefinitions:
    - AttributeName: PartitionKey
      AttributeType: S
    - AttributeName: RangeKey
      AttributeType: S
    KeySchema:
    - AttributeName: PartitionKey
      KeyType: HASH
    - AttributeName: RangeKey
      KeyType: RANGE
    ProvisionedThroughput:
      ReadCapacityUnits: 10
      WriteCapacityUnits: 10
"#;

/// Build the configuration document, shallow-merged over `existing`.
pub fn emit(buckets: &ClassificationBuckets, existing: Option<Map<String, Value>>) -> Map<String, Value> {
    let mut document = existing.unwrap_or_default();
    for (key, value) in produced(buckets) {
        document.insert(key.to_string(), value);
    }
    document
}

fn produced(buckets: &ClassificationBuckets) -> Vec<(&'static str, Value)> {
    let paths = buckets
        .apis
        .iter()
        .map(|(path, methods)| {
            let methods: Map<String, Value> = methods
                .iter()
                .map(|(method, entry)| (method.clone(), entry.clone()))
                .collect();
            (path.clone(), Value::Object(methods))
        })
        .collect();

    let mut produced = vec![("paths", Value::Object(paths))];
    let optional: [(&'static str, &Bucket); 5] = [
        ("s3", &buckets.buckets),
        ("dynamodb", &buckets.tables),
        ("sqs", &buckets.queues),
        ("lambdas", &buckets.lambdas),
        ("triggered", &buckets.triggers),
    ];
    produced.extend(
        optional
            .into_iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(key, bucket)| (key, Value::Object(bucket.clone()))),
    );
    produced
}

/// Render a document as YAML.
pub fn to_yaml(document: &Map<String, Value>) -> Result<String> {
    Ok(serde_yaml::to_string(document)?)
}

/// Read a prior configuration document. Unreadable or non-mapping documents
/// are reported and treated as absent.
pub fn read_existing(path: &Path) -> Option<Map<String, Value>> {
    if !path.exists() {
        return None;
    }
    let parsed = fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|text| {
            serde_yaml::from_str::<serde_yaml::Value>(&text).map_err(|err| err.to_string())
        });
    match parsed.map(yaml_to_expression) {
        Ok(Value::Object(map)) => Some(map),
        Ok(Value::Null) => None,
        Ok(_) => {
            warn!(path = %path.display(), "existing configuration is not a mapping; replacing it");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not read existing configuration; replacing it");
            None
        }
    }
}

/// Emit and write the configuration document. Parent directories are
/// created. Unless `overwrite` is set, keys of a prior document that this
/// run does not produce are preserved.
pub fn write_config(
    path: &Path,
    buckets: &ClassificationBuckets,
    overwrite: bool,
) -> Result<Map<String, Value>> {
    let existing = if overwrite { None } else { read_existing(path) };
    let document = emit(buckets, existing);
    write_document(path, &to_yaml(&document)?)?;
    info!(
        path = %path.display(),
        routes = buckets.route_count(),
        "wrote configuration"
    );
    Ok(document)
}

/// Write [`SAMPLE_CONFIG`] to `path`.
pub fn write_sample_config(path: &Path) -> Result<()> {
    write_document(path, SAMPLE_CONFIG)?;
    info!(path = %path.display(), "wrote sample configuration");
    Ok(())
}

fn write_document(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}
