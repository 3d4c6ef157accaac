use serde_json::Value;
use tracing::debug;

use super::ClassificationBuckets;
use crate::template::Resource;

pub const S3_BUCKET: &str = "AWS::S3::Bucket";
pub const DYNAMODB_TABLE: &str = "AWS::DynamoDB::Table";
pub const DYNAMODB_GLOBAL_TABLE: &str = "AWS::DynamoDB::GlobalTable";
pub const SQS_QUEUE: &str = "AWS::SQS::Queue";
pub const SNS_TOPIC: &str = "AWS::SNS::Topic";
pub const SES_EMAIL_IDENTITY: &str = "AWS::SES::EmailIdentity";

/// Bucket a primitive resource by its type. Unrecognized types land in
/// `others`. Buckets and tables are keyed by their declared name when it is
/// a string, otherwise by logical id; everything else by logical id.
pub fn classify_primitive(buckets: &mut ClassificationBuckets, resource: &Resource) {
    let id = resource.logical_id.clone();
    let properties = Value::Object(resource.properties_map());
    let named = |property: &str| {
        resource
            .property_str(property)
            .map(str::to_string)
            .unwrap_or_else(|| id.clone())
    };

    let (bucket, key) = match resource.resource_type.as_str() {
        S3_BUCKET => (&mut buckets.buckets, named("BucketName")),
        DYNAMODB_TABLE | DYNAMODB_GLOBAL_TABLE => (&mut buckets.tables, named("TableName")),
        SQS_QUEUE => (&mut buckets.queues, id.clone()),
        SNS_TOPIC => (&mut buckets.topics, id.clone()),
        SES_EMAIL_IDENTITY => (&mut buckets.email_identities, id.clone()),
        _ => (&mut buckets.others, id.clone()),
    };
    debug!(
        resource = %resource.logical_id,
        resource_type = %resource.resource_type,
        key = %key,
        "classified primitive resource"
    );
    bucket.insert(key, properties);
}
