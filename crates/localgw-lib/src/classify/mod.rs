//! Resource classification.
//!
//! A single pass over the resolved resources sorts every resource into one of
//! the [`ClassificationBuckets`]. Primitive cloud resources are handled by
//! [`primitive`]; each dialect layers its own event and integration model on
//! top ([`serverless`] for declarative templates, [`assembly`] for
//! synthesized ones).

pub mod assembly;
pub mod primitive;
pub mod serverless;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::Result;
use crate::hash_index::ContentIndex;
use crate::template::{Dialect, ResolvedTemplate};

/// Resources of one kind keyed by their bucket-specific identity.
pub type Bucket = Map<String, Value>;

/// HTTP path → lowercase method → `{"Properties": ...}` route entry.
pub type Routes = IndexMap<String, IndexMap<String, Value>>;

/// Classified view of a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationBuckets {
    pub apis: Routes,
    /// Storage buckets keyed by bucket name.
    pub buckets: Bucket,
    /// Tables keyed by table name.
    pub tables: Bucket,
    pub queues: Bucket,
    pub topics: Bucket,
    pub email_identities: Bucket,
    /// Functions without events, keyed by logical id (raw declaration).
    pub lambdas: Bucket,
    /// Storage-event triggers keyed by source bucket name.
    pub triggers: Bucket,
    pub others: Bucket,
}

impl ClassificationBuckets {
    /// Register a route. A later registration for the same path and method
    /// replaces the earlier one.
    pub fn add_route(&mut self, path: &str, method: &str, properties: Map<String, Value>) {
        let mut entry = Map::new();
        entry.insert("Properties".to_string(), Value::Object(properties));
        self.apis
            .entry(path.to_string())
            .or_default()
            .insert(method.to_ascii_lowercase(), Value::Object(entry));
    }

    /// Route entry for `path` and `method`, if registered.
    pub fn route(&self, path: &str, method: &str) -> Option<&Value> {
        self.apis
            .get(path)?
            .get(&method.to_ascii_lowercase())
    }

    /// Total number of registered path/method pairs.
    pub fn route_count(&self) -> usize {
        self.apis.values().map(IndexMap::len).sum()
    }
}

/// Classify a resolved template according to its dialect.
///
/// Synthesized templates build a content-hash index of the surrounding
/// project first; use [`assembly::classify`] directly to supply a prebuilt
/// index.
pub fn classify(template: &ResolvedTemplate) -> Result<ClassificationBuckets> {
    let buckets = match template.dialect {
        Dialect::Serverless => serverless::classify(template),
        Dialect::CloudAssembly => {
            let index = ContentIndex::build(template.root())?;
            assembly::classify(template, &index)?
        }
    };
    info!(
        dialect = %template.dialect,
        routes = buckets.route_count(),
        buckets = buckets.buckets.len(),
        tables = buckets.tables.len(),
        queues = buckets.queues.len(),
        others = buckets.others.len(),
        "classified template"
    );
    Ok(buckets)
}
