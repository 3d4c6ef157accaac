//! Synthesized-dialect classification.
//!
//! Routes are wired through several resources: an HTTP API route names an
//! integration, the integration names a lambda, and the lambda's deployment
//! metadata names the anonymized code asset. REST API methods name a path
//! resource whose synthesis path encodes the URL. Every hop is single-path,
//! so a broken reference is an error rather than a skipped route.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::primitive::classify_primitive;
use super::ClassificationBuckets;
use crate::auth::{AuthType, EventType};
use crate::error::{Error, Result};
use crate::hash_index::ContentIndex;
use crate::refs::root_resource_id;
use crate::template::{ResolvedTemplate, Resource};

pub const HTTP_ROUTE: &str = "AWS::ApiGatewayV2::Route";
pub const HTTP_INTEGRATION: &str = "AWS::ApiGatewayV2::Integration";
pub const REST_METHOD: &str = "AWS::ApiGateway::Method";
pub const REST_RESOURCE: &str = "AWS::ApiGateway::Resource";
pub const REST_API: &str = "AWS::ApiGateway::RestApi";
pub const LAMBDA_FUNCTION: &str = "AWS::Lambda::Function";
pub const LAMBDA_LAYER: &str = "AWS::Lambda::LayerVersion";

const ASSET_PATH: &str = "aws:asset:path";
const SYNTH_PATH: &str = "aws:cdk:path";
/// Synthesis path segment under which REST API resources are nested.
const SYNTH_ROOT_SEGMENT: &str = "Default";
const COPIED_PROPERTIES: [&str; 5] = ["Environment", "Handler", "Layers", "Runtime", "Timeout"];

/// Classify a synthesized template, recovering code locations through `index`.
pub fn classify(template: &ResolvedTemplate, index: &ContentIndex) -> Result<ClassificationBuckets> {
    let graph = Graph::new(template, index);
    let mut buckets = ClassificationBuckets::default();
    for resource in template.resources.values() {
        match resource.resource_type.as_str() {
            HTTP_ROUTE => graph.classify_http_route(&mut buckets, resource)?,
            REST_METHOD => graph.classify_rest_method(&mut buckets, resource)?,
            _ => classify_primitive(&mut buckets, resource),
        }
    }
    Ok(buckets)
}

struct Graph<'a> {
    index: &'a ContentIndex,
    by_type: IndexMap<&'a str, IndexMap<&'a str, &'a Resource>>,
}

impl<'a> Graph<'a> {
    fn new(template: &'a ResolvedTemplate, index: &'a ContentIndex) -> Self {
        let mut by_type: IndexMap<&str, IndexMap<&str, &Resource>> = IndexMap::new();
        for resource in template.resources.values() {
            by_type
                .entry(resource.resource_type.as_str())
                .or_default()
                .insert(resource.logical_id.as_str(), resource);
        }
        Self { index, by_type }
    }

    fn get(&self, resource_type: &str, id: &str) -> Option<&'a Resource> {
        self.by_type.get(resource_type)?.get(id).copied()
    }

    fn lambda(&self, referrer: &str, id: &str) -> Result<&'a Resource> {
        self.get(LAMBDA_FUNCTION, id).ok_or_else(|| Error::MissingLambda {
            resource: referrer.to_string(),
            lambda: id.to_string(),
        })
    }

    fn classify_http_route(&self, buckets: &mut ClassificationBuckets, route: &Resource) -> Result<()> {
        let id = route.logical_id.as_str();
        let route_key = required_str(route, "RouteKey")?;
        if route_key == "$default" {
            debug!(resource = %id, "skipping $default route");
            return Ok(());
        }
        let (method, path) = route_key
            .split_once(' ')
            .map(|(method, path)| (method.trim(), path.trim()))
            .filter(|(method, path)| !method.is_empty() && path.starts_with('/'))
            .ok_or_else(|| Error::MalformedRouteKey {
                resource: id.to_string(),
                route_key: route_key.to_string(),
            })?;

        let target = required_str(route, "Target")?;
        let integration_id = target.strip_prefix("integrations/").unwrap_or(target);
        let integration = self
            .get(HTTP_INTEGRATION, integration_id)
            .ok_or_else(|| Error::MissingIntegration {
                resource: id.to_string(),
                integration: integration_id.to_string(),
            })?;
        let lambda_id = required_str(integration, "IntegrationUri")?;
        let lambda = self.lambda(&integration.logical_id, lambda_id)?;

        let auth = auth_type(id, route.property_str("AuthorizationType"));
        let props = self.route_properties(lambda, EventType::ApigwV2, auth)?;
        debug!(resource = %id, %method, %path, lambda = %lambda.logical_id, "classified HTTP API route");
        buckets.add_route(path, method, props);
        Ok(())
    }

    fn classify_rest_method(&self, buckets: &mut ClassificationBuckets, method: &Resource) -> Result<()> {
        let id = method.logical_id.as_str();
        let http_method = required_str(method, "HttpMethod")?;
        let path = self.rest_path(method)?;

        let Some(integration) = method.property("Integration") else {
            debug!(resource = %id, "method has no integration; skipped");
            return Ok(());
        };
        let integration_type = integration
            .get("Type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_uppercase();
        if !matches!(integration_type.as_str(), "AWS" | "AWS_PROXY") {
            debug!(resource = %id, integration = %integration_type, "method is not a lambda integration; skipped");
            return Ok(());
        }
        let uri = integration
            .get("Uri")
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| Error::MissingIntegrationUri {
                resource: id.to_string(),
            })?;
        // arn:...:apigateway:<region>:lambda:path/2015-03-31/functions/<lambda>/invocations
        let lambda_id = uri.rsplit('/').nth(1).unwrap_or_default();
        let lambda = self.lambda(id, lambda_id)?;

        let auth = auth_type(id, method.property_str("AuthorizationType"));
        let props = self.route_properties(lambda, EventType::Apigw, auth)?;
        debug!(resource = %id, method = %http_method, %path, lambda = %lambda.logical_id, "classified REST API method");
        buckets.add_route(&path, http_method, props);
        Ok(())
    }

    fn rest_path(&self, method: &Resource) -> Result<String> {
        let id = method.logical_id.as_str();
        let resource_id = required_str(method, "ResourceId")?;
        let is_root = self
            .by_type
            .get(REST_API)
            .is_some_and(|apis| apis.keys().any(|api| root_resource_id(api) == resource_id));
        if is_root {
            return Ok("/".to_string());
        }

        let resource = self
            .get(REST_RESOURCE, resource_id)
            .ok_or_else(|| Error::MissingApiResource {
                resource: id.to_string(),
                api_resource: resource_id.to_string(),
            })?;
        let synth_path = resource.metadata_str(SYNTH_PATH).unwrap_or_default();
        resource_path(synth_path).ok_or_else(|| Error::MalformedResourcePath {
            resource: resource.logical_id.clone(),
            path: synth_path.to_string(),
        })
    }

    fn route_properties(
        &self,
        lambda: &Resource,
        event_type: EventType,
        auth: AuthType,
    ) -> Result<Map<String, Value>> {
        let mut props = Map::new();
        for key in COPIED_PROPERTIES {
            if let Some(value) = lambda.property(key) {
                props.insert(key.to_string(), value.clone());
            }
        }

        let asset = lambda
            .metadata_str(ASSET_PATH)
            .ok_or_else(|| Error::MissingProperty {
                resource: lambda.logical_id.clone(),
                property: format!("Metadata.{ASSET_PATH}"),
            })?;
        let code_uri = self.index.code_uri(
            asset,
            lambda.property_str("Handler"),
            lambda.property_str("Runtime"),
        );
        props.insert("CodeUri".into(), json!(code_uri));
        props.insert("EventType".into(), json!(event_type.as_str()));
        props.insert("AuthType".into(), json!(auth.as_str()));

        if let Some(layers) = lambda.property("Layers").and_then(Value::as_array) {
            let recovered: Vec<String> = layers
                .iter()
                .filter_map(|layer| self.layer_uri(&lambda.logical_id, layer))
                .collect();
            props.insert("Layers".into(), json!(recovered));
        }
        Ok(props)
    }

    fn layer_uri(&self, lambda_id: &str, layer: &Value) -> Option<String> {
        let asset = layer
            .as_str()
            .and_then(|id| self.get(LAMBDA_LAYER, id))
            .and_then(|layer| layer.metadata_str(ASSET_PATH));
        match asset {
            Some(asset) => Some(self.index.layer_uri(asset)),
            None => {
                warn!(resource = %lambda_id, layer = %layer, "layer is not a synthesized layer asset; skipped");
                None
            }
        }
    }
}

fn required_str<'r>(resource: &'r Resource, property: &str) -> Result<&'r str> {
    resource
        .property_str(property)
        .ok_or_else(|| Error::MissingProperty {
            resource: resource.logical_id.clone(),
            property: property.to_string(),
        })
}

fn auth_type(id: &str, declared: Option<&str>) -> AuthType {
    match declared.filter(|value| !value.is_empty()) {
        None => AuthType::None,
        Some(value) => AuthType::parse(value).unwrap_or_else(|| {
            warn!(resource = %id, authorization = %value, "unrecognized AuthorizationType; using NONE");
            AuthType::None
        }),
    }
}

/// URL path from a synthesis path such as `Stack/Api/Default/items/{id}/Resource`:
/// the segments after the root segment, without the trailing self segment.
pub fn resource_path(synth_path: &str) -> Option<String> {
    let segments: Vec<&str> = synth_path.split('/').collect();
    let root = segments.iter().position(|s| *s == SYNTH_ROOT_SEGMENT)?;
    let inner = segments.get(root + 1..segments.len().checked_sub(1)?)?;
    if inner.is_empty() {
        return None;
    }
    Some(format!("/{}", inner.join("/")))
}
