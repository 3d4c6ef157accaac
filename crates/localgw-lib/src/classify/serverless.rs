//! Declarative-dialect classification.
//!
//! Functions carry an inline `Events` mapping. `Api` and `HttpApi` events
//! become routes, `S3` object-created events become triggers, and functions
//! with no events are kept in `lambdas` so authorizers stay resolvable. A
//! function whose events yield neither a route nor a trigger goes to `others`.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::primitive::classify_primitive;
use super::ClassificationBuckets;
use crate::auth::{AuthType, EventType};
use crate::expr::{dig, dig_str, merge_defaults};
use crate::image::ContainerDescriptor;
use crate::template::{ResolvedTemplate, Resource};

pub const FUNCTION: &str = "AWS::Serverless::Function";
pub const API: &str = "AWS::Serverless::Api";
pub const SIMPLE_TABLE: &str = "AWS::Serverless::SimpleTable";

const PLACEHOLDER_CODE_URI: &str = "edit here! (e.g. app/)";
const PLACEHOLDER_HANDLER: &str = "edit here! (e.g. app.lambda_handler)";
const PLACEHOLDER_LAYER: &str = "if use outer dir, add here (e.g. /libs)";

/// Classify the resources of a declarative template.
pub fn classify(template: &ResolvedTemplate) -> ClassificationBuckets {
    let context = Context::new(template);
    let mut buckets = ClassificationBuckets::default();
    for resource in template.resources.values() {
        match resource.resource_type.as_str() {
            FUNCTION => context.classify_function(&mut buckets, resource),
            SIMPLE_TABLE => classify_simple_table(&mut buckets, resource),
            _ => classify_primitive(&mut buckets, resource),
        }
    }
    buckets
}

struct Context<'a> {
    template: &'a ResolvedTemplate,
    function_globals: Map<String, Value>,
    api_globals: Map<String, Value>,
    /// `AWS::Serverless::Api` properties with `Globals.Api` merged in.
    apis: IndexMap<&'a str, Map<String, Value>>,
}

impl<'a> Context<'a> {
    fn new(template: &'a ResolvedTemplate) -> Self {
        let api_globals = template.globals("Api");
        let apis = template
            .resources
            .values()
            .filter(|resource| resource.resource_type == API)
            .map(|resource| {
                let mut properties = resource.properties_map();
                merge_defaults(&mut properties, &api_globals);
                (resource.logical_id.as_str(), properties)
            })
            .collect();
        Self {
            template,
            function_globals: template.globals("Function"),
            api_globals,
            apis,
        }
    }

    fn classify_function(&self, buckets: &mut ClassificationBuckets, resource: &Resource) {
        let id = resource.logical_id.as_str();
        let mut props = resource.properties_map();
        merge_defaults(&mut props, &self.function_globals);

        if props.get("PackageType").and_then(Value::as_str) == Some("Image") {
            self.apply_container(id, &resource.metadata, &mut props);
        }

        let events = match props.remove("Events") {
            Some(Value::Object(events)) if !events.is_empty() => events,
            _ => {
                debug!(resource = %id, "function has no events");
                buckets
                    .lambdas
                    .insert(id.to_string(), resource.declaration.clone());
                return;
            }
        };

        // A function counts once: through the routes and triggers its events
        // produce, or in `others` when none of them produced anything.
        let mut placed = false;
        for (event_id, event) in &events {
            let Some(event) = event.as_object() else {
                continue;
            };
            let event_props = event
                .get("Properties")
                .cloned()
                .unwrap_or_else(|| json!({}));
            placed |= match event.get("Type").and_then(Value::as_str).unwrap_or_default() {
                "Api" => self.add_api_event(buckets, id, &props, &event_props),
                "HttpApi" => add_http_api_event(buckets, id, &props, &event_props),
                "S3" => add_s3_trigger(buckets, id, &props, &event_props),
                other => {
                    debug!(resource = %id, event = %event_id, event_type = %other, "unsupported event type");
                    false
                }
            };
        }
        if !placed {
            debug!(resource = %id, "no event produced a route or trigger");
            buckets
                .others
                .insert(id.to_string(), resource.declaration.clone());
        }
    }

    fn apply_container(&self, id: &str, metadata: &Value, props: &mut Map<String, Value>) {
        match ContainerDescriptor::read(metadata, self.template.root()) {
            Ok(descriptor) => {
                props.insert("CodeUri".into(), json!(descriptor.code_uri));
                props.insert("Handler".into(), json!(descriptor.handler));
                if !descriptor.layers.is_empty() {
                    props.insert("Layers".into(), json!(descriptor.layers));
                }
                props.insert(
                    "Environment".into(),
                    json!({ "Variables": descriptor.environment }),
                );
            }
            Err(err) => {
                warn!(
                    resource = %id,
                    error = %err,
                    "could not interpret the Dockerfile; edit the generated configuration by hand"
                );
                props.insert("CodeUri".into(), json!(PLACEHOLDER_CODE_URI));
                props.insert("Handler".into(), json!(PLACEHOLDER_HANDLER));
                props.insert(
                    "Environment".into(),
                    json!({ "Variables": { "SAMPLE_ENV": "VAL" } }),
                );
                props.insert("Layers".into(), json!([PLACEHOLDER_LAYER]));
            }
        }
    }

    fn add_api_event(
        &self,
        buckets: &mut ClassificationBuckets,
        id: &str,
        props: &Map<String, Value>,
        event_props: &Value,
    ) -> bool {
        let (Some(path), Some(method)) = route_of(event_props) else {
            debug!(resource = %id, "Api event without Path or Method");
            return false;
        };

        let mut route = props.clone();
        route.insert("EventType".into(), json!(EventType::Apigw.as_str()));
        route.insert("AuthType".into(), json!(AuthType::None.as_str()));

        let auth = match dig_str(event_props, &["RestApiId"]).filter(|api| !api.is_empty()) {
            Some(api_id) => match self.apis.get(api_id) {
                Some(api) => api.get("Auth").cloned(),
                None => {
                    warn!(resource = %id, api = %api_id, "RestApiId names no declared Api; auth settings ignored");
                    None
                }
            },
            None => self.api_globals.get("Auth").cloned(),
        };
        if let Some(auth) = auth {
            let selected = dig_str(event_props, &["Auth", "Authorizer"])
                .or_else(|| dig_str(&auth, &["DefaultAuthorizer"]));
            if let Some(name) = selected {
                apply_authorizer(&mut route, id, &auth, name);
            }
        }

        buckets.add_route(path, method, route);
        true
    }
}

fn route_of(event_props: &Value) -> (Option<&str>, Option<&str>) {
    let non_empty = |key: &str| dig_str(event_props, &[key]).filter(|v| !v.is_empty());
    (non_empty("Path"), non_empty("Method"))
}

fn apply_authorizer(route: &mut Map<String, Value>, id: &str, auth: &Value, name: &str) {
    if name.eq_ignore_ascii_case("NONE") {
        return;
    }
    if name == "AWS_IAM" {
        route.insert("AuthType".into(), json!(AuthType::AwsIam.as_str()));
        return;
    }
    let Some(authorizer) = dig(auth, &["Authorizers", name]) else {
        warn!(resource = %id, authorizer = %name, "authorizer is not declared; auth settings ignored");
        return;
    };
    if let Some(pool) = authorizer.get("UserPoolArn") {
        route.insert("AuthType".into(), json!(AuthType::CognitoUserPools.as_str()));
        route.insert("Authorizer".into(), pool.clone());
    } else if let Some(function) = authorizer.get("FunctionArn") {
        let payload = authorizer
            .get("FunctionPayloadType")
            .and_then(Value::as_str)
            .unwrap_or("TOKEN");
        if payload.eq_ignore_ascii_case("REQUEST") {
            route.insert("AuthType".into(), json!(AuthType::CustomRequest.as_str()));
        } else {
            route.insert("AuthType".into(), json!(AuthType::CustomToken.as_str()));
            if let Some(identity) = authorizer.get("Identity") {
                route.insert("AuthSource".into(), identity.clone());
            }
        }
        route.insert("Authorizer".into(), function.clone());
    } else {
        warn!(resource = %id, authorizer = %name, "authorizer has neither UserPoolArn nor FunctionArn; auth settings ignored");
    }
}

fn add_http_api_event(
    buckets: &mut ClassificationBuckets,
    id: &str,
    props: &Map<String, Value>,
    event_props: &Value,
) -> bool {
    let (Some(path), Some(method)) = route_of(event_props) else {
        debug!(resource = %id, "HttpApi event without Path or Method");
        return false;
    };

    let declared = dig_str(event_props, &["Auth", "Authorizer"]).unwrap_or("NONE");
    let auth = AuthType::parse(declared).unwrap_or_else(|| {
        warn!(resource = %id, authorizer = %declared, "unrecognized HttpApi authorizer; using NONE");
        AuthType::None
    });

    let mut route = props.clone();
    route.insert("EventType".into(), json!(EventType::ApigwV2.as_str()));
    route.insert("AuthType".into(), json!(auth.as_str()));
    buckets.add_route(path, method, route);
    true
}

/// Register an object-created trigger. Returns false when the event is not
/// an object-created event or names no bucket.
fn add_s3_trigger(
    buckets: &mut ClassificationBuckets,
    id: &str,
    props: &Map<String, Value>,
    event_props: &Value,
) -> bool {
    let object_created = match event_props.get("Events") {
        Some(Value::String(event)) => event.contains("ObjectCreated"),
        Some(Value::Array(events)) => events
            .iter()
            .filter_map(Value::as_str)
            .any(|event| event.contains("ObjectCreated")),
        _ => false,
    };
    if !object_created {
        return false;
    }
    let Some(bucket) = dig_str(event_props, &["Bucket"]).filter(|b| !b.is_empty()) else {
        debug!(resource = %id, "S3 event without Bucket");
        return false;
    };
    let mut trigger = props.clone();
    if let Some(filter) = event_props.get("Filter").filter(|f| !f.is_null()) {
        trigger.insert("Filter".into(), filter.clone());
    }
    buckets
        .triggers
        .insert(bucket.to_string(), json!({ "Properties": trigger }));
    true
}

fn classify_simple_table(buckets: &mut ClassificationBuckets, resource: &Resource) {
    let name = resource
        .property_str("TableName")
        .unwrap_or(resource.logical_id.as_str())
        .to_string();
    let key = dig_str(&resource.properties, &["PrimaryKey", "Name"]).unwrap_or("id");
    let key_type = match dig_str(&resource.properties, &["PrimaryKey", "Type"]) {
        Some("Number") => "N",
        Some("Binary") => "B",
        _ => "S",
    };

    let mut table = json!({
        "TableName": name,
        "AttributeDefinitions": [{"AttributeName": key, "AttributeType": key_type}],
        "KeySchema": [{"AttributeName": key, "KeyType": "HASH"}],
        "BillingMode": "PAY_PER_REQUEST",
    });
    if let (Some(throughput), Some(map)) = (
        resource.property("ProvisionedThroughput"),
        table.as_object_mut(),
    ) {
        map.insert("BillingMode".into(), json!("PROVISIONED"));
        map.insert("ProvisionedThroughput".into(), throughput.clone());
    }
    debug!(resource = %resource.logical_id, table = %name, "classified simple table");
    buckets.tables.insert(name, table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{resolve_document, Dialect, TemplateOptions};
    use std::path::Path;

    fn load(document: Value) -> ResolvedTemplate {
        resolve_document(
            Path::new("template.yaml"),
            document.as_object().cloned().unwrap_or_default(),
            Dialect::Serverless,
            &TemplateOptions::default(),
        )
        .expect("template resolves")
    }

    fn route_props<'a>(buckets: &'a ClassificationBuckets, path: &str, method: &str) -> &'a Value {
        &buckets.route(path, method).expect("route registered")["Properties"]
    }

    #[test]
    fn globals_fill_function_defaults() {
        let template = load(json!({
            "Globals": {"Function": {"Runtime": "python3.12", "Timeout": 10,
                "Environment": {"Variables": {"STAGE": "dev"}}}},
            "Resources": {"Fn": {"Type": FUNCTION, "Properties": {
                "CodeUri": "src/", "Handler": "app.handler", "Timeout": 3,
                "Environment": {"Variables": {"TABLE": "items"}},
                "Events": {"Get": {"Type": "Api", "Properties": {"Path": "/items", "Method": "GET"}}}
            }}}
        }));
        let buckets = classify(&template);
        let props = route_props(&buckets, "/items", "get");
        assert_eq!(props["Runtime"], json!("python3.12"));
        assert_eq!(props["Timeout"], json!(3));
        assert_eq!(
            props["Environment"]["Variables"],
            json!({"TABLE": "items", "STAGE": "dev"})
        );
        assert!(props.get("Events").is_none());
    }

    #[test]
    fn function_without_events_is_kept_as_lambda() {
        let template = load(json!({
            "Resources": {"Authorizer": {"Type": FUNCTION, "Properties": {"Handler": "auth.handler"}}}
        }));
        let buckets = classify(&template);
        assert_eq!(
            buckets.lambdas["Authorizer"]["Properties"]["Handler"],
            json!("auth.handler")
        );
        assert!(buckets.apis.is_empty());
    }

    #[test]
    fn token_authorizer_records_identity_source() {
        let template = load(json!({
            "Resources": {
                "Api": {"Type": API, "Properties": {"Auth": {
                    "DefaultAuthorizer": "Token",
                    "Authorizers": {"Token": {
                        "FunctionArn": {"Fn::GetAtt": ["AuthFn", "Arn"]},
                        "Identity": {"Header": "Authorization"}
                    }}
                }}},
                "AuthFn": {"Type": FUNCTION, "Properties": {"Handler": "auth.handler"}},
                "Fn": {"Type": FUNCTION, "Properties": {"Handler": "app.handler", "Events": {
                    "Get": {"Type": "Api", "Properties": {
                        "Path": "/secure", "Method": "get", "RestApiId": {"Ref": "Api"}}}
                }}}
            }
        }));
        let buckets = classify(&template);
        let props = route_props(&buckets, "/secure", "get");
        assert_eq!(props["AuthType"], json!("CUSTOM_TOKEN"));
        assert_eq!(
            props["Authorizer"],
            json!("arn:aws:lambda:us-east-1:123456789012:function/AuthFn")
        );
        assert_eq!(props["AuthSource"], json!({"Header": "Authorization"}));
    }

    #[test]
    fn request_authorizer_and_event_override() {
        let template = load(json!({
            "Globals": {"Api": {"Auth": {
                "DefaultAuthorizer": "AWS_IAM",
                "Authorizers": {"Req": {"FunctionArn": "arn:req", "FunctionPayloadType": "REQUEST"}}
            }}},
            "Resources": {"Fn": {"Type": FUNCTION, "Properties": {"Handler": "app.handler", "Events": {
                "Iam": {"Type": "Api", "Properties": {"Path": "/iam", "Method": "get"}},
                "Req": {"Type": "Api", "Properties": {"Path": "/req", "Method": "get",
                    "Auth": {"Authorizer": "Req"}}},
                "Open": {"Type": "Api", "Properties": {"Path": "/open", "Method": "get",
                    "Auth": {"Authorizer": "NONE"}}}
            }}}}
        }));
        let buckets = classify(&template);
        assert_eq!(route_props(&buckets, "/iam", "get")["AuthType"], json!("AWS_IAM"));
        assert_eq!(route_props(&buckets, "/req", "get")["AuthType"], json!("CUSTOM_REQUEST"));
        assert_eq!(route_props(&buckets, "/req", "get")["Authorizer"], json!("arn:req"));
        assert_eq!(route_props(&buckets, "/open", "get")["AuthType"], json!("NONE"));
    }

    #[test]
    fn missing_rest_api_keeps_none() {
        let template = load(json!({
            "Resources": {"Fn": {"Type": FUNCTION, "Properties": {"Handler": "app.handler", "Events": {
                "Get": {"Type": "Api", "Properties": {"Path": "/x", "Method": "post", "RestApiId": "Nope"}}
            }}}}
        }));
        let buckets = classify(&template);
        assert_eq!(route_props(&buckets, "/x", "post")["AuthType"], json!("NONE"));
    }

    #[test]
    fn http_api_authorizer_is_matched_case_insensitively() {
        let template = load(json!({
            "Resources": {"Fn": {"Type": FUNCTION, "Properties": {"Handler": "app.handler", "Events": {
                "Jwt": {"Type": "HttpApi", "Properties": {"Path": "/jwt", "Method": "GET",
                    "Auth": {"Authorizer": "jwt"}}},
                "Custom": {"Type": "HttpApi", "Properties": {"Path": "/custom", "Method": "GET",
                    "Auth": {"Authorizer": "MyLambdaAuth"}}}
            }}}}
        }));
        let buckets = classify(&template);
        let jwt = route_props(&buckets, "/jwt", "get");
        assert_eq!(jwt["AuthType"], json!("JWT"));
        assert_eq!(jwt["EventType"], json!("APIGW_V2"));
        assert_eq!(route_props(&buckets, "/custom", "get")["AuthType"], json!("NONE"));
    }

    #[test]
    fn routes_do_not_share_properties() {
        let template = load(json!({
            "Resources": {"Fn": {"Type": FUNCTION, "Properties": {"Handler": "app.handler", "Events": {
                "Rest": {"Type": "Api", "Properties": {"Path": "/a", "Method": "get"}},
                "Http": {"Type": "HttpApi", "Properties": {"Path": "/b", "Method": "get"}}
            }}}}
        }));
        let buckets = classify(&template);
        assert_eq!(route_props(&buckets, "/a", "get")["EventType"], json!("APIGW"));
        assert_eq!(route_props(&buckets, "/b", "get")["EventType"], json!("APIGW_V2"));
    }

    #[test]
    fn s3_events_accept_lists_and_filters() {
        let template = load(json!({
            "Resources": {
                "Uploads": {"Type": "AWS::S3::Bucket", "Properties": {"BucketName": "uploads"}},
                "Fn": {"Type": FUNCTION, "Properties": {"Handler": "app.handler", "Events": {
                    "Put": {"Type": "S3", "Properties": {
                        "Bucket": {"Ref": "Uploads"},
                        "Events": ["s3:ObjectRemoved:*", "s3:ObjectCreated:*"],
                        "Filter": {"S3Key": {"Rules": [{"Name": "prefix", "Value": "in/"}]}}
                    }}
                }}}
            }
        }));
        let buckets = classify(&template);
        let trigger = &buckets.triggers["uploads"]["Properties"];
        assert_eq!(trigger["Handler"], json!("app.handler"));
        assert_eq!(trigger["Filter"]["S3Key"]["Rules"][0]["Value"], json!("in/"));
        assert!(buckets.buckets.contains_key("uploads"));
    }

    #[test]
    fn other_events_go_to_others() {
        let template = load(json!({
            "Resources": {"Fn": {"Type": FUNCTION, "Properties": {"Handler": "app.handler", "Events": {
                "Tick": {"Type": "Schedule", "Properties": {"Schedule": "rate(1 minute)"}}
            }}}}
        }));
        let buckets = classify(&template);
        assert!(buckets.others.contains_key("Fn"));
        assert!(buckets.apis.is_empty());
    }

    #[test]
    fn routed_function_ignores_its_unsupported_events() {
        let template = load(json!({
            "Resources": {"Fn": {"Type": FUNCTION, "Properties": {"Handler": "app.handler", "Events": {
                "Get": {"Type": "Api", "Properties": {"Path": "/a", "Method": "get"}},
                "Tick": {"Type": "Schedule", "Properties": {"Schedule": "rate(1 minute)"}}
            }}}}
        }));
        let buckets = classify(&template);
        assert_eq!(buckets.route_count(), 1);
        assert!(buckets.others.is_empty());
    }

    #[test]
    fn incomplete_events_leave_the_function_in_others() {
        let template = load(json!({
            "Resources": {
                "Fn": {"Type": FUNCTION, "Properties": {"Handler": "app.handler", "Events": {
                    "Get": {"Type": "Api", "Properties": {"Path": "/x"}},
                    "Post": {"Type": "HttpApi", "Properties": {"Method": "post"}}
                }}},
                "Thumbs": {"Type": FUNCTION, "Properties": {"Handler": "thumbs.handler", "Events": {
                    "Put": {"Type": "S3", "Properties": {"Events": "s3:ObjectCreated:*"}}
                }}}
            }
        }));
        let buckets = classify(&template);
        assert_eq!(buckets.others.keys().collect::<Vec<_>>(), ["Fn", "Thumbs"]);
        assert_eq!(buckets.route_count(), 0);
        assert!(buckets.triggers.is_empty());
        assert!(buckets.lambdas.is_empty());
    }

    #[test]
    fn simple_table_becomes_dynamodb_table() {
        let template = load(json!({
            "Resources": {"Users": {"Type": SIMPLE_TABLE, "Properties": {
                "TableName": "users", "PrimaryKey": {"Name": "user_id", "Type": "Number"}
            }}}
        }));
        let buckets = classify(&template);
        assert_eq!(
            buckets.tables["users"],
            json!({
                "TableName": "users",
                "AttributeDefinitions": [{"AttributeName": "user_id", "AttributeType": "N"}],
                "KeySchema": [{"AttributeName": "user_id", "KeyType": "HASH"}],
                "BillingMode": "PAY_PER_REQUEST"
            })
        );
    }

    #[test]
    fn image_function_without_dockerfile_gets_placeholders() {
        let template = load(json!({
            "Resources": {"Fn": {"Type": FUNCTION,
                "Properties": {"PackageType": "Image", "Events": {
                    "Get": {"Type": "Api", "Properties": {"Path": "/img", "Method": "get"}}}},
                "Metadata": {"DockerContext": "./does-not-exist", "Dockerfile": "Dockerfile"}
            }}
        }));
        let buckets = classify(&template);
        let props = route_props(&buckets, "/img", "get");
        assert_eq!(props["CodeUri"], json!(PLACEHOLDER_CODE_URI));
        assert_eq!(props["Handler"], json!(PLACEHOLDER_HANDLER));
        assert_eq!(props["Environment"]["Variables"], json!({"SAMPLE_ENV": "VAL"}));
        assert_eq!(props["Layers"], json!([PLACEHOLDER_LAYER]));
    }
}
