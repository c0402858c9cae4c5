//! OpenAPI document assembly.
//!
//! [`DocumentBuilder`] turns frozen [`EndpointSpec`]s into an OpenAPI 3.0
//! [`Document`]. Bodies are described through the [`SchemaSynthesizer`];
//! error responses share one `Error` component. Besides the errors an
//! endpoint declares, the responses the pipeline itself can produce (413,
//! 422, 401, 403, 429 and 500) are documented where they apply.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use daedalus_core::{errors, EndpointSpec, ErrorDefinition};
use http::Method;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::field::{FieldDescriptor, FieldType};
use crate::scanner::TypeScanner;
use crate::schema::Schema;
use crate::synth::SchemaSynthesizer;

/// OpenAPI version written into documents.
pub const OPENAPI_VERSION: &str = "3.0.3";

/// Name of the shared error body component.
pub const ERROR_COMPONENT: &str = "Error";

const JSON: &str = "application/json";
const EVENT_STREAM: &str = "text/event-stream";

/// OpenAPI document root object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// OpenAPI version.
    pub openapi: String,
    /// API metadata.
    pub info: Info,
    /// Available servers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// API paths and operations.
    #[serde(default)]
    pub paths: IndexMap<String, PathItem>,
    /// Reusable components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    /// Tags for grouping operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl Document {
    /// Serializes the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Serialization`] if serialization fails.
    pub fn to_json_pretty(&self) -> SchemaResult<String> {
        serde_json::to_string_pretty(self).map_err(SchemaError::from)
    }

    /// Looks up an operation by method and path.
    #[must_use]
    pub fn operation(&self, method: &Method, path: &str) -> Option<&Operation> {
        self.paths.get(path)?.get(method)
    }
}

/// API metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    /// API title.
    pub title: String,
    /// API version.
    pub version: String,
    /// API description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Server information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Server URL.
    pub url: String,
    /// Server description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Operations on one path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    /// GET operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    /// PUT operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    /// POST operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    /// DELETE operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    /// OPTIONS operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    /// HEAD operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    /// PATCH operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    /// TRACE operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
}

impl PathItem {
    /// The operation for `method`, if set.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&Operation> {
        match *method {
            Method::GET => self.get.as_ref(),
            Method::PUT => self.put.as_ref(),
            Method::POST => self.post.as_ref(),
            Method::DELETE => self.delete.as_ref(),
            Method::OPTIONS => self.options.as_ref(),
            Method::HEAD => self.head.as_ref(),
            Method::PATCH => self.patch.as_ref(),
            Method::TRACE => self.trace.as_ref(),
            _ => None,
        }
    }

    fn slot_mut(&mut self, method: &Method) -> Option<&mut Option<Operation>> {
        match *method {
            Method::GET => Some(&mut self.get),
            Method::PUT => Some(&mut self.put),
            Method::POST => Some(&mut self.post),
            Method::DELETE => Some(&mut self.delete),
            Method::OPTIONS => Some(&mut self.options),
            Method::HEAD => Some(&mut self.head),
            Method::PATCH => Some(&mut self.patch),
            Method::TRACE => Some(&mut self.trace),
            _ => None,
        }
    }
}

/// An API operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Unique operation identifier.
    pub operation_id: String,
    /// Short summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Full description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tags for grouping.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Whether deprecated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    /// Parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status.
    pub responses: IndexMap<String, Response>,
    /// Security requirements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
}

/// Parameter location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterIn {
    /// Query string parameter.
    Query,
    /// URL path parameter.
    Path,
}

/// An operation parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Parameter location.
    #[serde(rename = "in")]
    pub location: ParameterIn,
    /// Whether required.
    #[serde(default)]
    pub required: bool,
    /// Parameter schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    /// Whether required.
    #[serde(default)]
    pub required: bool,
    /// Content by media type.
    pub content: IndexMap<String, MediaType>,
}

/// Media type content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    /// Schema for this media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Response definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Description (required by OpenAPI).
    pub description: String,
    /// Response content by media type.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

/// Reusable components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    /// Reusable schemas.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, Schema>,
    /// Security schemes.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

/// Security scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityScheme {
    /// Security scheme type.
    #[serde(rename = "type")]
    pub scheme_type: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// HTTP auth scheme name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Bearer token format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
}

/// Security requirement: scheme name to required scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// API tag for grouping operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
}

/// Assembles documents from endpoint specs.
///
/// # Example
///
/// ```
/// use daedalus_core::{errors, EndpointSpec, NoBody};
/// use daedalus_schema::{DocumentBuilder, StaticScanner};
/// use http::Method;
///
/// struct Health;
///
/// let spec = EndpointSpec::builder("health", Method::GET, "/health")
///     .io::<NoBody, Health>()
///     .build();
///
/// let doc = DocumentBuilder::new("Status API", "1.0.0")
///     .build(&[spec], &StaticScanner::new())
///     .unwrap();
///
/// let op = doc.operation(&Method::GET, "/health").unwrap();
/// assert!(op.responses.contains_key("200"));
/// assert!(op.responses.contains_key("500"));
/// ```
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    title: String,
    version: String,
    description: Option<String>,
    servers: Vec<Server>,
    bearer: Option<String>,
}

impl DocumentBuilder {
    /// Creates a builder for an API called `title` at `version`.
    #[must_use]
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            description: None,
            servers: Vec::new(),
            bearer: None,
        }
    }

    /// Sets the API description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a server.
    #[must_use]
    pub fn server(mut self, url: impl Into<String>, description: Option<String>) -> Self {
        self.servers.push(Server {
            url: url.into(),
            description,
        });
        self
    }

    /// Adds a bearer token security scheme, applied to endpoints that
    /// require authentication.
    #[must_use]
    pub fn bearer_auth(mut self, name: impl Into<String>) -> Self {
        self.bearer = Some(name.into());
        self
    }

    /// Assembles the document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnsupportedMethod`] for methods outside the
    /// OpenAPI set and [`SchemaError::DuplicateOperation`] when two endpoints
    /// share a method and path.
    pub fn build(
        &self,
        endpoints: &[EndpointSpec],
        scanner: &dyn TypeScanner,
    ) -> SchemaResult<Document> {
        let scanner = WithBuiltins(scanner);
        let mut synth = SchemaSynthesizer::new(&scanner);
        let mut paths: IndexMap<String, PathItem> = IndexMap::new();
        let mut tags: Vec<Tag> = Vec::new();

        for spec in endpoints {
            let item = paths.entry(spec.path().to_string()).or_default();
            let slot = item
                .slot_mut(spec.method())
                .ok_or_else(|| SchemaError::UnsupportedMethod {
                    endpoint: spec.name().to_string(),
                    method: spec.method().to_string(),
                })?;
            if let Some(existing) = slot {
                return Err(SchemaError::DuplicateOperation {
                    method: spec.method().to_string(),
                    path: spec.path().to_string(),
                    first: existing.operation_id.clone(),
                    second: spec.name().to_string(),
                });
            }
            *slot = Some(self.operation(spec, &mut synth));

            for tag in spec.tags() {
                if !tags.iter().any(|t| &t.name == tag) {
                    tags.push(Tag { name: tag.clone() });
                }
            }
        }

        let mut schemas = IndexMap::new();
        schemas.insert(ERROR_COMPONENT.to_string(), error_schema());
        schemas.extend(synth.into_components());

        let mut security_schemes = IndexMap::new();
        if let Some(name) = &self.bearer {
            security_schemes.insert(
                name.clone(),
                SecurityScheme {
                    scheme_type: "http".to_string(),
                    description: Some("Bearer token authentication".to_string()),
                    scheme: Some("bearer".to_string()),
                    bearer_format: Some("JWT".to_string()),
                },
            );
        }

        Ok(Document {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: self.title.clone(),
                version: self.version.clone(),
                description: self.description.clone(),
            },
            servers: self.servers.clone(),
            paths,
            components: Some(Components {
                schemas,
                security_schemes,
            }),
            tags,
        })
    }

    /// Assembles the document as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build); also fails if serialization fails.
    pub fn build_json(
        &self,
        endpoints: &[EndpointSpec],
        scanner: &dyn TypeScanner,
    ) -> SchemaResult<String> {
        self.build(endpoints, scanner)?.to_json_pretty()
    }

    fn operation(&self, spec: &EndpointSpec, synth: &mut SchemaSynthesizer<'_>) -> Operation {
        let mut parameters = path_parameters(spec);
        parameters.extend(spec.query_params().iter().map(|name| Parameter {
            name: name.clone(),
            location: ParameterIn::Query,
            required: false,
            schema: Some(Schema::string()),
        }));

        let request_body = (!spec.input().is_no_body()).then(|| RequestBody {
            required: true,
            content: single(JSON, synth.type_schema(spec.input().full_name())),
        });

        let mut responses = IndexMap::new();
        responses.insert(
            spec.success_status().as_u16().to_string(),
            success_response(spec, synth),
        );
        for (status, group) in error_groups(spec) {
            responses.insert(status.to_string(), error_response(&group, synth));
        }

        let security = match &self.bearer {
            Some(name) if spec.access().auth_required => {
                let scopes = spec
                    .access()
                    .all_scopes()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                vec![IndexMap::from([(name.clone(), scopes)])]
            }
            _ => Vec::new(),
        };

        Operation {
            operation_id: spec.name().to_string(),
            summary: spec.summary().map(str::to_string),
            description: spec.description().map(str::to_string),
            tags: spec.tags().to_vec(),
            deprecated: spec.is_deprecated(),
            parameters,
            request_body,
            responses,
            security,
        }
    }
}

fn single(media_type: &str, schema: Schema) -> IndexMap<String, MediaType> {
    IndexMap::from([(
        media_type.to_string(),
        MediaType {
            schema: Some(schema),
        },
    )])
}

fn success_response(spec: &EndpointSpec, synth: &mut SchemaSynthesizer<'_>) -> Response {
    let output = spec.output();
    if spec.is_streaming() {
        let schema = if output.is_no_body() {
            Schema::string()
        } else {
            synth.type_schema(output.full_name())
        };
        return Response {
            description: "Event stream".to_string(),
            content: single(EVENT_STREAM, schema),
        };
    }

    Response {
        description: "Successful response".to_string(),
        content: if output.is_no_body() {
            IndexMap::new()
        } else {
            single(JSON, synth.type_schema(output.full_name()))
        },
    }
}

/// Declared errors plus the pipeline's own, grouped by status.
///
/// A pipeline error is only added when no declared error uses its status.
fn error_groups(spec: &EndpointSpec) -> BTreeMap<u16, Vec<ErrorDefinition>> {
    let mut groups: BTreeMap<u16, Vec<ErrorDefinition>> = BTreeMap::new();
    for e in spec.declared_errors() {
        groups.entry(e.status().as_u16()).or_default().push(e.clone());
    }

    let access = spec.access();
    let reads_body = !spec.input().is_no_body();
    let implicit = [
        (reads_body, errors::bad_request()),
        (access.auth_required, errors::unauthorized()),
        (
            !access.scope_groups.is_empty() || !access.role_groups.is_empty(),
            errors::forbidden(),
        ),
        (reads_body, errors::payload_too_large()),
        (
            reads_body || !spec.path_params().is_empty(),
            errors::validation_error(),
        ),
        (!access.usage_limits.is_empty(), errors::rate_limited()),
        (true, errors::internal_error()),
    ];
    for (applies, e) in implicit {
        if applies {
            groups.entry(e.status().as_u16()).or_insert_with(|| vec![e]);
        }
    }

    groups
}

fn error_response(group: &[ErrorDefinition], synth: &mut SchemaSynthesizer<'_>) -> Response {
    let description = group
        .iter()
        .map(|e| format!("{}: {}", e.code(), e.message()))
        .collect::<Vec<_>>()
        .join("; ");

    let mut details_types: Vec<String> =
        group.iter().filter_map(ErrorDefinition::details_type).collect();
    details_types.dedup();

    let schema = match details_types.as_slice() {
        [only] => {
            let details = Schema::object().property("details", synth.reference(only));
            Schema {
                all_of: vec![Schema::component_ref(ERROR_COMPONENT), details],
                ..Schema::default()
            }
        }
        _ => Schema::component_ref(ERROR_COMPONENT),
    };

    Response {
        description,
        content: single(JSON, schema),
    }
}

fn error_schema() -> Schema {
    Schema::object()
        .property("code", Schema::string())
        .property("message", Schema::string())
        .property("details", Schema::free_form())
        .required_property("code")
        .required_property("message")
}

fn path_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^}/]+)\}").expect("valid regex"))
}

/// Path parameters from the template, then any declared but not templated.
fn path_parameters(spec: &EndpointSpec) -> Vec<Parameter> {
    let mut names: Vec<String> = path_param_regex()
        .captures_iter(spec.path())
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();
    for declared in spec.path_params() {
        if !names.contains(declared) {
            names.push(declared.clone());
        }
    }

    names
        .into_iter()
        .map(|name| Parameter {
            name,
            location: ParameterIn::Path,
            required: true,
            schema: Some(Schema::string()),
        })
        .collect()
}

/// Adds descriptions of the pipeline's own detail types to a scanner.
struct WithBuiltins<'a>(&'a dyn TypeScanner);

impl TypeScanner for WithBuiltins<'_> {
    fn fields(&self, type_name: &str) -> Option<Vec<FieldDescriptor>> {
        self.0.fields(type_name).or_else(|| builtin_fields(type_name))
    }
}

fn builtin_fields(type_name: &str) -> Option<Vec<FieldDescriptor>> {
    match type_name {
        "ValidationDetails" => Some(vec![FieldDescriptor::new(
            "Violations",
            FieldType::array(FieldType::named_str("ValidationViolation")),
        )
        .json("violations")]),
        "ValidationViolation" => Some(vec![
            FieldDescriptor::new("Field", FieldType::String).json("field"),
            FieldDescriptor::new("Rule", FieldType::String).json("rule"),
            FieldDescriptor::new("Value", FieldType::String).json("value"),
        ]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::StaticScanner;
    use crate::schema::{SchemaKind, SchemaType};
    use daedalus_core::NoBody;
    use http::StatusCode;

    struct CreateUser;
    struct User;
    struct Tick;

    fn scanner() -> StaticScanner {
        StaticScanner::new()
            .with(
                "CreateUser",
                vec![FieldDescriptor::new("Name", FieldType::String)
                    .json("name")
                    .validate("required,min=1")],
            )
            .with(
                "User",
                vec![
                    FieldDescriptor::new("ID", FieldType::String).json("id"),
                    FieldDescriptor::new("Name", FieldType::String).json("name"),
                ],
            )
    }

    fn create_user() -> EndpointSpec {
        EndpointSpec::builder("createUser", Method::POST, "/orgs/{org}/users")
            .summary("Create a user")
            .tag("users")
            .path_param("org")
            .query_param("dry_run")
            .io::<CreateUser, User>()
            .success_status(StatusCode::CREATED)
            .error(errors::conflict())
            .with_scopes(["users:write", "admin"])
            .usage_limit("users_created", |_| 100)
            .build()
    }

    #[test]
    fn test_full_operation() {
        let doc = DocumentBuilder::new("Users", "1.0.0")
            .bearer_auth("bearerAuth")
            .build(&[create_user()], &scanner())
            .unwrap();
        let op = doc.operation(&Method::POST, "/orgs/{org}/users").unwrap();

        assert_eq!(op.operation_id, "createUser");
        assert_eq!(op.tags, vec!["users"]);
        assert_eq!(op.parameters.len(), 2);
        assert_eq!(op.parameters[0].location, ParameterIn::Path);
        assert!(op.parameters[0].required);
        assert_eq!(op.parameters[1].location, ParameterIn::Query);
        assert!(!op.parameters[1].required);

        let body = op.request_body.as_ref().unwrap();
        let schema = body.content[JSON].schema.as_ref().unwrap();
        assert_eq!(schema.referenced_component(), Some("CreateUser"));

        let statuses: Vec<&str> = op.responses.keys().map(String::as_str).collect();
        assert_eq!(
            statuses,
            vec!["201", "400", "401", "403", "409", "413", "422", "429", "500"]
        );
        assert!(op.responses["409"].description.starts_with("CONFLICT"));

        assert_eq!(op.security.len(), 1);
        assert_eq!(op.security[0]["bearerAuth"], vec!["users:write", "admin"]);

        let schemas = &doc.components.as_ref().unwrap().schemas;
        assert!(schemas.contains_key(ERROR_COMPONENT));
        assert!(schemas.contains_key("CreateUser"));
        assert!(schemas.contains_key("User"));
        assert!(schemas.contains_key("ValidationDetails"));
        assert!(schemas.contains_key("ValidationViolation"));
    }

    #[test]
    fn test_no_body_is_suppressed() {
        let spec = EndpointSpec::builder("ping", Method::GET, "/ping").build();
        let doc = DocumentBuilder::new("t", "1").build(&[spec], &scanner()).unwrap();
        let op = doc.operation(&Method::GET, "/ping").unwrap();

        assert!(op.request_body.is_none());
        assert!(op.responses["200"].content.is_empty());
        let statuses: Vec<&str> = op.responses.keys().map(String::as_str).collect();
        assert_eq!(statuses, vec!["200", "500"]);
        assert!(op.security.is_empty());
    }

    #[test]
    fn test_streaming_success_response() {
        let spec = EndpointSpec::builder("ticks", Method::GET, "/ticks")
            .io::<NoBody, Tick>()
            .streaming()
            .build();
        let doc = DocumentBuilder::new("t", "1").build(&[spec], &scanner()).unwrap();
        let op = doc.operation(&Method::GET, "/ticks").unwrap();

        let ok = &op.responses["200"];
        let schema = ok.content[EVENT_STREAM].schema.as_ref().unwrap();
        assert_eq!(schema.referenced_component(), Some("Tick"));
    }

    #[test]
    fn test_collection_and_primitive_bodies_are_inlined() {
        let list = EndpointSpec::builder("listUsers", Method::GET, "/users")
            .io::<NoBody, Vec<User>>()
            .build();
        let rename = EndpointSpec::builder("rename", Method::PUT, "/name")
            .io::<String, Option<User>>()
            .build();
        let doc = DocumentBuilder::new("t", "1")
            .build(&[list, rename], &scanner())
            .unwrap();

        let op = doc.operation(&Method::GET, "/users").unwrap();
        let schema = op.responses["200"].content[JSON].schema.as_ref().unwrap();
        assert_eq!(schema.kind(), SchemaKind::Array);
        let value = serde_json::to_value(schema).unwrap();
        assert_eq!(value["items"]["$ref"], "#/components/schemas/User");

        let op = doc.operation(&Method::PUT, "/name").unwrap();
        let body = op.request_body.as_ref().unwrap();
        let schema = body.content[JSON].schema.as_ref().unwrap();
        assert_eq!(schema.schema_type, Some(SchemaType::String));
        let schema = op.responses["200"].content[JSON].schema.as_ref().unwrap();
        assert_eq!(schema.referenced_component(), Some("User"));

        let schemas = &doc.components.as_ref().unwrap().schemas;
        assert!(schemas.contains_key("User"));
        assert!(!schemas.contains_key("Vec<User>"));
        assert!(!schemas.contains_key("String"));
        assert!(!schemas.contains_key("Option<User>"));
    }

    #[test]
    fn test_declared_status_wins_over_pipeline_default() {
        let custom = ErrorDefinition::new("BAD_INPUT", StatusCode::UNPROCESSABLE_ENTITY, "bad input");
        let spec = EndpointSpec::builder("x", Method::POST, "/x")
            .io::<CreateUser, NoBody>()
            .error(custom)
            .build();
        let doc = DocumentBuilder::new("t", "1").build(&[spec], &scanner()).unwrap();
        let op = doc.operation(&Method::POST, "/x").unwrap();
        assert_eq!(op.responses["422"].description, "BAD_INPUT: bad input");
    }

    #[test]
    fn test_duplicate_operation_rejected() {
        let a = EndpointSpec::builder("a", Method::GET, "/same").build();
        let b = EndpointSpec::builder("b", Method::GET, "/same").build();
        let err = DocumentBuilder::new("t", "1").build(&[a, b], &scanner()).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateOperation { .. }));
    }

    #[test]
    fn test_unsupported_method_rejected() {
        let spec = EndpointSpec::builder("c", Method::CONNECT, "/tunnel").build();
        let err = DocumentBuilder::new("t", "1").build(&[spec], &scanner()).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedMethod { .. }));
    }

    #[test]
    fn test_json_output() {
        let json = DocumentBuilder::new("Users", "2.0.0")
            .description("User management")
            .server("https://api.example.com", None)
            .build_json(&[create_user()], &scanner())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["openapi"], OPENAPI_VERSION);
        assert_eq!(value["info"]["title"], "Users");
        assert_eq!(value["servers"][0]["url"], "https://api.example.com");
        assert_eq!(
            value["paths"]["/orgs/{org}/users"]["post"]["responses"]["422"]["content"][JSON]["schema"]["allOf"][0]["$ref"],
            "#/components/schemas/Error"
        );
    }
}
