//! Declarative endpoint specifications.
//!
//! An [`EndpointSpec`] describes one endpoint: its name, method and path, its
//! documentation, the parameters it reads, its input and output types, the
//! error codes its handler may return and the access requirements a caller
//! must meet. Specs are assembled with [`EndpointSpecBuilder`] and frozen by
//! [`EndpointSpecBuilder::build`]; nothing can change them afterwards, so they
//! can be shared freely between the pipelines and document assembly.
//!
//! # Example
//!
//! ```
//! use daedalus_core::{errors, EndpointSpec, NoBody};
//! use http::Method;
//!
//! #[derive(serde::Serialize)]
//! struct User {
//!     id: String,
//! }
//!
//! let spec = EndpointSpec::builder("getUser", Method::GET, "/users/{id}")
//!     .summary("Fetch a user")
//!     .path_param("id")
//!     .io::<NoBody, User>()
//!     .error(errors::not_found())
//!     .with_scopes(["users:read", "users:admin"])
//!     .build();
//!
//! assert!(spec.declares(&errors::not_found()));
//! assert!(spec.access().auth_required);
//! assert_eq!(spec.output().name(), "User");
//! ```

use crate::error::ErrorDefinition;
use crate::handler::NoBody;
use crate::identity::Identity;
use http::{Method, StatusCode};
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Strips module paths from a type name.
///
/// `alloc::vec::Vec<my_app::User>` becomes `Vec<User>`.
#[must_use]
pub fn strip_type_path(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut token = String::new();
    let flush = |token: &mut String, out: &mut String| {
        if let Some(last) = token.rsplit("::").next() {
            out.push_str(last);
        }
        token.clear();
    };
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            token.push(c);
        } else {
            flush(&mut token, &mut out);
            out.push(c);
        }
    }
    flush(&mut token, &mut out);
    out
}

/// Bare, namespace-stripped name of `T`.
#[must_use]
pub fn bare_type_name<T: ?Sized>() -> String {
    strip_type_path(std::any::type_name::<T>())
}

/// A reference to a Rust type, as recorded on a spec.
#[derive(Clone)]
pub struct TypeRef {
    name: Arc<str>,
    full_name: &'static str,
    id: TypeId,
}

impl TypeRef {
    /// Captures `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: bare_type_name::<T>().into(),
            full_name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Bare name, e.g. `User`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified name, e.g. `my_app::model::User`.
    #[must_use]
    pub const fn full_name(&self) -> &'static str {
        self.full_name
    }

    /// Returns `true` for the [`NoBody`] placeholder.
    #[must_use]
    pub fn is_no_body(&self) -> bool {
        self.id == TypeId::of::<NoBody>()
    }

    /// Returns `true` if this refers to `T`.
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name)
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRef {}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Computes the per-caller threshold of a usage limit.
pub type ThresholdFn = Arc<dyn Fn(&dyn Identity) -> u64 + Send + Sync>;

/// A usage limit on one identity stat.
#[derive(Clone)]
pub struct UsageLimit {
    stat_key: String,
    threshold: ThresholdFn,
}

impl UsageLimit {
    /// Creates a limit on `stat_key`.
    pub fn new<F>(stat_key: impl Into<String>, threshold: F) -> Self
    where
        F: Fn(&dyn Identity) -> u64 + Send + Sync + 'static,
    {
        Self {
            stat_key: stat_key.into(),
            threshold: Arc::new(threshold),
        }
    }

    /// The stat this limit reads.
    #[must_use]
    pub fn stat_key(&self) -> &str {
        &self.stat_key
    }

    /// Threshold for `identity`. Usage at or above it is blocked.
    #[must_use]
    pub fn threshold_for(&self, identity: &dyn Identity) -> u64 {
        (self.threshold)(identity)
    }
}

impl fmt::Debug for UsageLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageLimit")
            .field("stat_key", &self.stat_key)
            .finish_non_exhaustive()
    }
}

impl Serialize for UsageLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("UsageLimit", 1)?;
        s.serialize_field("statKey", &self.stat_key)?;
        s.end()
    }
}

/// What a caller must satisfy to reach an endpoint.
///
/// Scope and role groups are OR within a group and AND across groups.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequirements {
    /// Whether an authenticated identity is required at all.
    pub auth_required: bool,
    /// Required scope groups.
    pub scope_groups: Vec<Vec<String>>,
    /// Required role groups.
    pub role_groups: Vec<Vec<String>>,
    /// Usage limits.
    pub usage_limits: Vec<UsageLimit>,
}

impl AccessRequirements {
    /// Every scope mentioned in any group, deduplicated in declaration order.
    #[must_use]
    pub fn all_scopes(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for scope in self.scope_groups.iter().flatten() {
            if !out.contains(&scope.as_str()) {
                out.push(scope);
            }
        }
        out
    }
}

/// Frozen description of one endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    name: String,
    #[serde(serialize_with = "serialize_method")]
    method: Method,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    tags: Vec<String>,
    deprecated: bool,
    path_params: Vec<String>,
    query_params: Vec<String>,
    input: TypeRef,
    output: TypeRef,
    #[serde(serialize_with = "serialize_status")]
    success_status: StatusCode,
    #[serde(serialize_with = "serialize_errors")]
    errors: Vec<ErrorDefinition>,
    access: AccessRequirements,
    streaming: bool,
}

impl EndpointSpec {
    /// Starts building a spec.
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        method: Method,
        path: impl Into<String>,
    ) -> EndpointSpecBuilder {
        EndpointSpecBuilder {
            spec: Self {
                name: name.into(),
                method,
                path: path.into(),
                summary: None,
                description: None,
                tags: Vec::new(),
                deprecated: false,
                path_params: Vec::new(),
                query_params: Vec::new(),
                input: TypeRef::of::<NoBody>(),
                output: TypeRef::of::<NoBody>(),
                success_status: StatusCode::OK,
                errors: Vec::new(),
                access: AccessRequirements::default(),
                streaming: false,
            },
        }
    }

    /// Endpoint name, also used as the operation id.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Path template, with `{param}` placeholders.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Short summary.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Long description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Grouping tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Whether the endpoint is deprecated.
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// Required path parameter names.
    #[must_use]
    pub fn path_params(&self) -> &[String] {
        &self.path_params
    }

    /// Optional query parameter names.
    #[must_use]
    pub fn query_params(&self) -> &[String] {
        &self.query_params
    }

    /// Input type.
    #[must_use]
    pub const fn input(&self) -> &TypeRef {
        &self.input
    }

    /// Output type. For streams, the per-event shape.
    #[must_use]
    pub const fn output(&self) -> &TypeRef {
        &self.output
    }

    /// Status written on success.
    #[must_use]
    pub const fn success_status(&self) -> StatusCode {
        self.success_status
    }

    /// Errors the handler may return.
    #[must_use]
    pub fn declared_errors(&self) -> &[ErrorDefinition] {
        &self.errors
    }

    /// Returns `true` if `error`'s code was declared.
    #[must_use]
    pub fn declares(&self, error: &ErrorDefinition) -> bool {
        self.declares_code(error.code())
    }

    /// Returns `true` if `code` was declared.
    #[must_use]
    pub fn declares_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.has_code(code))
    }

    /// Access requirements.
    #[must_use]
    pub const fn access(&self) -> &AccessRequirements {
        &self.access
    }

    /// Whether this is an event-stream endpoint.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Records `In` and `Out`, replacing whatever the builder declared.
    ///
    /// Binding a spec to a handler goes through this, so the handler's types
    /// always decide how bodies are read and written.
    #[must_use]
    pub fn with_io<In: 'static, Out: 'static>(mut self) -> Self {
        self.input = TypeRef::of::<In>();
        self.output = TypeRef::of::<Out>();
        self
    }

    /// Marks the spec as an event stream.
    #[must_use]
    pub fn into_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }
}

/// Mutable builder consumed into an [`EndpointSpec`].
#[derive(Debug)]
#[must_use = "a builder does nothing until `build` is called"]
pub struct EndpointSpecBuilder {
    spec: EndpointSpec,
}

impl EndpointSpecBuilder {
    /// Sets the summary.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.spec.summary = Some(summary.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.spec.description = Some(description.into());
        self
    }

    /// Adds a grouping tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.spec.tags.push(tag.into());
        self
    }

    /// Marks the endpoint deprecated.
    pub fn deprecated(mut self) -> Self {
        self.spec.deprecated = true;
        self
    }

    /// Declares a required path parameter.
    pub fn path_param(mut self, name: impl Into<String>) -> Self {
        self.spec.path_params.push(name.into());
        self
    }

    /// Declares an optional query parameter.
    pub fn query_param(mut self, name: impl Into<String>) -> Self {
        self.spec.query_params.push(name.into());
        self
    }

    /// Records input and output types.
    pub fn io<In: 'static, Out: 'static>(mut self) -> Self {
        self.spec.input = TypeRef::of::<In>();
        self.spec.output = TypeRef::of::<Out>();
        self
    }

    /// Overrides the success status (default 200).
    pub fn success_status(mut self, status: StatusCode) -> Self {
        self.spec.success_status = status;
        self
    }

    /// Declares an error the handler may return.
    ///
    /// Declaring the same code twice keeps the first definition.
    pub fn error(mut self, error: ErrorDefinition) -> Self {
        if !self.spec.declares(&error) {
            self.spec.errors.push(error);
        }
        self
    }

    /// Declares several errors.
    pub fn errors(self, errors: impl IntoIterator<Item = ErrorDefinition>) -> Self {
        errors.into_iter().fold(self, Self::error)
    }

    /// Requires an authenticated caller.
    pub fn require_auth(mut self) -> Self {
        self.spec.access.auth_required = true;
        self
    }

    /// Adds a scope group: the caller needs at least one of `scopes`.
    ///
    /// Each call adds a further group that must also be satisfied.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group: Vec<String> = scopes.into_iter().map(Into::into).collect();
        if !group.is_empty() {
            self.spec.access.scope_groups.push(group);
        }
        self.spec.access.auth_required = true;
        self
    }

    /// Adds a role group, with the same semantics as [`with_scopes`](Self::with_scopes).
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let group: Vec<String> = roles.into_iter().map(Into::into).collect();
        if !group.is_empty() {
            self.spec.access.role_groups.push(group);
        }
        self.spec.access.auth_required = true;
        self
    }

    /// Blocks callers whose `stat_key` usage reaches `threshold(identity)`.
    pub fn usage_limit<F>(mut self, stat_key: impl Into<String>, threshold: F) -> Self
    where
        F: Fn(&dyn Identity) -> u64 + Send + Sync + 'static,
    {
        self.spec
            .access
            .usage_limits
            .push(UsageLimit::new(stat_key, threshold));
        self.spec.access.auth_required = true;
        self
    }

    /// Marks the endpoint as an event stream.
    pub fn streaming(mut self) -> Self {
        self.spec.streaming = true;
        self
    }

    /// Freezes the spec.
    #[must_use]
    pub fn build(self) -> EndpointSpec {
        self.spec
    }
}

fn serialize_method<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(method.as_str())
}

fn serialize_status<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

fn serialize_errors<S: Serializer>(
    errors: &[ErrorDefinition],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Declared<'a> {
        code: &'a str,
        status: u16,
        message: &'a str,
        #[serde(rename = "detailsType", skip_serializing_if = "Option::is_none")]
        details_type: Option<String>,
    }

    let mut seq = serializer.serialize_seq(Some(errors.len()))?;
    for e in errors {
        seq.serialize_element(&Declared {
            code: e.code(),
            status: e.status().as_u16(),
            message: e.message(),
            details_type: e.details_type(),
        })?;
    }
    seq.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::errors;
    use crate::identity::CallerIdentity;

    mod model {
        pub struct Order;
    }

    #[test]
    fn test_strip_type_path() {
        assert_eq!(strip_type_path("a::b::User"), "User");
        assert_eq!(strip_type_path("alloc::vec::Vec<a::b::User>"), "Vec<User>");
        assert_eq!(strip_type_path("u64"), "u64");
    }

    #[test]
    fn test_type_ref() {
        let t = TypeRef::of::<model::Order>();
        assert_eq!(t.name(), "Order");
        assert!(t.full_name().ends_with("model::Order"));
        assert!(!t.is_no_body());
        assert!(TypeRef::of::<NoBody>().is_no_body());
    }

    #[test]
    fn test_defaults() {
        let spec = EndpointSpec::builder("health", Method::GET, "/health").build();
        assert_eq!(spec.success_status(), StatusCode::OK);
        assert!(spec.input().is_no_body());
        assert!(spec.output().is_no_body());
        assert!(!spec.access().auth_required);
        assert!(!spec.is_streaming());
        assert!(spec.declared_errors().is_empty());
    }

    #[test]
    fn test_with_io_replaces_declared_types() {
        let spec = EndpointSpec::builder("x", Method::POST, "/x")
            .io::<NoBody, NoBody>()
            .build()
            .with_io::<model::Order, String>()
            .into_streaming();
        assert!(spec.input().is::<model::Order>());
        assert!(spec.output().is::<String>());
        assert!(spec.is_streaming());
    }

    #[test]
    fn test_scope_groups_accumulate() {
        let spec = EndpointSpec::builder("x", Method::POST, "/x")
            .with_scopes(["a", "b"])
            .with_scopes(["c"])
            .build();
        assert!(spec.access().auth_required);
        assert_eq!(
            spec.access().scope_groups,
            vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]]
        );
        assert_eq!(spec.access().all_scopes(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_roles_and_limits_imply_auth() {
        let spec = EndpointSpec::builder("x", Method::GET, "/x")
            .with_roles(["admin"])
            .build();
        assert!(spec.access().auth_required);

        let spec = EndpointSpec::builder("y", Method::GET, "/y")
            .usage_limit("calls", |_| 10)
            .build();
        assert!(spec.access().auth_required);
        let limit = &spec.access().usage_limits[0];
        assert_eq!(limit.stat_key(), "calls");
        assert_eq!(limit.threshold_for(&CallerIdentity::new("u")), 10);
    }

    #[test]
    fn test_error_declaration_dedupes_by_code() {
        let spec = EndpointSpec::builder("x", Method::GET, "/x")
            .error(errors::not_found())
            .errors([errors::not_found().with_message("other"), errors::conflict()])
            .build();
        assert_eq!(spec.declared_errors().len(), 2);
        assert!(spec.declares_code("CONFLICT"));
        assert!(!spec.declares(&errors::forbidden()));
        assert_eq!(spec.declared_errors()[0].message(), "not found");
    }

    #[test]
    fn test_serialize_skips_threshold_functions() {
        let spec = EndpointSpec::builder("listOrders", Method::GET, "/orders")
            .query_param("status")
            .io::<NoBody, model::Order>()
            .error(errors::not_found())
            .usage_limit("orders_listed", |_| 5)
            .build();

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["method"], "GET");
        assert_eq!(json["successStatus"], 200);
        assert_eq!(json["output"], "Order");
        assert_eq!(json["errors"][0]["code"], "NOT_FOUND");
        assert_eq!(json["errors"][0]["status"], 404);
        assert_eq!(
            json["access"]["usageLimits"][0],
            serde_json::json!({"statKey": "orders_listed"})
        );
    }
}
