//! # Daedalus Schema
//!
//! Schema synthesis and OpenAPI document assembly.
//!
//! Field metadata comes from a [`TypeScanner`]. Validation rule tags are
//! translated into schema constraints by [`translate`], [`SchemaSynthesizer`]
//! turns each named type into one component schema, and [`DocumentBuilder`]
//! assembles a whole [`Document`] from a set of endpoint specs.
//!
//! ## Example
//!
//! ```
//! use daedalus_core::{errors, EndpointSpec};
//! use daedalus_schema::{DocumentBuilder, FieldDescriptor, FieldType, StaticScanner};
//! use http::Method;
//!
//! struct Order;
//!
//! let scanner = StaticScanner::new().with(
//!     "Order",
//!     vec![
//!         FieldDescriptor::new("ID", FieldType::String).json("id").validate("uuid"),
//!         FieldDescriptor::new("Total", FieldType::Number).json("total").validate("gte=0"),
//!     ],
//! );
//!
//! let spec = EndpointSpec::builder("getOrder", Method::GET, "/orders/{id}")
//!     .io::<daedalus_core::NoBody, Order>()
//!     .error(errors::not_found())
//!     .build();
//!
//! let doc = DocumentBuilder::new("Orders", "1.0.0").build(&[spec], &scanner).unwrap();
//! let order = &doc.components.as_ref().unwrap().schemas["Order"];
//! assert_eq!(order.properties["total"].minimum, Some(0.0));
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-schema/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod document;
mod error;
mod field;
mod scanner;
mod schema;
mod synth;
mod translate;

pub use document::{
    Components, Document, DocumentBuilder, Info, MediaType, Operation, Parameter, ParameterIn,
    PathItem, RequestBody, Response, SecurityRequirement, SecurityScheme, Server, Tag,
    ERROR_COMPONENT, OPENAPI_VERSION,
};
pub use error::{SchemaError, SchemaResult};
pub use field::{
    parse_tags, FieldDescriptor, FieldType, TAG_DESCRIPTION, TAG_EXAMPLE, TAG_JSON, TAG_VALIDATE,
};
pub use scanner::{Describe, StaticScanner, TypeScanner};
pub use schema::{AdditionalProperties, Schema, SchemaKind, SchemaType, COMPONENT_PREFIX};
pub use synth::SchemaSynthesizer;
pub use translate::{translate, Constraints};
