//! # Daedalus Core
//!
//! Core types for turning typed callbacks into documented HTTP endpoints.
//!
//! - [`ErrorDefinition`] and the [`errors`] library - immutable, code-matched typed errors
//! - [`EndpointSpec`] - frozen per-endpoint metadata, built with [`EndpointSpecBuilder`]
//! - [`Identity`] - the caller, as resolved upstream
//! - [`RequestContext`] - per-request state handed to handlers
//! - [`Handler`] - the typed callback trait
//! - [`Validator`] and [`Observer`] - seams for the validation engine and diagnostics

#![doc(html_root_url = "https://docs.rs/daedalus-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cancel;
mod context;
mod error;
mod handler;
mod identity;
mod params;
pub mod signal;
pub mod spec;
mod validate;

pub use cancel::CancelSignal;
pub use context::{RequestContext, RequestId};
pub use error::{codes, errors, find_definition, Cause, ErrorBody, ErrorDefinition};
pub use handler::{BoxFuture, Handler, NoBody};
pub use identity::{CallerIdentity, Identity, NoIdentity};
pub use params::Params;
pub use signal::{Observer, Observers, Severity, Signal};
pub use spec::{AccessRequirements, EndpointSpec, EndpointSpecBuilder, TypeRef, UsageLimit};
pub use validate::{NoopValidator, ValidationViolation, Validator};
