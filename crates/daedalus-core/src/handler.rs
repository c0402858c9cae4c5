//! Handler trait for typed request processing.
//!
//! A [`Handler`] receives the per-request [`RequestContext`] by value plus the
//! decoded input, and resolves to an `anyhow::Result` of the output. Return an
//! [`ErrorDefinition`](crate::ErrorDefinition) (directly or wrapped in context)
//! to produce a documented error response; any other error becomes an opaque
//! 500.
//!
//! Async closures and functions implement the trait automatically:
//!
//! ```
//! use daedalus_core::{errors, Handler, RequestContext};
//!
//! async fn greet(ctx: RequestContext, name: String) -> anyhow::Result<String> {
//!     if name.is_empty() {
//!         return Err(errors::bad_request().with_message("name is empty").into());
//!     }
//!     Ok(format!("hello {name} ({})", ctx.endpoint()))
//! }
//!
//! fn assert_handler<H: Handler<String, String>>(_: &H) {}
//! assert_handler(&greet);
//! ```

use crate::context::RequestContext;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// An owned, sendable, boxed future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A typed request handler.
///
/// Object safe, so endpoints can hold `Arc<dyn Handler<In, Out>>`.
pub trait Handler<In, Out>: Send + Sync + 'static {
    /// Handles one request.
    ///
    /// # Errors
    ///
    /// Any error. Typed errors are matched against the endpoint's declared
    /// set; everything else is treated as an internal failure.
    fn call(&self, ctx: RequestContext, input: In) -> BoxFuture<'static, anyhow::Result<Out>>;
}

impl<F, Fut, In, Out> Handler<In, Out> for F
where
    F: Fn(RequestContext, In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Out>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext, input: In) -> BoxFuture<'static, anyhow::Result<Out>> {
        Box::pin(self(ctx, input))
    }
}

/// Placeholder for "no request body" or "no response body".
///
/// As an input, the body is never read. As an output, nothing is written.
/// Documents as an empty object and is suppressed from documented bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoBody {}
