//! Caller identity.
//!
//! The pipeline never authenticates anyone itself. An upstream layer resolves
//! the caller and attaches something implementing [`Identity`] to the routed
//! request; [`authorize`](../../daedalus_authz/fn.authorize.html) then asks it
//! for scopes, roles and usage counters.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// An authenticated (or anonymous) caller.
pub trait Identity: Send + Sync + fmt::Debug + 'static {
    /// Stable identifier of the caller.
    fn id(&self) -> &str;

    /// Tenant the caller belongs to, if any.
    fn tenant_id(&self) -> Option<&str> {
        None
    }

    /// Returns `true` if the caller was granted `scope`.
    fn has_scope(&self, scope: &str) -> bool;

    /// Returns `true` if the caller holds `role`.
    fn has_role(&self, role: &str) -> bool;

    /// Usage counters keyed by stat name.
    ///
    /// A key absent from the map counts as zero.
    fn stats(&self) -> HashMap<String, u64> {
        HashMap::new()
    }

    /// Returns `false` for the anonymous placeholder.
    fn is_authenticated(&self) -> bool {
        true
    }

    /// Identifier suitable for logs. Never contains secrets.
    fn log_id(&self) -> String {
        match self.tenant_id() {
            Some(tenant) => format!("{tenant}/{}", self.id()),
            None => self.id().to_string(),
        }
    }
}

/// Placeholder used when no identity was attached to the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoIdentity;

impl Identity for NoIdentity {
    fn id(&self) -> &str {
        "anonymous"
    }

    fn has_scope(&self, _scope: &str) -> bool {
        false
    }

    fn has_role(&self, _role: &str) -> bool {
        false
    }

    fn is_authenticated(&self) -> bool {
        false
    }
}

/// A ready-made [`Identity`] for callers resolved from tokens or keys.
///
/// # Example
///
/// ```
/// use daedalus_core::{CallerIdentity, Identity};
///
/// let caller = CallerIdentity::new("u-1")
///     .with_tenant("acme")
///     .with_scopes(["orders:read"])
///     .with_stat("requests_today", 12);
///
/// assert!(caller.has_scope("orders:read"));
/// assert_eq!(caller.stats()["requests_today"], 12);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    id: String,
    tenant_id: Option<String>,
    scopes: HashSet<String>,
    roles: HashSet<String>,
    stats: HashMap<String, u64>,
}

impl CallerIdentity {
    /// Creates an identity with no scopes, roles or stats.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Grants scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Grants roles.
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Records a usage counter.
    #[must_use]
    pub fn with_stat(mut self, key: impl Into<String>, value: u64) -> Self {
        self.stats.insert(key.into(), value);
        self
    }
}

impl Identity for CallerIdentity {
    fn id(&self) -> &str {
        &self.id
    }

    fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    fn stats(&self) -> HashMap<String, u64> {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_identity_is_anonymous() {
        let id = NoIdentity;
        assert!(!id.is_authenticated());
        assert!(!id.has_scope("anything"));
        assert!(!id.has_role("admin"));
        assert!(id.stats().is_empty());
        assert_eq!(id.log_id(), "anonymous");
    }

    #[test]
    fn test_caller_identity_builder() {
        let id = CallerIdentity::new("u-7")
            .with_tenant("acme")
            .with_scopes(["a", "b"])
            .with_roles(["admin"])
            .with_stat("calls", 3);

        assert!(id.is_authenticated());
        assert!(id.has_scope("a"));
        assert!(!id.has_scope("c"));
        assert!(id.has_role("admin"));
        assert_eq!(id.stats().get("calls"), Some(&3));
        assert_eq!(id.log_id(), "acme/u-7");
    }
}
