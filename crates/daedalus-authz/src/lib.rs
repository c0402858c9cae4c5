//! # Daedalus Authorization
//!
//! Decides whether a resolved [`Identity`] may reach an endpoint, given the
//! endpoint's [`AccessRequirements`].
//!
//! The decision runs in a fixed order and stops at the first unmet
//! requirement:
//!
//! 1. authentication, if required at all
//! 2. scope groups (one matching scope per group, every group)
//! 3. role groups (same algorithm)
//! 4. usage limits (`stats[key]`, absent = 0, blocked when `usage >= threshold`)
//!
//! The [`Denial`] says which requirement failed, and maps onto 401, 403 or 429.
//!
//! # Example
//!
//! ```
//! use daedalus_authz::{authorize, Denial};
//! use daedalus_core::{CallerIdentity, EndpointSpec};
//! use http::Method;
//!
//! let spec = EndpointSpec::builder("export", Method::POST, "/export")
//!     .with_scopes(["export:run"])
//!     .usage_limit("exports_today", |_| 3)
//!     .build();
//!
//! let caller = CallerIdentity::new("u-1")
//!     .with_scopes(["export:run"])
//!     .with_stat("exports_today", 3);
//!
//! let denial = authorize(spec.access(), &caller).unwrap_err();
//! assert!(matches!(denial, Denial::UsageExceeded { .. }));
//! assert_eq!(denial.status().as_u16(), 429);
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-authz/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use daedalus_core::{errors, AccessRequirements, ErrorDefinition, Identity};
use http::{HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Rate limit header names written on usage denials.
pub mod headers {
    /// Threshold that applied to the caller.
    pub const LIMIT: &str = "x-ratelimit-limit";
    /// Calls left before the threshold. Always zero on a denial.
    pub const REMAINING: &str = "x-ratelimit-remaining";
}

/// Why a caller was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Denial {
    /// No authenticated identity.
    #[error("authentication required")]
    Unauthenticated,

    /// None of the scopes in a required group were granted.
    #[error("missing one of scopes [{}]", .group.join(", "))]
    MissingScope {
        /// The unmet group.
        group: Vec<String>,
    },

    /// None of the roles in a required group are held.
    #[error("missing one of roles [{}]", .group.join(", "))]
    MissingRole {
        /// The unmet group.
        group: Vec<String>,
    },

    /// A usage counter reached its threshold.
    #[error("usage of `{stat_key}` at {usage}, limit {threshold}")]
    UsageExceeded {
        /// The stat that was checked.
        stat_key: String,
        /// Current usage.
        usage: u64,
        /// Threshold for this caller.
        threshold: u64,
    },
}

impl Denial {
    /// Response status for this denial.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::MissingScope { .. } | Self::MissingRole { .. } => StatusCode::FORBIDDEN,
            Self::UsageExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// The standard error written for this denial.
    ///
    /// Scope and role denials carry the unmet group as details; usage denials
    /// carry the stat key, usage and threshold.
    #[must_use]
    pub fn to_error(&self) -> ErrorDefinition {
        match self {
            Self::Unauthenticated => errors::unauthorized(),
            Self::MissingScope { .. } | Self::MissingRole { .. } => errors::forbidden()
                .with_message(self.to_string())
                .with_details(self),
            Self::UsageExceeded { .. } => errors::rate_limited().with_details(self),
        }
    }

    /// Extra response headers for this denial.
    #[must_use]
    pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        match self {
            Self::UsageExceeded { threshold, .. } => vec![
                (
                    HeaderName::from_static(headers::LIMIT),
                    HeaderValue::from(*threshold),
                ),
                (
                    HeaderName::from_static(headers::REMAINING),
                    HeaderValue::from_static("0"),
                ),
            ],
            _ => Vec::new(),
        }
    }
}

/// Checks `identity` against `requirements`.
///
/// # Errors
///
/// Returns the first unmet requirement as a [`Denial`].
pub fn authorize(
    requirements: &AccessRequirements,
    identity: &dyn Identity,
) -> Result<(), Denial> {
    if !requirements.auth_required {
        return Ok(());
    }

    if !identity.is_authenticated() {
        return Err(Denial::Unauthenticated);
    }

    if let Some(group) = first_unmet(&requirements.scope_groups, |s| identity.has_scope(s)) {
        tracing::debug!(caller = %identity.log_id(), ?group, "scope requirement not met");
        return Err(Denial::MissingScope { group });
    }

    if let Some(group) = first_unmet(&requirements.role_groups, |r| identity.has_role(r)) {
        tracing::debug!(caller = %identity.log_id(), ?group, "role requirement not met");
        return Err(Denial::MissingRole { group });
    }

    if !requirements.usage_limits.is_empty() {
        let stats = identity.stats();
        for limit in &requirements.usage_limits {
            let usage = stats.get(limit.stat_key()).copied().unwrap_or(0);
            let threshold = limit.threshold_for(identity);
            if usage >= threshold {
                tracing::debug!(
                    caller = %identity.log_id(),
                    stat_key = limit.stat_key(),
                    usage,
                    threshold,
                    "usage limit reached"
                );
                return Err(Denial::UsageExceeded {
                    stat_key: limit.stat_key().to_string(),
                    usage,
                    threshold,
                });
            }
        }
    }

    Ok(())
}

/// First group with no satisfied member.
fn first_unmet(groups: &[Vec<String>], granted: impl Fn(&str) -> bool) -> Option<Vec<String>> {
    groups
        .iter()
        .find(|group| !group.iter().any(|member| granted(member.as_str())))
        .cloned()
}
