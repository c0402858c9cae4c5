//! Struct-tag validation seam.
//!
//! The pipeline validates decoded inputs (and, optionally, outputs) against
//! their tag rules through a [`Validator`]. The engine itself lives outside
//! this crate; anything that can check a JSON value for a named type plugs in.

use serde::{Deserialize, Serialize};

/// A single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationViolation {
    /// Wire name of the offending field.
    pub field: String,
    /// The rule that failed, e.g. `required` or `min`.
    pub rule: String,
    /// The offending value, rendered as text.
    pub value: String,
}

impl ValidationViolation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        rule: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
            value: value.into(),
        }
    }
}

/// Checks a decoded value against the tag rules of its type.
///
/// `type_name` is the bare type name as reported by
/// [`TypeRef::name`](crate::TypeRef::name).
pub trait Validator: Send + Sync + 'static {
    /// Returns every violation found, or `Ok(())` if the value is valid.
    fn validate(
        &self,
        type_name: &str,
        value: &serde_json::Value,
    ) -> Result<(), Vec<ValidationViolation>>;
}

impl<F> Validator for F
where
    F: Fn(&str, &serde_json::Value) -> Result<(), Vec<ValidationViolation>>
        + Send
        + Sync
        + 'static,
{
    fn validate(
        &self,
        type_name: &str,
        value: &serde_json::Value,
    ) -> Result<(), Vec<ValidationViolation>> {
        self(type_name, value)
    }
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(&self, _: &str, _: &serde_json::Value) -> Result<(), Vec<ValidationViolation>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closure_validator() {
        let validator = |ty: &str, value: &serde_json::Value| {
            if ty == "CreateUser" && value["name"] == "" {
                Err(vec![ValidationViolation::new("name", "required", "")])
            } else {
                Ok(())
            }
        };

        assert!(validator.validate("CreateUser", &json!({"name": "ada"})).is_ok());
        let violations = validator
            .validate("CreateUser", &json!({"name": ""}))
            .unwrap_err();
        assert_eq!(violations[0].rule, "required");
    }

    #[test]
    fn test_noop_accepts_anything() {
        assert!(NoopValidator.validate("Anything", &json!(null)).is_ok());
    }
}
