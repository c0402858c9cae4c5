//! Validation rule to schema constraint translation.
//!
//! [`translate`] turns a rule string such as `required,min=3,max=64,email`
//! into the schema constraints it implies for a field of a given type. It is
//! total: unknown rules and unparsable parameters are dropped so that
//! documentation degrades rather than fails.
//!
//! | rule | numeric | string | array |
//! |---|---|---|---|
//! | `min=N` / `max=N` | minimum / maximum | minLength / maxLength | no-op |
//! | `gte=N` / `lte=N` | minimum / maximum | no-op | no-op |
//! | `gt=N` / `lt=N` | exclusive minimum / maximum | no-op | no-op |
//! | `len=N` | no-op | minLength = maxLength | minItems = maxItems |
//! | `unique` | no-op | no-op | uniqueItems |
//!
//! Format rules (`email`, `url`, `uuid`, `uuid4`, `uuid5`, `datetime`,
//! `ipv4`, `ipv6`) apply to any type. `oneof=a b c` becomes an enum with each
//! token coerced to the field type. `required` is a no-op here; requiredness
//! comes from the serialization tag.

use serde_json::Value;

use crate::field::FieldType;
use crate::schema::Schema;

/// Constraints implied by a rule string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    /// Numeric lower bound.
    pub minimum: Option<f64>,
    /// Numeric upper bound.
    pub maximum: Option<f64>,
    /// Whether the lower bound is exclusive.
    pub exclusive_minimum: bool,
    /// Whether the upper bound is exclusive.
    pub exclusive_maximum: bool,
    /// Minimum string length.
    pub min_length: Option<u64>,
    /// Maximum string length.
    pub max_length: Option<u64>,
    /// Minimum array length.
    pub min_items: Option<u64>,
    /// Maximum array length.
    pub max_items: Option<u64>,
    /// Whether array items must be unique.
    pub unique_items: bool,
    /// String format.
    pub format: Option<String>,
    /// Allowed values.
    pub enum_values: Vec<Value>,
}

impl Constraints {
    /// Returns `true` if no rule produced a constraint.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Writes every set constraint onto `schema`, leaving the rest alone.
    pub fn apply_to(&self, schema: &mut Schema) {
        if let Some(v) = self.minimum {
            schema.minimum = Some(v);
        }
        if let Some(v) = self.maximum {
            schema.maximum = Some(v);
        }
        if self.exclusive_minimum {
            schema.exclusive_minimum = true;
        }
        if self.exclusive_maximum {
            schema.exclusive_maximum = true;
        }
        if let Some(v) = self.min_length {
            schema.min_length = Some(v);
        }
        if let Some(v) = self.max_length {
            schema.max_length = Some(v);
        }
        if let Some(v) = self.min_items {
            schema.min_items = Some(v);
        }
        if let Some(v) = self.max_items {
            schema.max_items = Some(v);
        }
        if self.unique_items {
            schema.unique_items = true;
        }
        if let Some(format) = &self.format {
            schema.format = Some(format.clone());
        }
        if !self.enum_values.is_empty() {
            schema.enum_values = self.enum_values.clone();
        }
    }
}

/// How a resolved field type behaves under the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Integer,
    Number,
    String,
    Boolean,
    Array,
    Other,
}

impl Shape {
    fn of(ty: &FieldType) -> Self {
        match ty.resolved() {
            FieldType::Integer => Self::Integer,
            FieldType::Number => Self::Number,
            FieldType::String => Self::String,
            FieldType::Boolean => Self::Boolean,
            FieldType::Array(_) => Self::Array,
            _ => Self::Other,
        }
    }

    const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}

/// Translates `rules` for a field of type `ty`.
///
/// # Example
///
/// ```
/// use daedalus_schema::{translate, FieldType};
///
/// let c = translate("required,min=3,max=3", &FieldType::String);
/// assert_eq!(c.min_length, Some(3));
/// assert_eq!(c.max_length, Some(3));
///
/// let c = translate("len=5", &FieldType::array(FieldType::Integer));
/// assert_eq!((c.min_items, c.max_items), (Some(5), Some(5)));
/// ```
#[must_use]
pub fn translate(rules: &str, ty: &FieldType) -> Constraints {
    let shape = Shape::of(ty);
    let mut c = Constraints::default();

    for token in rules.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (name, param) = match token.split_once('=') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (token, None),
        };

        match (name, param) {
            ("min", Some(p)) => match shape {
                s if s.is_numeric() => {
                    set_f64(&mut c.minimum, p);
                }
                Shape::String => {
                    set_u64(&mut c.min_length, p);
                }
                _ => {}
            },
            ("max", Some(p)) => match shape {
                s if s.is_numeric() => {
                    set_f64(&mut c.maximum, p);
                }
                Shape::String => {
                    set_u64(&mut c.max_length, p);
                }
                _ => {}
            },
            ("gte", Some(p)) if shape.is_numeric() => {
                set_f64(&mut c.minimum, p);
            }
            ("lte", Some(p)) if shape.is_numeric() => {
                set_f64(&mut c.maximum, p);
            }
            ("gt", Some(p)) if shape.is_numeric() => {
                if set_f64(&mut c.minimum, p) {
                    c.exclusive_minimum = true;
                }
            }
            ("lt", Some(p)) if shape.is_numeric() => {
                if set_f64(&mut c.maximum, p) {
                    c.exclusive_maximum = true;
                }
            }
            ("len", Some(p)) => match shape {
                Shape::Array => {
                    if set_u64(&mut c.min_items, p) {
                        c.max_items = c.min_items;
                    }
                }
                Shape::String => {
                    if set_u64(&mut c.min_length, p) {
                        c.max_length = c.min_length;
                    }
                }
                _ => {}
            },
            ("unique", None) if shape == Shape::Array => c.unique_items = true,
            ("email", None) => c.format = Some("email".into()),
            ("url", None) => c.format = Some("uri".into()),
            ("uuid" | "uuid4" | "uuid5", None) => c.format = Some("uuid".into()),
            ("datetime", _) => c.format = Some("date-time".into()),
            ("ipv4", None) => c.format = Some("ipv4".into()),
            ("ipv6", None) => c.format = Some("ipv6".into()),
            ("oneof", Some(p)) => {
                c.enum_values = p.split_whitespace().map(|v| coerce(v, shape)).collect();
            }
            _ => {}
        }
    }

    c
}

/// Parses `param` into `slot`; returns whether it parsed.
fn set_f64(slot: &mut Option<f64>, param: &str) -> bool {
    match param.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            *slot = Some(v);
            true
        }
        _ => false,
    }
}

fn set_u64(slot: &mut Option<u64>, param: &str) -> bool {
    match param.parse::<u64>() {
        Ok(v) => {
            *slot = Some(v);
            true
        }
        Err(_) => false,
    }
}

/// Coerces an enum token to the field's type, falling back to a string.
fn coerce(token: &str, shape: Shape) -> Value {
    let coerced = match shape {
        Shape::Integer => token.parse::<i64>().ok().map(Value::from),
        Shape::Number => token
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Shape::Boolean => token.parse::<bool>().ok().map(Value::Bool),
        _ => None,
    };
    coerced.unwrap_or_else(|| Value::String(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn array() -> FieldType {
        FieldType::array(FieldType::String)
    }

    #[test]
    fn test_min_max_by_type() {
        let c = translate("min=1,max=10", &FieldType::Integer);
        assert_eq!((c.minimum, c.maximum), (Some(1.0), Some(10.0)));
        assert_eq!((c.min_length, c.max_length), (None, None));

        let c = translate("min=3,max=3", &FieldType::String);
        assert_eq!((c.min_length, c.max_length), (Some(3), Some(3)));
        assert_eq!(c.minimum, None);

        let c = translate("min=1,max=5", &array());
        assert!(c.is_empty());
    }

    #[test]
    fn test_inclusive_and_exclusive_bounds() {
        let c = translate("gte=0,lte=100", &FieldType::Number);
        assert_eq!((c.minimum, c.maximum), (Some(0.0), Some(100.0)));
        assert!(!c.exclusive_minimum && !c.exclusive_maximum);

        let c = translate("gt=0,lt=1", &FieldType::Number);
        assert_eq!((c.minimum, c.maximum), (Some(0.0), Some(1.0)));
        assert!(c.exclusive_minimum && c.exclusive_maximum);

        assert!(translate("gt=0,lte=4", &FieldType::String).is_empty());
    }

    #[test]
    fn test_len() {
        let c = translate("len=5", &array());
        assert_eq!((c.min_items, c.max_items), (Some(5), Some(5)));

        let c = translate("len=8", &FieldType::String);
        assert_eq!((c.min_length, c.max_length), (Some(8), Some(8)));
    }

    #[test]
    fn test_pointer_is_transparent() {
        let ty = FieldType::pointer(FieldType::Integer);
        assert_eq!(translate("min=2", &ty).minimum, Some(2.0));

        let ty = FieldType::pointer(array());
        assert!(translate("unique", &ty).unique_items);
    }

    #[test]
    fn test_formats_apply_to_any_type() {
        assert_eq!(translate("email", &FieldType::String).format.as_deref(), Some("email"));
        assert_eq!(translate("url", &FieldType::String).format.as_deref(), Some("uri"));
        for rule in ["uuid", "uuid4", "uuid5"] {
            assert_eq!(translate(rule, &FieldType::String).format.as_deref(), Some("uuid"));
        }
        assert_eq!(
            translate("datetime", &FieldType::Integer).format.as_deref(),
            Some("date-time")
        );
        assert_eq!(translate("ipv4", &FieldType::String).format.as_deref(), Some("ipv4"));
        assert_eq!(translate("ipv6", &FieldType::String).format.as_deref(), Some("ipv6"));
    }

    #[test]
    fn test_oneof_coercion() {
        let c = translate("oneof=1 2 x", &FieldType::Integer);
        assert_eq!(c.enum_values, vec![json!(1), json!(2), json!("x")]);

        let c = translate("oneof=true false", &FieldType::Boolean);
        assert_eq!(c.enum_values, vec![json!(true), json!(false)]);

        let c = translate("oneof=red green", &FieldType::String);
        assert_eq!(c.enum_values, vec![json!("red"), json!("green")]);

        let c = translate("oneof=0.5 1.5", &FieldType::Number);
        assert_eq!(c.enum_values, vec![json!(0.5), json!(1.5)]);
    }

    #[test]
    fn test_garbage_is_dropped() {
        assert!(translate("required,omitempty,dive,bogus=1", &FieldType::String).is_empty());
        assert!(translate("min=abc,max=", &FieldType::Integer).is_empty());
        assert!(translate("len=-1", &array()).is_empty());
        assert!(translate(",,  ,", &FieldType::String).is_empty());
    }

    #[test]
    fn test_apply_to_overwrites_only_set_fields() {
        let mut schema = Schema::string().with_description("kept");
        schema.max_length = Some(99);
        translate("min=2,email", &FieldType::String).apply_to(&mut schema);

        assert_eq!(schema.min_length, Some(2));
        assert_eq!(schema.max_length, Some(99));
        assert_eq!(schema.format.as_deref(), Some("email"));
        assert_eq!(schema.description.as_deref(), Some("kept"));
    }
}
