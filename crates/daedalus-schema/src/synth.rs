//! Schema synthesis from scanned type metadata.
//!
//! [`SchemaSynthesizer`] builds one component schema per named type and
//! returns `$ref`s to them. Every related type is visited exactly once, keyed
//! by a processed-name set, so cyclic type graphs terminate.

use std::collections::HashSet;

use daedalus_core::spec::{bare_type_name, strip_type_path};
use daedalus_core::NoBody;
use indexmap::IndexMap;
use serde_json::Value;

use crate::field::{FieldDescriptor, FieldType, TAG_DESCRIPTION, TAG_EXAMPLE, TAG_JSON, TAG_VALIDATE};
use crate::scanner::TypeScanner;
use crate::schema::{Schema, SchemaType};
use crate::translate::translate;

/// Builds component schemas for named types.
///
/// # Example
///
/// ```
/// use daedalus_schema::{FieldDescriptor, FieldType, SchemaSynthesizer, StaticScanner};
///
/// let scanner = StaticScanner::new().with(
///     "Node",
///     vec![
///         FieldDescriptor::new("Value", FieldType::Integer).json("value"),
///         FieldDescriptor::new("Next", FieldType::pointer(FieldType::named_str("Node")))
///             .json("next,omitempty"),
///     ],
/// );
///
/// let mut synth = SchemaSynthesizer::new(&scanner);
/// let node = synth.reference("Node");
/// assert_eq!(node.referenced_component(), Some("Node"));
///
/// let components = synth.into_components();
/// assert_eq!(components.len(), 1);
/// assert_eq!(components["Node"].required, vec!["value".to_string()]);
/// ```
pub struct SchemaSynthesizer<'a> {
    scanner: &'a dyn TypeScanner,
    components: IndexMap<String, Schema>,
    processed: HashSet<String>,
}

impl<'a> SchemaSynthesizer<'a> {
    /// Creates a synthesizer reading fields from `scanner`.
    #[must_use]
    pub fn new(scanner: &'a dyn TypeScanner) -> Self {
        Self {
            scanner,
            components: IndexMap::new(),
            processed: HashSet::new(),
        }
    }

    /// Synthesizes `type_name` (and everything it references) and returns a
    /// `$ref` to its component.
    pub fn reference(&mut self, type_name: &str) -> Schema {
        let name = strip_type_path(type_name);
        self.register(&name);
        Schema::component_ref(&name)
    }

    /// Synthesizes `type_name` and returns its component schema.
    pub fn component(&mut self, type_name: &str) -> Schema {
        let name = strip_type_path(type_name);
        self.register(&name);
        self.components.get(&name).cloned().unwrap_or_default()
    }

    /// Schema for a Rust type given by its full name.
    ///
    /// Wrappers and primitives are lowered first, so `Vec<User>` becomes an
    /// array of `$ref`s to `User` rather than a component of its own.
    pub fn type_schema(&mut self, full_name: &str) -> Schema {
        self.schema_for(&FieldType::from_type_name(full_name))
    }

    /// Schema for a field type, registering any named types it mentions.
    pub fn schema_for(&mut self, ty: &FieldType) -> Schema {
        match ty {
            FieldType::String => Schema::string(),
            FieldType::Integer => Schema::integer(),
            FieldType::Number => Schema::number(),
            FieldType::Boolean => Schema::boolean(),
            FieldType::DateTime => {
                let mut s = Schema::string();
                s.format = Some("date-time".into());
                s
            }
            FieldType::Pointer(inner) => self.schema_for(inner),
            FieldType::Array(element) => Schema::array(self.schema_for(element)),
            FieldType::Map => Schema::free_form(),
            FieldType::Named(name) => self.reference(name),
        }
    }

    /// Components synthesized so far, in first-seen order.
    #[must_use]
    pub fn components(&self) -> &IndexMap<String, Schema> {
        &self.components
    }

    /// Consumes the synthesizer, returning its components.
    #[must_use]
    pub fn into_components(self) -> IndexMap<String, Schema> {
        self.components
    }

    fn register(&mut self, name: &str) {
        if !self.processed.insert(name.to_string()) {
            return;
        }
        // Reserve the slot so parents precede the types they reference.
        self.components.insert(name.to_string(), Schema::object());

        let schema = if name == bare_type_name::<NoBody>() {
            Schema::object()
        } else if let Some(fields) = self.scanner.fields(name) {
            self.object_schema(&fields)
        } else {
            tracing::debug!(type_name = name, "no field metadata, using an empty object");
            Schema::object()
        };

        self.components.insert(name.to_string(), schema);
    }

    fn object_schema(&mut self, fields: &[FieldDescriptor]) -> Schema {
        let mut object = Schema::object();
        for field in fields {
            let Some((wire, required)) = wire_name(field) else {
                continue;
            };
            let schema = self.field_schema(field);
            if required {
                object.required.push(wire.clone());
            }
            object.properties.insert(wire, schema);
        }
        object
    }

    fn field_schema(&mut self, field: &FieldDescriptor) -> Schema {
        let mut schema = self.schema_for(&field.ty);

        if let Some(rules) = field.get_tag(TAG_VALIDATE) {
            translate(rules, &field.ty).apply_to(&mut schema);
        }
        if let Some(description) = field.get_tag(TAG_DESCRIPTION) {
            schema.description = Some(description.to_string());
        }
        if let Some(example) = field.get_tag(TAG_EXAMPLE) {
            schema.example = Some(retype_example(example, schema.schema_type));
        }

        schema
    }
}

/// Wire name and requiredness of a field, or `None` if it is not serialized.
fn wire_name(field: &FieldDescriptor) -> Option<(String, bool)> {
    let Some(tag) = field.get_tag(TAG_JSON) else {
        return Some((field.name.to_lowercase(), true));
    };

    let mut parts = tag.split(',');
    let first = parts.next().unwrap_or_default();
    if first == "-" {
        return None;
    }
    let omitempty = parts.any(|p| p.trim() == "omitempty");
    let name = if first.is_empty() {
        field.name.to_lowercase()
    } else {
        first.to_string()
    };
    Some((name, !omitempty))
}

/// Parses an example tag into the schema's type.
fn retype_example(raw: &str, schema_type: Option<SchemaType>) -> Value {
    let parsed = match schema_type {
        Some(SchemaType::Integer) => raw.trim().parse::<i64>().ok().map(Value::from),
        Some(SchemaType::Number) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Some(SchemaType::Boolean) => raw.trim().parse::<bool>().ok().map(Value::Bool),
        Some(SchemaType::Array) => Some(Value::Array(
            raw.split(',')
                .map(|s| Value::String(s.trim().to_string()))
                .collect(),
        )),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_string()))
}
