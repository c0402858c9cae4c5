//! Type metadata lookup.
//!
//! Rust has no runtime reflection, so field metadata is supplied by a
//! [`TypeScanner`]. Types can describe themselves through [`Describe`] and be
//! collected into a [`StaticScanner`].

use std::collections::HashMap;

use daedalus_core::spec::{bare_type_name, strip_type_path};

use crate::field::FieldDescriptor;

/// Resolves a bare type name to its fields.
pub trait TypeScanner: Send + Sync {
    /// Fields of `type_name`, or `None` if the type is unknown.
    fn fields(&self, type_name: &str) -> Option<Vec<FieldDescriptor>>;
}

impl<F> TypeScanner for F
where
    F: Fn(&str) -> Option<Vec<FieldDescriptor>> + Send + Sync,
{
    fn fields(&self, type_name: &str) -> Option<Vec<FieldDescriptor>> {
        self(type_name)
    }
}

/// A type that can list its own fields.
///
/// # Example
///
/// ```
/// use daedalus_schema::{Describe, FieldDescriptor, FieldType, StaticScanner, TypeScanner};
///
/// struct CreateUser;
///
/// impl Describe for CreateUser {
///     fn describe() -> Vec<FieldDescriptor> {
///         vec![FieldDescriptor::new("Name", FieldType::String)
///             .json("name")
///             .validate("required,min=1")]
///     }
/// }
///
/// let scanner = StaticScanner::new().register::<CreateUser>();
/// assert_eq!(scanner.fields("CreateUser").unwrap().len(), 1);
/// ```
pub trait Describe: 'static {
    /// Field descriptors, in declaration order.
    fn describe() -> Vec<FieldDescriptor>;
}

/// An in-memory scanner keyed by bare type name.
#[derive(Debug, Clone, Default)]
pub struct StaticScanner {
    types: HashMap<String, Vec<FieldDescriptor>>,
}

impl StaticScanner {
    /// Creates an empty scanner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a self-describing type.
    #[must_use]
    pub fn register<T: Describe>(mut self) -> Self {
        self.types.insert(bare_type_name::<T>(), T::describe());
        self
    }

    /// Registers fields under an explicit name.
    #[must_use]
    pub fn with(mut self, type_name: &str, fields: Vec<FieldDescriptor>) -> Self {
        self.insert(type_name, fields);
        self
    }

    /// Registers fields under an explicit name, in place.
    pub fn insert(&mut self, type_name: &str, fields: Vec<FieldDescriptor>) {
        self.types.insert(strip_type_path(type_name), fields);
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeScanner for StaticScanner {
    fn fields(&self, type_name: &str) -> Option<Vec<FieldDescriptor>> {
        self.types.get(type_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;

    #[test]
    fn test_unknown_type_is_none() {
        assert!(StaticScanner::new().fields("Nope").is_none());
    }

    #[test]
    fn test_explicit_names_are_stripped() {
        let scanner =
            StaticScanner::new().with("app::Tag", vec![FieldDescriptor::new("Name", FieldType::String)]);
        assert!(scanner.fields("Tag").is_some());
        assert_eq!(scanner.len(), 1);
    }

    #[test]
    fn test_closure_scanner() {
        let scanner = |name: &str| (name == "Empty").then(Vec::<FieldDescriptor>::new);
        assert_eq!(scanner.fields("Empty"), Some(Vec::new()));
        assert!(scanner.fields("Other").is_none());
    }
}
