//! Field metadata as reported by a type scanner.

use std::sync::OnceLock;

use daedalus_core::spec::{bare_type_name, strip_type_path};
use indexmap::IndexMap;
use regex::Regex;

/// Serialization tag key: `name[,omitempty]`, or `-` to drop the field.
pub const TAG_JSON: &str = "json";
/// Validation rule tag key: comma-separated `rule` or `rule=param` tokens.
pub const TAG_VALIDATE: &str = "validate";
/// Documentation tag key, copied verbatim.
pub const TAG_DESCRIPTION: &str = "description";
/// Example tag key, re-typed to the field's schema type.
pub const TAG_EXAMPLE: &str = "example";

/// Declared semantic type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Text.
    String,
    /// Whole numbers.
    Integer,
    /// Floating point numbers.
    Number,
    /// `true` / `false`.
    Boolean,
    /// A point in time, written as an RFC 3339 string.
    DateTime,
    /// An optional or boxed value; transparent for schema purposes.
    Pointer(Box<FieldType>),
    /// A sequence of the element type.
    Array(Box<FieldType>),
    /// A string-keyed map with free-form values.
    Map,
    /// Any other type, referenced by name.
    Named(String),
}

impl FieldType {
    /// `Pointer(inner)`.
    #[must_use]
    pub fn pointer(inner: FieldType) -> Self {
        Self::Pointer(Box::new(inner))
    }

    /// `Array(element)`.
    #[must_use]
    pub fn array(element: FieldType) -> Self {
        Self::Array(Box::new(element))
    }

    /// `Named` with the bare name of `T`.
    #[must_use]
    pub fn named<T: ?Sized>() -> Self {
        Self::Named(bare_type_name::<T>())
    }

    /// `Named` with `name`, stripped of any module path.
    #[must_use]
    pub fn named_str(name: &str) -> Self {
        Self::Named(strip_type_path(name))
    }

    /// Lowers a Rust type name, as reported by [`std::any::type_name`], into a
    /// field type.
    ///
    /// Collections and wrappers from `std` become arrays, pointers and maps;
    /// primitives map to their schema kind. Anything else is `Named`.
    ///
    /// ```
    /// use daedalus_schema::FieldType;
    ///
    /// assert_eq!(
    ///     FieldType::from_type_name("alloc::vec::Vec<app::User>"),
    ///     FieldType::array(FieldType::named_str("User"))
    /// );
    /// assert_eq!(FieldType::from_type_name("alloc::string::String"), FieldType::String);
    /// ```
    #[must_use]
    pub fn from_type_name(full: &str) -> Self {
        let full = strip_reference(full.trim());

        if let Some(inner) = full.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let element = inner.split(';').next().unwrap_or_default();
            return Self::array(Self::from_type_name(element));
        }

        let (head, args) = match full.find('<') {
            Some(open) if full.ends_with('>') => {
                (&full[..open], split_generic_args(&full[open + 1..full.len() - 1]))
            }
            _ => (full, Vec::new()),
        };
        let base = head.rsplit("::").next().unwrap_or(head);
        let first = || args.first().map_or(Self::Map, |arg| Self::from_type_name(arg));

        match base {
            "String" | "str" | "char" | "Uuid" => Self::String,
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
            | "u128" | "usize" => Self::Integer,
            "f32" | "f64" => Self::Number,
            "bool" => Self::Boolean,
            "DateTime" | "SystemTime" | "OffsetDateTime" => Self::DateTime,
            "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "IndexSet" | "SmallVec" => {
                Self::array(first())
            }
            "Option" | "Box" | "Arc" | "Rc" => Self::pointer(first()),
            "HashMap" | "BTreeMap" | "IndexMap" => Self::Map,
            "Value" if head.starts_with("serde_json") => Self::Map,
            _ => Self::named_str(full),
        }
    }

    /// The type with all pointer wrapping removed.
    #[must_use]
    pub fn resolved(&self) -> &FieldType {
        match self {
            Self::Pointer(inner) => inner.resolved(),
            other => other,
        }
    }
}

/// Drops a leading `&`, `&'a` or `&mut`.
fn strip_reference(name: &str) -> &str {
    let Some(rest) = name.strip_prefix('&') else {
        return name;
    };
    let rest = match rest.strip_prefix('\'') {
        Some(lifetime) => lifetime
            .split_once(char::is_whitespace)
            .map_or("", |(_, tail)| tail),
        None => rest,
    };
    let rest = rest.trim_start();
    rest.strip_prefix("mut ").unwrap_or(rest).trim_start()
}

/// Splits `A, B<C, D>, E` at top-level commas.
fn split_generic_args(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '<' | '[' | '(' => depth += 1,
            '>' | ']' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = args[start..].trim();
    if !last.is_empty() {
        out.push(last);
    }
    out
}

/// One field of a scanned type: name, type and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Source field name.
    pub name: String,
    /// Declared type.
    pub ty: FieldType,
    /// Tag map.
    pub tags: IndexMap<String, String>,
}

impl FieldDescriptor {
    /// Creates a descriptor with no tags.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            tags: IndexMap::new(),
        }
    }

    /// Sets a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Sets the serialization tag.
    #[must_use]
    pub fn json(self, value: impl Into<String>) -> Self {
        self.tag(TAG_JSON, value)
    }

    /// Sets the validation rule tag.
    #[must_use]
    pub fn validate(self, rules: impl Into<String>) -> Self {
        self.tag(TAG_VALIDATE, rules)
    }

    /// Sets the description tag.
    #[must_use]
    pub fn description(self, text: impl Into<String>) -> Self {
        self.tag(TAG_DESCRIPTION, text)
    }

    /// Sets the example tag.
    #[must_use]
    pub fn example(self, value: impl Into<String>) -> Self {
        self.tag(TAG_EXAMPLE, value)
    }

    /// Merges tags parsed from a raw tag string such as
    /// `json:"name,omitempty" validate:"min=3"`.
    #[must_use]
    pub fn tags_from(mut self, raw: &str) -> Self {
        self.tags.extend(parse_tags(raw));
        self
    }

    /// Value of tag `key`.
    #[must_use]
    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Parses a raw `key:"value" key2:"value2"` tag string.
///
/// Malformed trailing input is ignored; everything parsed before it is kept.
#[must_use]
pub fn parse_tags(raw: &str) -> IndexMap<String, String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"^\s*(\w+):"((?:[^"\\]|\\.)*)""#).expect("valid regex")
    });

    let mut tags = IndexMap::new();
    let mut rest = raw;
    while let Some(caps) = re.captures(rest) {
        let (Some(whole), Some(key), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            break;
        };
        tags.insert(key.as_str().to_string(), unescape(value.as_str()));
        rest = &rest[whole.end()..];
    }

    tags
}

/// Resolves backslash escapes in a tag value.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_unwraps_nested_pointers() {
        let ty = FieldType::pointer(FieldType::pointer(FieldType::Integer));
        assert_eq!(ty.resolved(), &FieldType::Integer);

        let arr = FieldType::pointer(FieldType::array(FieldType::String));
        assert!(matches!(arr.resolved(), FieldType::Array(_)));
    }

    #[test]
    fn test_named_strips_paths() {
        struct Address;
        assert_eq!(FieldType::named::<Address>(), FieldType::Named("Address".into()));
        assert_eq!(
            FieldType::named_str("billing::Invoice"),
            FieldType::Named("Invoice".into())
        );
    }

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags(r#"json:"name,omitempty" validate:"min=3,max=10" description:"say \"hi\"""#);
        assert_eq!(tags.get("json").map(String::as_str), Some("name,omitempty"));
        assert_eq!(tags.get("validate").map(String::as_str), Some("min=3,max=10"));
        assert_eq!(tags.get("description").map(String::as_str), Some(r#"say "hi""#));
    }

    #[test]
    fn test_parse_tags_keeps_escaped_backslash() {
        let tags = parse_tags(r#"example:"C:\\tmp" json:"path""#);
        assert_eq!(tags.get("example").map(String::as_str), Some(r"C:\tmp"));
        assert_eq!(tags.get("json").map(String::as_str), Some("path"));
    }

    #[test]
    fn test_from_type_name_lowers_std_types() {
        assert_eq!(FieldType::from_type_name("alloc::string::String"), FieldType::String);
        assert_eq!(FieldType::from_type_name("&str"), FieldType::String);
        assert_eq!(FieldType::from_type_name("&'static str"), FieldType::String);
        assert_eq!(FieldType::from_type_name("u64"), FieldType::Integer);
        assert_eq!(FieldType::from_type_name("f32"), FieldType::Number);
        assert_eq!(FieldType::from_type_name("bool"), FieldType::Boolean);
        assert_eq!(
            FieldType::from_type_name("core::option::Option<alloc::vec::Vec<i32>>"),
            FieldType::pointer(FieldType::array(FieldType::Integer))
        );
        assert_eq!(
            FieldType::from_type_name("std::collections::hash::map::HashMap<alloc::string::String, app::User>"),
            FieldType::Map
        );
        assert_eq!(FieldType::from_type_name("serde_json::value::Value"), FieldType::Map);
        assert_eq!(
            FieldType::from_type_name("[app::model::Tick]"),
            FieldType::array(FieldType::named_str("Tick"))
        );
    }

    #[test]
    fn test_from_type_name_keeps_user_types_named() {
        assert_eq!(
            FieldType::from_type_name("app::model::User"),
            FieldType::Named("User".into())
        );
        assert_eq!(
            FieldType::from_type_name("app::Page<app::model::User>"),
            FieldType::Named("Page<User>".into())
        );
    }

    #[test]
    fn test_split_generic_args_respects_nesting() {
        assert_eq!(
            split_generic_args("K, Vec<(A, B)>, Map<X, Y>"),
            vec!["K", "Vec<(A, B)>", "Map<X, Y>"]
        );
    }

    #[test]
    fn test_parse_tags_stops_at_garbage() {
        let tags = parse_tags(r#"json:"id" broken validate:"required""#);
        assert_eq!(tags.len(), 1);
        assert!(tags.contains_key("json"));
    }

    #[test]
    fn test_descriptor_builders() {
        let field = FieldDescriptor::new("Email", FieldType::String)
            .json("email")
            .validate("required,email")
            .tags_from(r#"example:"a@b.c""#);
        assert_eq!(field.get_tag(TAG_JSON), Some("email"));
        assert_eq!(field.get_tag(TAG_VALIDATE), Some("required,email"));
        assert_eq!(field.get_tag(TAG_EXAMPLE), Some("a@b.c"));
    }
}
