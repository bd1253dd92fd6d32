//! Connector schema types
//!
//! Types describing the object classes and attributes a connector exposes.

use serde::{Deserialize, Serialize};

/// Schema representing the structure of a target system.
///
/// A schema contains one or more object classes, each with their own
/// attributes and capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// The object classes available in this schema.
    pub object_classes: Vec<ObjectClass>,
}

impl Schema {
    /// Create a schema with the given object classes.
    #[must_use]
    pub fn with_object_classes(object_classes: Vec<ObjectClass>) -> Self {
        Self { object_classes }
    }

    /// Find an object class by name.
    #[must_use]
    pub fn get_object_class(&self, name: &str) -> Option<&ObjectClass> {
        self.object_classes.iter().find(|oc| oc.name == name)
    }
}

/// An object class in a target system schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectClass {
    /// Canonical name for this object class (used in xavyo).
    pub name: String,

    /// Native name in the target system.
    pub native_name: String,

    /// Description of this object class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Attributes belonging to this object class.
    pub attributes: Vec<SchemaAttribute>,

    /// Whether this object class supports create operations.
    #[serde(default = "default_true")]
    pub supports_create: bool,

    /// Whether this object class supports update operations.
    #[serde(default = "default_true")]
    pub supports_update: bool,

    /// Whether this object class supports delete operations.
    #[serde(default = "default_true")]
    pub supports_delete: bool,
}

fn default_true() -> bool {
    true
}

impl ObjectClass {
    /// Create a new object class with the given name.
    pub fn new(name: impl Into<String>, native_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_name: native_name.into(),
            description: None,
            attributes: Vec::new(),
            supports_create: true,
            supports_update: true,
            supports_delete: true,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add an attribute using builder pattern.
    #[must_use]
    pub fn with_attribute(mut self, attribute: SchemaAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Mark the object class as read/update only.
    #[must_use]
    pub fn without_create_delete(mut self) -> Self {
        self.supports_create = false;
        self.supports_delete = false;
        self
    }

    /// Find an attribute by name.
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<&SchemaAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get all required attributes.
    #[must_use]
    pub fn required_attributes(&self) -> Vec<&SchemaAttribute> {
        self.attributes.iter().filter(|a| a.required).collect()
    }

    /// Get all writable attributes.
    #[must_use]
    pub fn writable_attributes(&self) -> Vec<&SchemaAttribute> {
        self.attributes.iter().filter(|a| a.writable).collect()
    }
}

/// An attribute in an object class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaAttribute {
    /// Canonical name for this attribute (used in xavyo).
    pub name: String,

    /// Native name in the target system (the REST property).
    pub native_name: String,

    /// Data type of this attribute.
    pub data_type: AttributeDataType,

    /// Whether this attribute can have multiple values.
    #[serde(default)]
    pub multi_valued: bool,

    /// Whether this attribute is required for create operations.
    #[serde(default)]
    pub required: bool,

    /// Whether this attribute can be read.
    #[serde(default = "default_true")]
    pub readable: bool,

    /// Whether this attribute can be written.
    #[serde(default = "default_true")]
    pub writable: bool,

    /// Whether this attribute is returned by default in search results.
    #[serde(default = "default_true")]
    pub returned_by_default: bool,
}

impl SchemaAttribute {
    /// Create a new attribute with the given name and type.
    pub fn new(
        name: impl Into<String>,
        native_name: impl Into<String>,
        data_type: AttributeDataType,
    ) -> Self {
        Self {
            name: name.into(),
            native_name: native_name.into(),
            data_type,
            multi_valued: false,
            required: false,
            readable: true,
            writable: true,
            returned_by_default: true,
        }
    }

    /// Mark this attribute as multi-valued.
    #[must_use]
    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    /// Mark this attribute as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark this attribute as read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Mark this attribute as write-only (e.g. passwords).
    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self.returned_by_default = false;
        self
    }

    /// Set whether the attribute is returned by default.
    #[must_use]
    pub fn returned_by_default(mut self, returned: bool) -> Self {
        self.returned_by_default = returned;
        self
    }
}

/// Data type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeDataType {
    /// String/text value.
    String,
    /// Integer value.
    Integer,
    /// Boolean value.
    Boolean,
    /// Date/time value (RFC 3339 text).
    DateTime,
    /// Secret value that is never returned.
    GuardedString,
}

impl AttributeDataType {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeDataType::String => "string",
            AttributeDataType::Integer => "integer",
            AttributeDataType::Boolean => "boolean",
            AttributeDataType::DateTime => "datetime",
            AttributeDataType::GuardedString => "guardedstring",
        }
    }
}

impl std::fmt::Display for AttributeDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_class_builder() {
        let oc = ObjectClass::new("course", "courses")
            .with_description("Course")
            .with_attribute(SchemaAttribute::new("__name__", "name", AttributeDataType::String).read_only())
            .with_attribute(
                SchemaAttribute::new("student_ids", "student_ids", AttributeDataType::String)
                    .multi_valued(),
            )
            .without_create_delete();

        assert!(!oc.supports_create);
        assert!(oc.supports_update);
        assert!(!oc.supports_delete);
        assert_eq!(oc.writable_attributes().len(), 1);
        assert!(oc.get_attribute("student_ids").is_some_and(|a| a.multi_valued));
    }

    #[test]
    fn test_write_only_attribute() {
        let attr =
            SchemaAttribute::new("__password__", "password", AttributeDataType::GuardedString)
                .write_only();
        assert!(!attr.readable);
        assert!(attr.writable);
        assert!(!attr.returned_by_default);
    }

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::with_object_classes(vec![
            ObjectClass::new("user", "users"),
            ObjectClass::new("course", "courses"),
        ]);
        assert_eq!(schema.object_classes.len(), 2);
        assert_eq!(schema.get_object_class("course").map(|oc| oc.native_name.as_str()), Some("courses"));
        assert!(schema.get_object_class("group").is_none());
    }

    #[test]
    fn test_data_type_serialization() {
        let json = serde_json::to_string(&AttributeDataType::DateTime).unwrap();
        assert_eq!(json, "\"datetime\"");
        assert_eq!(AttributeDataType::GuardedString.to_string(), "guardedstring");
    }
}
