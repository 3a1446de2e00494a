//! Swagger 2 schema objects produced by lowering.
//!
//! A [`Schema`] may hold a pending [`Reference`] to another definition whose
//! final name is only known after the finalize pass. [`Schema::bind`]
//! replaces every pending handle with its rendered path; serializing a schema
//! that still holds a pending handle is an error.

use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::references::SchemaRef;

/// JSON Schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

/// Target of a `$ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Late-bound definition, resolved by the finalize pass.
    Pending(SchemaRef),
    /// Final textual form (`#/definitions/Pet`, `#/parameters/ApiVersion`, ...).
    Resolved(String),
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reference::Resolved(path) => serializer.serialize_str(path),
            Reference::Pending(handle) => Err(S::Error::custom(format!(
                "schema reference {} was never resolved",
                handle
            ))),
        }
    }
}

/// `x-ms-enum` extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XmsEnum {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub model_as_string: bool,
}

/// Properties in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(pub Vec<(String, Schema)>);

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, schema) in &self.0 {
            map.serialize_entry(name, schema)?;
        }
        map.end()
    }
}

/// Swagger 2 schema object
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "x-ms-enum", skip_serializing_if = "Option::is_none")]
    pub ms_enum: Option<XmsEnum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(rename = "x-ms-discriminator-value", skip_serializing_if = "Option::is_none")]
    pub discriminator_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(rename = "x-nullable", skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "x-ms-mutability", skip_serializing_if = "Option::is_none")]
    pub mutability: Option<Vec<String>>,
}

impl Schema {
    pub fn new(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::new(SchemaType::String)
    }

    pub fn integer() -> Self {
        Self::new(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::new(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(SchemaType::Boolean)
    }

    pub fn object() -> Self {
        Self::new(SchemaType::Object)
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::new(SchemaType::Array)
        }
    }

    /// Reference to a definition that is not named yet.
    pub fn pending(handle: SchemaRef) -> Self {
        Self {
            reference: Some(Reference::Pending(handle)),
            ..Self::default()
        }
    }

    pub fn resolved(path: impl Into<String>) -> Self {
        Self {
            reference: Some(Reference::Resolved(path.into())),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_description(mut self, description: Option<&str>) -> Self {
        if let Some(d) = description {
            self.description = Some(d.to_string());
        }
        self
    }

    pub fn is_ref(&self) -> bool {
        self.reference.is_some()
    }

    /// A schema with no constraint at all (`{}`).
    pub fn is_empty(&self) -> bool {
        *self == Schema::default()
    }

    /// Replace every pending reference in this schema tree.
    pub fn bind(&mut self, resolve: &dyn Fn(SchemaRef) -> String) {
        if let Some(Reference::Pending(handle)) = self.reference {
            self.reference = Some(Reference::Resolved(resolve(handle)));
        }
        if let Some(items) = &mut self.items {
            items.bind(resolve);
        }
        if let Some(additional) = &mut self.additional_properties {
            additional.bind(resolve);
        }
        if let Some(properties) = &mut self.properties {
            for (_, schema) in &mut properties.0 {
                schema.bind(resolve);
            }
        }
        for schema in self.all_of.iter_mut().flatten() {
            schema.bind(resolve);
        }
    }

    /// Whether any pending handle is left in this schema tree.
    pub fn has_pending(&self) -> bool {
        matches!(self.reference, Some(Reference::Pending(_)))
            || self.items.as_ref().is_some_and(|s| s.has_pending())
            || self
                .additional_properties
                .as_ref()
                .is_some_and(|s| s.has_pending())
            || self
                .properties
                .iter()
                .flat_map(|p| p.0.iter())
                .any(|(_, s)| s.has_pending())
            || self.all_of.iter().flatten().any(Schema::has_pending)
    }
}

/// JSON number for a literal, written as an integer when it has no fraction.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_swagger_keywords() {
        let mut schema = Schema::object();
        schema.properties = Some(Properties(vec![
            ("zeta".into(), Schema::string()),
            ("alpha".into(), Schema::integer().with_format("int32")),
        ]));
        schema.required = Some(vec!["zeta".into()]);
        schema.discriminator_value = Some("cat".into());
        schema.nullable = Some(true);

        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(
            json,
            r#"{"type":"object","properties":{"zeta":{"type":"string"},"alpha":{"type":"integer","format":"int32"}},"required":["zeta"],"x-ms-discriminator-value":"cat","x-nullable":true}"#
        );
    }

    #[test]
    fn pending_reference_fails_to_serialize() {
        let schema = Schema::array(Schema::pending(SchemaRef::new(3)));
        assert!(schema.has_pending());
        assert!(serde_json::to_value(&schema).is_err());
    }

    #[test]
    fn bind_resolves_nested_references() {
        let mut schema = Schema::object();
        schema.all_of = Some(vec![Schema::pending(SchemaRef::new(0))]);
        schema.properties = Some(Properties(vec![(
            "items".into(),
            Schema::array(Schema::pending(SchemaRef::new(1))),
        )]));

        schema.bind(&|handle| format!("#/definitions/T{}", handle.index()));
        assert!(!schema.has_pending());
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({
                "type": "object",
                "properties": { "items": { "type": "array", "items": { "$ref": "#/definitions/T1" } } },
                "allOf": [ { "$ref": "#/definitions/T0" } ]
            })
        );
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(number_value(1.0), json!(1));
        assert_eq!(number_value(1.5), json!(1.5));
    }
}
