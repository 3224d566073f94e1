use serde::Serialize;
use std::collections::BTreeMap;

/// JSON schema type of a single OMF property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDefinition {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub isindex: bool,
}

impl PropertyDefinition {
    pub const fn new(kind: PropertyType) -> Self {
        Self {
            kind,
            format: None,
            isindex: false,
        }
    }

    pub const fn with_format(mut self, format: &'static str) -> Self {
        self.format = Some(format);
        self
    }

    /// Marks the property as the index of the stream (its timestamp).
    pub const fn index(mut self) -> Self {
        self.isindex = true;
        self
    }
}

/// A dynamic OMF type, i.e. the schema every value in a container follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDefinition {
    pub id: String,
    pub classification: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: BTreeMap<String, PropertyDefinition>,
}

impl TypeDefinition {
    pub fn dynamic(id: &str, properties: &[(&str, PropertyDefinition)]) -> Self {
        Self {
            id: id.to_string(),
            classification: "dynamic",
            kind: "object",
            properties: properties
                .iter()
                .map(|(name, prop)| (name.to_string(), prop.clone()))
                .collect(),
        }
    }

    pub fn index_property(&self) -> Option<&str> {
        self.properties
            .iter()
            .find(|(_, p)| p.isindex)
            .map(|(name, _)| name.as_str())
    }
}

/// A record shape that can be sent as OMF data.
///
/// Implementors return a definition built once and cached for the life of the
/// process; the serialized field names of `Self` must match its properties.
pub trait OmfType: Serialize {
    fn type_definition() -> &'static TypeDefinition;

    fn type_id() -> &'static str {
        &Self::type_definition().id
    }
}

/// Declares one stream as an instance of a type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Container {
    pub id: String,
    pub typeid: String,
}

impl Container {
    pub fn new(id: impl Into<String>, typeid: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            typeid: typeid.into(),
        }
    }
}
