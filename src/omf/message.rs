use crate::error::IngressError;
use crate::omf::types::{Container, TypeDefinition};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Type,
    Container,
    Data,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Type => "type",
            MessageType::Container => "container",
            MessageType::Data => "data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Delete => "delete",
        }
    }
}

/// One logical OMF message before serialization.
///
/// The body is kept as JSON so a create message can be turned into the delete
/// message for the same objects without rebuilding it.
#[derive(Debug, Clone, PartialEq)]
pub struct OmfMessage {
    pub message_type: MessageType,
    pub action: Action,
    pub body: Value,
}

impl OmfMessage {
    pub fn type_message(definition: &TypeDefinition) -> Result<Self, IngressError> {
        Ok(Self {
            message_type: MessageType::Type,
            action: Action::Create,
            body: Value::Array(vec![serde_json::to_value(definition).map_err(encode_error)?]),
        })
    }

    pub fn container_message(containers: &[Container]) -> Result<Self, IngressError> {
        Ok(Self {
            message_type: MessageType::Container,
            action: Action::Create,
            body: serde_json::to_value(containers).map_err(encode_error)?,
        })
    }

    /// One entry per container, each carrying that stream's values in order.
    pub fn data_message<T: Serialize>(
        values: &BTreeMap<String, Vec<T>>,
    ) -> Result<Self, IngressError> {
        let body = values
            .iter()
            .map(|(container_id, values)| {
                Ok(json!({
                    "containerid": container_id,
                    "values": serde_json::to_value(values)?,
                }))
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()
            .map_err(encode_error)?;

        Ok(Self {
            message_type: MessageType::Data,
            action: Action::Create,
            body: Value::Array(body),
        })
    }

    /// The message that removes exactly what this message created.
    pub fn to_delete(&self) -> Self {
        Self {
            action: Action::Delete,
            ..self.clone()
        }
    }

    /// Ids of the objects a type or container message declares.
    pub fn object_ids(&self) -> Vec<&str> {
        self.body
            .as_array()
            .map(|items| items.iter().filter_map(|i| i["id"].as_str()).collect())
            .unwrap_or_default()
    }
}

pub(crate) fn encode_error(e: serde_json::Error) -> IngressError {
    IngressError::Encode(e.to_string())
}

impl fmt::Display for OmfMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.as_str(), self.message_type.as_str())
    }
}
