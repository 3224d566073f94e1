//! OMF (OSIsoft Message Format) message model and serialization.
//!
//! Only the subset this ingress needs is modelled: dynamic types, containers
//! and data messages, with `create` and `delete` actions.

mod message;
mod serializer;
mod types;

pub use message::{Action, MessageType, OmfMessage};
pub use serializer::{Compression, OMF_VERSION, SerializedOmfMessage};
pub use types::{Container, OmfType, PropertyDefinition, PropertyType, TypeDefinition};
