//! Wire encoding for OMF messages: JSON body plus the OMF request headers.

use bytes::Bytes;
use flate2::write::GzEncoder;
use std::io::Write;
use tracing::debug;

use crate::error::IngressError;
use crate::omf::message::{Action, MessageType, OmfMessage, encode_error};

pub const OMF_VERSION: &str = "1.2";

/// Body compression advertised through the `compression` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    fn header_value(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
        }
    }
}

/// A message ready to be posted to any number of endpoints.
#[derive(Debug, Clone)]
pub struct SerializedOmfMessage {
    pub message_type: MessageType,
    pub action: Action,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl SerializedOmfMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl OmfMessage {
    pub fn serialize(&self, compression: Compression) -> Result<SerializedOmfMessage, IngressError> {
        let json = serde_json::to_vec(&self.body).map_err(encode_error)?;
        debug!(message = %self, bytes = json.len(), ?compression, "Serialized OMF message");

        let body = match compression {
            Compression::None => json,
            Compression::Gzip => {
                gzip(&json).map_err(|e| IngressError::Encode(format!("gzip failed: {e}")))?
            }
        };

        Ok(SerializedOmfMessage {
            message_type: self.message_type,
            action: self.action,
            headers: vec![
                ("messagetype", self.message_type.as_str().to_string()),
                ("action", self.action.as_str().to_string()),
                ("messageformat", "JSON".to_string()),
                ("omfversion", OMF_VERSION.to_string()),
                ("compression", compression.header_value().to_string()),
            ],
            body: Bytes::from(body),
        })
    }
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::omf::Container;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn container_message() -> OmfMessage {
        OmfMessage::container_message(&[Container::new("BART_12TH_19TH", "BartStationEtd")])
            .unwrap()
    }

    #[test]
    fn test_headers_describe_message() {
        let serialized = container_message().to_delete().serialize(Compression::None).unwrap();

        assert_eq!(serialized.header("messagetype"), Some("container"));
        assert_eq!(serialized.header("action"), Some("delete"));
        assert_eq!(serialized.header("messageformat"), Some("JSON"));
        assert_eq!(serialized.header("omfversion"), Some("1.2"));
        assert_eq!(serialized.header("compression"), Some("none"));

        let body: serde_json::Value = serde_json::from_slice(&serialized.body).unwrap();
        assert_eq!(body[0]["id"], "BART_12TH_19TH");
    }

    #[test]
    fn test_gzip_body_inflates_to_json() {
        let msg = container_message();
        let plain = msg.serialize(Compression::None).unwrap();
        let gz = msg.serialize(Compression::Gzip).unwrap();

        assert_eq!(gz.header("compression"), Some("gzip"));
        let mut inflated = Vec::new();
        GzDecoder::new(&gz.body[..]).read_to_end(&mut inflated).unwrap();
        assert_eq!(inflated, plain.body.to_vec());
    }
}
