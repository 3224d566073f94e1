//! Error kinds for the ingress pipeline.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised anywhere between fetching ETDs and delivering OMF.
#[derive(Error, Debug)]
pub enum IngressError {
    /// Malformed settings or endpoint URI. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure or non-success status from the BART API.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Unexpected JSON shape or an unsupported timezone abbreviation.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A message could not be encoded for the wire.
    #[error("Encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// A single OMF endpoint refused or failed to receive a message.
#[derive(Error, Debug, Clone)]
#[error("Error sending OMF to endpoint at {address}. Response code: {}. Response: {body}", .status.map_or_else(|| "none".to_string(), |s| s.to_string()))]
pub struct SendError {
    pub address: String,
    /// `None` when the request never produced a response.
    pub status: Option<StatusCode>,
    pub body: String,
}

/// One or more sinks failed while fanning out a single message.
///
/// Every sink is attempted before this is returned. Failures keep the order
/// in which sinks were attempted and there is always at least one.
#[derive(Error, Debug, Clone)]
#[error("{} of {attempted} OMF endpoint(s) failed; first: {first}", .others.len() + 1)]
pub struct DeliveryError {
    attempted: usize,
    first: SendError,
    others: Vec<SendError>,
}

impl DeliveryError {
    /// Returns `None` when `failures` is empty.
    pub fn new(attempted: usize, failures: Vec<SendError>) -> Option<Self> {
        let mut failures = failures.into_iter();
        let first = failures.next()?;
        Some(Self {
            attempted,
            first,
            others: failures.collect(),
        })
    }

    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn first(&self) -> &SendError {
        &self.first
    }

    pub fn failures(&self) -> impl Iterator<Item = &SendError> {
        std::iter::once(&self.first).chain(&self.others)
    }

    pub fn failure_count(&self) -> usize {
        self.others.len() + 1
    }
}

impl From<serde_json::Error> for IngressError {
    fn from(e: serde_json::Error) -> Self {
        IngressError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_names_the_endpoint() {
        let err = SendError {
            address: "http://localhost:5590/omf".to_string(),
            status: Some(StatusCode::INTERNAL_SERVER_ERROR),
            body: "boom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("http://localhost:5590/omf"));
        assert!(msg.contains("500"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_delivery_error_surfaces_first_failure() {
        let first = SendError {
            address: "a".to_string(),
            status: None,
            body: "refused".to_string(),
        };
        let second = SendError {
            address: "b".to_string(),
            status: Some(StatusCode::BAD_REQUEST),
            body: String::new(),
        };
        let err = DeliveryError::new(3, vec![first, second]).unwrap();
        assert_eq!(err.first().address, "a");
        assert_eq!(err.failure_count(), 2);
        assert!(err.to_string().starts_with("2 of 3"));
        let addresses: Vec<_> = err.failures().map(|f| f.address.as_str()).collect();
        assert_eq!(addresses, vec!["a", "b"]);
    }

    #[test]
    fn test_delivery_error_needs_a_failure() {
        assert!(DeliveryError::new(2, Vec::new()).is_none());
    }
}
