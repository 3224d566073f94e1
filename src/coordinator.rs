//! Fan-out of OMF messages to every configured destination.

use std::collections::BTreeSet;
use tracing::{error, info, warn};

use crate::error::{DeliveryError, IngressError};
use crate::omf::{Compression, Container, OmfMessage, SerializedOmfMessage, TypeDefinition};
use crate::sink::OmfSink;
use crate::station::FetchBatch;

/// The delete messages mirroring what bootstrap created.
///
/// Produced once by bootstrap and handed to the shutdown path.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupPlan {
    pub container_delete: OmfMessage,
    pub type_delete: OmfMessage,
}

impl CleanupPlan {
    /// Container ids the plan deletes.
    pub fn stream_ids(&self) -> BTreeSet<String> {
        self.container_delete
            .object_ids()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// Holds the live destinations and sends each message to all of them.
pub struct DeliveryCoordinator {
    sinks: Vec<OmfSink>,
    compression: Compression,
}

impl DeliveryCoordinator {
    pub fn new(sinks: Vec<OmfSink>, compression: Compression) -> Self {
        if sinks.is_empty() {
            warn!("No OMF destinations enabled, messages will not be sent anywhere");
        }
        Self { sinks, compression }
    }

    pub fn sinks(&self) -> &[OmfSink] {
        &self.sinks
    }

    /// Creates the type and returns the message that deletes it.
    ///
    /// If any sink rejects the create, the delete is sent to every sink so
    /// the ones that accepted it are left clean.
    pub async fn send_type(&self, definition: &TypeDefinition) -> Result<OmfMessage, IngressError> {
        let create = OmfMessage::type_message(definition)?;
        self.send_or_roll_back(&create).await
    }

    /// Creates one container per stream id and returns the message that
    /// deletes exactly those containers. Rolled back like
    /// [`send_type`](Self::send_type).
    pub async fn send_containers<'a, I>(
        &self,
        stream_ids: I,
        type_id: &str,
    ) -> Result<OmfMessage, IngressError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let containers: Vec<Container> = stream_ids
            .into_iter()
            .map(|id| Container::new(id.as_str(), type_id))
            .collect();
        let create = OmfMessage::container_message(&containers)?;
        self.send_or_roll_back(&create).await
    }

    async fn send_or_roll_back(&self, create: &OmfMessage) -> Result<OmfMessage, IngressError> {
        let delete = create.to_delete();
        if let Err(e) = self.send(create).await {
            warn!(message = %create, "Create rejected, rolling back on every sink");
            if let Err(rollback) = self.send(&delete).await {
                warn!(error = %rollback, "Rollback incomplete");
            }
            return Err(e);
        }
        Ok(delete)
    }

    pub async fn send_data(&self, batch: &FetchBatch) -> Result<(), IngressError> {
        let message = OmfMessage::data_message(batch)?;
        self.send(&message).await
    }

    /// Deletes containers, then the type they reference, on every sink.
    ///
    /// Both deletes are attempted even if the first one fails; the first
    /// failure is returned.
    #[tracing::instrument(skip_all)]
    pub async fn cleanup(&self, plan: &CleanupPlan) -> Result<(), IngressError> {
        let containers = self.send(&plan.container_delete).await;
        if let Err(e) = &containers {
            error!(error = %e, "Failed to delete containers");
        }
        let ty = self.send(&plan.type_delete).await;
        if let Err(e) = &ty {
            error!(error = %e, "Failed to delete type");
        }
        containers.and(ty)
    }

    /// Closes every sink. Safe to call more than once.
    pub fn close(&mut self) {
        for sink in &mut self.sinks {
            sink.close();
        }
    }

    /// Serializes once and posts to every sink, collecting all failures.
    pub async fn send(&self, message: &OmfMessage) -> Result<(), IngressError> {
        let serialized = message.serialize(self.compression)?;
        self.send_serialized(&serialized).await
    }

    async fn send_serialized(&self, message: &SerializedOmfMessage) -> Result<(), IngressError> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.send(message).await {
                error!(kind = %sink.kind(), address = %e.address, status = ?e.status, body = %e.body, "OMF send failed");
                failures.push(e);
            }
        }

        match DeliveryError::new(self.sinks.len(), failures) {
            Some(err) => Err(err.into()),
            None => {
                info!(
                    messagetype = message.message_type.as_str(),
                    action = message.action.as_str(),
                    sinks = self.sinks.len(),
                    "OMF message delivered"
                );
                Ok(())
            }
        }
    }
}
