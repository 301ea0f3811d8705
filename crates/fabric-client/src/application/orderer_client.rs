//! # Orderer Client
//!
//! Block retrieval and transaction submission for one ordering node,
//! signing with the client identity.
//!
//! ## Config block resolution
//!
//! The newest block records the index of the last config block. When that
//! index is the newest block itself it is returned as is; otherwise one
//! more deliver fetches the block at the index.

use std::sync::Arc;

use async_trait::async_trait;
use fabric_protos::common::{Block, ConfigUpdateEnvelope, Envelope, HeaderType, Payload};
use fabric_protos::orderer::{BroadcastResponse, SeekPosition};
use prost::Message;
use tracing::{debug, info};

use super::orderer::Orderer;
use crate::algorithms::{
    create_config_signature, create_payload, create_seek_envelope, last_config_index, sign_payload,
};
use crate::domain::FabricError;
use crate::ports::{ConfigUpdateComputer, OrdererApi, Signer};

/// Client for one ordering node.
pub struct OrdererClient {
    orderer: Orderer,
    signer: Arc<dyn Signer>,
    admins: Vec<Arc<dyn Signer>>,
    tls_cert_hash: Vec<u8>,
}

impl OrdererClient {
    /// Client signing with `signer`.
    ///
    /// `tls_cert_hash` is the hash of the client TLS certificate presented
    /// to this orderer; see [`crate::algorithms::tls_cert_hash`].
    pub fn new(orderer: Orderer, signer: Arc<dyn Signer>, tls_cert_hash: Vec<u8>) -> Self {
        Self {
            orderer,
            signer,
            admins: Vec::new(),
            tls_cert_hash,
        }
    }

    /// Identities that sign configuration updates.
    pub fn with_admins(mut self, admins: Vec<Arc<dyn Signer>>) -> Self {
        self.admins = admins;
        self
    }

    /// Address of the ordering node.
    pub fn target(&self) -> &str {
        self.orderer.target()
    }

    /// Submit a configuration update signed by every admin.
    pub async fn update_channel(
        &self,
        channel_id: &str,
        config_update: &[u8],
    ) -> Result<BroadcastResponse, FabricError> {
        let (payload, tx_id) = create_payload(
            HeaderType::ConfigUpdate,
            channel_id,
            self.signer.as_ref(),
            || {
                let signatures = self
                    .admins
                    .iter()
                    .map(|admin| create_config_signature(admin.as_ref(), config_update))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ConfigUpdateEnvelope {
                    config_update: config_update.to_vec(),
                    signatures,
                }
                .encode_to_vec())
            },
            |channel_header| channel_header.tls_cert_hash = self.tls_cert_hash.clone(),
        )?;

        info!(channel_id, tx_id = %tx_id, signatures = self.admins.len(), "submitting config update");
        self.broadcast_payload(&payload).await
    }

    /// Create a channel from a pre-built channel creation transaction.
    pub async fn create_channel_with_tx(
        &self,
        channel_id: &str,
        channel_tx: &[u8],
    ) -> Result<BroadcastResponse, FabricError> {
        self.update_channel(channel_id, channel_tx).await
    }

    /// Set anchor peers from a pre-built anchor peer update.
    pub async fn set_anchor_peer_with_tx(
        &self,
        channel_id: &str,
        anchor_tx: &[u8],
    ) -> Result<BroadcastResponse, FabricError> {
        self.update_channel(channel_id, anchor_tx).await
    }

    /// Edit the current channel configuration and submit the difference.
    ///
    /// `edit` receives the encoded config envelope of the current config
    /// block and returns the updated one; `computer` turns the pair into a
    /// config update.
    pub async fn update_channel_config<F>(
        &self,
        channel_id: &str,
        computer: &dyn ConfigUpdateComputer,
        edit: F,
    ) -> Result<BroadcastResponse, FabricError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, FabricError> + Send,
    {
        let block = self.config_block(channel_id).await?;
        let original = config_envelope_bytes(&block)?;
        let updated = edit(&original)?;
        let update = computer.compute_update(channel_id, &original, &updated)?;
        self.update_channel(channel_id, &update).await
    }
}

/// Encoded config envelope carried by the first transaction of a config
/// block.
fn config_envelope_bytes(block: &Block) -> Result<Vec<u8>, FabricError> {
    let first = block
        .data
        .as_ref()
        .and_then(|data| data.data.first())
        .ok_or_else(|| FabricError::Build(format!("block {} carries no transactions", block.number())))?;
    let envelope = Envelope::decode(first.as_slice())?;
    let payload = Payload::decode(envelope.payload.as_slice())?;
    Ok(payload.data)
}

#[async_trait]
impl OrdererApi for OrdererClient {
    async fn genesis_block(&self, channel_id: &str) -> Result<Block, FabricError> {
        self.get_block(channel_id, SeekPosition::genesis()).await
    }

    async fn newest_block(&self, channel_id: &str) -> Result<Block, FabricError> {
        self.get_block(channel_id, SeekPosition::newest()).await
    }

    async fn config_block(&self, channel_id: &str) -> Result<Block, FabricError> {
        let newest = self.newest_block(channel_id).await?;
        let index = last_config_index(&newest)?;
        if index == newest.number() {
            return Ok(newest);
        }
        debug!(channel_id, index, newest = newest.number(), "fetching config block");
        self.get_block(channel_id, SeekPosition::specified(index)).await
    }

    async fn get_block(
        &self,
        channel_id: &str,
        position: SeekPosition,
    ) -> Result<Block, FabricError> {
        let envelope = create_seek_envelope(
            channel_id,
            self.signer.as_ref(),
            &self.tls_cert_hash,
            position,
        )?;
        self.orderer.send_deliver(envelope.into()).await
    }

    async fn broadcast_payload(&self, payload: &Payload) -> Result<BroadcastResponse, FabricError> {
        let envelope = sign_payload(self.signer.as_ref(), payload)?;
        self.orderer.send_broadcast(envelope.into()).await
    }

    async fn send_payload(&self, payload: &Payload) -> Result<Block, FabricError> {
        let envelope = sign_payload(self.signer.as_ref(), payload)?;
        self.orderer.send_deliver(envelope.into()).await
    }
}
