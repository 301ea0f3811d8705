//! Inbound Ports (Driving Ports / API)
//!
//! Operations the client offers to callers that talk to more than one
//! node at a time.

use async_trait::async_trait;
use fabric_protos::common::{Block, Payload};
use fabric_protos::orderer::{BroadcastResponse, SeekPosition};
use fabric_protos::peer::Proposal;

use crate::domain::{ChaincodeDefinition, FabricError, TransactionProposalResponse};

/// Per-target outcome of a proposal fan-out, indexed like the targets.
///
/// Exactly one of `responses[i]` and `errors[i]` is set.
#[derive(Debug, Default)]
pub struct FanOut {
    /// Successful responses
    pub responses: Vec<Option<TransactionProposalResponse>>,
    /// Failures
    pub errors: Vec<Option<FabricError>>,
}

/// Ordering service API.
#[async_trait]
pub trait OrdererApi: Send + Sync {
    /// Block 0 of `channel_id`.
    async fn genesis_block(&self, channel_id: &str) -> Result<Block, FabricError>;

    /// Current head of `channel_id`.
    async fn newest_block(&self, channel_id: &str) -> Result<Block, FabricError>;

    /// Most recent configuration block of `channel_id`.
    ///
    /// Costs one deliver when the head is itself the config block, two
    /// otherwise.
    async fn config_block(&self, channel_id: &str) -> Result<Block, FabricError>;

    /// The single block at `position`.
    async fn get_block(
        &self,
        channel_id: &str,
        position: SeekPosition,
    ) -> Result<Block, FabricError>;

    /// Sign `payload` and submit it for ordering.
    async fn broadcast_payload(&self, payload: &Payload) -> Result<BroadcastResponse, FabricError>;

    /// Sign `payload`, a seek request, and return the last block delivered.
    async fn send_payload(&self, payload: &Payload) -> Result<Block, FabricError>;
}

/// Multi-endorser API.
#[async_trait]
pub trait EndorsementApi: Send + Sync {
    /// Sign `proposal` once and send it to every target concurrently.
    async fn send_proposal(&self, proposal: &Proposal) -> Result<FanOut, FabricError>;

    /// Endorse an invocation on every target and submit the transaction.
    async fn invoke_chaincode(
        &self,
        channel_id: &str,
        chaincode_id: &str,
        is_init: bool,
        args: Vec<Vec<u8>>,
    ) -> Result<BroadcastResponse, FabricError>;

    /// Commit a chaincode definition approved by enough organizations.
    async fn commit_chaincode(
        &self,
        channel_id: &str,
        definition: &ChaincodeDefinition,
    ) -> Result<BroadcastResponse, FabricError>;
}
