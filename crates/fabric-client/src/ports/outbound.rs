//! # Outbound Ports
//!
//! Traits for external dependencies: the signing identity, endorsing
//! peers, the ordering service and the configuration delta calculator.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fabric_protos::common::{Block, Envelope, Payload, Status};
use fabric_protos::msp::SerializedIdentity;
use fabric_protos::orderer::{seek_position, BroadcastResponse, DeliverResponse, SeekInfo, SeekPosition};
use fabric_protos::peer::{
    ChaincodeAction, Endorsement, ProposalResponse, ProposalResponsePayload, Response,
    SignedProposal,
};
use futures::stream::{self, BoxStream, StreamExt};
use prost::Message;
use sha2::digest::DynDigest;
use sha2::{Digest, Sha256};

use crate::domain::{FabricError, Group, StatusError};

/// Stream of messages read from a bidirectional call.
pub type ResponseStream<T> = BoxStream<'static, Result<T, FabricError>>;

/// Signing identity - outbound port.
pub trait Signer: Send + Sync {
    /// Sign `message`.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, FabricError>;

    /// Serialized identity placed in signature headers as the creator.
    fn serialize(&self) -> Result<Vec<u8>, FabricError>;

    /// Fresh hasher for transaction IDs and certificate hashes.
    fn hasher(&self) -> Result<Box<dyn DynDigest + Send>, FabricError>;

    /// Hash `message` with [`Signer::hasher`].
    fn hash(&self, message: &[u8]) -> Result<Vec<u8>, FabricError> {
        let mut hasher = self.hasher()?;
        hasher.update(message);
        Ok(hasher.finalize().into_vec())
    }
}

/// Endorsing peer connection - outbound port.
#[async_trait]
pub trait EndorserConnection: Send + Sync {
    /// Send one signed proposal and return the peer's response.
    async fn process_proposal(
        &self,
        proposal: SignedProposal,
    ) -> Result<ProposalResponse, FabricError>;

    /// Endpoint address, used to label responses and errors.
    fn target(&self) -> &str;
}

/// Ordering service connection - outbound port.
///
/// Each call sends exactly one envelope, closes its send side, and returns
/// the server's messages as a stream.
#[async_trait]
pub trait OrdererConnection: Send + Sync {
    /// Open a broadcast stream carrying `envelope`.
    async fn broadcast(
        &self,
        envelope: Envelope,
    ) -> Result<ResponseStream<BroadcastResponse>, FabricError>;

    /// Open a deliver stream carrying the seek request in `envelope`.
    async fn deliver(
        &self,
        envelope: Envelope,
    ) -> Result<ResponseStream<DeliverResponse>, FabricError>;

    /// Endpoint address, used to label errors.
    fn target(&self) -> &str;
}

/// Computes the configuration update that turns one channel configuration
/// into another.
///
/// Both configurations and the result are encoded records; the client
/// signs and submits the result without interpreting it.
pub trait ConfigUpdateComputer: Send + Sync {
    /// Encoded `ConfigUpdate` for `channel_id`.
    fn compute_update(
        &self,
        channel_id: &str,
        original: &[u8],
        updated: &[u8],
    ) -> Result<Vec<u8>, FabricError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock signer: SHA-256 "signatures" over a fixed identity.
#[derive(Debug, Clone)]
pub struct MockSigner {
    /// Organization of the identity
    pub msp_id: String,
    /// Certificate bytes of the identity
    pub certificate: Vec<u8>,
    /// Should signing fail?
    pub should_fail: bool,
}

impl Default for MockSigner {
    fn default() -> Self {
        Self {
            msp_id: "Org1MSP".to_string(),
            certificate: b"-----BEGIN CERTIFICATE-----mock".to_vec(),
            should_fail: false,
        }
    }
}

impl Signer for MockSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, FabricError> {
        if self.should_fail {
            return Err(FabricError::Signing("Mock failure".to_string()));
        }
        Ok(Sha256::digest(message).to_vec())
    }

    fn serialize(&self) -> Result<Vec<u8>, FabricError> {
        Ok(SerializedIdentity {
            mspid: self.msp_id.clone(),
            id_bytes: self.certificate.clone(),
        }
        .encode_to_vec())
    }

    fn hasher(&self) -> Result<Box<dyn DynDigest + Send>, FabricError> {
        Ok(Box::new(Sha256::new()))
    }
}

/// Mock endorsing peer with scripted responses.
///
/// Scripted results are consumed in order; once the script is empty every
/// call gets the fallback response, or a connection failure if none is set.
pub struct MockEndorser {
    target: String,
    script: Mutex<VecDeque<Result<ProposalResponse, StatusError>>>,
    fallback: Option<ProposalResponse>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    received: Mutex<Vec<SignedProposal>>,
}

impl MockEndorser {
    /// Endorser with no scripted responses.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: None,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Endorser answering every call with `response`.
    pub fn with_response(target: impl Into<String>, response: ProposalResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(target)
        }
    }

    /// Wait `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a result for the next unanswered call.
    pub fn push_result(&self, result: Result<ProposalResponse, StatusError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(result);
        }
    }

    /// Number of proposals received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Proposals received, in arrival order.
    pub fn received(&self) -> Vec<SignedProposal> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Endorsed response whose payload is a `ProposalResponsePayload`
    /// tagged with `marker` and carrying `status` as the chaincode status.
    pub fn response(status: i32, marker: &[u8], endorser: &[u8]) -> ProposalResponse {
        let action = ChaincodeAction {
            response: Some(Response {
                status,
                message: String::new(),
                payload: marker.to_vec(),
            }),
            ..Default::default()
        };
        let payload = ProposalResponsePayload {
            proposal_hash: marker.to_vec(),
            extension: action.encode_to_vec(),
        }
        .encode_to_vec();

        ProposalResponse {
            version: 1,
            timestamp: None,
            response: Some(Response {
                status,
                message: String::new(),
                payload: marker.to_vec(),
            }),
            endorsement: Some(Endorsement {
                endorser: endorser.to_vec(),
                signature: Sha256::digest(&payload).to_vec(),
            }),
            payload,
        }
    }
}

#[async_trait]
impl EndorserConnection for MockEndorser {
    async fn process_proposal(
        &self,
        proposal: SignedProposal,
    ) -> Result<ProposalResponse, FabricError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut received) = self.received.lock() {
            received.push(proposal);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(result) => result.map_err(FabricError::from),
            None => self.fallback.clone().ok_or_else(|| {
                FabricError::connection_failed(Group::EndorserClient, "Mock failure")
            }),
        }
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Mock ordering service holding a chain of blocks.
pub struct MockOrderer {
    target: String,
    blocks: Mutex<BTreeMap<u64, Block>>,
    broadcast_script: Mutex<VecDeque<Status>>,
    open_failures: Mutex<VecDeque<StatusError>>,
    broadcast_calls: AtomicUsize,
    deliver_calls: AtomicUsize,
    envelopes: Mutex<Vec<Envelope>>,
    seeks: Mutex<Vec<SeekPosition>>,
}

impl MockOrderer {
    /// Orderer with no blocks that accepts every broadcast.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            blocks: Mutex::new(BTreeMap::new()),
            broadcast_script: Mutex::new(VecDeque::new()),
            open_failures: Mutex::new(VecDeque::new()),
            broadcast_calls: AtomicUsize::new(0),
            deliver_calls: AtomicUsize::new(0),
            envelopes: Mutex::new(Vec::new()),
            seeks: Mutex::new(Vec::new()),
        }
    }

    /// Orderer serving `blocks`, keyed by their header number.
    pub fn with_blocks(target: impl Into<String>, blocks: Vec<Block>) -> Self {
        let orderer = Self::new(target);
        for block in blocks {
            orderer.add_block(block);
        }
        orderer
    }

    /// Add or replace a block.
    pub fn add_block(&self, block: Block) {
        if let Ok(mut blocks) = self.blocks.lock() {
            blocks.insert(block.number(), block);
        }
    }

    /// Status returned by the next unanswered broadcast.
    pub fn push_broadcast_status(&self, status: Status) {
        if let Ok(mut script) = self.broadcast_script.lock() {
            script.push_back(status);
        }
    }

    /// Make the next stream fail to open with `error`.
    pub fn push_open_failure(&self, error: StatusError) {
        if let Ok(mut failures) = self.open_failures.lock() {
            failures.push_back(error);
        }
    }

    /// Number of broadcast streams opened.
    pub fn broadcast_calls(&self) -> usize {
        self.broadcast_calls.load(Ordering::SeqCst)
    }

    /// Number of deliver streams opened.
    pub fn deliver_calls(&self) -> usize {
        self.deliver_calls.load(Ordering::SeqCst)
    }

    /// Every envelope received, broadcast and deliver alike.
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.envelopes.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Start positions of every deliver request.
    pub fn seek_positions(&self) -> Vec<SeekPosition> {
        self.seeks.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn open(&self, envelope: Envelope) -> Result<(), FabricError> {
        if let Ok(mut envelopes) = self.envelopes.lock() {
            envelopes.push(envelope);
        }
        match self.open_failures.lock().ok().and_then(|mut f| f.pop_front()) {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    fn seek(&self, envelope: &Envelope) -> Option<SeekPosition> {
        let payload = Payload::decode(envelope.payload.as_slice()).ok()?;
        let info = SeekInfo::decode(payload.data.as_slice()).ok()?;
        info.start
    }

    fn lookup(&self, position: &SeekPosition) -> Option<Block> {
        let blocks = self.blocks.lock().ok()?;
        match position.r#type.as_ref()? {
            seek_position::Type::Specified(s) => blocks.get(&s.number).cloned(),
            seek_position::Type::Newest(_) => blocks.values().next_back().cloned(),
            seek_position::Type::Oldest(_) => blocks.values().next().cloned(),
            seek_position::Type::NextCommit(_) => None,
        }
    }
}

#[async_trait]
impl OrdererConnection for MockOrderer {
    async fn broadcast(
        &self,
        envelope: Envelope,
    ) -> Result<ResponseStream<BroadcastResponse>, FabricError> {
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
        self.open(envelope)?;

        let status = self
            .broadcast_script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or(Status::Success);
        let messages = vec![Ok(BroadcastResponse::with_status(status))];
        Ok(stream::iter(messages).boxed())
    }

    async fn deliver(
        &self,
        envelope: Envelope,
    ) -> Result<ResponseStream<DeliverResponse>, FabricError> {
        self.deliver_calls.fetch_add(1, Ordering::SeqCst);
        let position = self.seek(&envelope);
        self.open(envelope)?;

        let messages = match position {
            None => vec![Ok(DeliverResponse::status(Status::BadRequest))],
            Some(position) => {
                let block = self.lookup(&position);
                if let Ok(mut seeks) = self.seeks.lock() {
                    seeks.push(position);
                }
                match block {
                    Some(block) => vec![
                        Ok(DeliverResponse::block(block)),
                        Ok(DeliverResponse::status(Status::Success)),
                    ],
                    None => vec![Ok(DeliverResponse::status(Status::NotFound))],
                }
            }
        };
        Ok(stream::iter(messages).boxed())
    }

    fn target(&self) -> &str {
        &self.target
    }
}
