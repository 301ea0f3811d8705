//! Shared test network: mock peers and orderer, signed by a real P-256
//! identity.

use std::sync::Arc;
use std::time::Duration;

use fabric_client::adapters::LocalSigner;
use fabric_client::algorithms::tls_cert_hash;
use fabric_client::ports::{MockEndorser, MockOrderer};
use fabric_client::{Endorser, Orderer, OrdererClient, PeerClient, PeersClient, RetryPolicy, Signer};
use fabric_protos::common::{Block, BlockMetadataIndex, LastConfig, Metadata, OrdererBlockMetadata};
use prost::Message;

pub const CHANNEL: &str = "mychannel";
pub const CALL_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Network {
    pub peers: Vec<Arc<MockEndorser>>,
    pub orderer: Arc<MockOrderer>,
    pub signer: Arc<LocalSigner>,
}

impl Network {
    pub fn new(peers: Vec<Arc<MockEndorser>>) -> Self {
        Self::with_orderer(peers, MockOrderer::new("grpcs://orderer.example.com:7050"))
    }

    pub fn with_orderer(peers: Vec<Arc<MockEndorser>>, orderer: MockOrderer) -> Self {
        Self {
            peers,
            orderer: Arc::new(orderer),
            signer: Arc::new(LocalSigner::random("Org1MSP", b"-----BEGIN CERTIFICATE-----user1".to_vec())),
        }
    }

    pub fn signer(&self) -> Arc<dyn Signer> {
        self.signer.clone()
    }

    pub fn orderer_client(&self, retry: RetryPolicy) -> OrdererClient {
        OrdererClient::new(
            Orderer::new(self.orderer.clone(), retry, CALL_TIMEOUT),
            self.signer(),
            tls_cert_hash(None),
        )
    }

    pub fn endorser(&self, index: usize, retry: RetryPolicy) -> Endorser {
        Endorser::new(self.peers[index].clone(), retry, CALL_TIMEOUT)
    }

    pub fn peers_client(&self, retry: RetryPolicy) -> PeersClient {
        let endorsers = (0..self.peers.len())
            .map(|index| Arc::new(self.endorser(index, retry.clone())))
            .collect();
        PeersClient::new(
            endorsers,
            Arc::new(self.orderer_client(RetryPolicy::no_retry())),
            self.signer(),
        )
    }

    pub fn peer_client(&self, index: usize) -> PeerClient {
        PeerClient::new(self.endorser(index, RetryPolicy::no_retry()), self.signer())
    }
}

/// Peer answering every proposal with the same payload `marker`, signed as
/// `endorser`.
pub fn peer(target: &str, marker: &[u8], endorser: &[u8]) -> Arc<MockEndorser> {
    Arc::new(MockEndorser::with_response(
        target,
        MockEndorser::response(200, marker, endorser),
    ))
}

/// Block whose metadata points at `last_config`.
pub fn block_with_last_config(number: u64, last_config: u64) -> Block {
    let mut block = Block::new(number, Vec::new());
    let value = OrdererBlockMetadata {
        last_config: Some(LastConfig { index: last_config }),
        consenter_metadata: Vec::new(),
    }
    .encode_to_vec();
    if let Some(metadata) = block.metadata.as_mut() {
        metadata.metadata[BlockMetadataIndex::Signatures as usize] =
            Metadata { value, signatures: Vec::new() }.encode_to_vec();
    }
    block
}
