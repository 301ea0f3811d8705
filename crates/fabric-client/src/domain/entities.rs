//! # Domain Entities
//!
//! Requests accepted and responses returned by the client services.

use std::collections::HashMap;

use fabric_protos::common::Envelope;
use fabric_protos::peer::chaincode_spec::Type as ChaincodeType;
use fabric_protos::peer::{CollectionConfig, Endorsement, ProposalResponse};

/// Chaincode invocation to wrap in a proposal.
///
/// A non-empty function name is sent as the first argument, followed by
/// `args`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChaincodeInvokeRequest {
    /// Chaincode name
    pub chaincode_id: String,
    /// Chaincode language
    pub lang: ChaincodeType,
    /// Chaincode function
    pub fcn: String,
    /// Function arguments
    pub args: Vec<Vec<u8>>,
    /// Private inputs, kept out of the transaction
    pub transient_map: HashMap<String, Vec<u8>>,
    /// Marks a lifecycle init invocation
    pub is_init: bool,
}

impl Default for ChaincodeInvokeRequest {
    fn default() -> Self {
        Self {
            chaincode_id: String::new(),
            lang: ChaincodeType::Undefined,
            fcn: String::new(),
            args: Vec::new(),
            transient_map: HashMap::new(),
            is_init: false,
        }
    }
}

impl ChaincodeInvokeRequest {
    /// Invocation of `fcn` on `chaincode_id` with `args`.
    pub fn new(chaincode_id: impl Into<String>, fcn: impl Into<String>, args: Vec<Vec<u8>>) -> Self {
        Self {
            chaincode_id: chaincode_id.into(),
            fcn: fcn.into(),
            args,
            ..Default::default()
        }
    }

    /// Arguments as sent on the wire.
    pub fn wire_args(&self) -> Vec<Vec<u8>> {
        if self.fcn.is_empty() {
            return self.args.clone();
        }
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.fcn.as_bytes().to_vec());
        args.extend(self.args.iter().cloned());
        args
    }
}

/// One endorser's answer to a proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionProposalResponse {
    /// URL of the endorser that answered
    pub endorser: String,
    /// Status of the peer's response
    pub status: i32,
    /// Status set by the chaincode, falling back to `status`
    pub chaincode_status: i32,
    /// The raw response
    pub proposal_response: ProposalResponse,
}

impl TransactionProposalResponse {
    /// Status of the inner response, 0 when absent.
    pub fn response_status(&self) -> i32 {
        self.proposal_response
            .response
            .as_ref()
            .map(|r| r.status)
            .unwrap_or_default()
    }

    /// Payload returned by the chaincode.
    pub fn response_payload(&self) -> &[u8] {
        self.proposal_response
            .response
            .as_ref()
            .map(|r| r.payload.as_slice())
            .unwrap_or_default()
    }
}

/// Serialized payload and the signature over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    /// Encoded `Payload`
    pub payload: Vec<u8>,
    /// Signature over `payload`
    pub signature: Vec<u8>,
}

impl From<SignedEnvelope> for Envelope {
    fn from(signed: SignedEnvelope) -> Self {
        Envelope {
            payload: signed.payload,
            signature: signed.signature,
        }
    }
}

/// Agreed response payload plus the distinct endorsements over it.
#[derive(Debug, Clone, PartialEq)]
pub struct EndorsedPayload {
    /// Byte-identical payload shared by every successful response
    pub payload: Vec<u8>,
    /// Endorsements, first occurrence per endorser
    pub endorsements: Vec<Endorsement>,
}

/// Chaincode definition agreed on through the lifecycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChaincodeDefinition {
    /// Chaincode name
    pub name: String,
    /// Chaincode version label
    pub version: String,
    /// Definition sequence number
    pub sequence: i64,
    /// Endorsement plugin, empty for the default
    pub endorsement_plugin: String,
    /// Validation plugin, empty for the default
    pub validation_plugin: String,
    /// Encoded endorsement policy, passed through untouched
    pub validation_parameter: Vec<u8>,
    /// Private data collections
    pub collections: Vec<CollectionConfig>,
    /// Whether `Init` must run before other invocations
    pub init_required: bool,
}

/// Approval of a definition for the caller's organization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApproveChaincodeRequest {
    /// Definition to approve
    pub definition: ChaincodeDefinition,
    /// Installed package backing the definition, if any
    pub package_id: Option<String>,
}

/// Definition approved by the caller's organization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApprovedChaincodeDefinition {
    /// Approved definition
    pub definition: ChaincodeDefinition,
    /// Installed package, when one is linked
    pub package_id: Option<String>,
}

/// Definition committed on a channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommittedChaincodeDefinition {
    /// Committed definition
    pub definition: ChaincodeDefinition,
    /// Approval state per organization
    pub approvals: HashMap<String, bool>,
}

/// Package installed on a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledChaincode {
    /// Package identifier (`label:hash`)
    pub package_id: String,
    /// Package label
    pub label: String,
}
