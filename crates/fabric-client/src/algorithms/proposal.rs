//! # Proposal Builder
//!
//! Headers, proposals, payloads and signatures.
//!
//! Every header gets a fresh 24-byte nonce. The transaction ID is the hex
//! encoded hash of `nonce || creator`, so it is unique per header and bound
//! to the signing identity.

use std::time::{SystemTime, UNIX_EPOCH};

use fabric_protos::common::{
    ChannelHeader, ConfigSignature, Header, HeaderType, Payload, SignatureHeader,
};
use fabric_protos::peer::{
    ChaincodeActionPayload, ChaincodeEndorsedAction, ChaincodeHeaderExtension, ChaincodeId,
    ChaincodeInput, ChaincodeInvocationSpec, ChaincodeProposalPayload, ChaincodeSpec, Proposal,
    SignedProposal, Transaction, TransactionAction,
};
use prost::Message;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::domain::{ChaincodeInvokeRequest, EndorsedPayload, FabricError, SignedEnvelope};
use crate::ports::Signer;

/// Nonce length in bytes.
pub const NONCE_SIZE: usize = 24;

/// Proposal plus the header it was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct ChaincodeProposal {
    /// The unsigned proposal
    pub proposal: Proposal,
    /// Header embedded in the proposal, reused by the transaction
    pub header: Header,
    /// Transaction ID carried in the channel header
    pub tx_id: String,
}

/// Fresh random nonce.
pub fn random_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Hex encoded hash of `nonce || creator`.
pub fn compute_tx_id(nonce: &[u8], creator: &[u8], signer: &dyn Signer) -> Result<String, FabricError> {
    let mut hasher = signer.hasher()?;
    hasher.update(nonce);
    hasher.update(creator);
    Ok(hex::encode(hasher.finalize()))
}

/// Encoded signature header for `creator`, with a fresh nonce when none
/// is given.
pub fn create_signature_header(creator: &[u8], nonce: Option<Vec<u8>>) -> Vec<u8> {
    SignatureHeader {
        creator: creator.to_vec(),
        nonce: nonce.unwrap_or_else(random_nonce),
    }
    .encode_to_vec()
}

/// Build a header of `header_type` for `channel_id`.
///
/// `customize` runs on the channel header after the standard fields are
/// filled in. Returns the header and its transaction ID.
pub fn create_header<F>(
    header_type: HeaderType,
    channel_id: &str,
    signer: &dyn Signer,
    customize: F,
) -> Result<(Header, String), FabricError>
where
    F: FnOnce(&mut ChannelHeader),
{
    let creator = signer.serialize()?;
    let nonce = random_nonce();
    let tx_id = compute_tx_id(&nonce, &creator, signer)?;

    let mut channel_header = ChannelHeader {
        r#type: header_type as i32,
        version: 0,
        timestamp: Some(now()),
        channel_id: channel_id.to_string(),
        tx_id: tx_id.clone(),
        epoch: 0,
        extension: Vec::new(),
        tls_cert_hash: Vec::new(),
    };
    customize(&mut channel_header);

    let header = Header {
        channel_header: channel_header.encode_to_vec(),
        signature_header: create_signature_header(&creator, Some(nonce)),
    };
    Ok((header, tx_id))
}

/// Build a payload whose data comes from `data`, run after the header is
/// complete.
pub fn create_payload<D, F>(
    header_type: HeaderType,
    channel_id: &str,
    signer: &dyn Signer,
    data: D,
    customize: F,
) -> Result<(Payload, String), FabricError>
where
    D: FnOnce() -> Result<Vec<u8>, FabricError>,
    F: FnOnce(&mut ChannelHeader),
{
    let (header, tx_id) = create_header(header_type, channel_id, signer, customize)?;
    let payload = Payload {
        header: Some(header),
        data: data()?,
    };
    Ok((payload, tx_id))
}

/// Build an endorser transaction proposal invoking a chaincode.
pub fn create_chaincode_invoke_proposal(
    channel_id: &str,
    signer: &dyn Signer,
    request: &ChaincodeInvokeRequest,
) -> Result<ChaincodeProposal, FabricError> {
    if request.chaincode_id.is_empty() {
        return Err(FabricError::Build("ChaincodeID is required".to_string()));
    }

    let chaincode_id = ChaincodeId {
        name: request.chaincode_id.clone(),
        ..Default::default()
    };
    let invocation = ChaincodeInvocationSpec {
        chaincode_spec: Some(ChaincodeSpec {
            r#type: request.lang as i32,
            chaincode_id: Some(chaincode_id.clone()),
            input: Some(ChaincodeInput {
                args: request.wire_args(),
                decorations: Default::default(),
                is_init: request.is_init,
            }),
            timeout: 0,
        }),
    };

    let extension = ChaincodeHeaderExtension {
        chaincode_id: Some(chaincode_id),
    }
    .encode_to_vec();
    let (header, tx_id) = create_header(
        HeaderType::EndorserTransaction,
        channel_id,
        signer,
        |channel_header| channel_header.extension = extension,
    )?;

    let payload = ChaincodeProposalPayload {
        input: invocation.encode_to_vec(),
        transient_map: request.transient_map.clone(),
    };

    Ok(ChaincodeProposal {
        proposal: Proposal {
            header: header.encode_to_vec(),
            payload: payload.encode_to_vec(),
            extension: Vec::new(),
        },
        header,
        tx_id,
    })
}

/// Encode and sign a proposal.
pub fn sign_proposal(signer: &dyn Signer, proposal: &Proposal) -> Result<SignedProposal, FabricError> {
    let proposal_bytes = proposal.encode_to_vec();
    let signature = signer.sign(&proposal_bytes)?;
    Ok(SignedProposal {
        proposal_bytes,
        signature,
    })
}

/// Encode and sign a payload.
pub fn sign_payload(signer: &dyn Signer, payload: &Payload) -> Result<SignedEnvelope, FabricError> {
    let payload = payload.encode_to_vec();
    let signature = signer.sign(&payload)?;
    Ok(SignedEnvelope { payload, signature })
}

/// Signature over a configuration update.
///
/// The signed bytes are the encoded signature header followed by the
/// update.
pub fn create_config_signature(
    signer: &dyn Signer,
    config_update: &[u8],
) -> Result<ConfigSignature, FabricError> {
    let creator = signer.serialize()?;
    let signature_header = create_signature_header(&creator, None);

    let mut signing_bytes = Vec::with_capacity(signature_header.len() + config_update.len());
    signing_bytes.extend_from_slice(&signature_header);
    signing_bytes.extend_from_slice(config_update);

    Ok(ConfigSignature {
        signature: signer.sign(&signing_bytes)?,
        signature_header,
    })
}

/// SHA-256 of the DER client certificate, or of the empty string when
/// there is none.
pub fn tls_cert_hash(client_cert_der: Option<&[u8]>) -> Vec<u8> {
    Sha256::digest(client_cert_der.unwrap_or_default()).to_vec()
}

/// Assemble the transaction payload submitted to the orderer.
///
/// The transient map is dropped from the proposal payload so private
/// inputs never reach the ledger.
pub fn create_transaction_payload(
    header: &Header,
    proposal: &Proposal,
    endorsed: &EndorsedPayload,
) -> Result<Payload, FabricError> {
    let mut proposal_payload = ChaincodeProposalPayload::decode(proposal.payload.as_slice())?;
    proposal_payload.transient_map.clear();

    let action = TransactionAction {
        header: header.signature_header.clone(),
        payload: ChaincodeActionPayload {
            chaincode_proposal_payload: proposal_payload.encode_to_vec(),
            action: Some(ChaincodeEndorsedAction {
                proposal_response_payload: endorsed.payload.clone(),
                endorsements: endorsed.endorsements.clone(),
            }),
        }
        .encode_to_vec(),
    };

    Ok(Payload {
        header: Some(header.clone()),
        data: Transaction {
            actions: vec![action],
        }
        .encode_to_vec(),
    })
}

fn now() -> prost_types::Timestamp {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    prost_types::Timestamp { seconds, nanos: 0 }
}
