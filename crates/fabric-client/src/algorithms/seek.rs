//! # Block Seeking
//!
//! Seek requests for the deliver service and lookup of a block's last
//! configuration index.

use fabric_protos::common::{Block, BlockMetadataIndex, HeaderType, LastConfig, Metadata, OrdererBlockMetadata};
use fabric_protos::orderer::{SeekInfo, SeekPosition};
use prost::Message;

use super::proposal::{create_payload, sign_payload};
use crate::domain::{FabricError, SignedEnvelope};
use crate::ports::Signer;

/// Signed deliver request for the single block at `position`.
///
/// `tls_cert_hash` binds the request to the client's TLS certificate.
pub fn create_seek_envelope(
    channel_id: &str,
    signer: &dyn Signer,
    tls_cert_hash: &[u8],
    position: SeekPosition,
) -> Result<SignedEnvelope, FabricError> {
    let (payload, _) = create_payload(
        HeaderType::DeliverSeekInfo,
        channel_id,
        signer,
        || Ok(SeekInfo::single(position).encode_to_vec()),
        |channel_header| channel_header.tls_cert_hash = tls_cert_hash.to_vec(),
    )?;
    sign_payload(signer, &payload)
}

/// Index of the last configuration block recorded in `block`'s metadata.
///
/// Current orderers write it into the signatures slot; older ones use the
/// dedicated last-config slot, read when the signatures value is empty or
/// carries no index. An index is never assumed when the signatures value
/// is present but neither slot records one.
pub fn last_config_index(block: &Block) -> Result<u64, FabricError> {
    let signatures = metadata_at(block, BlockMetadataIndex::Signatures)?;

    if signatures.value.is_empty() {
        let legacy = metadata_at(block, BlockMetadataIndex::LastConfig)?;
        let last_config = LastConfig::decode(legacy.value.as_slice())?;
        return Ok(last_config.index);
    }

    let orderer_metadata = OrdererBlockMetadata::decode(signatures.value.as_slice())?;
    if let Some(last_config) = orderer_metadata.last_config {
        return Ok(last_config.index);
    }

    let legacy = metadata_at(block, BlockMetadataIndex::LastConfig)?;
    if legacy.value.is_empty() {
        return Err(FabricError::MissingMetadata(format!(
            "no last config index in block [{}]",
            block.number()
        )));
    }
    Ok(LastConfig::decode(legacy.value.as_slice())?.index)
}

fn metadata_at(block: &Block, index: BlockMetadataIndex) -> Result<Metadata, FabricError> {
    let slots = block
        .metadata
        .as_ref()
        .ok_or_else(|| FabricError::MissingMetadata("no metadata in block".to_string()))?;
    let raw = slots
        .metadata
        .get(index as usize)
        .ok_or_else(|| FabricError::MissingMetadata(format!("no metadata at index [{}]", index as i32)))?;
    Ok(Metadata::decode(raw.as_slice())?)
}
