//! Block construction and hashing.

use sha2::{Digest, Sha256};

use crate::common::{Block, BlockData, BlockHeader, BlockMetadata, BlockMetadataIndex, Status};

/// Number of metadata slots a freshly built block carries.
pub const BLOCK_METADATA_SLOTS: usize = 5;

impl Status {
    /// Status code as carried on the wire.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Block {
    /// Empty block with `number` and `previous_hash`, no data, and one empty
    /// entry per metadata slot.
    pub fn new(number: u64, previous_hash: Vec<u8>) -> Self {
        Self {
            header: Some(BlockHeader {
                number,
                previous_hash,
                data_hash: Vec::new(),
            }),
            data: Some(BlockData::default()),
            metadata: Some(BlockMetadata {
                metadata: vec![Vec::new(); BLOCK_METADATA_SLOTS],
            }),
        }
    }

    /// Block number, 0 when the header is absent.
    pub fn number(&self) -> u64 {
        self.header.as_ref().map(|h| h.number).unwrap_or_default()
    }

    /// Raw bytes of a metadata slot, if the block carries that slot.
    pub fn metadata_slot(&self, index: BlockMetadataIndex) -> Option<&[u8]> {
        self.metadata
            .as_ref()
            .and_then(|m| m.metadata.get(index as usize))
            .map(Vec::as_slice)
    }

    /// Recompute `header.data_hash` from the current data.
    pub fn seal(&mut self) {
        let hash = match self.data.as_ref() {
            Some(data) => data.hash(),
            None => BlockData::default().hash(),
        };
        if let Some(header) = self.header.as_mut() {
            header.data_hash = hash;
        }
    }
}

impl BlockData {
    /// SHA-256 over the concatenation of all data entries, in order.
    pub fn hash(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        for entry in &self.data {
            hasher.update(entry);
        }
        hasher.finalize().to_vec()
    }
}
