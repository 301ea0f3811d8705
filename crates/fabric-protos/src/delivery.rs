//! Seek positions and ordering service replies.

use crate::common::{Block, Status};
use crate::orderer::{
    deliver_response, seek_info, seek_position, BroadcastResponse, DeliverResponse, SeekInfo,
    SeekNewest, SeekPosition, SeekSpecified,
};

impl SeekPosition {
    /// Position of block `number`.
    pub fn specified(number: u64) -> Self {
        Self {
            r#type: Some(seek_position::Type::Specified(SeekSpecified { number })),
        }
    }

    /// Position of the newest block.
    pub fn newest() -> Self {
        Self {
            r#type: Some(seek_position::Type::Newest(SeekNewest {})),
        }
    }

    /// Position of the first block on the channel.
    pub fn genesis() -> Self {
        Self::specified(0)
    }
}

impl SeekInfo {
    /// Request exactly the block at `position`, waiting until it exists.
    pub fn single(position: SeekPosition) -> Self {
        Self {
            start: Some(position.clone()),
            stop: Some(position),
            behavior: seek_info::SeekBehavior::BlockUntilReady as i32,
            ..Default::default()
        }
    }
}

impl BroadcastResponse {
    /// Response carrying `status` and no info.
    pub fn with_status(status: Status) -> Self {
        Self {
            status: status as i32,
            info: String::new(),
        }
    }
}

impl DeliverResponse {
    /// Block message.
    pub fn block(block: Block) -> Self {
        Self {
            r#type: Some(deliver_response::Type::Block(block)),
        }
    }

    /// Terminal status message.
    pub fn status(status: Status) -> Self {
        Self {
            r#type: Some(deliver_response::Type::Status(status as i32)),
        }
    }
}
