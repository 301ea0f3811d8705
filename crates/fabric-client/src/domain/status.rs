//! # Status Classification
//!
//! Every failure the client reports carries a `(group, code)` pair. The
//! group names the component that produced the failure and the code is
//! interpreted within that group. Retry policies key their retryable sets
//! on the same pair.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    static ref CHAINCODE_NOT_FOUND: Regex = Regex::new(
        r"(chaincode [^ ]+ not found)|(could not find chaincode with name)|(cannot get package for chaincode)"
    )
    .expect("static pattern compiles");
}

/// Component that produced a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Group {
    /// Status of unknown origin.
    Unknown,
    /// Status returned by the gRPC layer; codes are gRPC codes.
    Transport,
    /// Failure detected on the client side of an endorser call.
    EndorserClient,
    /// Status returned by an endorsing peer.
    EndorserServer,
    /// Failure detected on the client side of an orderer call.
    OrdererClient,
    /// Status returned by the ordering service.
    OrdererServer,
    /// Validation code reported for a committed transaction.
    EventServer,
    /// Status set by the invoked chaincode.
    Chaincode,
}

impl Group {
    /// Stable label used in log fields and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Unknown => "Unknown",
            Group::Transport => "Transport",
            Group::EndorserClient => "EndorserClient",
            Group::EndorserServer => "EndorserServer",
            Group::OrdererClient => "OrdererClient",
            Group::OrdererServer => "OrdererServer",
            Group::EventServer => "EventServer",
            Group::Chaincode => "Chaincode",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codes raised by the client itself, used with the `*Client` groups.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ClientCode {
    Ok = 0,
    Unknown = 1,
    ConnectionFailed = 2,
    EndorsementMismatch = 3,
    EmptyCert = 4,
    Timeout = 5,
    NoPeersFound = 6,
    MultipleErrors = 7,
    SignatureVerificationFailed = 8,
    MissingEndorsement = 9,
    QueryEndorsers = 11,
    GenericTransient = 12,
    PrematureChaincodeExecution = 21,
    ChaincodeAlreadyLaunching = 22,
    ChaincodeNameNotFound = 23,
    PvtDataDisseminationFailed = 24,
}

impl From<ClientCode> for i32 {
    fn from(code: ClientCode) -> Self {
        code as i32
    }
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{group} status code {code}: {message}")]
pub struct StatusError {
    /// Originating component
    pub group: Group,
    /// Code within the group
    pub code: i32,
    /// Human-readable detail
    pub message: String,
}

impl StatusError {
    /// Create a status error.
    pub fn new(group: Group, code: impl Into<i32>, message: impl Into<String>) -> Self {
        Self {
            group,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Classify a chaincode response whose status fell outside `[200, 400)`.
    ///
    /// Messages reporting a missing chaincode become
    /// `EndorserClient/ChaincodeNameNotFound` so they can be retried while a
    /// freshly installed chaincode starts; everything else keeps the
    /// chaincode's own status.
    pub fn from_chaincode_response(status: i32, message: &str) -> Self {
        if CHAINCODE_NOT_FOUND.is_match(message) {
            Self::new(
                Group::EndorserClient,
                ClientCode::ChaincodeNameNotFound,
                message,
            )
        } else {
            Self::new(Group::Chaincode, status, message)
        }
    }

    /// Whether this status carries `(group, code)`.
    pub fn is(&self, group: Group, code: impl Into<i32>) -> bool {
        self.group == group && self.code == code.into()
    }
}
