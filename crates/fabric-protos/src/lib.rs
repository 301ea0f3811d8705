//! # Fabric Protos
//!
//! Protobuf records and gRPC stubs for endorsing peers and ordering
//! nodes, generated by `tonic-build` from the schema vendored under
//! `proto/`. Field numbers are the network's, so every record is
//! wire-compatible.
//!
//! ## Packages
//!
//! - [`common`]: envelopes, headers, blocks, configuration and policies
//! - [`orderer`]: broadcast and deliver records, `AtomicBroadcast` stubs
//! - [`peer`]: proposals, endorsements, chaincode invocation, collections
//!   and the `Endorser` stubs
//! - [`msp`]: serialized identities and policy principals
//! - [`lifecycle`]: chaincode lifecycle arguments and results
//!
//! Helpers for block construction and seek positions are inherent
//! methods on the generated records.

#![warn(missing_docs)]

/// Records shared by every service: envelopes, headers and blocks.
#[allow(missing_docs)]
pub mod common {
    tonic::include_proto!("common");
}

/// Identity records.
#[allow(missing_docs)]
pub mod msp {
    tonic::include_proto!("msp");
}

/// Broadcast and deliver records of the ordering service.
#[allow(missing_docs)]
pub mod orderer {
    tonic::include_proto!("orderer");
}

/// Proposal, endorsement and transaction records of the peer service.
#[allow(missing_docs)]
pub mod protos {
    tonic::include_proto!("protos");
}

/// Arguments and results of the `_lifecycle` system chaincode.
#[allow(missing_docs)]
pub mod lifecycle {
    tonic::include_proto!("lifecycle");
}

pub use protos as peer;

mod block;
mod delivery;

pub use block::BLOCK_METADATA_SLOTS;
pub use prost::Message;
