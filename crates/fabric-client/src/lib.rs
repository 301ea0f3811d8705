//! # Fabric Client
//!
//! Client-side protocol engine for a permissioned ledger network of
//! endorsing peers and ordering nodes.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Turn a chaincode invocation into a committed transaction:
//! - Sign a proposal once and fan it out to every endorsing peer
//! - Accept the endorsements only when every successful peer agrees on
//!   the response payload
//! - Assemble the transaction and broadcast it to the ordering service
//! - Read blocks back through deliver seeks, including the latest
//!   configuration block
//!
//! Every network call is classified and retried by a [`RetryPolicy`]
//! that reuses the already signed bytes.
//!
//! ## Module Structure
//!
//! ```text
//! fabric-client/
//! ├── domain/          # Status taxonomy, FabricError, request/response types
//! ├── algorithms/      # Proposal builder, agreement rule, retry, seek
//! ├── ports/           # API traits (inbound) + connection traits (outbound)
//! ├── adapters/        # tonic gRPC, rustls TLS, P-256 signer
//! ├── application/     # PeerClient, PeersClient, OrdererClient
//! └── config.rs        # EndpointConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{GrpcEndorser, GrpcOrderer, LocalSigner};
pub use algorithms::{
    collect_endorsements, create_chaincode_invoke_proposal, create_seek_envelope, last_config_index,
    RetryPolicy, RetryableCodes,
};
pub use application::{Endorser, Orderer, OrdererClient, PeerClient, PeersClient};
pub use config::{EndpointConfig, KeepaliveConfig, RetryProfile, DEFAULT_FAN_OUT_DEADLINE};
pub use domain::{
    ChaincodeDefinition, ChaincodeInvokeRequest, ClientCode, FabricError, Group, StatusError,
    TransactionProposalResponse,
};
pub use ports::{
    ConfigUpdateComputer, EndorsementApi, EndorserConnection, FanOut, OrdererApi, OrdererConnection,
    Signer,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
