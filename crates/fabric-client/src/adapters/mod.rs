//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound ports against real infrastructure: tonic gRPC
//! connections, rustls TLS and an in-memory P-256 signing identity.

pub mod grpc;
pub mod signer;
pub mod tls;

pub use grpc::{endorser_connection, orderer_connection, GrpcEndorser, GrpcOrderer};
pub use signer::LocalSigner;
