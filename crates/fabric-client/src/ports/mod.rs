//! Ports module for the Fabric client
//!
//! Defines inbound (API) and outbound (SPI) port traits.

pub mod inbound;
pub mod outbound;

pub use inbound::{EndorsementApi, FanOut, OrdererApi};
pub use outbound::{
    ConfigUpdateComputer, EndorserConnection, MockEndorser, MockOrderer, MockSigner,
    OrdererConnection, ResponseStream, Signer,
};
