//! # Application Module
//!
//! Application services orchestrating the algorithms and outbound ports.
//!
//! - `endorser` / `orderer` - One node each, with retry and deadlines
//! - `peer_client` - Single peer administration and lifecycle
//! - `peers_client` - Multi-peer endorsement and submission
//! - `orderer_client` - Ordering service reads and channel updates

pub mod endorser;
pub mod lifecycle;
pub mod orderer;
pub mod orderer_client;
pub mod peer_client;
pub mod peers_client;
mod stream;

pub use endorser::Endorser;
pub use orderer::Orderer;
pub use orderer_client::OrdererClient;
pub use peer_client::PeerClient;
pub use peers_client::PeersClient;
