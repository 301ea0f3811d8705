//! Cross-service flows.

#[cfg(test)]
mod fixtures;

pub mod block_flows;
pub mod lifecycle_flow;
pub mod transaction_flow;
