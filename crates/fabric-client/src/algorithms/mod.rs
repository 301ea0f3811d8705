//! # Algorithms
//!
//! Pure building blocks used by the application services.
//!
//! - `proposal` - Proposal, header and transaction assembly
//! - `endorsement` - Agreement rule over endorser responses
//! - `retry` - Classified retry with exponential backoff
//! - `seek` - Deliver requests and last-config lookup

pub mod endorsement;
pub mod proposal;
pub mod retry;
pub mod seek;

pub use endorsement::{collect_endorsements, is_successful_status};
pub use proposal::{
    create_chaincode_invoke_proposal, create_config_signature, create_header, create_payload,
    create_transaction_payload, sign_payload, sign_proposal, tls_cert_hash, ChaincodeProposal,
};
pub use retry::{RetryPolicy, RetryableCodes};
pub use seek::{create_seek_envelope, last_config_index};
