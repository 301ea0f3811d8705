//! # Fabric Client Test Suite
//!
//! End-to-end flows across the client services, run against in-memory
//! peers and ordering nodes.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs          # Network of mock nodes + real signer
//!     ├── transaction_flow.rs  # Proposal -> endorsement -> broadcast
//!     ├── block_flows.rs       # Genesis, newest and config block reads
//!     └── lifecycle_flow.rs    # Join, approve and commit
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fabric-tests
//! cargo test -p fabric-tests integration::block_flows::
//! ```

#![allow(dead_code)]

pub mod integration;
