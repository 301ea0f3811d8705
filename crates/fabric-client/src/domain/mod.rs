//! # Domain Module
//!
//! Core types: status classification, errors, and the records the client
//! hands back to callers.

pub mod entities;
pub mod errors;
pub mod status;

pub use entities::*;
pub use errors::*;
pub use status::*;
