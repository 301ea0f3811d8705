//! # Domain Errors
//!
//! Error type returned by every client operation.

use thiserror::Error;

use super::status::{ClientCode, Group, StatusError};

/// Fabric client error types.
#[derive(Debug, Error)]
pub enum FabricError {
    /// A classified failure from a peer, orderer, chaincode or the transport.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// A retry loop stopped; `source` is the last error seen.
    #[error("{source} (after {attempts} attempts)")]
    RetriesExhausted {
        /// Invocations performed, including the first
        attempts: u32,
        /// Last error returned by the operation
        source: Box<FabricError>,
    },

    /// A proposal sent to one endorser failed.
    #[error("transaction processing for endorser [{endorser}]: {source}")]
    Endorser {
        /// Endorser URL
        endorser: String,
        /// Underlying failure
        source: Box<FabricError>,
    },

    /// Two successful endorsements disagree on the response payload.
    /// Both payloads are base64 encoded.
    #[error("ProposalResponsePayloads do not match (base64): '{got}' vs '{baseline}'")]
    EndorsementMismatch {
        /// Payload of the disagreeing response
        got: String,
        /// Payload of the first successful response
        baseline: String,
    },

    /// No proposal response passed the status filter.
    #[error("no proposal responses received")]
    NoProposalResponses,

    /// The agreed response payload is empty.
    #[error("no payload")]
    NoPayload,

    /// No successful response carried an endorsement.
    #[error("no endorsements")]
    NoEndorsements,

    /// Several failures collected from one stream exchange.
    #[error("multiple errors occurred: [{}]", join_errors(.0))]
    Multiple(Vec<FabricError>),

    /// A request could not be assembled.
    #[error("Build error: {0}")]
    Build(String),

    /// The signing identity failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// A wire record could not be decoded.
    #[error("Decode error: {0}")]
    Codec(#[from] prost::DecodeError),

    /// Invalid client or endpoint configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// TLS material could not be loaded.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A block lacks the metadata needed to locate its configuration.
    #[error("Missing block metadata: {0}")]
    MissingMetadata(String),
}

fn join_errors(errors: &[FabricError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl FabricError {
    /// Status carried by this error, looking through wrappers.
    ///
    /// For [`FabricError::Multiple`] the first classified error wins.
    pub fn status(&self) -> Option<&StatusError> {
        match self {
            FabricError::Status(status) => Some(status),
            FabricError::RetriesExhausted { source, .. } => source.status(),
            FabricError::Endorser { source, .. } => source.status(),
            FabricError::Multiple(errors) => errors.iter().find_map(FabricError::status),
            _ => None,
        }
    }

    /// Whether the carried status is `(group, code)`.
    pub fn has_status(&self, group: Group, code: impl Into<i32>) -> bool {
        let code = code.into();
        self.status().map(|s| s.is(group, code)).unwrap_or(false)
    }

    /// Client-side timeout for `group`.
    pub fn timeout(group: Group, message: impl Into<String>) -> Self {
        StatusError::new(group, ClientCode::Timeout, message).into()
    }

    /// Client-side connection failure for `group`.
    pub fn connection_failed(group: Group, message: impl Into<String>) -> Self {
        StatusError::new(group, ClientCode::ConnectionFailed, message).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_seen_through_wrappers() {
        let inner: FabricError = StatusError::new(Group::EndorserServer, 500, "boom").into();
        let wrapped = FabricError::RetriesExhausted {
            attempts: 3,
            source: Box::new(FabricError::Endorser {
                endorser: "peer0:7051".into(),
                source: Box::new(inner),
            }),
        };

        assert!(wrapped.has_status(Group::EndorserServer, 500));
        assert_eq!(
            wrapped.to_string(),
            "transaction processing for endorser [peer0:7051]: EndorserServer status code 500: boom (after 3 attempts)"
        );
    }

    #[test]
    fn test_multiple_uses_first_classified() {
        let err = FabricError::Multiple(vec![
            FabricError::Build("x".into()),
            StatusError::new(Group::OrdererServer, 503, "a").into(),
            StatusError::new(Group::OrdererServer, 500, "b").into(),
        ]);

        assert!(err.has_status(Group::OrdererServer, 503));
        assert!(err.to_string().starts_with("multiple errors occurred: [Build error: x"));
    }

    #[test]
    fn test_unclassified_has_no_status() {
        assert!(FabricError::NoPayload.status().is_none());
        assert!(!FabricError::NoEndorsements.has_status(Group::Unknown, 0));
    }

    #[test]
    fn test_timeout_constructor() {
        let err = FabricError::timeout(Group::OrdererClient, "deadline");
        assert!(err.has_status(Group::OrdererClient, ClientCode::Timeout));
    }
}
