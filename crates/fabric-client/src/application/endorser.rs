//! # Endorser
//!
//! Sends signed proposals to one endorsing peer with a per-attempt deadline
//! and the endpoint's retry policy.
//!
//! The deadline bounds each attempt, so one call can take up to
//! `attempts * timeout` plus backoff. Callers that need a bound on the
//! whole call wrap it, as [`super::PeersClient`] does for a fan-out.

use std::sync::Arc;
use std::time::Duration;

use fabric_protos::peer::{ChaincodeAction, ProposalResponse, ProposalResponsePayload, SignedProposal};
use fabric_telemetry::metric_inc;
use fabric_telemetry::metrics::outcome;
use fabric_telemetry::PROPOSALS_SENT;
use prost::Message;
use tracing::{debug, warn};

use crate::algorithms::{is_successful_status, RetryPolicy};
use crate::config::EndpointConfig;
use crate::domain::{FabricError, Group, StatusError, TransactionProposalResponse};
use crate::ports::EndorserConnection;

/// One endorsing peer.
pub struct Endorser {
    connection: Arc<dyn EndorserConnection>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Endorser {
    /// Wrap `connection` with an explicit policy and per-attempt deadline.
    pub fn new(connection: Arc<dyn EndorserConnection>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            connection,
            retry,
            timeout,
        }
    }

    /// Wrap `connection` using the endpoint's retry profile and timeout.
    pub fn from_config(connection: Arc<dyn EndorserConnection>, config: &EndpointConfig) -> Self {
        Self::new(connection, config.retry_policy(), config.effective_timeout())
    }

    /// Address of the peer.
    pub fn target(&self) -> &str {
        self.connection.target()
    }

    /// Send `proposal`, retrying transient failures, and classify the
    /// answer.
    ///
    /// The same signed bytes are sent on every attempt.
    pub async fn process_transaction_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<TransactionProposalResponse, FabricError> {
        let result = self.retry.invoke(|| self.send_proposal(proposal.clone())).await;
        metric_inc!(PROPOSALS_SENT, &[outcome(&result)]);

        let response = result.map_err(|err| {
            warn!(endorser = %self.target(), error = %err, "proposal failed");
            FabricError::Endorser {
                endorser: self.target().to_string(),
                source: Box::new(err),
            }
        })?;

        let status = response.response.as_ref().map(|r| r.status).unwrap_or_default();
        let chaincode_status = chaincode_status(&response)?.unwrap_or(status);

        Ok(TransactionProposalResponse {
            endorser: self.target().to_string(),
            status,
            chaincode_status,
            proposal_response: response,
        })
    }

    async fn send_proposal(&self, proposal: SignedProposal) -> Result<ProposalResponse, FabricError> {
        debug!(endorser = %self.target(), "sending proposal");

        let response = tokio::time::timeout(self.timeout, self.connection.process_proposal(proposal))
            .await
            .map_err(|_| {
                FabricError::timeout(
                    Group::EndorserClient,
                    format!("{} : deadline exceeded after {:?}", self.target(), self.timeout),
                )
            })??;

        if let Some(inner) = response.response.as_ref() {
            if !is_successful_status(inner.status) {
                return Err(StatusError::from_chaincode_response(inner.status, &inner.message).into());
            }
        }
        Ok(response)
    }
}

/// Status the chaincode set in its action, when the response carries one.
///
/// The peer can report success while the chaincode reports failure, so
/// this nested status is the one callers should trust.
fn chaincode_status(response: &ProposalResponse) -> Result<Option<i32>, FabricError> {
    if response.payload.is_empty() {
        return Ok(None);
    }
    let payload = ProposalResponsePayload::decode(response.payload.as_slice())?;
    let action = ChaincodeAction::decode(payload.extension.as_slice())?;
    Ok(action.response.map(|r| r.status))
}
