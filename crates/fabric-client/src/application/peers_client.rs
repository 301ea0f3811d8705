//! # Peers Client
//!
//! Endorsement by several peers followed by submission to the ordering
//! service.
//!
//! ## Flow
//!
//! 1. Sign the proposal once
//! 2. Send it to every peer concurrently and wait for all of them, up to
//!    the fan-out deadline; peers still pending then count as timed out
//! 3. Apply the agreement rule to the responses
//! 4. Assemble the transaction and broadcast it

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fabric_protos::orderer::BroadcastResponse;
use fabric_protos::peer::Proposal;
use fabric_telemetry::ENDORSEMENTS_COLLECTED;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::endorser::Endorser;
use super::lifecycle::{commit_args, functions, lifecycle_request};
use crate::algorithms::{
    collect_endorsements, create_chaincode_invoke_proposal, create_transaction_payload, sign_proposal,
};
use crate::config::DEFAULT_FAN_OUT_DEADLINE;
use crate::domain::{ChaincodeDefinition, ChaincodeInvokeRequest, FabricError, Group};
use crate::ports::{EndorsementApi, FanOut, OrdererApi, Signer};

/// Client for a set of endorsing peers sharing one ordering service.
pub struct PeersClient {
    endorsers: Vec<Arc<Endorser>>,
    orderer: Arc<dyn OrdererApi>,
    signer: Arc<dyn Signer>,
    deadline: Duration,
}

impl PeersClient {
    /// Client sending to `endorsers` and submitting through `orderer`.
    pub fn new(endorsers: Vec<Arc<Endorser>>, orderer: Arc<dyn OrdererApi>, signer: Arc<dyn Signer>) -> Self {
        Self {
            endorsers,
            orderer,
            signer,
            deadline: DEFAULT_FAN_OUT_DEADLINE,
        }
    }

    /// Bound the whole fan-out, retries included, by `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Number of endorsing peers.
    pub fn target_count(&self) -> usize {
        self.endorsers.len()
    }

    /// Endorse `request` on every peer and submit the transaction.
    pub async fn process(
        &self,
        channel_id: &str,
        request: &ChaincodeInvokeRequest,
    ) -> Result<BroadcastResponse, FabricError> {
        let proposal = create_chaincode_invoke_proposal(channel_id, self.signer.as_ref(), request)?;
        let fan_out = self.send_proposal(&proposal.proposal).await?;

        for (index, err) in fan_out.errors.iter().enumerate() {
            if let Some(err) = err {
                warn!(tx_id = %proposal.tx_id, target = index, error = %err, "endorsement discarded");
            }
        }

        let endorsed = collect_endorsements(&fan_out.responses).map_err(|err| {
            error!(tx_id = %proposal.tx_id, error = %err, "endorsements rejected");
            err
        })?;
        ENDORSEMENTS_COLLECTED.inc_by(endorsed.endorsements.len() as f64);

        let payload = create_transaction_payload(&proposal.header, &proposal.proposal, &endorsed)?;
        info!(
            channel_id,
            tx_id = %proposal.tx_id,
            endorsements = endorsed.endorsements.len(),
            "submitting transaction"
        );
        self.orderer.broadcast_payload(&payload).await
    }
}

#[async_trait]
impl EndorsementApi for PeersClient {
    async fn send_proposal(&self, proposal: &Proposal) -> Result<FanOut, FabricError> {
        if self.endorsers.is_empty() {
            return Err(FabricError::Config("targets is required".to_string()));
        }

        let signed = sign_proposal(self.signer.as_ref(), proposal)?;
        let count = self.endorsers.len();
        let mut fan_out = FanOut {
            responses: vec![None; count],
            errors: (0..count).map(|_| None).collect(),
        };

        let mut tasks = JoinSet::new();
        for (index, endorser) in self.endorsers.iter().enumerate() {
            let endorser = Arc::clone(endorser);
            let signed = signed.clone();
            tasks.spawn(async move { (index, endorser.process_transaction_proposal(&signed).await) });
        }

        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((index, Ok(response)))) => fan_out.responses[index] = Some(response),
                    Some(Ok((index, Err(err)))) => fan_out.errors[index] = Some(err),
                    Some(Err(err)) => error!(error = %err, "endorsement task failed"),
                    None => break,
                },
                _ = &mut deadline => {
                    tasks.abort_all();
                    for (index, endorser) in self.endorsers.iter().enumerate() {
                        if fan_out.responses[index].is_none() && fan_out.errors[index].is_none() {
                            fan_out.errors[index] = Some(FabricError::timeout(
                                Group::EndorserClient,
                                format!("{} : fan-out deadline exceeded after {:?}", endorser.target(), self.deadline),
                            ));
                        }
                    }
                    warn!(targets = count, deadline = ?self.deadline, "proposal fan-out cut short");
                    break;
                }
            }
        }

        debug!(
            targets = count,
            responses = fan_out.responses.iter().flatten().count(),
            "proposal fan-out complete"
        );
        Ok(fan_out)
    }

    async fn invoke_chaincode(
        &self,
        channel_id: &str,
        chaincode_id: &str,
        is_init: bool,
        args: Vec<Vec<u8>>,
    ) -> Result<BroadcastResponse, FabricError> {
        let request = ChaincodeInvokeRequest {
            chaincode_id: chaincode_id.to_string(),
            args,
            is_init,
            ..Default::default()
        };
        self.process(channel_id, &request).await
    }

    async fn commit_chaincode(
        &self,
        channel_id: &str,
        definition: &ChaincodeDefinition,
    ) -> Result<BroadcastResponse, FabricError> {
        let request = lifecycle_request(functions::COMMIT, commit_args(definition));
        self.process(channel_id, &request).await
    }
}
