//! # Peer Client
//!
//! Operations answered by a single endorsing peer: chaincode queries,
//! channel membership, and the per-organization steps of the chaincode
//! lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use fabric_protos::common::Status;
use fabric_protos::lifecycle::{
    CheckCommitReadinessResult, GetInstalledChaincodePackageArgs, GetInstalledChaincodePackageResult,
    InstallChaincodeArgs, InstallChaincodeResult, QueryApprovedChaincodeDefinitionArgs,
    QueryApprovedChaincodeDefinitionResult, QueryChaincodeDefinitionArgs, QueryChaincodeDefinitionResult,
    QueryChaincodeDefinitionsArgs, QueryChaincodeDefinitionsResult, QueryInstalledChaincodesArgs,
    QueryInstalledChaincodesResult,
};
use fabric_protos::orderer::BroadcastResponse;
use fabric_protos::peer::{ChannelQueryResponse, Response};
use prost::Message;
use tracing::{debug, info};

use super::endorser::Endorser;
use super::lifecycle::{
    approve_args, approved_definition, check_commit_readiness_args, committed_definition, cscc_request,
    functions, lifecycle_request, listed_definition,
};
use crate::algorithms::{create_chaincode_invoke_proposal, create_transaction_payload, sign_proposal, ChaincodeProposal};
use crate::domain::{
    ApproveChaincodeRequest, ApprovedChaincodeDefinition, ChaincodeDefinition, ChaincodeInvokeRequest,
    CommittedChaincodeDefinition, EndorsedPayload, FabricError, Group, InstalledChaincode, StatusError,
    TransactionProposalResponse,
};
use crate::ports::{OrdererApi, Signer};

/// Client for one endorsing peer.
pub struct PeerClient {
    endorser: Endorser,
    signer: Arc<dyn Signer>,
}

impl PeerClient {
    /// Client sending proposals to `endorser`, signed by `signer`.
    pub fn new(endorser: Endorser, signer: Arc<dyn Signer>) -> Self {
        Self { endorser, signer }
    }

    /// Address of the peer.
    pub fn target(&self) -> &str {
        self.endorser.target()
    }

    /// Evaluate a chaincode function without submitting a transaction.
    pub async fn query_chaincode(
        &self,
        channel_id: &str,
        chaincode_id: &str,
        is_init: bool,
        args: Vec<Vec<u8>>,
    ) -> Result<Response, FabricError> {
        let request = ChaincodeInvokeRequest {
            chaincode_id: chaincode_id.to_string(),
            args,
            is_init,
            ..Default::default()
        };
        let (response, _) = self.process(channel_id, &request).await?;
        Ok(response.proposal_response.response.unwrap_or_default())
    }

    /// Channels the peer has joined.
    pub async fn query_channels(&self) -> Result<ChannelQueryResponse, FabricError> {
        self.send_proposal("", &cscc_request(functions::GET_CHANNELS, Vec::new()))
            .await
    }

    /// Join `channel_id`, using its genesis block from `orderer`.
    pub async fn join_channel(&self, channel_id: &str, orderer: &dyn OrdererApi) -> Result<(), FabricError> {
        let genesis = orderer.genesis_block(channel_id).await?;
        let request = cscc_request(functions::JOIN_CHAIN, vec![genesis.encode_to_vec()]);
        self.process("", &request).await?;
        info!(peer = %self.target(), channel_id, "joined channel");
        Ok(())
    }

    /// Install a chaincode package.
    pub async fn install_chaincode(&self, package: Vec<u8>) -> Result<InstallChaincodeResult, FabricError> {
        let args = InstallChaincodeArgs {
            chaincode_install_package: package,
        };
        self.send_proposal("", &lifecycle_request(functions::INSTALL, args))
            .await
    }

    /// Packages installed on the peer.
    pub async fn query_installed_chaincodes(&self) -> Result<Vec<InstalledChaincode>, FabricError> {
        let result: QueryInstalledChaincodesResult = self
            .send_proposal(
                "",
                &lifecycle_request(functions::QUERY_INSTALLED, QueryInstalledChaincodesArgs {}),
            )
            .await?;

        Ok(result
            .installed_chaincodes
            .into_iter()
            .map(|installed| InstalledChaincode {
                package_id: installed.package_id,
                label: installed.label,
            })
            .collect())
    }

    /// Raw bytes of an installed package.
    pub async fn get_installed_chaincode_package(&self, package_id: &str) -> Result<Vec<u8>, FabricError> {
        let args = GetInstalledChaincodePackageArgs {
            package_id: package_id.to_string(),
        };
        let result: GetInstalledChaincodePackageResult = self
            .send_proposal("", &lifecycle_request(functions::GET_INSTALLED_PACKAGE, args))
            .await?;
        Ok(result.chaincode_install_package)
    }

    /// Approve a definition for this peer's organization and submit the
    /// approval through `orderer`.
    ///
    /// The transaction carries this peer's endorsement only.
    pub async fn approve_chaincode(
        &self,
        channel_id: &str,
        request: &ApproveChaincodeRequest,
        orderer: &dyn OrdererApi,
    ) -> Result<BroadcastResponse, FabricError> {
        let invoke = lifecycle_request(functions::APPROVE, approve_args(request));
        let (response, proposal) = self.process(channel_id, &invoke).await?;

        let endorsement = response
            .proposal_response
            .endorsement
            .clone()
            .ok_or(FabricError::NoEndorsements)?;
        let endorsed = EndorsedPayload {
            payload: response.proposal_response.payload,
            endorsements: vec![endorsement],
        };
        if endorsed.payload.is_empty() {
            return Err(FabricError::NoPayload);
        }

        let payload = create_transaction_payload(&proposal.header, &proposal.proposal, &endorsed)?;
        info!(channel_id, tx_id = %proposal.tx_id, name = %request.definition.name, "submitting approval");
        orderer.broadcast_payload(&payload).await
    }

    /// Definition approved by this peer's organization.
    pub async fn query_approved_chaincode_definition(
        &self,
        channel_id: &str,
        name: &str,
        sequence: i64,
    ) -> Result<ApprovedChaincodeDefinition, FabricError> {
        let args = QueryApprovedChaincodeDefinitionArgs {
            name: name.to_string(),
            sequence,
        };
        let result: QueryApprovedChaincodeDefinitionResult = self
            .send_proposal(channel_id, &lifecycle_request(functions::QUERY_APPROVED, args))
            .await?;
        Ok(approved_definition(name, result))
    }

    /// Which organizations have approved `definition`.
    pub async fn check_commit_readiness(
        &self,
        channel_id: &str,
        definition: &ChaincodeDefinition,
    ) -> Result<HashMap<String, bool>, FabricError> {
        let args = check_commit_readiness_args(definition);
        let result: CheckCommitReadinessResult = self
            .send_proposal(channel_id, &lifecycle_request(functions::CHECK_COMMIT_READINESS, args))
            .await?;
        Ok(result.approvals)
    }

    /// Committed definition of `name`.
    pub async fn query_committed(
        &self,
        channel_id: &str,
        name: &str,
    ) -> Result<CommittedChaincodeDefinition, FabricError> {
        let args = QueryChaincodeDefinitionArgs { name: name.to_string() };
        let result: QueryChaincodeDefinitionResult = self
            .send_proposal(channel_id, &lifecycle_request(functions::QUERY_DEFINITION, args))
            .await?;
        Ok(committed_definition(name, result))
    }

    /// Every committed definition on `channel_id`.
    pub async fn query_committed_of_channel(&self, channel_id: &str) -> Result<Vec<ChaincodeDefinition>, FabricError> {
        let result: QueryChaincodeDefinitionsResult = self
            .send_proposal(
                channel_id,
                &lifecycle_request(functions::QUERY_DEFINITIONS, QueryChaincodeDefinitionsArgs {}),
            )
            .await?;
        Ok(result
            .chaincode_definitions
            .into_iter()
            .map(listed_definition)
            .collect())
    }

    /// Send `request` and decode the chaincode's payload as `R`.
    pub async fn send_proposal<R>(&self, channel_id: &str, request: &ChaincodeInvokeRequest) -> Result<R, FabricError>
    where
        R: Message + Default,
    {
        let (response, _) = self.process(channel_id, request).await?;
        Ok(R::decode(response.response_payload())?)
    }

    /// Build, sign and send `request`; any status but 200 is an error.
    async fn process(
        &self,
        channel_id: &str,
        request: &ChaincodeInvokeRequest,
    ) -> Result<(TransactionProposalResponse, ChaincodeProposal), FabricError> {
        let proposal = create_chaincode_invoke_proposal(channel_id, self.signer.as_ref(), request)?;
        let signed = sign_proposal(self.signer.as_ref(), &proposal.proposal)?;
        debug!(peer = %self.target(), channel_id, tx_id = %proposal.tx_id, chaincode = %request.chaincode_id, "proposal");

        let response = self.endorser.process_transaction_proposal(&signed).await?;
        if response.status != Status::Success.code() {
            return Err(StatusError::new(
                Group::EndorserServer,
                response.status,
                format!("bad status from {} ({})", response.endorser, response.status),
            )
            .into());
        }
        Ok((response, proposal))
    }
}
