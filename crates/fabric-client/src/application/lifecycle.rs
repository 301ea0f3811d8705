//! # Lifecycle Requests
//!
//! Invocations of the `_lifecycle` and `cscc` system chaincodes, and the
//! mapping between their records and the client's definition types.

use fabric_protos::lifecycle::{
    chaincode_source, query_chaincode_definitions_result, ApproveChaincodeDefinitionForMyOrgArgs,
    ChaincodeSource, CheckCommitReadinessArgs, CommitChaincodeDefinitionArgs,
    QueryApprovedChaincodeDefinitionResult, QueryChaincodeDefinitionResult,
};
use fabric_protos::peer::{CollectionConfig, CollectionConfigPackage};
use prost::Message;

use crate::domain::{
    ApproveChaincodeRequest, ApprovedChaincodeDefinition, ChaincodeDefinition, ChaincodeInvokeRequest,
    CommittedChaincodeDefinition,
};

/// Chaincode lifecycle system chaincode.
pub const LIFECYCLE: &str = "_lifecycle";
/// Configuration system chaincode.
pub const CSCC: &str = "cscc";

/// System chaincode functions.
pub mod functions {
    #![allow(missing_docs)]
    pub const INSTALL: &str = "InstallChaincode";
    pub const QUERY_INSTALLED: &str = "QueryInstalledChaincodes";
    pub const GET_INSTALLED_PACKAGE: &str = "GetInstalledChaincodePackage";
    pub const APPROVE: &str = "ApproveChaincodeDefinitionForMyOrg";
    pub const QUERY_APPROVED: &str = "QueryApprovedChaincodeDefinition";
    pub const CHECK_COMMIT_READINESS: &str = "CheckCommitReadiness";
    pub const COMMIT: &str = "CommitChaincodeDefinition";
    pub const QUERY_DEFINITION: &str = "QueryChaincodeDefinition";
    pub const QUERY_DEFINITIONS: &str = "QueryChaincodeDefinitions";
    pub const GET_CHANNELS: &str = "GetChannels";
    pub const JOIN_CHAIN: &str = "JoinChain";
}

/// `_lifecycle` call of `function` with one encoded argument.
pub fn lifecycle_request(function: &str, args: impl Message) -> ChaincodeInvokeRequest {
    ChaincodeInvokeRequest::new(LIFECYCLE, function, vec![args.encode_to_vec()])
}

/// `cscc` call of `function` with raw arguments.
pub fn cscc_request(function: &str, args: Vec<Vec<u8>>) -> ChaincodeInvokeRequest {
    ChaincodeInvokeRequest::new(CSCC, function, args)
}

fn collections(definition: &ChaincodeDefinition) -> Option<CollectionConfigPackage> {
    Some(CollectionConfigPackage {
        config: definition.collections.clone(),
    })
}

fn collection_list(package: Option<CollectionConfigPackage>) -> Vec<CollectionConfig> {
    package.map(|p| p.config).unwrap_or_default()
}

/// Approval arguments; without a package the source is `Unavailable`.
pub fn approve_args(request: &ApproveChaincodeRequest) -> ApproveChaincodeDefinitionForMyOrgArgs {
    let definition = &request.definition;
    let source = match &request.package_id {
        Some(package_id) if !package_id.is_empty() => {
            chaincode_source::Type::LocalPackage(chaincode_source::Local {
                package_id: package_id.clone(),
            })
        }
        _ => chaincode_source::Type::Unavailable(chaincode_source::Unavailable {}),
    };

    ApproveChaincodeDefinitionForMyOrgArgs {
        sequence: definition.sequence,
        name: definition.name.clone(),
        version: definition.version.clone(),
        endorsement_plugin: definition.endorsement_plugin.clone(),
        validation_plugin: definition.validation_plugin.clone(),
        validation_parameter: definition.validation_parameter.clone(),
        collections: collections(definition),
        init_required: definition.init_required,
        source: Some(ChaincodeSource { r#type: Some(source) }),
    }
}

/// Commit arguments.
pub fn commit_args(definition: &ChaincodeDefinition) -> CommitChaincodeDefinitionArgs {
    CommitChaincodeDefinitionArgs {
        sequence: definition.sequence,
        name: definition.name.clone(),
        version: definition.version.clone(),
        endorsement_plugin: definition.endorsement_plugin.clone(),
        validation_plugin: definition.validation_plugin.clone(),
        validation_parameter: definition.validation_parameter.clone(),
        collections: collections(definition),
        init_required: definition.init_required,
    }
}

/// Commit readiness arguments.
pub fn check_commit_readiness_args(definition: &ChaincodeDefinition) -> CheckCommitReadinessArgs {
    CheckCommitReadinessArgs {
        sequence: definition.sequence,
        name: definition.name.clone(),
        version: definition.version.clone(),
        endorsement_plugin: definition.endorsement_plugin.clone(),
        validation_plugin: definition.validation_plugin.clone(),
        validation_parameter: definition.validation_parameter.clone(),
        collections: collections(definition),
        init_required: definition.init_required,
    }
}

/// Approved definition of `name`.
pub fn approved_definition(name: &str, result: QueryApprovedChaincodeDefinitionResult) -> ApprovedChaincodeDefinition {
    let package_id = result.source.and_then(|source| match source.r#type {
        Some(chaincode_source::Type::LocalPackage(local)) => Some(local.package_id),
        _ => None,
    });

    ApprovedChaincodeDefinition {
        definition: ChaincodeDefinition {
            name: name.to_string(),
            version: result.version,
            sequence: result.sequence,
            endorsement_plugin: result.endorsement_plugin,
            validation_plugin: result.validation_plugin,
            validation_parameter: result.validation_parameter,
            collections: collection_list(result.collections),
            init_required: result.init_required,
        },
        package_id,
    }
}

/// Committed definition of `name` with its approvals.
pub fn committed_definition(name: &str, result: QueryChaincodeDefinitionResult) -> CommittedChaincodeDefinition {
    CommittedChaincodeDefinition {
        definition: ChaincodeDefinition {
            name: name.to_string(),
            version: result.version,
            sequence: result.sequence,
            endorsement_plugin: result.endorsement_plugin,
            validation_plugin: result.validation_plugin,
            validation_parameter: result.validation_parameter,
            collections: collection_list(result.collections),
            init_required: result.init_required,
        },
        approvals: result.approvals,
    }
}

/// One entry of the committed definitions on a channel.
pub fn listed_definition(entry: query_chaincode_definitions_result::ChaincodeDefinition) -> ChaincodeDefinition {
    ChaincodeDefinition {
        name: entry.name,
        version: entry.version,
        sequence: entry.sequence,
        endorsement_plugin: entry.endorsement_plugin,
        validation_plugin: entry.validation_plugin,
        validation_parameter: entry.validation_parameter,
        collections: collection_list(entry.collections),
        init_required: entry.init_required,
    }
}
