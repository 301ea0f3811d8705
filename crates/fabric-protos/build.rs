// Path: crates/fabric-protos/build.rs
use std::path::PathBuf;

const PROTOS: &[&str] = &[
    "proto/common/common.proto",
    "proto/common/configtx.proto",
    "proto/common/policies.proto",
    "proto/msp/identities.proto",
    "proto/msp/msp_principal.proto",
    "proto/orderer/ab.proto",
    "proto/peer/chaincode.proto",
    "proto/peer/collection.proto",
    "proto/peer/peer.proto",
    "proto/peer/policy.proto",
    "proto/peer/proposal.proto",
    "proto/peer/proposal_response.proto",
    "proto/peer/query.proto",
    "proto/peer/transaction.proto",
    "proto/peer/lifecycle/lifecycle.proto",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut includes = vec![PathBuf::from("proto")];

    // Windows builds need PROTOC pointing at an installed compiler.
    #[cfg(not(windows))]
    {
        if std::env::var_os("PROTOC").is_none() {
            std::env::set_var("PROTOC", protobuf_src::protoc());
        }
        includes.push(protobuf_src::include());
    }

    for proto in PROTOS {
        println!("cargo:rerun-if-changed={proto}");
    }

    // Servers are generated too; tests stand up in-process peers and orderers.
    tonic_build::configure().compile(PROTOS, &includes)?;

    Ok(())
}
