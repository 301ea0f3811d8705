//! # Lifecycle Flow
//!
//! Channel membership and chaincode lifecycle steps driven through the
//! system chaincodes: join, per-organization approval, commit.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fabric_client::application::lifecycle::{functions, CSCC, LIFECYCLE};
    use fabric_client::domain::ApproveChaincodeRequest;
    use fabric_client::ports::{MockEndorser, MockOrderer};
    use fabric_client::{ChaincodeDefinition, EndorsementApi, RetryPolicy};
    use fabric_protos::common::{Block, ChannelHeader, HeaderType, Payload, Status};
    use fabric_protos::peer::{
        ChaincodeInvocationSpec, ChaincodeProposalPayload, Proposal, SignedProposal,
    };
    use prost::Message;

    use crate::integration::fixtures::{peer, Network, CHANNEL};

    fn invocation(signed: &SignedProposal) -> (String, Vec<Vec<u8>>) {
        let proposal = Proposal::decode(signed.proposal_bytes.as_slice()).unwrap();
        let payload = ChaincodeProposalPayload::decode(proposal.payload.as_slice()).unwrap();
        let spec = ChaincodeInvocationSpec::decode(payload.input.as_slice())
            .unwrap()
            .chaincode_spec
            .unwrap();
        (
            spec.chaincode_id.unwrap().name,
            spec.input.unwrap().args,
        )
    }

    fn definition() -> ChaincodeDefinition {
        ChaincodeDefinition {
            name: "basic".into(),
            version: "1.0".into(),
            sequence: 1,
            init_required: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_join_channel_sends_genesis_block() {
        let genesis = Block::new(0, Vec::new());
        let network = Network::with_orderer(
            vec![peer("grpcs://peer0.org1.example.com:7051", b"", b"E1")],
            MockOrderer::with_blocks("grpcs://orderer.example.com:7050", vec![genesis.clone()]),
        );

        network
            .peer_client(0)
            .join_channel(CHANNEL, &network.orderer_client(RetryPolicy::no_retry()))
            .await
            .unwrap();

        let (chaincode, args) = invocation(&network.peers[0].received()[0]);
        assert_eq!(chaincode, CSCC);
        assert_eq!(args[0], functions::JOIN_CHAIN.as_bytes());
        assert_eq!(args[1], genesis.encode_to_vec());
    }

    #[tokio::test]
    async fn test_join_without_genesis_fails_before_the_peer() {
        let network = Network::new(vec![peer("grpcs://peer0.org1.example.com:7051", b"", b"E1")]);

        let result = network
            .peer_client(0)
            .join_channel(CHANNEL, &network.orderer_client(RetryPolicy::no_retry()))
            .await;

        assert!(result.is_err());
        assert_eq!(network.peers[0].calls(), 0);
    }

    #[tokio::test]
    async fn test_approve_submits_single_endorsement() {
        let network = Network::new(vec![peer("grpcs://peer0.org1.example.com:7051", b"A", b"E1")]);
        let request = ApproveChaincodeRequest {
            definition: definition(),
            package_id: Some("basic_1.0:0a1b".into()),
        };

        let response = network
            .peer_client(0)
            .approve_chaincode(CHANNEL, &request, &network.orderer_client(RetryPolicy::no_retry()))
            .await
            .unwrap();
        assert_eq!(response.status, Status::Success.code());

        let (chaincode, args) = invocation(&network.peers[0].received()[0]);
        assert_eq!(chaincode, LIFECYCLE);
        assert_eq!(args[0], functions::APPROVE.as_bytes());

        let envelope = network.orderer.envelopes().pop().unwrap();
        let payload = Payload::decode(envelope.payload.as_slice()).unwrap();
        let header = ChannelHeader::decode(payload.header.unwrap().channel_header.as_slice()).unwrap();
        assert_eq!(header.r#type, HeaderType::EndorserTransaction as i32);
        assert_eq!(header.channel_id, CHANNEL);
    }

    #[tokio::test]
    async fn test_commit_is_endorsed_by_every_organization() {
        let network = Network::new(vec![
            peer("grpcs://peer0.org1.example.com:7051", b"C", b"E1"),
            peer("grpcs://peer0.org2.example.com:9051", b"C", b"E2"),
        ]);

        network
            .peers_client(RetryPolicy::no_retry())
            .commit_chaincode(CHANNEL, &definition())
            .await
            .unwrap();

        for peer in &network.peers {
            let (chaincode, args) = invocation(&peer.received()[0]);
            assert_eq!(chaincode, LIFECYCLE);
            assert_eq!(args[0], functions::COMMIT.as_bytes());
        }
        assert_eq!(network.orderer.broadcast_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejected_approval_is_not_submitted() {
        let rejecting = Arc::new(MockEndorser::with_response(
            "grpcs://peer0.org1.example.com:7051",
            MockEndorser::response(500, b"", b"E1"),
        ));
        let network = Network::new(vec![rejecting]);
        let request = ApproveChaincodeRequest {
            definition: definition(),
            package_id: None,
        };

        let result = network
            .peer_client(0)
            .approve_chaincode(CHANNEL, &request, &network.orderer_client(RetryPolicy::no_retry()))
            .await;

        assert!(result.is_err());
        assert_eq!(network.orderer.broadcast_calls(), 0);
    }
}
