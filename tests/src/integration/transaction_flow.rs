//! # Transaction Flow
//!
//! A chaincode invocation from proposal to ordering:
//!
//! 1. **Sign once**: every peer receives the same signed proposal
//! 2. **Agreement**: endorsements are kept only when all successful
//!    peers return identical payloads
//! 3. **Submission**: the signed transaction reaches the orderer

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fabric_client::ports::MockEndorser;
    use fabric_client::{EndorsementApi, FabricError, Group, RetryPolicy, StatusError};
    use fabric_protos::common::{Envelope, Payload, Status};
    use fabric_protos::peer::{ChaincodeActionPayload, Transaction};
    use fabric_telemetry::PROPOSALS_SENT;
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::Signature;
    use prost::Message;

    use crate::integration::fixtures::{peer, Network, CHANNEL};

    // =============================================================================
    // HELPERS
    // =============================================================================

    fn submitted(envelope: &Envelope) -> ChaincodeActionPayload {
        let payload = Payload::decode(envelope.payload.as_slice()).unwrap();
        let transaction = Transaction::decode(payload.data.as_slice()).unwrap();
        ChaincodeActionPayload::decode(transaction.actions[0].payload.as_slice()).unwrap()
    }

    fn args() -> Vec<Vec<u8>> {
        vec![b"transfer".to_vec(), b"a".to_vec(), b"b".to_vec(), b"10".to_vec()]
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_two_peers_endorse_and_orderer_accepts() {
        let network = Network::new(vec![
            peer("grpcs://peer0.org1.example.com:7051", b"P", b"E1"),
            peer("grpcs://peer0.org2.example.com:9051", b"P", b"E2"),
        ]);
        let client = network.peers_client(RetryPolicy::no_retry());

        let response = client
            .invoke_chaincode(CHANNEL, "basic", false, args())
            .await
            .unwrap();

        assert_eq!(response.status, Status::Success.code());
        assert_eq!(network.orderer.broadcast_calls(), 1);

        let envelope = network.orderer.envelopes().pop().unwrap();
        let action = submitted(&envelope).action.unwrap();
        let endorsers: Vec<_> = action.endorsements.iter().map(|e| e.endorser.clone()).collect();
        assert_eq!(endorsers.len(), 2);
        assert!(endorsers.contains(&b"E1".to_vec()));
        assert!(endorsers.contains(&b"E2".to_vec()));
    }

    #[tokio::test]
    async fn test_submitted_envelope_is_signed_by_client() {
        let network = Network::new(vec![peer("grpcs://peer0.org1.example.com:7051", b"P", b"E1")]);
        network
            .peers_client(RetryPolicy::no_retry())
            .invoke_chaincode(CHANNEL, "basic", false, args())
            .await
            .unwrap();

        let envelope = network.orderer.envelopes().pop().unwrap();
        let signature = Signature::from_der(&envelope.signature).unwrap();
        assert!(network
            .signer
            .verifying_key()
            .verify(&envelope.payload, &signature)
            .is_ok());
    }

    #[tokio::test]
    async fn test_every_peer_sees_identical_signed_bytes() {
        let network = Network::new(vec![
            peer("grpcs://peer0.org1.example.com:7051", b"P", b"E1"),
            peer("grpcs://peer1.org1.example.com:8051", b"P", b"E2"),
            peer("grpcs://peer0.org2.example.com:9051", b"P", b"E3"),
        ]);
        network
            .peers_client(RetryPolicy::no_retry())
            .invoke_chaincode(CHANNEL, "basic", false, args())
            .await
            .unwrap();

        let first = network.peers[0].received();
        for peer in &network.peers[1..] {
            assert_eq!(peer.received(), first);
        }
    }

    #[tokio::test]
    async fn test_proposals_are_counted() {
        let before = PROPOSALS_SENT.with_label_values(&["success"]).get();
        let network = Network::new(vec![peer("grpcs://peer0.org1.example.com:7051", b"P", b"E1")]);
        network
            .peers_client(RetryPolicy::no_retry())
            .invoke_chaincode(CHANNEL, "basic", false, args())
            .await
            .unwrap();

        assert!(PROPOSALS_SENT.with_label_values(&["success"]).get() > before);
    }

    // =============================================================================
    // AGREEMENT FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_disagreeing_peers_block_submission() {
        let network = Network::new(vec![
            peer("grpcs://peer0.org1.example.com:7051", b"P", b"E1"),
            peer("grpcs://peer0.org2.example.com:9051", b"Q", b"E2"),
        ]);

        let err = network
            .peers_client(RetryPolicy::no_retry())
            .invoke_chaincode(CHANNEL, "basic", false, args())
            .await
            .unwrap_err();

        assert!(matches!(err, FabricError::EndorsementMismatch { .. }));
        assert_eq!(network.orderer.broadcast_calls(), 0);
    }

    #[tokio::test]
    async fn test_chaincode_error_on_one_peer_still_submits() {
        let rejecting = Arc::new(MockEndorser::with_response(
            "grpcs://peer0.org2.example.com:9051",
            MockEndorser::response(500, b"boom", b"E2"),
        ));
        let network = Network::new(vec![
            peer("grpcs://peer0.org1.example.com:7051", b"P", b"E1"),
            rejecting,
        ]);

        network
            .peers_client(RetryPolicy::no_retry())
            .invoke_chaincode(CHANNEL, "basic", false, args())
            .await
            .unwrap();

        let envelope = network.orderer.envelopes().pop().unwrap();
        assert_eq!(submitted(&envelope).action.unwrap().endorsements.len(), 1);
    }

    #[tokio::test]
    async fn test_no_peer_answers() {
        let network = Network::new(vec![
            Arc::new(MockEndorser::new("grpcs://peer0.org1.example.com:7051")),
            Arc::new(MockEndorser::new("grpcs://peer0.org2.example.com:9051")),
        ]);

        let err = network
            .peers_client(RetryPolicy::no_retry())
            .invoke_chaincode(CHANNEL, "basic", false, args())
            .await
            .unwrap_err();
        assert!(matches!(err, FabricError::NoProposalResponses));
    }

    // =============================================================================
    // RETRIES
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_busy_peer_is_retried_with_the_same_proposal() {
        let busy = peer("grpcs://peer0.org1.example.com:7051", b"P", b"E1");
        busy.push_result(Err(StatusError::new(Group::EndorserServer, 503, "busy")));
        busy.push_result(Err(StatusError::new(Group::EndorserServer, 503, "busy")));
        let network = Network::new(vec![busy, peer("grpcs://peer0.org2.example.com:9051", b"P", b"E2")]);

        network
            .peers_client(RetryPolicy::default())
            .invoke_chaincode(CHANNEL, "basic", false, args())
            .await
            .unwrap();

        let attempts = network.peers[0].received();
        assert_eq!(attempts.len(), 3);
        assert!(attempts.iter().all(|p| *p == attempts[0]));
        assert_eq!(network.peers[1].received()[0], attempts[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_busy_past_the_budget_is_dropped() {
        let busy = peer("grpcs://peer0.org1.example.com:7051", b"P", b"E1");
        for _ in 0..3 {
            busy.push_result(Err(StatusError::new(Group::EndorserServer, 503, "busy")));
        }
        let network = Network::new(vec![busy, peer("grpcs://peer0.org2.example.com:9051", b"P", b"E2")]);

        let fan_out = network
            .peers_client(RetryPolicy::default())
            .send_proposal(&fabric_protos::peer::Proposal::default())
            .await
            .unwrap();

        let err = fan_out.errors[0].as_ref().unwrap();
        assert!(matches!(err, FabricError::Endorser { .. }));
        assert!(err.has_status(Group::EndorserServer, 503));
        assert!(fan_out.responses[1].is_some());
    }
}
