//! # Block Flows
//!
//! Reads from the ordering service through single-block deliver seeks:
//! genesis, newest, and the latest configuration block, which costs one
//! deliver when the head is itself the config block and two otherwise.

#[cfg(test)]
mod tests {
    use fabric_client::ports::MockOrderer;
    use fabric_client::{last_config_index, ClientCode, FabricError, Group, OrdererApi, RetryPolicy, StatusError};
    use fabric_protos::common::{Block, Status};
    use fabric_protos::orderer::seek_position;

    use crate::integration::fixtures::{block_with_last_config, Network, CHANNEL};

    fn chain(head: u64, last_config: u64) -> MockOrderer {
        let mut blocks = vec![Block::new(0, Vec::new())];
        blocks.extend((1..=head).map(|n| block_with_last_config(n, last_config.min(n))));
        MockOrderer::with_blocks("grpcs://orderer.example.com:7050", blocks)
    }

    #[tokio::test]
    async fn test_config_block_at_head_costs_one_deliver() {
        let network = Network::with_orderer(vec![], chain(4, 4));
        let block = network
            .orderer_client(RetryPolicy::no_retry())
            .config_block(CHANNEL)
            .await
            .unwrap();

        assert_eq!(block.number(), 4);
        assert_eq!(network.orderer.deliver_calls(), 1);
    }

    #[tokio::test]
    async fn test_older_config_block_costs_two_delivers() {
        let network = Network::with_orderer(vec![], chain(6, 2));
        let block = network
            .orderer_client(RetryPolicy::no_retry())
            .config_block(CHANNEL)
            .await
            .unwrap();

        assert_eq!(block.number(), 2);
        assert_eq!(last_config_index(&block).unwrap(), 2);
        assert_eq!(network.orderer.deliver_calls(), 2);

        let seeks = network.orderer.seek_positions();
        assert!(matches!(seeks[0].r#type, Some(seek_position::Type::Newest(_))));
        assert!(matches!(
            &seeks[1].r#type,
            Some(seek_position::Type::Specified(s)) if s.number == 2
        ));
    }

    #[tokio::test]
    async fn test_fresh_channel_config_is_genesis() {
        let network = Network::with_orderer(vec![], chain(0, 0));
        let block = network
            .orderer_client(RetryPolicy::no_retry())
            .config_block(CHANNEL)
            .await
            .unwrap();

        assert_eq!(block.number(), 0);
        assert_eq!(network.orderer.deliver_calls(), 1);
    }

    #[tokio::test]
    async fn test_genesis_and_newest() {
        let network = Network::with_orderer(vec![], chain(3, 1));
        let client = network.orderer_client(RetryPolicy::no_retry());

        assert_eq!(client.genesis_block(CHANNEL).await.unwrap().number(), 0);
        assert_eq!(client.newest_block(CHANNEL).await.unwrap().number(), 3);
    }

    #[tokio::test]
    async fn test_missing_block_is_not_found() {
        let network = Network::with_orderer(vec![], chain(1, 1));
        let err = network
            .orderer_client(RetryPolicy::no_retry())
            .get_block(CHANNEL, fabric_protos::orderer::SeekPosition::specified(9))
            .await
            .unwrap_err();

        assert!(err.has_status(Group::OrdererServer, Status::NotFound.code()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_orderer_is_retried_then_reported() {
        let orderer = chain(1, 1);
        for _ in 0..3 {
            orderer.push_open_failure(StatusError::new(
                Group::OrdererClient,
                ClientCode::ConnectionFailed,
                "orderer.example.com:7050 : connection refused",
            ));
        }
        let network = Network::with_orderer(vec![], orderer);

        let err = network
            .orderer_client(RetryPolicy::channel_client())
            .newest_block(CHANNEL)
            .await
            .unwrap_err();

        assert!(matches!(err, FabricError::RetriesExhausted { attempts: 3, .. }));
        assert!(err.has_status(Group::OrdererClient, ClientCode::ConnectionFailed));
        assert_eq!(network.orderer.deliver_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_orderer_broadcast_is_retried() {
        let network = Network::new(vec![crate::integration::fixtures::peer(
            "grpcs://peer0.org1.example.com:7051",
            b"P",
            b"E1",
        )]);
        network.orderer.push_broadcast_status(Status::ServiceUnavailable);

        let client = fabric_client::PeersClient::new(
            vec![std::sync::Arc::new(network.endorser(0, RetryPolicy::no_retry()))],
            std::sync::Arc::new(network.orderer_client(RetryPolicy::default())),
            network.signer(),
        );
        let response = fabric_client::EndorsementApi::invoke_chaincode(&client, CHANNEL, "basic", false, vec![])
            .await
            .unwrap();

        assert_eq!(response.status, Status::Success.code());
        assert_eq!(network.orderer.broadcast_calls(), 2);
    }
}
