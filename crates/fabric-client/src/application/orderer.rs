//! # Orderer
//!
//! Broadcast and deliver exchanges with one ordering node. Each exchange
//! is retried as a unit and bounded by the endpoint deadline.

use std::sync::Arc;
use std::time::Duration;

use fabric_protos::common::{Block, Envelope, Status};
use fabric_protos::orderer::{deliver_response, BroadcastResponse, DeliverResponse};
use fabric_telemetry::metric_inc;
use fabric_telemetry::metrics::outcome;
use fabric_telemetry::{BROADCASTS, DELIVERIES};
use tracing::debug;

use super::stream::{drain, Reply};
use crate::algorithms::RetryPolicy;
use crate::config::EndpointConfig;
use crate::domain::{FabricError, Group, StatusError};
use crate::ports::OrdererConnection;

/// One ordering node.
pub struct Orderer {
    connection: Arc<dyn OrdererConnection>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Orderer {
    /// Wrap `connection` with an explicit policy and deadline.
    pub fn new(connection: Arc<dyn OrdererConnection>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            connection,
            retry,
            timeout,
        }
    }

    /// Wrap `connection` using the endpoint's retry profile and timeout.
    pub fn from_config(connection: Arc<dyn OrdererConnection>, config: &EndpointConfig) -> Self {
        Self::new(connection, config.retry_policy(), config.effective_timeout())
    }

    /// Address of the node.
    pub fn target(&self) -> &str {
        self.connection.target()
    }

    /// Submit `envelope`; succeeds only on a `SUCCESS` reply.
    pub async fn send_broadcast(&self, envelope: Envelope) -> Result<BroadcastResponse, FabricError> {
        let result = self.retry.invoke(|| self.broadcast_once(envelope.clone())).await;
        metric_inc!(BROADCASTS, &[outcome(&result)]);
        result
    }

    /// Send the seek request in `envelope` and return the last block
    /// delivered.
    pub async fn send_deliver(&self, envelope: Envelope) -> Result<Block, FabricError> {
        let result = self.retry.invoke(|| self.deliver_once(envelope.clone())).await;
        metric_inc!(DELIVERIES, &[outcome(&result)]);
        result
    }

    async fn broadcast_once(&self, envelope: Envelope) -> Result<BroadcastResponse, FabricError> {
        debug!(orderer = %self.target(), "broadcast");
        self.with_deadline(async {
            let stream = self.connection.broadcast(envelope).await?;
            drain(stream, self.target(), classify_broadcast).await
        })
        .await
    }

    async fn deliver_once(&self, envelope: Envelope) -> Result<Block, FabricError> {
        debug!(orderer = %self.target(), "deliver");
        self.with_deadline(async {
            let stream = self.connection.deliver(envelope).await?;
            drain(stream, self.target(), classify_deliver).await
        })
        .await
    }

    async fn with_deadline<T>(
        &self,
        exchange: impl std::future::Future<Output = Result<T, FabricError>>,
    ) -> Result<T, FabricError> {
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                FabricError::timeout(
                    Group::OrdererClient,
                    format!("{} : deadline exceeded after {:?}", self.target(), self.timeout),
                )
            })?
    }
}

fn classify_broadcast(response: BroadcastResponse) -> Reply<BroadcastResponse> {
    if response.status == Status::Success.code() {
        Reply::Result(response)
    } else {
        Reply::Error(server_status(response.status, &response.info))
    }
}

fn classify_deliver(response: DeliverResponse) -> Reply<Block> {
    match response.r#type {
        Some(deliver_response::Type::Block(block)) => Reply::Result(block),
        Some(deliver_response::Type::Status(status)) if status != Status::Success.code() => {
            Reply::Error(server_status(status, ""))
        }
        _ => Reply::Ignore,
    }
}

fn server_status(status: i32, info: &str) -> FabricError {
    let message = if info.is_empty() {
        "error status from ordering service".to_string()
    } else {
        format!("error status from ordering service: {info}")
    };
    StatusError::new(Group::OrdererServer, status, message).into()
}
