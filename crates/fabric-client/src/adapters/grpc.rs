//! # gRPC Connections
//!
//! tonic implementations of the endorser and orderer connection ports.
//!
//! Calls go through the `Endorser` and `AtomicBroadcast` clients generated
//! in `fabric-protos`. TLS connections dial through a custom connector
//! that runs the rustls handshake from [`super::tls::client_config`].

use std::sync::Arc;

use async_trait::async_trait;
use fabric_protos::common::Envelope;
use fabric_protos::orderer::atomic_broadcast_client::AtomicBroadcastClient;
use fabric_protos::orderer::{BroadcastResponse, DeliverResponse};
use fabric_protos::peer::endorser_client::EndorserClient;
use fabric_protos::peer::{ProposalResponse, SignedProposal};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tonic::body::BoxBody;
use tonic::codegen::http::{Request, Uri};
use tonic::transport::{Channel, Endpoint};
use tower::{service_fn, ServiceExt};
use tracing::{debug, info};

use super::tls;
use crate::config::EndpointConfig;
use crate::domain::{FabricError, Group, StatusError};
use crate::ports::{EndorserConnection, OrdererConnection, ResponseStream};

/// gRPC status received from a remote node, classified as transport.
pub fn transport_error(status: tonic::Status) -> FabricError {
    StatusError::new(Group::Transport, status.code() as i32, status.message().to_string()).into()
}

/// Open a channel to `config`.
///
/// With `fail_fast` the connection is dialed now and a failure is returned
/// as `<group>Client/ConnectionFailed`; otherwise it is dialed on first use.
pub async fn connect(config: &EndpointConfig, group: Group) -> Result<Channel, FabricError> {
    let address = config.address().to_string();
    let mut endpoint = Endpoint::from_shared(format!("http://{address}"))
        .map_err(|e| FabricError::Config(format!("invalid endpoint URL [{}]: {e}", config.url)))?
        .connect_timeout(config.effective_timeout())
        .keep_alive_timeout(config.keepalive.timeout)
        .keep_alive_while_idle(config.keepalive.permit_without_stream);
    if let Some(interval) = config.keepalive.interval {
        endpoint = endpoint.http2_keep_alive_interval(interval);
    }

    let secured = config.is_secured();
    debug!(target_address = %address, secured, fail_fast = config.fail_fast, "opening channel");

    let channel = if secured {
        let connector = TlsConnector::from(tls::client_config(config)?);
        let server_name = tls::server_name(config)?;
        let dial = service_fn(move |_: Uri| {
            let connector = connector.clone();
            let server_name = server_name.clone();
            let address = address.clone();
            async move {
                let tcp = TcpStream::connect(address).await?;
                connector.connect(server_name, tcp).await
            }
        });

        if config.fail_fast {
            endpoint
                .connect_with_connector(dial)
                .await
                .map_err(|e| dial_error(group, config, e))?
        } else {
            endpoint.connect_with_connector_lazy(dial)
        }
    } else if config.fail_fast {
        endpoint
            .connect()
            .await
            .map_err(|e| dial_error(group, config, e))?
    } else {
        endpoint.connect_lazy()
    };

    info!(url = %config.url, secured, "channel ready");
    Ok(channel)
}

fn dial_error(group: Group, config: &EndpointConfig, err: tonic::transport::Error) -> FabricError {
    FabricError::connection_failed(group, format!("{} : {err}", config.address()))
}

async fn ready(channel: &Channel, group: Group, target: &str) -> Result<Channel, FabricError> {
    let mut channel = channel.clone();
    ServiceExt::<Request<BoxBody>>::ready(&mut channel)
        .await
        .map_err(|e| FabricError::connection_failed(group, format!("{target} : {e}")))?;
    Ok(channel)
}

fn into_stream<R: Send + 'static>(inbound: tonic::Streaming<R>) -> ResponseStream<R> {
    inbound
        .map(|message| message.map_err(transport_error))
        .boxed()
}

/// Endorsing peer reached over gRPC.
#[derive(Clone)]
pub struct GrpcEndorser {
    target: String,
    channel: Channel,
}

impl GrpcEndorser {
    /// Connect to the peer described by `config`.
    pub async fn connect(config: &EndpointConfig) -> Result<Self, FabricError> {
        let channel = connect(config, Group::EndorserClient).await?;
        Ok(Self::from_channel(config.url.clone(), channel))
    }

    /// Use an existing channel.
    pub fn from_channel(target: impl Into<String>, channel: Channel) -> Self {
        Self {
            target: target.into(),
            channel,
        }
    }
}

#[async_trait]
impl EndorserConnection for GrpcEndorser {
    async fn process_proposal(
        &self,
        proposal: SignedProposal,
    ) -> Result<ProposalResponse, FabricError> {
        let channel = ready(&self.channel, Group::EndorserClient, &self.target).await?;
        let response = EndorserClient::new(channel)
            .process_proposal(proposal)
            .await
            .map_err(transport_error)?;
        Ok(response.into_inner())
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Ordering node reached over gRPC.
#[derive(Clone)]
pub struct GrpcOrderer {
    target: String,
    channel: Channel,
}

impl GrpcOrderer {
    /// Connect to the orderer described by `config`.
    pub async fn connect(config: &EndpointConfig) -> Result<Self, FabricError> {
        let channel = connect(config, Group::OrdererClient).await?;
        Ok(Self::from_channel(config.url.clone(), channel))
    }

    /// Use an existing channel.
    pub fn from_channel(target: impl Into<String>, channel: Channel) -> Self {
        Self {
            target: target.into(),
            channel,
        }
    }

    async fn client(&self) -> Result<AtomicBroadcastClient<Channel>, FabricError> {
        let channel = ready(&self.channel, Group::OrdererClient, &self.target).await?;
        Ok(AtomicBroadcastClient::new(channel))
    }
}

#[async_trait]
impl OrdererConnection for GrpcOrderer {
    async fn broadcast(
        &self,
        envelope: Envelope,
    ) -> Result<ResponseStream<BroadcastResponse>, FabricError> {
        let response = self
            .client()
            .await?
            .broadcast(tokio_stream::once(envelope))
            .await
            .map_err(transport_error)?;
        Ok(into_stream(response.into_inner()))
    }

    async fn deliver(
        &self,
        envelope: Envelope,
    ) -> Result<ResponseStream<DeliverResponse>, FabricError> {
        let response = self
            .client()
            .await?
            .deliver(tokio_stream::once(envelope))
            .await
            .map_err(transport_error)?;
        Ok(into_stream(response.into_inner()))
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// Connect to an endorsing peer, returned behind the port trait.
pub async fn endorser_connection(config: &EndpointConfig) -> Result<Arc<dyn EndorserConnection>, FabricError> {
    Ok(Arc::new(GrpcEndorser::connect(config).await?))
}

/// Connect to an ordering node, returned behind the port trait.
pub async fn orderer_connection(config: &EndpointConfig) -> Result<Arc<dyn OrdererConnection>, FabricError> {
    Ok(Arc::new(GrpcOrderer::connect(config).await?))
}
