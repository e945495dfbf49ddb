//! 基于 tonic 的连接句柄实现

use std::time::Duration;

use async_trait::async_trait;
use gecko_raft_proto::{
    raft_client_protocol_service_client::RaftClientProtocolServiceClient, RaftClientReplyProto,
    RaftClientRequestProto, SetConfigurationRequestProto,
};
use log::{debug, info};
use tokio::select;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};

use crate::{
    config::ClientConfig,
    error::{Error, Result},
    protocol::RaftPeer,
    proxy::{ClientProtocol, ProxyFactory, ReplyObserver, RequestSink},
};

/// 到一个对等节点的 grpc 连接
/// Channel 内部自带多路复用，可被并发的请求共享
pub struct GrpcClientProxy {
    peer: RaftPeer,
    client: RaftClientProtocolServiceClient<Channel>,
    /// 关闭时取消所有进行中的流
    shutdown: CancellationToken,
}

impl GrpcClientProxy {
    pub fn new(peer: RaftPeer, channel: Channel) -> Self {
        Self {
            peer,
            client: RaftClientProtocolServiceClient::new(channel),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn peer(&self) -> &RaftPeer {
        &self.peer
    }

    fn ensure_open(&self) -> Result<(), tonic::Status> {
        if self.shutdown.is_cancelled() {
            return Err(tonic::Status::unavailable(format!(
                "proxy to {} is shut down",
                self.peer
            )));
        }
        Ok(())
    }
}

/// 驱动一次双向流，把每个回复交给 observer
async fn exchange(
    mut client: RaftClientProtocolServiceClient<Channel>,
    requests: UnboundedReceiverStream<RaftClientRequestProto>,
    observer: &mut ReplyObserver,
) -> Result<(), tonic::Status> {
    let mut replies = client.append(requests).await?.into_inner();
    while let Some(reply) = replies.message().await? {
        observer.on_next(reply);
    }
    Ok(())
}

#[async_trait]
impl ClientProtocol for GrpcClientProxy {
    async fn set_configuration(
        &self,
        request: SetConfigurationRequestProto,
    ) -> Result<RaftClientReplyProto, tonic::Status> {
        self.ensure_open()?;
        let mut client = self.client.clone();
        Ok(client.set_configuration(request).await?.into_inner())
    }

    fn append(&self, mut observer: ReplyObserver) -> RequestSink {
        let (sink, requests) = RequestSink::channel();
        if let Err(status) = self.ensure_open() {
            observer.on_error(status);
            return sink;
        }

        let client = self.client.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let result = select! {
                _ = shutdown.cancelled() => Err(tonic::Status::cancelled("proxy shut down")),
                res = exchange(client, requests, &mut observer) => res,
            };
            match result {
                Ok(()) => observer.on_completed(),
                Err(status) => observer.on_error(status),
            }
        });
        sink
    }

    async fn shutdown(&self) -> Result<()> {
        info!("shutdown proxy to peer {}", self.peer);
        self.shutdown.cancel();
        Ok(())
    }
}

/// 按节点地址建立 grpc 连接
#[derive(Debug, Clone, Default)]
pub struct GrpcProxyFactory {
    connect_timeout: Option<Duration>,
}

impl GrpcProxyFactory {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }

    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self::new(cfg.connect_timeout())
    }

    fn endpoint(&self, peer: &RaftPeer) -> Result<Endpoint> {
        let uri = if peer.address.contains("://") {
            peer.address.clone()
        } else {
            format!("http://{}", peer.address)
        };
        let mut endpoint =
            Endpoint::from_shared(uri).map_err(|e| Error::connection_setup(&peer.id, e))?;
        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        Ok(endpoint)
    }
}

#[async_trait]
impl ProxyFactory for GrpcProxyFactory {
    type Proxy = GrpcClientProxy;

    async fn create_proxy(&self, peer: &RaftPeer) -> Result<GrpcClientProxy> {
        debug!("connecting to peer {}", peer);
        let channel = self
            .endpoint(peer)?
            .connect()
            .await
            .map_err(|e| Error::connection_setup(&peer.id, e))?;
        Ok(GrpcClientProxy::new(peer.clone(), channel))
    }
}
