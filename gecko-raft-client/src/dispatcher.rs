//! 请求分发
//!
//! 把一个请求发往它指定的节点，等待回复并解码
//! * 成员变更请求：一元调用
//! * 普通请求：单次双向流，发送一个请求后关闭发送端，等待第一个回复
//!
//! 本层不做重试，not leader 等错误交给上层处理

use std::{io, time::Duration};

use gecko_raft_proto::RaftClientReplyProto;
use log::{debug, warn};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ClientConfig,
    error::{Error, Result},
    peer_proxy_map::PeerProxyMap,
    proto_utils,
    protocol::{RaftClientReply, RaftClientRequest, RaftPeer},
    proxy::{
        grpc::GrpcProxyFactory, ClientProtocol, Completion, ProxyFactory, ReplyObserver,
    },
};

pub struct RequestDispatcher<F: ProxyFactory = GrpcProxyFactory> {
    proxies: PeerProxyMap<F>,
    /// 等待流式回复的上限
    request_timeout: Option<Duration>,
    /// close 时取消，唤醒所有等待中的请求
    shutdown: CancellationToken,
}

impl RequestDispatcher<GrpcProxyFactory> {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self::new(GrpcProxyFactory::from_config(cfg), cfg.peers.clone())
            .with_request_timeout(cfg.request_timeout())
    }
}

impl<F: ProxyFactory> RequestDispatcher<F> {
    pub fn new(factory: F, peers: impl IntoIterator<Item = RaftPeer>) -> Self {
        let proxies = PeerProxyMap::new(factory);
        proxies.add_peers(peers);
        Self {
            proxies,
            request_timeout: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn proxies(&self) -> &PeerProxyMap<F> {
        &self.proxies
    }

    pub fn add_servers(&self, servers: impl IntoIterator<Item = RaftPeer>) {
        self.proxies.add_peers(servers)
    }

    /// 发送请求并等待回复，close 会中断等待
    pub async fn send_request(&self, request: &RaftClientRequest) -> Result<RaftClientReply> {
        self.send(request, None).await
    }

    /// token 被取消时中断等待，返回 [`Error::Interrupted`]
    pub async fn send_request_with_token(
        &self,
        request: &RaftClientRequest,
        token: CancellationToken,
    ) -> Result<RaftClientReply> {
        self.send(request, Some(&token)).await
    }

    async fn send(
        &self,
        request: &RaftClientRequest,
        token: Option<&CancellationToken>,
    ) -> Result<RaftClientReply> {
        if self.shutdown.is_cancelled() {
            return Err(interrupted(request));
        }

        let proxy = match self.proxies.get_proxy(&request.server_id).await {
            Err(Error::Closed) => return Err(interrupted(request)),
            res => res?,
        };
        // 建连期间 close 已执行，连接由 close 负责关闭
        if self.shutdown.is_cancelled() {
            return Err(interrupted(request));
        }
        debug!("send request {}", request);

        if request.is_set_configuration() {
            let set_conf = proto_utils::to_set_configuration_request_proto(request);
            let reply = proxy.set_configuration(set_conf).await?;
            return proto_utils::to_raft_client_reply(reply);
        }

        let request_proto = proto_utils::to_raft_client_request_proto(request);
        let (observer, completion) = ReplyObserver::new(request);
        let mut sink = proxy.append(observer);
        // 流已经结束时 observer 会给出结果，这里只记录
        if let Err(e) = sink.on_next(request_proto) {
            debug!("write request {} to stream failed: {}", request, e);
        }
        sink.on_completed();

        let reply = self.wait_reply(request, completion, token).await?;
        proto_utils::to_raft_client_reply(reply)
    }

    async fn wait_reply(
        &self,
        request: &RaftClientRequest,
        completion: Completion,
        token: Option<&CancellationToken>,
    ) -> Result<RaftClientReplyProto> {
        let cancelled = async {
            match token {
                Some(token) => select! {
                    _ = self.shutdown.cancelled() => {}
                    _ = token.cancelled() => {}
                },
                None => self.shutdown.cancelled().await,
            }
        };

        select! {
            biased;
            settled = settle(request, completion, self.request_timeout) => settled,
            _ = cancelled => Err(interrupted(request)),
        }
    }

    /// 关闭所有连接并中断等待中的请求，关闭失败只记录日志
    pub async fn close(&self) {
        self.shutdown.cancel();
        for (id, e) in self.proxies.close().await {
            warn!("Got error when closing proxy with id {}: {}", id, e);
        }
    }
}

fn interrupted(request: &RaftClientRequest) -> Error {
    Error::Interrupted {
        request: request.to_string(),
    }
}

/// 等待完成句柄被设置
/// observer 给出的错误已经归类，原样返回；句柄被丢弃则包装为 I/O 错误
async fn settle(
    request: &RaftClientRequest,
    completion: Completion,
    timeout: Option<Duration>,
) -> Result<RaftClientReplyProto> {
    let settled = match timeout {
        Some(timeout) => match time::timeout(timeout, completion).await {
            Ok(settled) => settled,
            Err(_) => {
                return Err(Error::Timeout {
                    request: request.to_string(),
                    timeout,
                })
            }
        },
        None => completion.await,
    };

    match settled {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("reply observer of request {} dropped", request),
        )
        .into()),
    }
}
