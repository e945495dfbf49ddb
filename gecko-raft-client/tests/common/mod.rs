#![allow(dead_code)]

use std::{
    collections::HashSet,
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use gecko_raft_client::{
    proto_utils, ClientProtocol, Error, Message, ProxyFactory, RaftClientReply, RaftPeer,
    ReplyObserver, RequestSink, Result,
};
use gecko_raft_proto::{RaftClientReplyProto, SetConfigurationRequestProto};
use tokio_stream::StreamExt;

/// 流式调用的行为
#[derive(Debug, Clone)]
pub enum Script {
    /// 回复一次后结束
    Reply,
    /// 直接结束，不回复
    Empty,
    /// 以错误结束
    Fail(tonic::Code),
    /// 一直不回复
    Hang,
    /// 丢弃 observer，不给任何终止信号
    Drop,
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub created: AtomicUsize,
    pub unary_calls: AtomicUsize,
    pub streams: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl Recorder {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub fn reply_to(client_id: &str, server_id: &str, call_id: u64, content: &str) -> RaftClientReply {
    RaftClientReply {
        client_id: client_id.to_string(),
        server_id: server_id.to_string(),
        call_id,
        success: true,
        message: Some(Message::new(content.to_string())),
        not_leader: None,
    }
}

pub struct MockProxy {
    peer: RaftPeer,
    script: Script,
    fail_shutdown: bool,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl ClientProtocol for MockProxy {
    async fn set_configuration(
        &self,
        request: SetConfigurationRequestProto,
    ) -> Result<RaftClientReplyProto, tonic::Status> {
        self.recorder.unary_calls.fetch_add(1, Ordering::SeqCst);
        let rpc = request.rpc_request.unwrap_or_default();
        let reply = reply_to(
            &rpc.requestor_id,
            &self.peer.id,
            rpc.call_id,
            &format!("conf:{}", request.peers.len()),
        );
        Ok(proto_utils::to_raft_client_reply_proto(&reply))
    }

    fn append(&self, mut observer: ReplyObserver) -> RequestSink {
        self.recorder.streams.fetch_add(1, Ordering::SeqCst);
        let (sink, mut requests) = RequestSink::channel();
        let script = self.script.clone();
        let peer_id = self.peer.id.clone();
        tokio::spawn(async move {
            let request = match requests.next().await {
                Some(request) => request,
                None => return observer.on_completed(),
            };
            match script {
                Script::Reply => {
                    let rpc = request.rpc_request.unwrap_or_default();
                    let content = request
                        .message
                        .map(|m| String::from_utf8_lossy(&m.content).to_string())
                        .unwrap_or_default();
                    let reply = reply_to(&rpc.requestor_id, &peer_id, rpc.call_id, &content);
                    observer.on_next(proto_utils::to_raft_client_reply_proto(&reply));
                    // 发送端关闭后才结束流
                    while requests.next().await.is_some() {}
                    observer.on_completed();
                }
                Script::Empty => observer.on_completed(),
                Script::Fail(code) => observer.on_error(tonic::Status::new(code, "mock failure")),
                Script::Hang => {
                    let _observer = observer;
                    futures::future::pending::<()>().await;
                }
                Script::Drop => drop(observer),
            }
        });
        sink
    }

    async fn shutdown(&self) -> Result<()> {
        self.recorder.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.fail_shutdown {
            return Err(io::Error::new(io::ErrorKind::Other, "mock shutdown failure").into());
        }
        Ok(())
    }
}

pub struct MockFactory {
    pub recorder: Arc<Recorder>,
    script: Script,
    /// 创建连接耗时
    delay: Duration,
    /// 前若干次创建失败
    failures: AtomicUsize,
    failing_shutdown: HashSet<String>,
}

impl MockFactory {
    pub fn new(script: Script) -> Self {
        Self {
            recorder: Arc::new(Recorder::default()),
            script,
            delay: Duration::ZERO,
            failures: AtomicUsize::new(0),
            failing_shutdown: HashSet::new(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failures(self, n: usize) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_failing_shutdown(mut self, id: &str) -> Self {
        self.failing_shutdown.insert(id.to_string());
        self
    }
}

#[async_trait]
impl ProxyFactory for MockFactory {
    type Proxy = MockProxy;

    async fn create_proxy(&self, peer: &RaftPeer) -> Result<MockProxy> {
        self.recorder.created.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("mock refused {}", peer),
            )));
        }
        Ok(MockProxy {
            peer: peer.clone(),
            script: self.script.clone(),
            fail_shutdown: self.failing_shutdown.contains(&peer.id),
            recorder: self.recorder.clone(),
        })
    }
}

pub fn peers() -> Vec<RaftPeer> {
    vec![
        RaftPeer::new("s1", "127.0.0.1:7001"),
        RaftPeer::new("s2", "127.0.0.1:7002"),
    ]
}
