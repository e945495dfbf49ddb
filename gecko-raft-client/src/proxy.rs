//! 与单个对等节点之间的连接抽象
//!
//! 传输层通过 [`ClientProtocol`] 暴露两种调用：
//! * 一元调用：成员变更
//! * 单次双向流：发送一个请求后关闭发送端，回复通过 [`ReplyObserver`] 回调异步送达

use async_trait::async_trait;
use gecko_raft_proto::{RaftClientReplyProto, RaftClientRequestProto, SetConfigurationRequestProto};
use log::debug;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    error::{Error, Result},
    protocol::{RaftClientRequest, RaftPeer},
};

pub mod grpc;

/// 一个对等节点的连接句柄，可被多个请求并发使用
#[async_trait]
pub trait ClientProtocol: Send + Sync + 'static {
    async fn set_configuration(
        &self,
        request: SetConfigurationRequestProto,
    ) -> Result<RaftClientReplyProto, tonic::Status>;

    /// 打开一个流，回复与结束信号通过 observer 回调
    /// 返回的 sink 用于写入请求
    fn append(&self, observer: ReplyObserver) -> RequestSink;

    /// 释放底层传输资源
    async fn shutdown(&self) -> Result<()>;
}

/// 首次访问某个节点时创建连接句柄
#[async_trait]
pub trait ProxyFactory: Send + Sync + 'static {
    type Proxy: ClientProtocol;

    async fn create_proxy(&self, peer: &RaftPeer) -> Result<Self::Proxy>;
}

pub(crate) type Completion = oneshot::Receiver<Result<RaftClientReplyProto>>;

/// 一次流式请求的回复观察者
///
/// 持有请求的完成句柄，只会被设置一次：第一个回复、流错误或者流结束
/// 终止回调消耗 self，保证每个流只有一个终止信号
#[derive(Debug)]
pub struct ReplyObserver {
    /// 原始请求，用于错误信息
    request: String,
    completion: Option<oneshot::Sender<Result<RaftClientReplyProto>>>,
}

impl ReplyObserver {
    pub(crate) fn new(request: &RaftClientRequest) -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        let observer = Self {
            request: request.to_string(),
            completion: Some(tx),
        };
        (observer, rx)
    }

    /// 收到回复，只有第一个回复生效
    pub fn on_next(&mut self, reply: RaftClientReplyProto) {
        self.settle(Ok(reply))
    }

    /// 流出错，不在此处重试
    pub fn on_error(mut self, status: tonic::Status) {
        self.settle(Err(Error::Rpc(status)))
    }

    /// 流正常结束
    pub fn on_completed(mut self) {
        if !self.is_done() {
            let request = self.request.clone();
            self.settle(Err(Error::NoReply { request }))
        }
    }

    pub fn is_done(&self) -> bool {
        self.completion.is_none()
    }

    fn settle(&mut self, result: Result<RaftClientReplyProto>) {
        if let Some(tx) = self.completion.take() {
            if tx.send(result).is_err() {
                debug!("caller of request {} stopped waiting", self.request);
            }
        }
    }
}

/// 流的发送端，单次使用：写入一个请求，然后关闭
#[derive(Debug)]
pub struct RequestSink {
    tx: Option<mpsc::UnboundedSender<RaftClientRequestProto>>,
}

impl RequestSink {
    /// 创建 sink 以及交给传输层的请求流
    pub fn channel() -> (Self, UnboundedReceiverStream<RaftClientRequestProto>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, UnboundedReceiverStream::new(rx))
    }

    pub fn on_next(&mut self, request: RaftClientRequestProto) -> Result<()> {
        let tx = self.tx.as_ref().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "request stream completed")
        })?;
        tx.send(request).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "request stream closed").into()
        })
    }

    /// 关闭发送端，通知对方没有更多请求
    pub fn on_completed(&mut self) {
        self.tx.take();
    }
}

#[cfg(test)]
mod tests {
    use gecko_raft_proto::RaftRpcReplyProto;
    use tokio_stream::StreamExt;

    use super::*;
    use crate::protocol::Message;

    fn request() -> RaftClientRequest {
        RaftClientRequest::write("c1", "s1", 1, Message::new("x"))
    }

    fn reply(call_id: u64) -> RaftClientReplyProto {
        RaftClientReplyProto {
            rpc_reply: Some(RaftRpcReplyProto {
                call_id,
                success: true,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn first_reply_wins() {
        let (mut observer, completion) = ReplyObserver::new(&request());
        observer.on_next(reply(1));
        observer.on_next(reply(2));
        assert!(observer.is_done());
        observer.on_completed();

        let settled = completion.await.unwrap().unwrap();
        assert_eq!(settled.rpc_reply.unwrap().call_id, 1);
    }

    #[tokio::test]
    async fn completed_without_reply() {
        let (observer, completion) = ReplyObserver::new(&request());
        observer.on_completed();

        match completion.await.unwrap() {
            Err(Error::NoReply { request }) => assert_eq!(request, "c1->s1#1-write"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn error_after_reply_is_ignored() {
        let (mut observer, completion) = ReplyObserver::new(&request());
        observer.on_next(reply(1));
        observer.on_error(tonic::Status::internal("late"));
        assert!(completion.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn sink_sends_once_then_closes() {
        let (mut sink, mut requests) = RequestSink::channel();
        sink.on_next(RaftClientRequestProto::default()).unwrap();
        sink.on_completed();
        assert!(sink.on_next(RaftClientRequestProto::default()).is_err());

        assert!(requests.next().await.is_some());
        assert!(requests.next().await.is_none());
    }
}
