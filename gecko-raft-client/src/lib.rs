//! raft 集群客户端的请求分发层
//!
//! 把“向某个节点发送请求”转换为一次网络往返：
//! * 每个对等节点维护一个长连接，首次使用时创建
//! * 成员变更请求走一元调用，普通请求走单次双向流
//! * 传输层的各类失败统一归类为 [`error::Error`]
//!
//! leader 选举、重试与重定向由上层负责，本层不涉及

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod peer_proxy_map;
pub mod protocol;
pub mod proto_utils;
pub mod proxy;

pub use config::ClientConfig;
pub use dispatcher::RequestDispatcher;
pub use error::{Error, Result};
pub use peer_proxy_map::PeerProxyMap;
pub use protocol::{
    Message, NotLeaderHint, RaftClientReply, RaftClientRequest, RaftPeer, RequestKind,
};
pub use proxy::{
    grpc::{GrpcClientProxy, GrpcProxyFactory},
    ClientProtocol, ProxyFactory, ReplyObserver, RequestSink,
};

pub type PeerId = String;
pub type ClientId = String;
pub type CallId = u64;
