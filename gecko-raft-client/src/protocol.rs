//! 客户端与集群之间交互的领域对象

use std::fmt;

use bytes::Bytes;

use crate::{CallId, ClientId, PeerId};

/// 集群中的一个节点，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize)]
pub struct RaftPeer {
    pub id: PeerId,
    pub address: String,
}

impl RaftPeer {
    pub fn new(id: impl Into<PeerId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for RaftPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.address)
    }
}

/// 状态机命令，内容对本层不透明
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub content: Bytes,
}

impl Message {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// 请求类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// 写状态机
    Write(Message),
    /// 只读查询
    Read(Message),
    /// 成员变更，目标配置中的全部节点
    SetConfiguration(Vec<RaftPeer>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftClientRequest {
    pub client_id: ClientId,
    /// 接收此请求的节点
    pub server_id: PeerId,
    pub call_id: CallId,
    pub kind: RequestKind,
}

impl RaftClientRequest {
    pub fn write(
        client_id: impl Into<ClientId>,
        server_id: impl Into<PeerId>,
        call_id: CallId,
        message: Message,
    ) -> Self {
        Self::new(client_id, server_id, call_id, RequestKind::Write(message))
    }

    pub fn read(
        client_id: impl Into<ClientId>,
        server_id: impl Into<PeerId>,
        call_id: CallId,
        message: Message,
    ) -> Self {
        Self::new(client_id, server_id, call_id, RequestKind::Read(message))
    }

    pub fn set_configuration(
        client_id: impl Into<ClientId>,
        server_id: impl Into<PeerId>,
        call_id: CallId,
        peers: Vec<RaftPeer>,
    ) -> Self {
        Self::new(
            client_id,
            server_id,
            call_id,
            RequestKind::SetConfiguration(peers),
        )
    }

    fn new(
        client_id: impl Into<ClientId>,
        server_id: impl Into<PeerId>,
        call_id: CallId,
        kind: RequestKind,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            server_id: server_id.into(),
            call_id,
            kind,
        }
    }

    pub fn is_set_configuration(&self) -> bool {
        matches!(self.kind, RequestKind::SetConfiguration(_))
    }
}

impl fmt::Display for RaftClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            RequestKind::Write(_) => "write",
            RequestKind::Read(_) => "read",
            RequestKind::SetConfiguration(_) => "setConf",
        };
        write!(
            f,
            "{}->{}#{}-{}",
            self.client_id, self.server_id, self.call_id, kind
        )
    }
}

/// 接收方不是 leader 时携带的提示，由上层重试逻辑使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotLeaderHint {
    pub suggested_leader: Option<RaftPeer>,
    pub peers: Vec<RaftPeer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftClientReply {
    pub client_id: ClientId,
    pub server_id: PeerId,
    pub call_id: CallId,
    pub success: bool,
    pub message: Option<Message>,
    pub not_leader: Option<NotLeaderHint>,
}

impl RaftClientReply {
    pub fn is_not_leader(&self) -> bool {
        self.not_leader.is_some()
    }
}

impl fmt::Display for RaftClientReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}<-{}#{}:{}",
            self.client_id,
            self.server_id,
            self.call_id,
            if self.success { "OK" } else { "FAIL" }
        )
    }
}
