//! 领域对象与 protobuf 消息之间的转换

use std::io;

use gecko_raft_proto::{
    ClientMessageEntryProto, RaftClientReplyProto, RaftClientRequestProto, RaftPeerProto,
    RaftRpcReplyProto, RaftRpcRequestProto, SetConfigurationRequestProto,
};

use crate::{
    error::Result,
    protocol::{Message, NotLeaderHint, RaftClientReply, RaftClientRequest, RaftPeer, RequestKind},
};

pub fn to_raft_peer_proto(peer: &RaftPeer) -> RaftPeerProto {
    RaftPeerProto {
        id: peer.id.clone(),
        address: peer.address.clone(),
    }
}

pub fn to_raft_peer(proto: RaftPeerProto) -> RaftPeer {
    RaftPeer::new(proto.id, proto.address)
}

fn to_rpc_request_proto(request: &RaftClientRequest) -> RaftRpcRequestProto {
    RaftRpcRequestProto {
        requestor_id: request.client_id.clone(),
        replier_id: request.server_id.clone(),
        call_id: request.call_id,
    }
}

fn to_message_proto(message: &Message) -> ClientMessageEntryProto {
    ClientMessageEntryProto {
        content: message.content.clone(),
    }
}

/// 普通请求，成员变更请求不带消息体
pub fn to_raft_client_request_proto(request: &RaftClientRequest) -> RaftClientRequestProto {
    let (message, read_only) = match &request.kind {
        RequestKind::Write(m) => (Some(to_message_proto(m)), false),
        RequestKind::Read(m) => (Some(to_message_proto(m)), true),
        RequestKind::SetConfiguration(_) => (None, false),
    };
    RaftClientRequestProto {
        rpc_request: Some(to_rpc_request_proto(request)),
        message,
        read_only,
    }
}

pub fn to_set_configuration_request_proto(
    request: &RaftClientRequest,
) -> SetConfigurationRequestProto {
    let peers = match &request.kind {
        RequestKind::SetConfiguration(peers) => peers.iter().map(to_raft_peer_proto).collect(),
        _ => Vec::new(),
    };
    SetConfigurationRequestProto {
        rpc_request: Some(to_rpc_request_proto(request)),
        peers,
    }
}

pub fn to_raft_client_reply_proto(reply: &RaftClientReply) -> RaftClientReplyProto {
    let (suggested_leader, peers_in_conf) = match &reply.not_leader {
        Some(hint) => (
            hint.suggested_leader.as_ref().map(to_raft_peer_proto),
            hint.peers.iter().map(to_raft_peer_proto).collect(),
        ),
        None => (None, Vec::new()),
    };
    RaftClientReplyProto {
        rpc_reply: Some(RaftRpcReplyProto {
            requestor_id: reply.client_id.clone(),
            replier_id: reply.server_id.clone(),
            call_id: reply.call_id,
            success: reply.success,
        }),
        message: reply.message.as_ref().map(to_message_proto),
        is_not_leader: reply.not_leader.is_some(),
        suggested_leader,
        peers_in_conf,
    }
}

/// 回复缺少 rpc 元数据时视为无法解码
pub fn to_raft_client_reply(proto: RaftClientReplyProto) -> Result<RaftClientReply> {
    let rpc = proto.rpc_reply.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "reply without rpc_reply header")
    })?;
    let not_leader = proto.is_not_leader.then(|| NotLeaderHint {
        suggested_leader: proto.suggested_leader.map(to_raft_peer),
        peers: proto.peers_in_conf.into_iter().map(to_raft_peer).collect(),
    });
    Ok(RaftClientReply {
        client_id: rpc.requestor_id,
        server_id: rpc.replier_id,
        call_id: rpc.call_id,
        success: rpc.success,
        message: proto.message.map(|m| Message::new(m.content)),
        not_leader,
    })
}
