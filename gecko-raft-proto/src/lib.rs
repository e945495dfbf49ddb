//! raft 客户端协议的 protobuf 消息以及 grpc 桩代码，由 `proto/raft_client.proto` 生成

tonic::include_proto!("gecko.raft");
