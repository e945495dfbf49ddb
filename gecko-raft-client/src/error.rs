use std::{io, time::Duration};

use crate::PeerId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),
    #[error("Failed to set up connection to peer {peer}: {source}")]
    ConnectionSetup {
        peer: PeerId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Rpc error: {0}")]
    Rpc(#[from] tonic::Status),
    #[error("I/O: {0}")]
    Io(#[from] io::Error),
    #[error("No reply for request {request}")]
    NoReply { request: String },
    #[error("Interrupted while waiting for response of request {request}")]
    Interrupted { request: String },
    #[error("Request {request} timed out after {timeout:?}")]
    Timeout { request: String, timeout: Duration },
    #[error("Peer proxy map closed")]
    Closed,
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// 是否属于 I/O 类错误，上层据此决定是否换节点重试
    pub fn is_io(&self) -> bool {
        !matches!(
            self,
            Error::UnknownPeer(_) | Error::Interrupted { .. } | Error::Closed | Error::Config(_)
        )
    }

    pub(crate) fn connection_setup<E>(peer: &str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::ConnectionSetup {
            peer: peer.to_string(),
            source: source.into(),
        }
    }
}
