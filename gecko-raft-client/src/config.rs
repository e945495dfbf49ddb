use std::time::Duration;

use tokio::{fs, io::AsyncReadExt};

use crate::{error::Result, protocol::RaftPeer};

/// 客户端配置
///
/// ```toml
/// request_timeout_ms = 3000
///
/// [[peers]]
/// id = "s1"
/// address = "127.0.0.1:7001"
/// ```
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub peers: Vec<RaftPeer>,
    /// 等待流式回复的上限，不设置则一直等待
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub async fn from_path(path: &str) -> Result<Self> {
        let mut file = fs::File::open(path).await?;
        let mut s = String::new();
        file.read_to_string(&mut s).await?;

        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str::<ClientConfig>(s)?)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}
