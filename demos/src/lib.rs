#![allow(dead_code)]

use clap::{Parser, Subcommand};

/// 向集群中的某个节点发送一个请求
#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct Args {
    /// 集群配置文件
    #[clap(short, long, default_value = "./cluster.toml")]
    pub config: String,
    /// 接收请求的节点 id
    #[clap(short, long)]
    pub server: String,
    #[clap(long, default_value = "demo-client")]
    pub client_id: String,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 写状态机
    Write { message: String },
    /// 只读查询
    Read { message: String },
    /// 成员变更，参数为新配置中的节点 id
    SetConf { ids: Vec<String> },
}

/// 环境变量，前缀 GECKO_
#[derive(Debug, serde::Deserialize)]
pub struct Env {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Env {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("GECKO_").from_env::<Env>()
    }
}
