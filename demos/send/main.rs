use clap::Parser;
use demos::{Args, Command, Env};
use flexi_logger::Logger;
use gecko_raft_client::{ClientConfig, Message, RaftClientRequest, RequestDispatcher};
use log::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let env = Env::from_env()?;
    let _logger = Logger::try_with_str(&env.log_level)?.start()?;

    // 获取配置
    let cfg = ClientConfig::from_path(&args.config).await?;
    let dispatcher = RequestDispatcher::from_config(&cfg);

    let request = match args.command {
        Command::Write { message } => {
            RaftClientRequest::write(&args.client_id, &args.server, 1, Message::new(message))
        }
        Command::Read { message } => {
            RaftClientRequest::read(&args.client_id, &args.server, 1, Message::new(message))
        }
        Command::SetConf { ids } => {
            let peers = cfg
                .peers
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect();
            RaftClientRequest::set_configuration(&args.client_id, &args.server, 1, peers)
        }
    };

    match dispatcher.send_request(&request).await {
        Ok(reply) => match &reply.not_leader {
            Some(hint) => info!(
                "{} is not leader, suggested leader: {:?}",
                reply.server_id, hint.suggested_leader
            ),
            None => info!("reply {}: {:?}", reply, reply.message),
        },
        Err(e) => error!("request {} failed: {}", request, e),
    }

    dispatcher.close().await;
    Ok(())
}
