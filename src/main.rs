use anyhow::Context;
use clap::{Parser, Subcommand};
use quorumfs::config::{
    default_candidates, parse_node_list, DEFAULT_BALANCER_PORT, DEFAULT_DATA_DIR, DEFAULT_HOST,
    DEFAULT_RETRY_LIMIT,
};
use quorumfs::api::DEFAULT_MAX_UPLOAD_BYTES;
use quorumfs::network::{wire::FileResponse, SelectionPolicy, DEFAULT_RPC_TIMEOUT_MS};
use quorumfs::{Balancer, BalancerConfig, ClientSession, Config, Node};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quorumfs", version, about = "Replicated file storage with per-operation consensus")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a storage node
    Node {
        #[arg(long)]
        port: u16,
        #[arg(long, default_value_t = DEFAULT_HOST)]
        host: IpAddr,
        /// Comma-separated ports or host:port pairs of every node
        #[arg(long)]
        peers: Option<String>,
        #[arg(long, default_value = DEFAULT_DATA_DIR)]
        data_dir: PathBuf,
        #[arg(long, default_value_t = DEFAULT_RETRY_LIMIT)]
        retry_limit: usize,
        #[arg(long, default_value_t = DEFAULT_RPC_TIMEOUT_MS)]
        rpc_timeout_ms: u64,
        /// Largest file a client may upload, in bytes
        #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,
    },
    /// Run the node selector
    Balancer {
        #[arg(long, default_value_t = SocketAddr::new(DEFAULT_HOST, DEFAULT_BALANCER_PORT))]
        listen: SocketAddr,
        #[arg(long, default_value = "round-robin")]
        policy: SelectionPolicy,
        #[arg(long)]
        candidates: Option<String>,
        #[arg(long, default_value_t = DEFAULT_RPC_TIMEOUT_MS)]
        rpc_timeout_ms: u64,
    },
    /// Talk to the cluster through the balancer
    Client {
        #[arg(long, default_value_t = SocketAddr::new(DEFAULT_HOST, DEFAULT_BALANCER_PORT))]
        balancer: SocketAddr,
        #[arg(long, default_value_t = DEFAULT_RPC_TIMEOUT_MS)]
        rpc_timeout_ms: u64,
        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand, Debug)]
enum ClientAction {
    List,
    Upload {
        path: PathBuf,
        /// Name to store the file under
        #[arg(long)]
        name: Option<String>,
    },
    Download {
        id: u64,
        #[arg(default_value = ".")]
        output: PathBuf,
    },
    Delete {
        id: u64,
    },
    Rename {
        id: u64,
        new_name: String,
        /// Keep the file locked this long before renaming
        #[arg(long, default_value_t = 0)]
        hold_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Node {
            port,
            host,
            peers,
            data_dir,
            retry_limit,
            rpc_timeout_ms,
            max_upload_bytes,
        } => {
            let peers = match peers {
                Some(raw) => parse_node_list(&raw, host)?,
                None => default_candidates(host),
            };
            let mut config = Config::new(host, port, peers);
            config.data_dir = data_dir;
            config.retry_limit = retry_limit;
            config.rpc_timeout_ms = rpc_timeout_ms;
            config.max_upload_bytes = max_upload_bytes;

            info!("Node configuration: {:?}", config);
            let node = Node::new(config).await.context("failed to start node")?;
            node.start().await?;
        }
        Commands::Balancer {
            listen,
            policy,
            candidates,
            rpc_timeout_ms,
        } => {
            let candidates = match candidates {
                Some(raw) => parse_node_list(&raw, listen.ip())?,
                None => default_candidates(listen.ip()),
            };
            let mut config = BalancerConfig::new(listen, candidates);
            config.rpc_timeout_ms = rpc_timeout_ms;

            Balancer::new(config, policy)?.start().await?;
        }
        Commands::Client {
            balancer,
            rpc_timeout_ms,
            action,
        } => {
            let session = ClientSession::connect(balancer, Duration::from_millis(rpc_timeout_ms)).await?;
            run_client(&session, action).await?;
        }
    }

    Ok(())
}

async fn run_client(session: &ClientSession, action: ClientAction) -> anyhow::Result<()> {
    let response = match action {
        ClientAction::List => {
            println!("{}", session.list().await?);
            return Ok(());
        }
        ClientAction::Upload { path, name } => session.upload(&path, name).await?,
        ClientAction::Download { id, output } => session.download(id, &output).await?,
        ClientAction::Delete { id } => session.delete(id).await?,
        ClientAction::Rename {
            id,
            new_name,
            hold_ms,
        } => session.rename(id, &new_name, hold_ms).await?,
    };

    print_response(&response);
    Ok(())
}

fn print_response(response: &FileResponse) {
    match response.file_id {
        Some(id) => println!("{} (id {})", response.message, id),
        None => println!("{}", response.message),
    }
}
