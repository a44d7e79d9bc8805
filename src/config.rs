use consensus::NodeId;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::error::{QuorumFsError, Result};

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_NODE_PORTS: [u16; 5] = [7000, 7001, 7002, 7003, 7004];
pub const DEFAULT_BALANCER_PORT: u16 = 9001;
pub const DEFAULT_RETRY_LIMIT: usize = 5;
pub const DEFAULT_DATA_DIR: &str = "replicas";

/// Settings for one storage node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node_ip: IpAddr,
    pub port: u16,
    /// Every node of the deployment, this one included.
    pub peers: Vec<NodeId>,
    pub data_dir: PathBuf,
    pub retry_limit: usize,
    pub rpc_timeout_ms: u64,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn new(node_ip: IpAddr, port: u16, peers: Vec<NodeId>) -> Self {
        Self {
            node_ip,
            port,
            peers,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            retry_limit: DEFAULT_RETRY_LIMIT,
            rpc_timeout_ms: network::DEFAULT_RPC_TIMEOUT_MS,
            max_upload_bytes: api::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::new(SocketAddr::new(self.node_ip, self.port))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.node_ip, self.port)
    }

    /// Each node keeps its bytes in a directory named after its port.
    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join(self.port.to_string())
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_limit == 0 {
            return Err(QuorumFsError::InvalidConfig(
                "retry limit must be at least 1".to_string(),
            ));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(QuorumFsError::InvalidConfig(
                "RPC timeout must be positive".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(QuorumFsError::InvalidConfig(
                "upload limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the node selector process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    pub listen: SocketAddr,
    pub candidates: Vec<NodeId>,
    pub rpc_timeout_ms: u64,
}

impl BalancerConfig {
    pub fn new(listen: SocketAddr, candidates: Vec<NodeId>) -> Self {
        Self {
            listen,
            candidates,
            rpc_timeout_ms: network::DEFAULT_RPC_TIMEOUT_MS,
        }
    }
}

/// Parses `7000,7001` or `10.0.0.2:7000,10.0.0.3:7000`; bare ports use `host`.
pub fn parse_node_list(raw: &str, host: IpAddr) -> Result<Vec<NodeId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if let Ok(port) = entry.parse::<u16>() {
                return Ok(NodeId::new(SocketAddr::new(host, port)));
            }
            entry
                .parse::<NodeId>()
                .map_err(|e| QuorumFsError::InvalidConfig(format!("Invalid node address {}: {}", entry, e)))
        })
        .collect()
}

pub fn default_candidates(host: IpAddr) -> Vec<NodeId> {
    DEFAULT_NODE_PORTS
        .iter()
        .map(|port| NodeId::new(SocketAddr::new(host, *port)))
        .collect()
}

impl From<Config> for consensus::Config {
    fn from(config: Config) -> Self {
        consensus::Config {
            node_id: config.node_id(),
            peers: config.peers,
            retry_limit: config.retry_limit,
        }
    }
}

impl From<Config> for api::Config {
    fn from(config: Config) -> Self {
        api::Config {
            node_ip: config.node_ip,
            port: config.port,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

impl From<Config> for network::Config {
    fn from(config: Config) -> Self {
        network::Config {
            candidates: config.peers,
            rpc_timeout_ms: config.rpc_timeout_ms,
        }
    }
}

impl From<BalancerConfig> for network::Config {
    fn from(config: BalancerConfig) -> Self {
        network::Config {
            candidates: config.candidates,
            rpc_timeout_ms: config.rpc_timeout_ms,
        }
    }
}
