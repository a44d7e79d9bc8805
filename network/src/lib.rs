mod balancer;
mod client;
mod discovery;
pub mod wire;

pub use balancer::{NodeSelector, RandomSelector, RoundRobinSelector, SelectionPolicy};
pub use client::NodeClient;
pub use discovery::{LivenessProbe, ServiceProbe};

use consensus::NodeId;
use std::time::Duration;

/// Name every storage node exports on its discovery endpoint.
pub const SERVICE_NAME: &str = "FileServer";

pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;

pub type Result<T> = std::result::Result<T, NetworkError>;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("No servers available")]
    NoServersAvailable,
}

impl NetworkError {
    pub(crate) fn from_request(node: NodeId, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout(format!("{}: {}", node, err))
        } else if err.is_connect() {
            NetworkError::ConnectionFailed(format!("{}: {}", node, err))
        } else {
            NetworkError::Http(err)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed set of addresses that may host a storage node.
    pub candidates: Vec<NodeId>,
    pub rpc_timeout_ms: u64,
}

impl Config {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}
