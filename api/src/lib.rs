mod error;
mod handlers;
mod server;
mod service;

pub use error::{ApiError, ApiResult};
pub use server::{BalancerServer, Server};
pub use service::NodeService;

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Room for the name and the JSON framing around an upload's contents.
const ACCEPT_ENVELOPE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node_ip: IpAddr,
    pub port: u16,
    /// Largest raw body `PUT /files/{name}` takes.
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.node_ip, self.port)
    }

    /// Body limit for `/consensus/accept`: any upload this node takes must
    /// also fit once it is replicated to a peer with the same settings.
    pub fn accept_body_limit(&self) -> usize {
        consensus::payload::encoded_len(self.max_upload_bytes) + ACCEPT_ENVELOPE_BYTES
    }
}
