pub mod client;
pub mod config;
pub mod error;
pub mod node;

pub use client::ClientSession;
pub use config::{BalancerConfig, Config};
pub use error::{QuorumFsError, Result};
pub use node::{Balancer, Node};

// Re-export key types from workspace crates
pub use api;
pub use consensus;
pub use network;
pub use storage;
