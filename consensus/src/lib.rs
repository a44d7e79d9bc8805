mod coordinator;
mod manager;
mod messages;
pub mod payload;
mod round;

pub use coordinator::{ConsensusCoordinator, PeerTransport, PromiseOutcome, QuorumTally};
pub use manager::ConsensusManager;
pub use messages::{FileRef, Operation, OperationKind, PrepareRequest, PrepareResponse};
pub use round::ConsensusRound;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Address of a storage node. Unique within a deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub SocketAddr);

impl NodeId {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.0
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<SocketAddr>().map(NodeId)
    }
}

impl From<SocketAddr> for NodeId {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node_id: NodeId,
    /// Every known node, possibly including this one.
    pub peers: Vec<NodeId>,
    pub retry_limit: usize,
}

impl Config {
    /// Known nodes other than this one.
    pub fn other_peers(&self) -> Vec<NodeId> {
        let mut others: Vec<NodeId> = self
            .peers
            .iter()
            .copied()
            .filter(|peer| *peer != self.node_id)
            .collect();
        others.sort();
        others.dedup();
        others
    }
}

pub type Result<T> = std::result::Result<T, ConsensusError>;

#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("Stale proposal: round {proposed} is lower than current round {current}")]
    StaleProposal { proposed: u64, current: u64 },

    #[error("Peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: NodeId, reason: String },

    #[error("Consensus failed after {attempts} attempts")]
    ConsensusFailed { attempts: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Wall-clock milliseconds, used to seed and advance rounds.
pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
