use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::messages::Operation;
use crate::round::ConsensusRound;
use crate::{Config, ConsensusError, NodeId, Result};

/// Outbound calls a proposer makes to its peers.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Returns the round the peer promised, or `StaleProposal` when the peer
    /// already holds a higher round. Any other error means the peer could not
    /// be reached.
    async fn prepare(&self, peer: NodeId, round: u64) -> Result<u64>;

    async fn accept(&self, peer: NodeId, operation: &Operation) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseOutcome {
    Promised,
    Stale,
    Unreachable,
}

impl PromiseOutcome {
    pub fn classify(proposed: u64, response: &Result<u64>) -> Self {
        match response {
            Ok(accepted) if *accepted >= proposed => PromiseOutcome::Promised,
            Ok(_) => PromiseOutcome::Stale,
            Err(ConsensusError::StaleProposal { .. }) => PromiseOutcome::Stale,
            Err(_) => PromiseOutcome::Unreachable,
        }
    }
}

/// Votes collected for one round. The proposer always promises to itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuorumTally {
    pub promised: HashSet<NodeId>,
    pub stale: HashSet<NodeId>,
    pub unreachable: HashSet<NodeId>,
}

impl QuorumTally {
    pub fn record(&mut self, peer: NodeId, outcome: PromiseOutcome) {
        match outcome {
            PromiseOutcome::Promised => self.promised.insert(peer),
            PromiseOutcome::Stale => self.stale.insert(peer),
            PromiseOutcome::Unreachable => self.unreachable.insert(peer),
        };
    }

    pub fn promises(&self) -> usize {
        self.promised.len() + 1
    }

    pub fn reachable(&self) -> usize {
        self.promised.len() + self.stale.len() + 1
    }

    pub fn ratio(&self) -> f64 {
        self.promises() as f64 / self.reachable() as f64
    }

    /// Strict majority of the nodes that answered this round.
    pub fn has_quorum(&self) -> bool {
        2 * self.promises() > self.reachable()
    }
}

pub struct ConsensusCoordinator {
    node_id: NodeId,
    peers: Vec<NodeId>,
    round: Arc<ConsensusRound>,
    transport: Arc<dyn PeerTransport>,
    retry_limit: usize,
}

impl ConsensusCoordinator {
    pub fn new(
        config: &Config,
        round: Arc<ConsensusRound>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        Self {
            node_id: config.node_id,
            peers: config.other_peers(),
            round,
            transport,
            retry_limit: config.retry_limit.max(1),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn round(&self) -> &Arc<ConsensusRound> {
        &self.round
    }

    /// Acceptor entry point for a peer's proposal.
    pub async fn prepare(&self, proposed: u64) -> Result<u64> {
        let current = self.round.current().await;
        tracing::info!(
            node = %self.node_id,
            proposed,
            current,
            "Received prepare"
        );
        let accepted = self.round.prepare(proposed).await?;
        tracing::debug!(node = %self.node_id, round = accepted, "Promised round");
        Ok(accepted)
    }

    /// Sends `prepare` to every peer, one call at a time, and counts the replies.
    pub async fn collect_promises(&self, proposed: u64) -> QuorumTally {
        let mut tally = QuorumTally::default();

        for peer in &self.peers {
            let response = self.transport.prepare(*peer, proposed).await;
            let outcome = PromiseOutcome::classify(proposed, &response);
            match (&outcome, &response) {
                (PromiseOutcome::Promised, Ok(round)) => {
                    tracing::info!(peer = %peer, round, "Promise received");
                }
                (PromiseOutcome::Unreachable, Err(e)) => {
                    tracing::warn!(peer = %peer, "Peer is down: {}", e);
                }
                _ => {
                    tracing::warn!(peer = %peer, proposed, "Peer rejected stale proposal");
                }
            }
            tally.record(*peer, outcome);
        }

        tally
    }

    /// One propose/promise attempt. On success returns the peers that promised.
    pub async fn run_consensus_round(&self) -> Result<HashSet<NodeId>> {
        let proposed = self.round.current().await;
        tracing::info!(node = %self.node_id, round = proposed, "Trying to reach consensus");

        let tally = self.collect_promises(proposed).await;

        if tally.has_quorum() {
            tracing::info!(
                node = %self.node_id,
                "Consensus SUCCESS: {} / {} acceptors promised",
                tally.promises(),
                tally.reachable()
            );
            Ok(tally.promised)
        } else {
            let advanced = self.round.advance_to_now().await;
            tracing::warn!(
                node = %self.node_id,
                next_round = advanced,
                "Consensus FAILED: {} / {} acceptors promised",
                tally.promises(),
                tally.reachable()
            );
            Err(ConsensusError::ConsensusFailed { attempts: 1 })
        }
    }

    /// Retries `run_consensus_round` without backoff up to the retry limit.
    pub async fn reach_consensus(&self) -> Result<HashSet<NodeId>> {
        for attempt in 1..=self.retry_limit {
            match self.run_consensus_round().await {
                Ok(promised) => return Ok(promised),
                Err(ConsensusError::ConsensusFailed { .. }) => {
                    tracing::debug!(attempt, limit = self.retry_limit, "Retrying consensus round");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ConsensusError::ConsensusFailed {
            attempts: self.retry_limit,
        })
    }
}
