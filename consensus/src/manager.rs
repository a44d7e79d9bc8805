use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;

use crate::coordinator::{ConsensusCoordinator, PeerTransport};
use crate::messages::Operation;
use crate::round::ConsensusRound;
use crate::{Config, NodeId, Result};

/// Runs a consensus round for each mutation, fans the accepted operation out
/// to the peers that promised, then applies it locally.
pub struct ConsensusManager {
    coordinator: ConsensusCoordinator,
    transport: Arc<dyn PeerTransport>,
    config: Config,
}

impl ConsensusManager {
    pub fn new(config: Config, transport: Arc<dyn PeerTransport>) -> Self {
        Self::with_round(config, Arc::new(ConsensusRound::new()), transport)
    }

    pub fn with_round(
        config: Config,
        round: Arc<ConsensusRound>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        let coordinator = ConsensusCoordinator::new(&config, round, transport.clone());
        Self {
            coordinator,
            transport,
            config,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    pub fn coordinator(&self) -> &ConsensusCoordinator {
        &self.coordinator
    }

    pub async fn prepare(&self, proposed: u64) -> Result<u64> {
        self.coordinator.prepare(proposed).await
    }

    /// Local apply only happens once a round reached quorum. Peer delivery is
    /// best-effort: failures are logged and never retried or rolled back.
    pub async fn replicate<T, F, Fut>(&self, operation: &Operation, apply: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let promised = self.coordinator.reach_consensus().await?;

        let mut targets: Vec<NodeId> = promised.into_iter().collect();
        targets.sort();
        self.fan_out(&targets, operation).await;

        Ok(apply().await)
    }

    async fn fan_out(&self, targets: &[NodeId], operation: &Operation) {
        let deliveries = targets.iter().map(|peer| {
            let transport = self.transport.clone();
            async move { (*peer, transport.accept(*peer, operation).await) }
        });

        for (peer, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(()) => tracing::debug!(
                    peer = %peer,
                    op = %operation.kind(),
                    file = operation.file_name(),
                    "Accept request delivered"
                ),
                Err(e) => tracing::warn!(
                    peer = %peer,
                    op = %operation.kind(),
                    "Failed to deliver accept request: {}",
                    e
                ),
            }
        }
    }
}
