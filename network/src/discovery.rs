use async_trait::async_trait;
use consensus::NodeId;
use futures::future::join_all;
use std::sync::Arc;

use crate::client::NodeClient;
use crate::Result;

/// Lightweight check for which services an address exports.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn exported_services(&self, node: NodeId) -> Result<Vec<String>>;
}

#[async_trait]
impl ServiceProbe for NodeClient {
    async fn exported_services(&self, node: NodeId) -> Result<Vec<String>> {
        self.services(node).await
    }
}

/// Determines which of a fixed candidate set are currently up.
#[derive(Clone)]
pub struct LivenessProbe {
    candidates: Vec<NodeId>,
    probe: Arc<dyn ServiceProbe>,
}

impl LivenessProbe {
    pub fn new(candidates: Vec<NodeId>, probe: Arc<dyn ServiceProbe>) -> Self {
        Self { candidates, probe }
    }

    pub fn candidates(&self) -> &[NodeId] {
        &self.candidates
    }

    /// Candidates exporting at least one service, in candidate order.
    /// Silent candidates are skipped, never treated as an error.
    pub async fn probe_liveness(&self) -> Vec<NodeId> {
        let checks = self.candidates.iter().map(|candidate| {
            let probe = self.probe.clone();
            async move {
                match probe.exported_services(*candidate).await {
                    Ok(services) if !services.is_empty() => Some(*candidate),
                    Ok(_) => {
                        tracing::debug!(node = %candidate, "Node exports no services");
                        None
                    }
                    Err(e) => {
                        tracing::debug!(node = %candidate, "Waiting for other servers... ({})", e);
                        None
                    }
                }
            }
        });

        join_all(checks).await.into_iter().flatten().collect()
    }
}
