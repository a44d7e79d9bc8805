use tokio::sync::Mutex;

use crate::{now_millis, ConsensusError, Result};

/// Proposal counter owned by one node. Never decreases.
#[derive(Debug)]
pub struct ConsensusRound {
    value: Mutex<u64>,
}

impl ConsensusRound {
    /// Seeds the round from the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(now_millis())
    }

    pub fn starting_at(value: u64) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    pub async fn current(&self) -> u64 {
        *self.value.lock().await
    }

    /// Acceptor side of a round. Promises `proposed` unless it is lower than
    /// the local round, in which case the local round is left untouched.
    pub async fn prepare(&self, proposed: u64) -> Result<u64> {
        let mut current = self.value.lock().await;
        if proposed < *current {
            return Err(ConsensusError::StaleProposal {
                proposed,
                current: *current,
            });
        }
        *current = proposed;
        Ok(*current)
    }

    /// Moves the round forward to at least `candidate`.
    pub async fn advance_to(&self, candidate: u64) -> u64 {
        let mut current = self.value.lock().await;
        *current = (*current).max(candidate);
        *current
    }

    /// Called after a failed attempt so the retry carries a higher claim.
    pub async fn advance_to_now(&self) -> u64 {
        self.advance_to(now_millis()).await
    }
}

impl Default for ConsensusRound {
    fn default() -> Self {
        Self::new()
    }
}
