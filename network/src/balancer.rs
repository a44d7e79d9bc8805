use async_trait::async_trait;
use consensus::NodeId;
use rand::seq::SliceRandom;
use std::fmt;
use std::str::FromStr;
use tokio::sync::Mutex;

use crate::discovery::LivenessProbe;
use crate::{NetworkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    RoundRobin,
    Random,
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" | "rr" => Ok(SelectionPolicy::RoundRobin),
            "random" => Ok(SelectionPolicy::Random),
            other => Err(format!("unknown selection policy: {}", other)),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::RoundRobin => f.write_str("round-robin"),
            SelectionPolicy::Random => f.write_str("random"),
        }
    }
}

/// Picks the node a client session should talk to.
#[async_trait]
pub trait NodeSelector: Send + Sync {
    async fn get_server(&self) -> Result<NodeId>;

    fn policy(&self) -> SelectionPolicy;
}

#[derive(Debug, Default)]
struct RoundRobinState {
    /// Live nodes in the order they were first seen.
    members: Vec<NodeId>,
    cursor: usize,
}

impl RoundRobinState {
    fn refresh(&mut self, live: &[NodeId]) {
        self.members.retain(|member| live.contains(member));
        for node in live {
            if !self.members.contains(node) {
                self.members.push(*node);
            }
        }
    }

    fn next(&mut self) -> Option<NodeId> {
        if self.members.is_empty() {
            return None;
        }
        self.cursor %= self.members.len();
        let target = self.members[self.cursor];
        self.cursor += 1;
        Some(target)
    }
}

pub struct RoundRobinSelector {
    liveness: LivenessProbe,
    state: Mutex<RoundRobinState>,
}

impl RoundRobinSelector {
    pub fn new(liveness: LivenessProbe) -> Self {
        Self {
            liveness,
            state: Mutex::new(RoundRobinState::default()),
        }
    }

    pub async fn members(&self) -> Vec<NodeId> {
        self.state.lock().await.members.clone()
    }
}

#[async_trait]
impl NodeSelector for RoundRobinSelector {
    async fn get_server(&self) -> Result<NodeId> {
        let live = self.liveness.probe_liveness().await;

        let mut state = self.state.lock().await;
        state.refresh(&live);
        let target = state.next().ok_or(NetworkError::NoServersAvailable)?;

        tracing::info!(node = %target, live = state.members.len(), "Round-robin selected node");
        Ok(target)
    }

    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::RoundRobin
    }
}

pub struct RandomSelector {
    liveness: LivenessProbe,
}

impl RandomSelector {
    pub fn new(liveness: LivenessProbe) -> Self {
        Self { liveness }
    }
}

#[async_trait]
impl NodeSelector for RandomSelector {
    async fn get_server(&self) -> Result<NodeId> {
        let live = self.liveness.probe_liveness().await;
        let target = live
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or(NetworkError::NoServersAvailable)?;

        tracing::info!(node = %target, live = live.len(), "Random selection picked node");
        Ok(target)
    }

    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::Random
    }
}
