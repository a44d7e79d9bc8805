use crate::config::{BalancerConfig, Config};
use crate::error::{QuorumFsError, Result};
use network::{LivenessProbe, NodeClient, NodeSelector, RandomSelector, RoundRobinSelector, SelectionPolicy};
use std::sync::Arc;
use storage::FileExecutor;
use tokio::net::TcpListener;
use tracing::{error, info};

/// One storage node: file executor, consensus and its HTTP service.
pub struct Node {
    config: Config,
    executor: Arc<FileExecutor>,
    service: Arc<api::NodeService>,
    api_server: api::Server,
}

impl Node {
    /// Fails only if the node's storage directory cannot be prepared.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        info!("Initializing file server node at {}", config.bind_address());

        let executor = Arc::new(FileExecutor::open(config.storage_dir()).await.map_err(|e| {
            error!("Unable to create directory {:?}: {}", config.storage_dir(), e);
            QuorumFsError::Storage(e)
        })?);

        let network_config: network::Config = config.clone().into();
        let transport = Arc::new(NodeClient::new(network_config.rpc_timeout())?);

        let consensus_manager = Arc::new(consensus::ConsensusManager::new(
            config.clone().into(),
            transport,
        ));

        let service = Arc::new(api::NodeService::new(consensus_manager, executor.clone()));
        let api_server = api::Server::new(config.clone().into(), service.clone());

        Ok(Self {
            config,
            executor,
            service,
            api_server,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn executor(&self) -> &Arc<FileExecutor> {
        &self.executor
    }

    pub fn service(&self) -> &Arc<api::NodeService> {
        &self.service
    }

    pub async fn start(self) -> Result<()> {
        info!(
            "Bound at {} with name {}",
            self.config.bind_address(),
            network::SERVICE_NAME
        );
        self.api_server.start().await?;
        Ok(())
    }

    /// Serves on an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.api_server.serve(listener).await?;
        Ok(())
    }
}

/// The node selector process.
pub struct Balancer {
    config: BalancerConfig,
    selector: Arc<dyn NodeSelector>,
}

impl Balancer {
    pub fn new(config: BalancerConfig, policy: SelectionPolicy) -> Result<Self> {
        let network_config: network::Config = config.clone().into();
        let client = Arc::new(NodeClient::new(network_config.rpc_timeout())?);
        let liveness = LivenessProbe::new(network_config.candidates, client);

        let selector: Arc<dyn NodeSelector> = match policy {
            SelectionPolicy::RoundRobin => Arc::new(RoundRobinSelector::new(liveness)),
            SelectionPolicy::Random => Arc::new(RandomSelector::new(liveness)),
        };

        Ok(Self { config, selector })
    }

    pub fn selector(&self) -> &Arc<dyn NodeSelector> {
        &self.selector
    }

    pub async fn start(self) -> Result<()> {
        info!("{} load balancer started", self.selector.policy());
        api::BalancerServer::new(self.config.listen, self.selector)
            .start()
            .await?;
        Ok(())
    }
}
