//! In-process clusters on loopback ports for the integration tests.

use quorumfs::consensus::NodeId;
use quorumfs::network::{
    LivenessProbe, NodeClient, NodeSelector, RandomSelector, RoundRobinSelector, SelectionPolicy,
};
use quorumfs::{api, Config, Node};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const RPC_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

async fn reserve_port() -> TcpListener {
    TcpListener::bind(SocketAddr::new(LOCALHOST, 0))
        .await
        .expect("Failed to bind a loopback port")
}

fn local_id(listener: &TcpListener) -> NodeId {
    NodeId::new(listener.local_addr().expect("Listener has no local address"))
}

/// Shape of a [`TestCluster`] before it starts.
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    live: usize,
    down: usize,
    rpc_timeout: Duration,
    max_upload_bytes: usize,
}

impl ClusterBuilder {
    pub fn down(mut self, count: usize) -> Self {
        self.down = count;
        self
    }

    /// Timeout for node-to-node calls and for the cluster's own client.
    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    pub fn max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub async fn start(self) -> TestCluster {
        TestCluster::launch(self).await
    }
}

/// A set of storage nodes serving over HTTP. Nodes listed as down keep their
/// address in every peer list but never accept connections.
pub struct TestCluster {
    live: Vec<NodeId>,
    down: Vec<NodeId>,
    handles: Vec<JoinHandle<()>>,
    client: NodeClient,
    _data: TempDir,
}

impl TestCluster {
    pub fn builder(live: usize) -> ClusterBuilder {
        ClusterBuilder {
            live,
            down: 0,
            rpc_timeout: RPC_TIMEOUT,
            max_upload_bytes: api::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub async fn start(size: usize) -> Self {
        Self::builder(size).start().await
    }

    pub async fn start_with_down(live_count: usize, down_count: usize) -> Self {
        Self::builder(live_count).down(down_count).start().await
    }

    async fn launch(shape: ClusterBuilder) -> Self {
        init_tracing();
        let ClusterBuilder {
            live: live_count,
            down: down_count,
            rpc_timeout,
            max_upload_bytes,
        } = shape;

        let mut listeners = Vec::with_capacity(live_count);
        for _ in 0..live_count {
            listeners.push(reserve_port().await);
        }
        let mut down = Vec::with_capacity(down_count);
        for _ in 0..down_count {
            let listener = reserve_port().await;
            down.push(local_id(&listener));
        }

        let live: Vec<NodeId> = listeners.iter().map(local_id).collect();
        let everyone: Vec<NodeId> = live.iter().chain(down.iter()).copied().collect();
        let data = tempfile::tempdir().expect("Failed to create scratch directory");

        let mut handles = Vec::with_capacity(live_count);
        for listener in listeners {
            let id = local_id(&listener);
            let mut config = Config::new(id.addr().ip(), id.port(), everyone.clone());
            config.data_dir = data.path().to_path_buf();
            config.rpc_timeout_ms = rpc_timeout.as_millis() as u64;
            config.max_upload_bytes = max_upload_bytes;

            let node = Node::new(config).await.expect("Failed to start node");
            handles.push(tokio::spawn(async move {
                if let Err(e) = node.serve(listener).await {
                    tracing::error!("node {} stopped: {}", id, e);
                }
            }));
        }

        let client = NodeClient::new(rpc_timeout).expect("Failed to build client");

        Self {
            live,
            down,
            handles,
            client,
            _data: data,
        }
    }

    pub fn live(&self) -> &[NodeId] {
        &self.live
    }

    pub fn down(&self) -> &[NodeId] {
        &self.down
    }

    /// Live nodes first, then the down ones, as configured on every node.
    pub fn candidates(&self) -> Vec<NodeId> {
        self.live.iter().chain(self.down.iter()).copied().collect()
    }

    pub fn node(&self, index: usize) -> NodeId {
        self.live[index]
    }

    pub fn client(&self) -> &NodeClient {
        &self.client
    }

    pub async fn start_balancer(&self, policy: SelectionPolicy) -> TestBalancer {
        let liveness = LivenessProbe::new(self.candidates(), Arc::new(self.client.clone()));
        let selector: Arc<dyn NodeSelector> = match policy {
            SelectionPolicy::RoundRobin => Arc::new(RoundRobinSelector::new(liveness)),
            SelectionPolicy::Random => Arc::new(RandomSelector::new(liveness)),
        };

        let listener = reserve_port().await;
        let address = local_id(&listener).addr();
        let server = api::BalancerServer::new(address, selector);
        let handle = tokio::spawn(async move {
            if let Err(e) = server.serve(listener).await {
                tracing::error!("balancer stopped: {}", e);
            }
        });

        TestBalancer { address, handle }
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

pub struct TestBalancer {
    pub address: SocketAddr,
    handle: JoinHandle<()>,
}

impl Drop for TestBalancer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
