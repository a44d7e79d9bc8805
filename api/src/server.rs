use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use network::NodeSelector;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::service::NodeService;
use crate::{ApiError, ApiResult};

async fn bind(addr: SocketAddr) -> ApiResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to bind to {}: {}", addr, e)))
}

/// HTTP surface of one storage node.
pub struct Server {
    config: crate::Config,
    service: Arc<NodeService>,
}

impl Server {
    pub fn new(config: crate::Config, service: Arc<NodeService>) -> Self {
        Self { config, service }
    }

    pub async fn start(&self) -> ApiResult<()> {
        let listener = bind(self.config.bind_address()).await?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> ApiResult<()> {
        let addr = listener
            .local_addr()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        tracing::info!("Node {} serving on {}", self.service.node_id(), addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| ApiError::InternalError(format!("Server error: {}", e)))
    }

    pub fn router(&self) -> Router {
        Router::new()
            // Discovery
            .route("/health", get(health_check))
            .route("/services", get(list_services))
            // Peer protocol
            .route("/consensus/prepare", post(prepare))
            .route(
                "/consensus/accept",
                post(accept).layer(DefaultBodyLimit::max(self.config.accept_body_limit())),
            )
            // Client operations
            .route("/files", get(list_files))
            .route(
                "/files/:key",
                put(upload_file)
                    .layer(DefaultBodyLimit::max(self.config.max_upload_bytes))
                    .get(download_file)
                    .delete(delete_file),
            )
            .route("/files/:key/rename", post(rename_file))
            .with_state(self.service.clone())
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }
}

/// HTTP surface of the node selector.
pub struct BalancerServer {
    listen: SocketAddr,
    selector: Arc<dyn NodeSelector>,
}

impl BalancerServer {
    pub fn new(listen: SocketAddr, selector: Arc<dyn NodeSelector>) -> Self {
        Self { listen, selector }
    }

    pub async fn start(&self) -> ApiResult<()> {
        let listener = bind(self.listen).await?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> ApiResult<()> {
        let addr = listener
            .local_addr()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        tracing::info!(
            "{} balancer serving on {}",
            self.selector.policy(),
            addr
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| ApiError::InternalError(format!("Server error: {}", e)))
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/server", get(get_server))
            .route("/health", get(balancer_health))
            .with_state(self.selector.clone())
            .layer(TraceLayer::new_for_http())
    }
}
