use async_trait::async_trait;
use bytes::Bytes;
use consensus::{ConsensusError, NodeId, Operation, PeerTransport, PrepareRequest, PrepareResponse};
use reqwest::{StatusCode, Url};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::wire::{ErrorBody, FileResponse, RenameRequest, ServerAddress};
use crate::{NetworkError, Result};

/// HTTP stub for talking to a storage node or the balancer. Every request is
/// bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl NodeClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { http, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(addr: SocketAddr, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&format!("http://{}/", addr))
            .map_err(|e| NetworkError::Protocol(format!("Invalid address {}: {}", addr, e)))?;
        url.path_segments_mut()
            .map_err(|_| NetworkError::Protocol(format!("Address {} cannot carry a path", addr)))?
            .clear()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, node: NodeId, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| NetworkError::from_request(node, e))
    }

    async fn file_response(node: NodeId, response: reqwest::Response) -> Result<FileResponse> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::Protocol(format!(
                "{} answered {}: {}",
                node, status, body
            )));
        }
        Ok(response.json::<FileResponse>().await?)
    }

    /// Names the node exports on its discovery endpoint.
    pub async fn services(&self, node: NodeId) -> Result<Vec<String>> {
        let url = Self::url(node.addr(), &["services"])?;
        let response = self.send(node, self.http.get(url)).await?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn prepare_round(&self, node: NodeId, round: u64) -> consensus::Result<u64> {
        let unreachable = |reason: String| ConsensusError::PeerUnreachable { peer: node, reason };

        let url = Self::url(node.addr(), &["consensus", "prepare"])
            .map_err(|e| unreachable(e.to_string()))?;
        let response = self
            .send(node, self.http.post(url).json(&PrepareRequest { round }))
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let promised: PrepareResponse = response
                    .json()
                    .await
                    .map_err(|e| ConsensusError::Transport(e.to_string()))?;
                Ok(promised.round)
            }
            StatusCode::CONFLICT => {
                let body: ErrorBody = response
                    .json()
                    .await
                    .map_err(|e| ConsensusError::Transport(e.to_string()))?;
                Err(ConsensusError::StaleProposal {
                    proposed: round,
                    current: body.current_round.unwrap_or(round),
                })
            }
            status => Err(unreachable(format!("unexpected status {}", status))),
        }
    }

    /// A peer applies a rename only after its hold, so the hold is added to
    /// the request timeout.
    pub async fn send_accept(&self, node: NodeId, operation: &Operation) -> Result<()> {
        let url = Self::url(node.addr(), &["consensus", "accept"])?;
        let timeout = match operation {
            Operation::Rename {
                hold_duration_ms, ..
            } => self
                .timeout
                .saturating_add(Duration::from_millis(*hold_duration_ms)),
            _ => self.timeout,
        };
        let request = self.http.post(url).json(operation).timeout(timeout);
        let response = self.send(node, request).await?;
        response.error_for_status()?;
        Ok(())
    }

    pub async fn list_files(&self, node: NodeId) -> Result<BTreeMap<u64, String>> {
        let url = Self::url(node.addr(), &["files"])?;
        let response = self.send(node, self.http.get(url)).await?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn upload_file(&self, node: NodeId, name: &str, data: Bytes) -> Result<FileResponse> {
        let url = Self::url(node.addr(), &["files", name])?;
        let response = self.send(node, self.http.put(url).body(data)).await?;
        Self::file_response(node, response).await
    }

    pub async fn download_file(&self, node: NodeId, id: u64) -> Result<FileResponse> {
        let url = Self::url(node.addr(), &["files", &id.to_string()])?;
        let response = self.send(node, self.http.get(url)).await?;
        Self::file_response(node, response).await
    }

    pub async fn delete_file(&self, node: NodeId, id: u64) -> Result<FileResponse> {
        let url = Self::url(node.addr(), &["files", &id.to_string()])?;
        let response = self.send(node, self.http.delete(url)).await?;
        Self::file_response(node, response).await
    }

    pub async fn rename_file(
        &self,
        node: NodeId,
        id: u64,
        new_name: &str,
        hold_duration_ms: u64,
    ) -> Result<FileResponse> {
        let url = Self::url(node.addr(), &["files", &id.to_string(), "rename"])?;
        let body = RenameRequest {
            new_name: new_name.to_string(),
            hold_duration_ms,
        };
        let request = self
            .http
            .post(url)
            .json(&body)
            .timeout(self.rename_timeout(hold_duration_ms));
        let response = self.send(node, request).await?;
        Self::file_response(node, response).await
    }

    /// The serving node waits out the hold on every peer that promised and
    /// then once more locally, so a rename can take twice its hold.
    pub fn rename_timeout(&self, hold_duration_ms: u64) -> Duration {
        self.timeout
            .saturating_add(Duration::from_millis(hold_duration_ms.saturating_mul(2)))
    }

    /// Asks the balancer which node this session should use.
    pub async fn get_server(&self, balancer: SocketAddr) -> Result<NodeId> {
        let url = Self::url(balancer, &["server"])?;
        let response = self.send(NodeId::new(balancer), self.http.get(url)).await?;

        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Err(NetworkError::NoServersAvailable);
        }
        let server: ServerAddress = response.error_for_status()?.json().await?;
        Ok(server.address)
    }
}

#[async_trait]
impl PeerTransport for NodeClient {
    async fn prepare(&self, peer: NodeId, round: u64) -> consensus::Result<u64> {
        self.prepare_round(peer, round).await
    }

    async fn accept(&self, peer: NodeId, operation: &Operation) -> consensus::Result<()> {
        self.send_accept(peer, operation)
            .await
            .map_err(|e| ConsensusError::PeerUnreachable {
                peer,
                reason: e.to_string(),
            })
    }
}
