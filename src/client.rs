use anyhow::{bail, Context};
use bytes::Bytes;
use consensus::NodeId;
use network::wire::FileResponse;
use network::NodeClient;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DOWNLOAD_SUCCESS: &str = "DOWNLOAD SUCCESS!";

/// A client session: asks the balancer once, then talks to that node only.
pub struct ClientSession {
    client: NodeClient,
    server: NodeId,
}

impl ClientSession {
    pub async fn connect(balancer: SocketAddr, timeout: Duration) -> anyhow::Result<Self> {
        let client = NodeClient::new(timeout)?;
        let server = client
            .get_server(balancer)
            .await
            .with_context(|| format!("no file server available from balancer {}", balancer))?;
        info!("Client connected to file server {}", server);
        Ok(Self { client, server })
    }

    pub fn server(&self) -> NodeId {
        self.server
    }

    pub async fn list(&self) -> anyhow::Result<String> {
        let files = self.client.list_files(self.server).await?;
        if files.is_empty() {
            return Ok("No files on the server".to_string());
        }
        Ok(files
            .iter()
            .map(|(id, name)| format!("{}\t{}", id, name))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Uploads a local file under its own file name unless `name` is given.
    pub async fn upload(&self, path: &Path, name: Option<String>) -> anyhow::Result<FileResponse> {
        let name = match name {
            Some(name) => name,
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .with_context(|| format!("cannot derive a file name from {}", path.display()))?,
        };
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;

        Ok(self.client.upload_file(self.server, &name, Bytes::from(data)).await?)
    }

    /// Writes the file's bytes into `output`, a directory or a file path.
    pub async fn download(&self, id: u64, output: &Path) -> anyhow::Result<FileResponse> {
        let response = self.client.download_file(self.server, id).await?;
        if !response.is_success() {
            return Ok(response);
        }

        let Some(data) = response.data.clone() else {
            bail!("server reported success without file contents");
        };
        let target = download_target(output, &response.message);
        tokio::fs::write(&target, &data)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;
        info!("Saved {} bytes to {}", data.len(), target.display());
        Ok(response)
    }

    pub async fn delete(&self, id: u64) -> anyhow::Result<FileResponse> {
        Ok(self.client.delete_file(self.server, id).await?)
    }

    pub async fn rename(&self, id: u64, new_name: &str, hold_duration_ms: u64) -> anyhow::Result<FileResponse> {
        Ok(self
            .client
            .rename_file(self.server, id, new_name, hold_duration_ms)
            .await?)
    }
}

/// Success messages look like `DOWNLOAD SUCCESS!<name>`.
fn download_target(output: &Path, message: &str) -> PathBuf {
    if output.is_dir() {
        if let Some(name) = message.strip_prefix(DOWNLOAD_SUCCESS) {
            if !name.is_empty() {
                return output.join(name);
            }
        }
    }
    output.to_path_buf()
}
