use bytes::Bytes;
use consensus::{ConsensusManager, FileRef, NodeId, Operation};
use network::wire::FileResponse;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use storage::{ApplyOutcome, FileExecutor, FileId, StorageError};

/// Per-node façade: mutations go through consensus and fan-out before the
/// local apply; reads answer from local state only. Every outcome is turned
/// into a [`FileResponse`].
pub struct NodeService {
    consensus: Arc<ConsensusManager>,
    executor: Arc<FileExecutor>,
}

impl NodeService {
    pub fn new(consensus: Arc<ConsensusManager>, executor: Arc<FileExecutor>) -> Self {
        Self {
            consensus,
            executor,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.consensus.node_id()
    }

    pub fn executor(&self) -> &Arc<FileExecutor> {
        &self.executor
    }

    pub async fn prepare(&self, proposed: u64) -> consensus::Result<u64> {
        self.consensus.prepare(proposed).await
    }

    /// Applies an operation a peer already agreed on. Failures stay local.
    pub async fn accept_request(&self, operation: Operation) {
        match self.executor.apply(&operation).await {
            Ok(outcome) => {
                tracing::info!(node = %self.node_id(), "Accepted {}: {:?}", operation.kind(), outcome)
            }
            Err(e) => tracing::warn!(
                node = %self.node_id(),
                op = %operation.kind(),
                file = operation.file_name(),
                "Failed to apply accepted operation: {}",
                e
            ),
        }
    }

    pub async fn get_all_files_on_server(&self) -> BTreeMap<FileId, String> {
        self.executor.list().await
    }

    pub async fn upload_file(&self, data: Bytes, name: String) -> FileResponse {
        tracing::info!(node = %self.node_id(), "Upload request for {}", name);

        if let Err(e) = storage::validate_name(&name) {
            return FileResponse::failure(format!("UPLOAD FAILED! {}", e));
        }

        let operation = Operation::Upload { name, data };
        let result = self
            .consensus
            .replicate(&operation, || self.executor.apply(&operation))
            .await;

        match result {
            Ok(Ok(ApplyOutcome::Uploaded(record))) => {
                FileResponse::success("UPLOAD SUCCESS!").with_file_id(record.id)
            }
            Ok(Ok(other)) => {
                tracing::error!("Upload produced unexpected outcome {:?}", other);
                FileResponse::failure("UPLOAD FAILED!")
            }
            Ok(Err(e)) => {
                tracing::error!("Upload failed due to: {}", e);
                FileResponse::failure(format!("UPLOAD FAILED! {}", e))
            }
            Err(e) => {
                tracing::error!("Upload aborted: {}", e);
                FileResponse::failure("UPLOAD FAILED!")
            }
        }
    }

    pub async fn download_file(&self, id: FileId) -> FileResponse {
        tracing::info!(node = %self.node_id(), file_id = id, "Download request");

        match self.executor.read_bytes(id).await {
            Ok((record, data)) => {
                tracing::info!(file_id = id, "File download succeeded for {}", record.name);
                FileResponse::success(format!("DOWNLOAD SUCCESS!{}", record.name))
                    .with_file_id(id)
                    .with_data(data)
            }
            Err(StorageError::NotFound(_)) => {
                tracing::error!(file_id = id, "File does not exist on the server");
                FileResponse::failure("DOWNLOAD FAILED!. File Does Not exist on the server")
            }
            Err(e) => {
                tracing::error!(file_id = id, "Error while reading file: {}", e);
                FileResponse::failure(format!("DOWNLOAD FAILED! {}", e))
            }
        }
    }

    pub async fn delete_file(&self, id: FileId) -> FileResponse {
        tracing::info!(node = %self.node_id(), file_id = id, "Delete request");

        let Some(name) = self.executor.name_of(id).await else {
            tracing::error!(file_id = id, "Invalid file id to delete");
            return FileResponse::failure("DELETE FAILED! Invalid File Id Provided");
        };

        let operation = Operation::Delete {
            target: FileRef::new(id, name),
        };
        let result = self
            .consensus
            .replicate(&operation, || self.executor.apply(&operation))
            .await;

        match result {
            Ok(Ok(_)) => FileResponse::success("DELETE SUCCESS!").with_file_id(id),
            Ok(Err(StorageError::FileLocked(_))) => {
                FileResponse::failure("File locked, cannot delete. Try again later.")
            }
            Ok(Err(StorageError::NotFound(_))) => {
                FileResponse::failure("DELETE FAILED! Invalid File Id Provided")
            }
            Ok(Err(e)) => {
                tracing::error!("DELETE failed due to: {}", e);
                FileResponse::failure(format!("DELETE FAILED! {}", e))
            }
            Err(e) => {
                tracing::error!("Delete aborted: {}", e);
                FileResponse::failure("DELETE FAILED!")
            }
        }
    }

    /// The local claim on the file is taken before the consensus round so an
    /// overlapping delete or rename on this node is refused for the whole
    /// operation, fan-out included.
    ///
    /// Each promised peer holds the file for `hold_duration_ms` before its
    /// accept returns, and this node holds it again afterwards, so the call
    /// takes at least twice the hold. `NodeClient` stretches its request
    /// timeouts to match.
    pub async fn rename_file(&self, id: FileId, new_name: String, hold_duration_ms: u64) -> FileResponse {
        tracing::info!(node = %self.node_id(), file_id = id, "Rename request to {}", new_name);

        if let Err(e) = storage::validate_name(&new_name) {
            return FileResponse::failure(format!("RENAME FAILED! {}", e));
        }
        let Some(name) = self.executor.name_of(id).await else {
            return FileResponse::failure("RENAME FAILED! Invalid File Id Provided");
        };
        let claim = match self.executor.claim(id) {
            Ok(claim) => claim,
            Err(_) => return FileResponse::failure("File locked for renaming. Try again later."),
        };

        let operation = Operation::Rename {
            target: FileRef::new(id, name),
            new_name: new_name.clone(),
            hold_duration_ms,
        };
        let hold = Duration::from_millis(hold_duration_ms);
        let result = self
            .consensus
            .replicate(&operation, || self.executor.rename_claimed(&claim, &new_name, hold))
            .await;

        match result {
            Ok(Ok(record)) => FileResponse::success("Rename successful.").with_file_id(record.id),
            Ok(Err(StorageError::FileLocked(_))) => {
                FileResponse::failure("File locked for renaming. Try again later.")
            }
            Ok(Err(e)) => {
                tracing::error!("Rename failed due to: {}", e);
                FileResponse::failure(format!("RENAME FAILED! {}", e))
            }
            Err(e) => {
                tracing::error!("Rename aborted: {}", e);
                FileResponse::failure("RENAME FAILED!")
            }
        }
    }
}
