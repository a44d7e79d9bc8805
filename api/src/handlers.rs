use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use consensus::{Operation, PrepareRequest, PrepareResponse};
use network::wire::{FileResponse, HealthResponse, RenameRequest, ServerAddress};
use network::{NodeSelector, SERVICE_NAME};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::service::NodeService;
use crate::{ApiError, ApiResult};

pub type NodeState = Arc<NodeService>;
pub type BalancerState = Arc<dyn NodeSelector>;

fn parse_file_id(raw: &str) -> ApiResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ApiError::InvalidRequest(format!("Invalid file id: {}", raw)))
}

pub async fn health_check(State(service): State<NodeState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        node: service.node_id(),
    })
}

/// Registration: the names this address exports.
pub async fn list_services() -> Json<Vec<String>> {
    Json(vec![SERVICE_NAME.to_string()])
}

pub async fn prepare(
    State(service): State<NodeState>,
    Json(request): Json<PrepareRequest>,
) -> ApiResult<Json<PrepareResponse>> {
    let round = service.prepare(request.round).await?;
    Ok(Json(PrepareResponse { round }))
}

pub async fn accept(
    State(service): State<NodeState>,
    Json(operation): Json<Operation>,
) -> StatusCode {
    service.accept_request(operation).await;
    StatusCode::NO_CONTENT
}

pub async fn list_files(State(service): State<NodeState>) -> Json<BTreeMap<u64, String>> {
    Json(service.get_all_files_on_server().await)
}

pub async fn upload_file(
    State(service): State<NodeState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Json<FileResponse> {
    Json(service.upload_file(body, name).await)
}

pub async fn download_file(
    State(service): State<NodeState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FileResponse>> {
    let id = parse_file_id(&id)?;
    Ok(Json(service.download_file(id).await))
}

pub async fn delete_file(
    State(service): State<NodeState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FileResponse>> {
    let id = parse_file_id(&id)?;
    Ok(Json(service.delete_file(id).await))
}

pub async fn rename_file(
    State(service): State<NodeState>,
    Path(id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> ApiResult<Json<FileResponse>> {
    let id = parse_file_id(&id)?;
    Ok(Json(
        service
            .rename_file(id, request.new_name, request.hold_duration_ms)
            .await,
    ))
}

pub async fn get_server(State(selector): State<BalancerState>) -> ApiResult<Json<ServerAddress>> {
    let address = selector.get_server().await?;
    Ok(Json(ServerAddress { address }))
}

pub async fn balancer_health() -> StatusCode {
    StatusCode::OK
}
