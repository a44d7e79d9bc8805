use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use network::wire::ErrorBody;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Stale proposal: round {proposed} is lower than {current}")]
    StaleProposal { proposed: u64, current: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No servers available")]
    NoServersAvailable,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<consensus::ConsensusError> for ApiError {
    fn from(err: consensus::ConsensusError) -> Self {
        match err {
            consensus::ConsensusError::StaleProposal { proposed, current } => {
                ApiError::StaleProposal { proposed, current }
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<network::NetworkError> for ApiError {
    fn from(err: network::NetworkError) -> Self {
        match err {
            network::NetworkError::NoServersAvailable => ApiError::NoServersAvailable,
            other => ApiError::ServiceUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, code, current_round) = match self {
            ApiError::StaleProposal { current, .. } => {
                (StatusCode::CONFLICT, "StaleProposal", Some(current))
            }
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest", None),
            ApiError::NoServersAvailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "NoServersAvailable", None)
            }
            ApiError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable", None)
            }
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", None),
        };

        let body = ErrorBody {
            code: code.to_string(),
            message,
            current_round,
        };

        (status, Json(body)).into_response()
    }
}
