//! Mapping of domain errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use phi_core::CoreError;

use crate::coordinator::CoordinatorError;
use crate::http::responses::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Upstream(#[from] CoordinatorError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(e) => match e {
                CoreError::TaskNotFound(_)
                | CoreError::ToolTaskNotFound { .. }
                | CoreError::LocalAgentNotFound(_) => StatusCode::NOT_FOUND,
                CoreError::InvalidStateTransition { .. }
                | CoreError::ToolTaskAlreadyResolved { .. }
                | CoreError::DuplicateStep { .. }
                | CoreError::MetricsAlreadyRecorded(_) => StatusCode::CONFLICT,
                CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            },
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
