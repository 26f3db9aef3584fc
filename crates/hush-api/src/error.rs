use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use hush_types::api::ErrorResponse;
use hush_visibility::WhisperError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Whisper(#[from] WhisperError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Whisper(WhisperError::Store(e))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Whisper(e) => match e {
                WhisperError::UnsupportedContext
                | WhisperError::UnknownRecipient { .. }
                | WhisperError::UnknownSender(_)
                | WhisperError::UnknownChannel(_)
                | WhisperError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
                WhisperError::NotSubscribed(_) => StatusCode::FORBIDDEN,
                WhisperError::NotVisible => StatusCode::NOT_FOUND,
                WhisperError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            // Store details stay in the log; callers only learn to retry.
            Self::Whisper(e) if e.is_retriable() => {
                error!("{:?}", e);
                "Service temporarily unavailable, retry later".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { result: "error", msg })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
