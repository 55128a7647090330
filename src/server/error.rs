//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::ChurnError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The request was well-formed but the record cannot be scored
    #[error("{0}")]
    Unprocessable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ChurnError> for ServerError {
    fn from(err: ChurnError) -> Self {
        match err {
            ChurnError::SchemaError(_) | ChurnError::ValidationError(_) => {
                ServerError::Unprocessable(err.to_string())
            }
            ChurnError::SerializationError(_) => ServerError::BadRequest(err.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to a client
    pub fn public_message(&self) -> String {
        match self {
            ServerError::BadRequest(msg) | ServerError::Unprocessable(msg) => msg.clone(),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                "An internal error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": true,
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let missing: ServerError = ChurnError::SchemaError("missing field 'tenure'".into()).into();
        assert_eq!(missing.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let corrupt: ServerError = ChurnError::ArtifactError("bad magic".into()).into();
        assert_eq!(corrupt.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(corrupt.public_message(), "An internal error occurred");

        assert_eq!(
            ServerError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
