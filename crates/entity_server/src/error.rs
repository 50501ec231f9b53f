//! Maps core errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use entity_core::error::EntityError;
use serde_json::json;

#[derive(Debug)]
pub struct AppError(pub EntityError);

impl From<EntityError> for AppError {
    fn from(e: EntityError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &self.0 {
            EntityError::Internal(e) => {
                tracing::error!(error = ?e, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = json!({
            "status": self.0.status_name(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}
