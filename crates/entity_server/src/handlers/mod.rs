//! HTTP handlers. Successful JSON responses share one envelope.

pub mod entities;
pub mod entity_types;
pub mod health;
pub mod roles;

use axum::body::Bytes;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use entity_core::bulk::{parse_csv, write_csv, CsvRow};
use entity_core::error::EntityError;

use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: &'static str,
    pub result: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub fn ok<T>(message: &'static str, result: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        message,
        result,
        count: None,
    }))
}

pub fn counted<T>(message: &'static str, result: T, count: u64) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        message,
        result,
        count: Some(count),
    }))
}

/// `{"query": {...}}` request bodies.
#[derive(Debug, Default, Deserialize)]
pub struct QueryBody<T> {
    #[serde(default)]
    pub query: T,
}

pub(crate) fn csv_rows(body: &Bytes) -> Result<Vec<CsvRow>, AppError> {
    Ok(parse_csv(body)?)
}

pub(crate) fn csv_response(rows: &[CsvRow]) -> Result<Response, AppError> {
    let bytes = write_csv(rows)?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], bytes).into_response())
}

pub(crate) fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EntityError::BadRequest(format!("{name} is required")).into())
}
