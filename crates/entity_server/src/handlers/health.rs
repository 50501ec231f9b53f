//! GET /health

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Extension, Json};
use entity_core::proto::HealthReport;
use entity_core::service::RegistryService;

pub async fn health(
    Extension(service): Extension<Arc<dyn RegistryService>>,
) -> (StatusCode, Json<HealthReport>) {
    let report = service.health().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
