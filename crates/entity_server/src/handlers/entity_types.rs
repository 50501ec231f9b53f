//! /v1/entityTypes/*

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Path;
use axum::response::Response;
use axum::{Extension, Json};
use uuid::Uuid;

use entity_core::filter::EntityTypeFilter;
use entity_core::messages;
use entity_core::principal::UserDetails;
use entity_core::proto::CreateEntityTypeRequest;
use entity_core::service::RegistryService;
use entity_core::types::{EntityType, EntityTypePatch};

use super::{csv_response, csv_rows, ok, ApiResult, QueryBody};
use crate::error::AppError;

type Service = Extension<Arc<dyn RegistryService>>;

pub async fn create(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Json(req): Json<CreateEntityTypeRequest>,
) -> ApiResult<EntityType> {
    ok(
        messages::ENTITY_TYPE_CREATED,
        service.create_entity_type(&user, req).await?,
    )
}

pub async fn update(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Path(id): Path<Uuid>,
    Json(patch): Json<EntityTypePatch>,
) -> ApiResult<EntityType> {
    ok(
        messages::ENTITY_TYPE_UPDATED,
        service.update_entity_type(&user, id, patch).await?,
    )
}

pub async fn list(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
) -> ApiResult<Vec<EntityType>> {
    ok(
        messages::ENTITY_TYPES_FETCHED,
        service.list_entity_types(&user).await?,
    )
}

pub async fn find(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Json(body): Json<QueryBody<EntityTypeFilter>>,
) -> ApiResult<Vec<EntityType>> {
    ok(
        messages::ENTITY_TYPES_FETCHED,
        service.find_entity_types(&user, body.query).await?,
    )
}

pub async fn bulk_create(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    body: Bytes,
) -> Result<Response, AppError> {
    let rows = csv_rows(&body)?;
    csv_response(&service.bulk_create_entity_types(&user, rows).await?)
}

pub async fn bulk_update(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    body: Bytes,
) -> Result<Response, AppError> {
    let rows = csv_rows(&body)?;
    csv_response(&service.bulk_update_entity_types(&user, rows).await?)
}
