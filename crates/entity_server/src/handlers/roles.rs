//! /v1/userRoleExtension/*

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use uuid::Uuid;

use entity_core::filter::RoleFilter;
use entity_core::messages;
use entity_core::principal::UserDetails;
use entity_core::proto::CreateRoleRequest;
use entity_core::service::RegistryService;
use entity_core::types::{UserRoleExtension, UserRoleExtensionPatch};

use super::{ok, ApiResult, QueryBody};

type Service = Extension<Arc<dyn RegistryService>>;

pub async fn create(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Json(req): Json<CreateRoleRequest>,
) -> ApiResult<UserRoleExtension> {
    ok(
        messages::USER_ROLE_INFORMATION_CREATED,
        service.create_role(&user, req).await?,
    )
}

pub async fn update(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserRoleExtensionPatch>,
) -> ApiResult<UserRoleExtension> {
    ok(
        messages::USER_ROLE_UPDATED,
        service.update_role(&user, id, patch).await?,
    )
}

pub async fn find(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Json(body): Json<QueryBody<RoleFilter>>,
) -> ApiResult<Vec<UserRoleExtension>> {
    ok(
        messages::ROLES_FETCHED,
        service.find_roles(&user, body.query).await?,
    )
}

pub async fn delete(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    service.delete_role(&user, id).await?;
    ok(messages::USER_ROLE_DELETED, serde_json::json!({ "_id": id }))
}
