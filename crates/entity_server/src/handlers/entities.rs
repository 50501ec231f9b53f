//! /v1/entities/*

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use entity_core::bulk::{MappingCsv, MappingReport};
use entity_core::error::EntityError;
use entity_core::hierarchy::RolePage;
use entity_core::messages;
use entity_core::principal::UserDetails;
use entity_core::proto::{
    AddEntityRequest, FindEntitiesRequest, ListByIdsRequest, RelatedEntities, SearchRequest,
    UpdateEntityRequest,
};
use entity_core::search::{Page, SearchPage};
use entity_core::service::RegistryService;
use entity_core::types::{Entity, TargetedRole};

use super::{counted, csv_response, csv_rows, ok, required, ApiResult};
use crate::error::AppError;

type Service = Extension<Arc<dyn RegistryService>>;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub search: String,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RolesQuery {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub paginate: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddQuery {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub parent_entity_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
}

/// POST /v1/entities/mappingUpload
pub async fn mapping_upload(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    body: Bytes,
) -> ApiResult<MappingReport> {
    let rows = csv_rows(&body)?;
    let report = service.mapping_upload(&user, rows).await?;
    let message = if report.success {
        messages::ENTITY_MAPPING_COMPLETED
    } else {
        messages::ENTITY_MAPPING_PARTIAL
    };
    ok(message, report)
}

/// POST /v1/entities/createMappingCsv
pub async fn create_mapping_csv(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    body: Bytes,
) -> ApiResult<MappingCsv> {
    let rows = csv_rows(&body)?;
    ok(
        messages::MAPPING_CSV_GENERATED,
        service.create_mapping_csv(&user, rows).await?,
    )
}

/// GET /v1/entities/subEntityList/:id
pub async fn sub_entity_list(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Path(id): Path<Uuid>,
    Query(q): Query<ListQuery>,
) -> ApiResult<SearchPage> {
    let page = Page::from_query(q.limit, q.page)?;
    let found = service
        .sub_entities(&user, id, q.entity_type.as_deref(), &q.search, page)
        .await?;
    ok(messages::ENTITIES_FETCHED, found)
}

/// GET /v1/entities/relatedEntities/:id
pub async fn related_entities(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Path(id): Path<Uuid>,
) -> ApiResult<RelatedEntities> {
    ok(
        messages::RELATED_ENTITIES_FETCHED,
        service.related_entities(&user, id).await?,
    )
}

/// GET /v1/entities/targetedRoles/:ids
///
/// `ids` is one entity ID or a comma-separated list.
pub async fn targeted_roles(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Path(ids): Path<String>,
    Query(q): Query<RolesQuery>,
) -> ApiResult<Vec<TargetedRole>> {
    let ids = ids
        .split(',')
        .map(|s| {
            Uuid::parse_str(s.trim())
                .map_err(|_| EntityError::BadRequest(format!("invalid entity id '{s}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let page = match q.paginate.as_deref() {
        Some(p) if p.eq_ignore_ascii_case("true") => Some(Page::from_query(q.limit, q.page)?),
        _ => None,
    };
    let RolePage { data, count } = service
        .targeted_roles(&user, &ids, q.entity_type.as_deref(), page)
        .await?;
    counted(messages::ROLES_FETCHED, data, count)
}

/// POST /v1/entities/add
pub async fn add(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Query(q): Query<AddQuery>,
    Json(req): Json<AddEntityRequest>,
) -> ApiResult<Entity> {
    let entity_type = required(&q.entity_type, "type")?;
    let entity = service
        .add_entity(&user, entity_type, q.parent_entity_id, req)
        .await?;
    ok(messages::ENTITY_ADDED, entity)
}

/// POST /v1/entities/update/:id
pub async fn update(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEntityRequest>,
) -> ApiResult<Entity> {
    ok(
        messages::ENTITY_UPDATED,
        service.update_entity(&user, id, req).await?,
    )
}

/// GET /v1/entities/details/:id
///
/// `id` is an internal ID or an external ID.
pub async fn details(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Path(key): Path<String>,
) -> ApiResult<Entity> {
    ok(
        messages::ENTITY_INFORMATION_FETCHED,
        service.entity_details(&user, &key).await?,
    )
}

/// POST /v1/entities/find
pub async fn find(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Json(req): Json<FindEntitiesRequest>,
) -> ApiResult<Vec<Entity>> {
    ok(
        messages::ENTITY_FETCHED,
        service.find_entities(&user, req).await?,
    )
}

/// POST /v1/entities/listByIds
pub async fn list_by_ids(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Json(req): Json<ListByIdsRequest>,
) -> ApiResult<Vec<Entity>> {
    ok(
        messages::ENTITIES_FETCHED,
        service.list_by_ids(&user, req.entities).await?,
    )
}

/// GET /v1/entities/listByEntityType/:type
pub async fn list_by_entity_type(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Path(entity_type): Path<String>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Vec<Entity>> {
    let page = Page::from_query(q.limit, q.page)?;
    let found = service
        .list_by_entity_type(&user, &entity_type, &q.search, page)
        .await?;
    counted(messages::ENTITIES_FETCHED, found.data, found.count)
}

/// POST /v1/entities/search
pub async fn search(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Vec<Entity>> {
    let found = service.search(&user, req).await?;
    counted(messages::ENTITIES_FETCHED, found.data, found.count)
}

/// POST /v1/entities/bulkCreate?type=
pub async fn bulk_create(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    Query(q): Query<TypeQuery>,
    body: Bytes,
) -> Result<Response, AppError> {
    let entity_type = required(&q.entity_type, "type")?;
    let rows = csv_rows(&body)?;
    let out = service.bulk_create_entities(&user, entity_type, rows).await?;
    csv_response(&out)
}

/// POST /v1/entities/bulkUpdate
pub async fn bulk_update(
    Extension(service): Service,
    Extension(user): Extension<UserDetails>,
    body: Bytes,
) -> Result<Response, AppError> {
    let rows = csv_rows(&body)?;
    let out = service.bulk_update_entities(&user, rows).await?;
    csv_response(&out)
}
