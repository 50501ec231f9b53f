//! Router construction for the entity registry server.

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{delete, get, post},
    Extension, Router,
};
use entity_core::service::RegistryService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{entities, entity_types, health, roles};
use crate::middleware::jwt::{internal_auth, jwt_auth, JwtConfig};

/// Build the full axum router with all routes and middleware.
pub fn build_router(service: Arc<dyn RegistryService>, jwt_config: JwtConfig) -> Router {
    // User token only
    let user_routes = Router::new()
        .route("/v1/entities/mappingUpload", post(entities::mapping_upload))
        .route(
            "/v1/entities/subEntityList/:id",
            get(entities::sub_entity_list),
        )
        .route(
            "/v1/entities/relatedEntities/:id",
            get(entities::related_entities),
        )
        .route(
            "/v1/entities/targetedRoles/:ids",
            get(entities::targeted_roles),
        )
        .route("/v1/entities/details/:id", get(entities::details))
        .route("/v1/entities/listByIds", post(entities::list_by_ids))
        .route(
            "/v1/entities/listByEntityType/:type",
            get(entities::list_by_entity_type),
        )
        .route("/v1/entities/search", post(entities::search))
        .route("/v1/entityTypes/list", get(entity_types::list))
        .layer(axum_mw::from_fn(jwt_auth));

    // Internal access token required
    let internal_routes = Router::new()
        .route("/v1/entities/add", post(entities::add))
        .route("/v1/entities/update/:id", post(entities::update))
        .route("/v1/entities/find", post(entities::find))
        .route("/v1/entities/bulkCreate", post(entities::bulk_create))
        .route("/v1/entities/bulkUpdate", post(entities::bulk_update))
        .route(
            "/v1/entities/createMappingCsv",
            post(entities::create_mapping_csv),
        )
        .route("/v1/entityTypes/create", post(entity_types::create))
        .route("/v1/entityTypes/update/:id", post(entity_types::update))
        .route("/v1/entityTypes/find", post(entity_types::find))
        .route("/v1/entityTypes/bulkCreate", post(entity_types::bulk_create))
        .route("/v1/entityTypes/bulkUpdate", post(entity_types::bulk_update))
        .route("/v1/userRoleExtension/create", post(roles::create))
        .route("/v1/userRoleExtension/update/:id", post(roles::update))
        .route("/v1/userRoleExtension/find", post(roles::find))
        .route("/v1/userRoleExtension/delete/:id", delete(roles::delete))
        .layer(axum_mw::from_fn(internal_auth));

    // Public routes (no auth)
    let public = Router::new().route("/health", get(health::health));

    public
        .merge(user_routes)
        .merge(internal_routes)
        .layer(Extension(jwt_config))
        .layer(Extension(service))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
