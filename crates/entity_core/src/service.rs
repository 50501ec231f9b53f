//! RegistryService: the single domain service behind the HTTP layer.
//!
//! Takes port traits via `Arc<dyn ...>` so the same logic runs against
//! Postgres or the in-memory adapter.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::bulk::{CsvRow, EntityBulk, MappingBuilder, MappingCsv, MappingReport};
use crate::catalog::Catalog;
use crate::entity_types::EntityTypeService;
use crate::error::EntityError;
use crate::filter::{EntityFilter, EntityTypeFilter, EntityUpdate, FindOptions, RoleFilter, SortBy};
use crate::hierarchy::{HierarchyMutator, HierarchyQuery, RolePage};
use crate::ports::{EntityStore, EntityTypeStore, UserRoleStore};
use crate::principal::UserDetails;
use crate::proto::*;
use crate::roles::RoleService;
use crate::search::{Page, SearchPage, SearchQuery};
use crate::types::{
    Entity, EntityId, EntityType, EntityTypeId, EntityTypePatch, MetaInformation, NewEntity,
    UserRoleExtension, UserRoleExtensionPatch,
};

pub type Result<T> = std::result::Result<T, EntityError>;

// ── RegistryService trait ─────────────────────────────────────

/// Every method takes the caller explicitly; the tenant always comes from
/// `UserDetails`, never from a request body.
#[async_trait]
pub trait RegistryService: Send + Sync {
    // Hierarchy
    async fn sub_entities(
        &self,
        user: &UserDetails,
        entity_id: EntityId,
        target_type: Option<&str>,
        search_text: &str,
        page: Page,
    ) -> Result<SearchPage>;

    async fn search(&self, user: &UserDetails, req: SearchRequest) -> Result<SearchPage>;

    async fn related_entities(&self, user: &UserDetails, entity_id: EntityId) -> Result<RelatedEntities>;

    async fn targeted_roles(
        &self,
        user: &UserDetails,
        entity_ids: &[EntityId],
        requested_type: Option<&str>,
        page: Option<Page>,
    ) -> Result<RolePage>;

    async fn mapping_upload(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<MappingReport>;

    async fn create_mapping_csv(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<MappingCsv>;

    // Entities
    async fn add_entity(
        &self,
        user: &UserDetails,
        entity_type: &str,
        parent_entity_id: Option<EntityId>,
        req: AddEntityRequest,
    ) -> Result<Entity>;

    async fn update_entity(&self, user: &UserDetails, id: EntityId, req: UpdateEntityRequest) -> Result<Entity>;

    /// By internal ID, or by external ID when `key` is not a UUID.
    async fn entity_details(&self, user: &UserDetails, key: &str) -> Result<Entity>;

    async fn find_entities(&self, user: &UserDetails, req: FindEntitiesRequest) -> Result<Vec<Entity>>;

    async fn list_by_ids(&self, user: &UserDetails, ids: Vec<EntityId>) -> Result<Vec<Entity>>;

    async fn list_by_entity_type(
        &self,
        user: &UserDetails,
        entity_type: &str,
        search_text: &str,
        page: Page,
    ) -> Result<SearchPage>;

    async fn bulk_create_entities(&self, user: &UserDetails, entity_type: &str, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>>;

    async fn bulk_update_entities(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>>;

    // Entity types
    async fn create_entity_type(&self, user: &UserDetails, req: CreateEntityTypeRequest) -> Result<EntityType>;

    async fn update_entity_type(&self, user: &UserDetails, id: EntityTypeId, patch: EntityTypePatch) -> Result<EntityType>;

    async fn list_entity_types(&self, user: &UserDetails) -> Result<Vec<EntityType>>;

    async fn find_entity_types(&self, user: &UserDetails, filter: EntityTypeFilter) -> Result<Vec<EntityType>>;

    async fn bulk_create_entity_types(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>>;

    async fn bulk_update_entity_types(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>>;

    // Roles
    async fn create_role(&self, user: &UserDetails, req: CreateRoleRequest) -> Result<UserRoleExtension>;

    async fn update_role(&self, user: &UserDetails, id: Uuid, patch: UserRoleExtensionPatch) -> Result<UserRoleExtension>;

    async fn find_roles(&self, user: &UserDetails, filter: RoleFilter) -> Result<Vec<UserRoleExtension>>;

    async fn delete_role(&self, user: &UserDetails, id: Uuid) -> Result<()>;

    // Health
    async fn health(&self) -> HealthReport;
}

// ── RegistryServiceImpl ───────────────────────────────────────

pub struct RegistryServiceImpl {
    entities: Arc<dyn EntityStore>,
    catalog: Catalog,
    mutator: HierarchyMutator,
    query: HierarchyQuery,
    mapping: MappingBuilder,
    entity_bulk: EntityBulk,
    entity_types: EntityTypeService,
    roles: RoleService,
}

impl RegistryServiceImpl {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        entity_types: Arc<dyn EntityTypeStore>,
        roles: Arc<dyn UserRoleStore>,
    ) -> Self {
        let catalog = Catalog::new(entity_types.clone());
        let mutator = HierarchyMutator::new(entities.clone(), catalog.clone());
        Self {
            query: HierarchyQuery::new(entities.clone(), roles.clone(), catalog.clone()),
            mapping: MappingBuilder::new(entities.clone(), mutator.clone()),
            entity_bulk: EntityBulk::new(entities.clone(), catalog.clone()),
            entity_types: EntityTypeService::new(entity_types.clone()),
            roles: RoleService::new(roles, entity_types),
            entities,
            catalog,
            mutator,
        }
    }

    /// Upper bound on concurrently processed mapping rows.
    pub fn with_bulk_concurrency(mut self, concurrency: usize) -> Self {
        self.mapping = self.mapping.with_concurrency(concurrency);
        self
    }

    async fn entity_by_id(&self, user: &UserDetails, id: EntityId) -> Result<Entity> {
        self.entities
            .find_one(&EntityFilter::by_id(user.tenant_id.as_str(), id))
            .await
            .map_err(|e| match e {
                EntityError::NotFound(_) => EntityError::NotFound(format!("entity {id}")),
                other => other,
            })
    }
}

#[async_trait]
impl RegistryService for RegistryServiceImpl {
    async fn sub_entities(
        &self,
        user: &UserDetails,
        entity_id: EntityId,
        target_type: Option<&str>,
        search_text: &str,
        page: Page,
    ) -> Result<SearchPage> {
        self.query
            .sub_entities(&user.tenant_id, entity_id, target_type, search_text, page)
            .await
    }

    async fn search(&self, user: &UserDetails, req: SearchRequest) -> Result<SearchPage> {
        let page = Page::from_query(req.page_size, req.page_no)?;
        self.query
            .search(&user.tenant_id, &req.search_text, page, req.entity_ids)
            .await
    }

    async fn related_entities(&self, user: &UserDetails, entity_id: EntityId) -> Result<RelatedEntities> {
        let entity = self.entity_by_id(user, entity_id).await?;
        let related_entities = self.query.related_entities_of(&entity).await?;
        Ok(RelatedEntities { entity, related_entities })
    }

    async fn targeted_roles(
        &self,
        user: &UserDetails,
        entity_ids: &[EntityId],
        requested_type: Option<&str>,
        page: Option<Page>,
    ) -> Result<RolePage> {
        self.query
            .targeted_roles(&user.tenant_id, entity_ids, requested_type, page)
            .await
    }

    async fn mapping_upload(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<MappingReport> {
        self.mapping.process_entity_mapping_upload_data(user, rows).await
    }

    async fn create_mapping_csv(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<MappingCsv> {
        self.mapping.create_mapping_csv(&user.tenant_id, rows).await
    }

    async fn add_entity(
        &self,
        user: &UserDetails,
        entity_type: &str,
        parent_entity_id: Option<EntityId>,
        req: AddEntityRequest,
    ) -> Result<Entity> {
        let ty = self.catalog.get(&user.tenant_id, entity_type).await?;
        if let Some(parent_id) = parent_entity_id {
            self.mutator.check_new_child(user, parent_id, &ty.name).await?;
        }
        let mut meta_information = MetaInformation::default();
        meta_information.set_fields(&req.meta_information);
        if meta_information.external_id.trim().is_empty() {
            return Err(EntityError::BadRequest("externalId is required".into()));
        }

        let mut created = self
            .entities
            .create(vec![NewEntity {
                entity_type: Some(ty.name.clone()),
                entity_type_id: Some(ty.id),
                meta_information,
                registry_details: req.registry_details,
                tenant_id: user.tenant_id.clone(),
                org_id: user.org_id.clone(),
                created_by: user.user_id.clone(),
            }])
            .await?
            .remove(0);
        tracing::info!(tenant = %user.tenant_id, entity = %created.id, entity_type, "entity added");

        if let Some(parent_id) = parent_entity_id {
            self.mutator.attach_child(user, parent_id, created.id, None).await?;
            created = self.entity_by_id(user, created.id).await?;
        }
        Ok(created)
    }

    async fn update_entity(&self, user: &UserDetails, id: EntityId, req: UpdateEntityRequest) -> Result<Entity> {
        let update = EntityUpdate {
            set_meta: req.meta_information.unwrap_or_default(),
            set_registry_details: req.registry_details.unwrap_or_default(),
            updated_by: Some(user.user_id.clone()),
            ..Default::default()
        };
        if update.is_empty() {
            return Err(EntityError::BadRequest("no fields to update".into()));
        }
        self.entities
            .update_one(&EntityFilter::by_id(user.tenant_id.as_str(), id), &update)
            .await
            .map_err(|e| match e {
                EntityError::NotFound(_) => EntityError::NotFound(format!("entity {id}")),
                other => other,
            })
    }

    async fn entity_details(&self, user: &UserDetails, key: &str) -> Result<Entity> {
        if let Ok(id) = Uuid::parse_str(key) {
            return self.entity_by_id(user, id).await;
        }
        self.entities
            .find_one(&EntityFilter::tenant(user.tenant_id.as_str()).with_external_ids(vec![key.to_string()]))
            .await
            .map_err(|e| match e {
                EntityError::NotFound(_) => EntityError::NotFound(format!("entity with externalId '{key}'")),
                other => other,
            })
    }

    async fn find_entities(&self, user: &UserDetails, req: FindEntitiesRequest) -> Result<Vec<Entity>> {
        let mut filter = req.query;
        filter.tenant_id = Some(user.tenant_id.clone());
        let opts = FindOptions {
            sort: Some(SortBy::CreatedAt),
            limit: req.limit,
            skip: req.skip,
        };
        let found = self.entities.find(&filter, &opts).await?;
        if found.is_empty() {
            return Err(EntityError::NotFound("no entities matched".into()));
        }
        Ok(found)
    }

    async fn list_by_ids(&self, user: &UserDetails, ids: Vec<EntityId>) -> Result<Vec<Entity>> {
        if ids.is_empty() {
            return Err(EntityError::BadRequest("entities must not be empty".into()));
        }
        self.entities
            .find(
                &EntityFilter::tenant(user.tenant_id.as_str()).with_ids(ids),
                &FindOptions::default(),
            )
            .await
    }

    async fn list_by_entity_type(
        &self,
        user: &UserDetails,
        entity_type: &str,
        search_text: &str,
        page: Page,
    ) -> Result<SearchPage> {
        let query = SearchQuery::new(user.tenant_id.as_str(), page)
            .of_type(entity_type)
            .text(search_text);
        self.entities.search(&query).await
    }

    async fn bulk_create_entities(&self, user: &UserDetails, entity_type: &str, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>> {
        self.entity_bulk.create(user, entity_type, rows).await
    }

    async fn bulk_update_entities(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>> {
        self.entity_bulk.update(user, rows).await
    }

    async fn create_entity_type(&self, user: &UserDetails, req: CreateEntityTypeRequest) -> Result<EntityType> {
        self.entity_types.create(user, req).await
    }

    async fn update_entity_type(&self, user: &UserDetails, id: EntityTypeId, patch: EntityTypePatch) -> Result<EntityType> {
        self.entity_types.update(user, id, patch).await
    }

    async fn list_entity_types(&self, user: &UserDetails) -> Result<Vec<EntityType>> {
        self.entity_types.list(user).await
    }

    async fn find_entity_types(&self, user: &UserDetails, filter: EntityTypeFilter) -> Result<Vec<EntityType>> {
        self.entity_types.find(user, filter).await
    }

    async fn bulk_create_entity_types(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>> {
        self.entity_types.bulk_create(user, rows).await
    }

    async fn bulk_update_entity_types(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>> {
        self.entity_types.bulk_update(user, rows).await
    }

    async fn create_role(&self, user: &UserDetails, req: CreateRoleRequest) -> Result<UserRoleExtension> {
        self.roles.create(user, req).await
    }

    async fn update_role(&self, user: &UserDetails, id: Uuid, patch: UserRoleExtensionPatch) -> Result<UserRoleExtension> {
        self.roles.update(user, id, patch).await
    }

    async fn find_roles(&self, user: &UserDetails, filter: RoleFilter) -> Result<Vec<UserRoleExtension>> {
        self.roles.find(user, filter).await
    }

    async fn delete_role(&self, user: &UserDetails, id: Uuid) -> Result<()> {
        self.roles.delete(user, id).await
    }

    async fn health(&self) -> HealthReport {
        let store = match self.entities.ping().await {
            Ok(()) => HealthCheck {
                name: "entity_store".into(),
                healthy: true,
                message: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "entity store health check failed");
                HealthCheck {
                    name: "entity_store".into(),
                    healthy: false,
                    message: Some(e.to_string()),
                }
            }
        };
        HealthReport {
            name: "entity-registry".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            healthy: store.healthy,
            checks: vec![store],
        }
    }
}
