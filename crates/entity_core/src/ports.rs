//! Storage port traits for the registry.
//! Implemented by the in-memory adapter here and by entity_postgres.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::EntityError;
use crate::filter::{EntityFilter, EntityTypeFilter, EntityUpdate, FindOptions, RoleFilter};
use crate::search::{SearchPage, SearchQuery};
use crate::types::{
    Entity, EntityType, EntityTypeId, EntityTypePatch, NewEntity, NewEntityType,
    NewUserRoleExtension, UserRoleExtension, UserRoleExtensionPatch,
};

pub type Result<T> = std::result::Result<T, EntityError>;

/// Persisted hierarchy nodes.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Entities matching `filter`, in storage order unless `opts.sort` is set.
    async fn find(&self, filter: &EntityFilter, opts: &FindOptions) -> Result<Vec<Entity>>;

    /// First match, or `NotFound`.
    async fn find_one(&self, filter: &EntityFilter) -> Result<Entity>;

    /// Insert all records. A duplicate `(tenantId, externalId)` is a `Conflict`
    /// and nothing from the call is written.
    async fn create(&self, entities: Vec<NewEntity>) -> Result<Vec<Entity>>;

    /// Atomically apply `update` to the first match and return it, or `NotFound`.
    async fn update_one(&self, filter: &EntityFilter, update: &EntityUpdate) -> Result<Entity>;

    /// Apply `update` to every match, one record at a time. Returns the count.
    async fn update_many(&self, filter: &EntityFilter, update: &EntityUpdate) -> Result<u64>;

    /// One page plus the total match count.
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage>;

    /// Cheap connectivity probe for the health check.
    async fn ping(&self) -> Result<()>;
}

/// Entity type catalog storage.
#[async_trait]
pub trait EntityTypeStore: Send + Sync {
    async fn find(&self, filter: &EntityTypeFilter) -> Result<Vec<EntityType>>;

    async fn find_one(&self, filter: &EntityTypeFilter) -> Result<EntityType>;

    /// Duplicate `(tenantId, name)` is a `Conflict`.
    async fn create(&self, entity_type: NewEntityType) -> Result<EntityType>;

    /// `NotFound` when no type has this ID in the tenant.
    async fn update(
        &self,
        tenant_id: &str,
        id: EntityTypeId,
        patch: &EntityTypePatch,
        updated_by: &str,
    ) -> Result<EntityType>;
}

/// User role extension storage.
#[async_trait]
pub trait UserRoleStore: Send + Sync {
    async fn find(&self, filter: &RoleFilter, opts: &FindOptions) -> Result<Vec<UserRoleExtension>>;

    async fn count(&self, filter: &RoleFilter) -> Result<u64>;

    async fn create(&self, role: NewUserRoleExtension) -> Result<UserRoleExtension>;

    async fn update(
        &self,
        tenant_id: &str,
        id: Uuid,
        patch: &UserRoleExtensionPatch,
        updated_by: &str,
    ) -> Result<UserRoleExtension>;

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<()>;
}
