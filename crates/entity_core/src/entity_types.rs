//! Entity type CRUD.

use std::sync::Arc;

use crate::bulk::{CsvRow, EntityTypeBulk};
use crate::error::EntityError;
use crate::filter::EntityTypeFilter;
use crate::hierarchy::union::union_into;
use crate::ports::{EntityTypeStore, Result};
use crate::principal::UserDetails;
use crate::proto::CreateEntityTypeRequest;
use crate::types::{EntityType, EntityTypeId, EntityTypePatch, NewEntityType};

#[derive(Clone)]
pub struct EntityTypeService {
    store: Arc<dyn EntityTypeStore>,
    bulk: EntityTypeBulk,
}

impl EntityTypeService {
    pub fn new(store: Arc<dyn EntityTypeStore>) -> Self {
        Self {
            bulk: EntityTypeBulk::new(store.clone()),
            store,
        }
    }

    pub async fn create(&self, user: &UserDetails, req: CreateEntityTypeRequest) -> Result<EntityType> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(EntityError::BadRequest("name is required".into()));
        }
        let mut new = NewEntityType::new(name, user.tenant_id.as_str(), user.org_id.as_str());
        union_into(&mut new.immediate_children_entity_type, &req.immediate_children_entity_type);
        new.to_be_mapped_to_parent_entities = req.to_be_mapped_to_parent_entities;
        new.is_observable = req.is_observable.unwrap_or(true);
        new.registry_details = req.registry_details;
        new.created_by = user.user_id.clone();
        let created = self.store.create(new).await?;
        tracing::info!(tenant = %user.tenant_id, entity_type = %created.name, "entity type created");
        Ok(created)
    }

    pub async fn update(&self, user: &UserDetails, id: EntityTypeId, patch: EntityTypePatch) -> Result<EntityType> {
        if patch.is_empty() {
            return Err(EntityError::BadRequest("no fields to update".into()));
        }
        self.store.update(&user.tenant_id, id, &patch, &user.user_id).await
    }

    pub async fn list(&self, user: &UserDetails) -> Result<Vec<EntityType>> {
        self.store.find(&EntityTypeFilter::tenant(user.tenant_id.as_str())).await
    }

    /// Tenant is always taken from the caller, never from the filter body.
    pub async fn find(&self, user: &UserDetails, mut filter: EntityTypeFilter) -> Result<Vec<EntityType>> {
        filter.tenant_id = Some(user.tenant_id.clone());
        self.store.find(&filter).await
    }

    pub async fn bulk_create(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>> {
        self.bulk.create(user, rows).await
    }

    pub async fn bulk_update(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>> {
        self.bulk.update(user, rows).await
    }
}
