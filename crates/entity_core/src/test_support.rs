//! Fixtures shared by the unit test modules.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;

use crate::catalog::Catalog;
use crate::error::EntityError;
use crate::filter::{EntityFilter, EntityUpdate, FindOptions};
use crate::memory::InMemoryStores;
use crate::ports::{EntityStore, EntityTypeStore, Result};
use crate::principal::UserDetails;
use crate::search::{SearchPage, SearchQuery};
use crate::types::{Entity, EntityType, MetaInformation, NewEntity, NewEntityType};

pub const TENANT: &str = "t1";

pub fn user() -> UserDetails {
    UserDetails {
        user_id: "u1".into(),
        tenant_id: TENANT.into(),
        org_id: "o1".into(),
        roles: vec![],
    }
}

pub struct Fixture {
    pub stores: InMemoryStores,
    pub catalog: Catalog,
}

impl Fixture {
    pub fn new() -> Self {
        let stores = InMemoryStores::new();
        let catalog = Catalog::new(stores.entity_types.clone());
        Self { stores, catalog }
    }

    pub fn entities(&self) -> Arc<dyn EntityStore> {
        self.stores.entities.clone()
    }

    pub async fn entity_type(&self, name: &str, children: &[&str], propagate: bool) -> EntityType {
        let mut t = NewEntityType::new(name, TENANT, "o1");
        t.immediate_children_entity_type = children.iter().map(|c| c.to_string()).collect();
        t.to_be_mapped_to_parent_entities = propagate;
        self.stores.entity_types.create(t).await.unwrap()
    }

    pub async fn entity(&self, ty: &EntityType, external_id: &str) -> Entity {
        self.stores
            .entities
            .create(vec![NewEntity {
                entity_type: Some(ty.name.clone()),
                entity_type_id: Some(ty.id),
                meta_information: MetaInformation::new(external_id, external_id),
                registry_details: Map::new(),
                tenant_id: TENANT.into(),
                org_id: "o1".into(),
                created_by: "u1".into(),
            }])
            .await
            .unwrap()
            .remove(0)
    }

    pub async fn untyped_entity(&self, external_id: &str) -> Entity {
        self.stores
            .entities
            .create(vec![NewEntity {
                entity_type: None,
                entity_type_id: None,
                meta_information: MetaInformation::new(external_id, external_id),
                registry_details: Map::new(),
                tenant_id: TENANT.into(),
                org_id: "o1".into(),
                created_by: "u1".into(),
            }])
            .await
            .unwrap()
            .remove(0)
    }

    pub async fn reload(&self, e: &Entity) -> Entity {
        self.stores
            .entities
            .find_one(&EntityFilter::by_id(TENANT, e.id))
            .await
            .unwrap()
    }
}

/// Reads go to `inner`; every write fails as if the database went away.
pub struct BrokenWrites {
    pub inner: Arc<dyn EntityStore>,
}

impl BrokenWrites {
    fn down() -> EntityError {
        EntityError::Internal(anyhow::anyhow!("connection reset"))
    }
}

#[async_trait]
impl EntityStore for BrokenWrites {
    async fn find(&self, filter: &EntityFilter, opts: &FindOptions) -> Result<Vec<Entity>> {
        self.inner.find(filter, opts).await
    }

    async fn find_one(&self, filter: &EntityFilter) -> Result<Entity> {
        self.inner.find_one(filter).await
    }

    async fn create(&self, _entities: Vec<NewEntity>) -> Result<Vec<Entity>> {
        Err(Self::down())
    }

    async fn update_one(&self, _filter: &EntityFilter, _update: &EntityUpdate) -> Result<Entity> {
        Err(Self::down())
    }

    async fn update_many(&self, _filter: &EntityFilter, _update: &EntityUpdate) -> Result<u64> {
        Err(Self::down())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        self.inner.search(query).await
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
