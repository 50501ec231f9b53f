//! Read-side view of the entity type catalog used by the hierarchy engines.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::EntityError;
use crate::filter::EntityTypeFilter;
use crate::ports::{EntityTypeStore, Result};
use crate::types::{EntityType, EntityTypeId};

/// Type-name lookups over non-deleted entity types of one tenant.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn EntityTypeStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn EntityTypeStore>) -> Self {
        Self { store }
    }

    /// Every requested name must exist; the first missing one is reported.
    pub async fn resolve(
        &self,
        tenant_id: &str,
        names: &[String],
    ) -> Result<BTreeMap<String, EntityType>> {
        if names.is_empty() {
            return Ok(BTreeMap::new());
        }
        let filter = EntityTypeFilter::tenant(tenant_id).with_names(names.to_vec());
        let found: BTreeMap<String, EntityType> = self
            .store
            .find(&filter)
            .await?
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        if let Some(missing) = names.iter().find(|n| !found.contains_key(*n)) {
            return Err(EntityError::NotFound(format!("entity type '{missing}'")));
        }
        Ok(found)
    }

    pub async fn get(&self, tenant_id: &str, name: &str) -> Result<EntityType> {
        let mut resolved = self.resolve(tenant_id, &[name.to_string()]).await?;
        resolved
            .remove(name)
            .ok_or_else(|| EntityError::NotFound(format!("entity type '{name}'")))
    }

    /// Immediate child type names; empty when the type has none or is unknown.
    pub async fn immediate_children_of(&self, tenant_id: &str, name: &str) -> Result<Vec<String>> {
        match self.get(tenant_id, name).await {
            Ok(t) => Ok(t.immediate_children_entity_type),
            Err(EntityError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// `toBeMappedToParentEntities` of the type. Unknown type is `NotFound`.
    pub async fn requires_parent_propagation(&self, tenant_id: &str, name: &str) -> Result<bool> {
        Ok(self.get(tenant_id, name).await?.to_be_mapped_to_parent_entities)
    }

    /// IDs of the named types in the order given. Unknown names are skipped.
    pub async fn resolve_ids(&self, tenant_id: &str, names: &[String]) -> Result<Vec<EntityTypeId>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let filter = EntityTypeFilter::tenant(tenant_id).with_names(names.to_vec());
        let found = self.store.find(&filter).await?;
        Ok(names
            .iter()
            .filter_map(|n| found.iter().find(|t| &t.name == n).map(|t| t.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEntityTypeStore;
    use crate::types::NewEntityType;

    async fn catalog() -> Catalog {
        let store = Arc::new(InMemoryEntityTypeStore::default());
        let mut state = NewEntityType::new("state", "t", "o");
        state.immediate_children_entity_type = vec!["district".into()];
        state.to_be_mapped_to_parent_entities = true;
        store.create(state).await.unwrap();
        store
            .create(NewEntityType::new("district", "t", "o"))
            .await
            .unwrap();
        Catalog::new(store)
    }

    #[tokio::test]
    async fn resolve_reports_missing_name() {
        let c = catalog().await;
        let err = c
            .resolve("t", &["state".into(), "block".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::NotFound(m) if m.contains("block")));
    }

    #[tokio::test]
    async fn resolve_is_tenant_scoped() {
        let c = catalog().await;
        assert!(c.resolve("other", &["state".into()]).await.is_err());
    }

    #[tokio::test]
    async fn children_and_flag() {
        let c = catalog().await;
        assert_eq!(c.immediate_children_of("t", "state").await.unwrap(), vec!["district"]);
        assert!(c.immediate_children_of("t", "nope").await.unwrap().is_empty());
        assert!(c.requires_parent_propagation("t", "state").await.unwrap());
        assert!(!c.requires_parent_propagation("t", "district").await.unwrap());
        assert!(matches!(
            c.requires_parent_propagation("t", "nope").await,
            Err(EntityError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resolve_ids_keeps_request_order() {
        let c = catalog().await;
        let ids = c
            .resolve_ids("t", &["district".into(), "ghost".into(), "state".into()])
            .await
            .unwrap();
        let state = c.get("t", "state").await.unwrap();
        let district = c.get("t", "district").await.unwrap();
        assert_eq!(ids, vec![district.id, state.id]);
    }
}
