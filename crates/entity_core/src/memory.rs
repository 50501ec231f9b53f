//! In-memory store adapters.
//!
//! Used by the test suites and by the server when no database URL is
//! configured. Records keep insertion order, which stands in for the
//! `created_at, id` ordering of the Postgres adapter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::EntityError;
use crate::filter::{
    apply_find_options, EntityFilter, EntityTypeFilter, EntityUpdate, FindOptions, RoleFilter,
};
use crate::ports::{EntityStore, EntityTypeStore, Result, UserRoleStore};
use crate::search::{SearchPage, SearchQuery, TextMatcher};
use crate::types::{
    Entity, EntityType, EntityTypeId, EntityTypePatch, NewEntity, NewEntityType,
    NewUserRoleExtension, UserRoleExtension, UserRoleExtensionPatch,
};

/// The three stores bundled, mirroring `entity_postgres::PgStores`.
#[derive(Clone, Default)]
pub struct InMemoryStores {
    pub entities: Arc<InMemoryEntityStore>,
    pub entity_types: Arc<InMemoryEntityTypeStore>,
    pub roles: Arc<InMemoryUserRoleStore>,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }
}

// ── Entities ──────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryEntityStore {
    rows: RwLock<Vec<Entity>>,
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn find(&self, filter: &EntityFilter, opts: &FindOptions) -> Result<Vec<Entity>> {
        let rows = self.rows.read().await;
        let hits: Vec<Entity> = rows.iter().filter(|e| filter.matches(e)).cloned().collect();
        Ok(apply_find_options(hits, opts))
    }

    async fn find_one(&self, filter: &EntityFilter) -> Result<Entity> {
        let rows = self.rows.read().await;
        rows.iter()
            .find(|e| filter.matches(e))
            .cloned()
            .ok_or_else(|| EntityError::NotFound("entity".into()))
    }

    async fn create(&self, entities: Vec<NewEntity>) -> Result<Vec<Entity>> {
        let mut rows = self.rows.write().await;
        let mut seen: Vec<(&str, &str)> = Vec::new();
        for e in &entities {
            let key = (e.tenant_id.as_str(), e.meta_information.external_id.as_str());
            if key.1.is_empty() {
                continue;
            }
            let clash = seen.contains(&key)
                || rows
                    .iter()
                    .any(|r| r.tenant_id == key.0 && r.external_id() == key.1);
            if clash {
                return Err(EntityError::Conflict(format!(
                    "externalId '{}' already exists",
                    key.1
                )));
            }
            seen.push(key);
        }
        let now = Utc::now();
        let created: Vec<Entity> = entities
            .into_iter()
            .map(|e| e.into_entity(Uuid::new_v4(), now))
            .collect();
        rows.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_one(&self, filter: &EntityFilter, update: &EntityUpdate) -> Result<Entity> {
        let mut rows = self.rows.write().await;
        let idx = rows
            .iter()
            .position(|e| filter.matches(e))
            .ok_or_else(|| EntityError::NotFound("entity".into()))?;
        let mut entity = rows[idx].clone();
        update.apply(&mut entity);
        entity.updated_at = Utc::now();
        let pending = [(idx, entity)];
        ensure_unique_external_ids(&rows, &pending)?;
        let [(_, entity)] = pending;
        rows[idx] = entity.clone();
        Ok(entity)
    }

    async fn update_many(&self, filter: &EntityFilter, update: &EntityUpdate) -> Result<u64> {
        let mut rows = self.rows.write().await;
        let now = Utc::now();
        let pending: Vec<(usize, Entity)> = rows
            .iter()
            .enumerate()
            .filter(|(_, e)| filter.matches(e))
            .map(|(idx, e)| {
                let mut e = e.clone();
                update.apply(&mut e);
                e.updated_at = now;
                (idx, e)
            })
            .collect();
        ensure_unique_external_ids(&rows, &pending)?;
        let n = pending.len() as u64;
        for (idx, entity) in pending {
            rows[idx] = entity;
        }
        Ok(n)
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        if matches!(&query.entity_ids, Some(ids) if ids.is_empty()) {
            return Ok(SearchPage::empty());
        }
        let matcher = TextMatcher::new(query)?;
        let rows = self.rows.read().await;
        let hits: Vec<&Entity> = rows
            .iter()
            .filter(|e| e.tenant_id == query.tenant_id)
            .filter(|e| match &query.entity_ids {
                Some(ids) => ids.contains(&e.id),
                None => true,
            })
            .filter(|e| match &query.entity_type {
                Some(t) => e.entity_type.as_deref() == Some(t.as_str()),
                None => true,
            })
            .filter(|e| matcher.as_ref().map_or(true, |m| m.matches(e)))
            .collect();
        let count = hits.len() as u64;
        let data = hits
            .into_iter()
            .skip(query.page.skip())
            .take(query.page.limit())
            .cloned()
            .collect();
        Ok(SearchPage { data, count })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Rejects a changed externalId that another entity of the tenant holds once
/// `pending` replaces its rows.
fn ensure_unique_external_ids(rows: &[Entity], pending: &[(usize, Entity)]) -> Result<()> {
    let after = |j: usize| {
        pending
            .iter()
            .find(|(idx, _)| *idx == j)
            .map_or(&rows[j], |(_, e)| e)
    };
    for (idx, entity) in pending {
        let ext = entity.external_id();
        if ext.is_empty() || ext == rows[*idx].external_id() {
            continue;
        }
        let clash = (0..rows.len())
            .filter(|j| j != idx)
            .map(after)
            .any(|r| r.tenant_id == entity.tenant_id && r.external_id() == ext);
        if clash {
            return Err(EntityError::Conflict(format!("externalId '{ext}' already exists")));
        }
    }
    Ok(())
}

// ── Entity types ──────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryEntityTypeStore {
    rows: RwLock<Vec<EntityType>>,
}

#[async_trait]
impl EntityTypeStore for InMemoryEntityTypeStore {
    async fn find(&self, filter: &EntityTypeFilter) -> Result<Vec<EntityType>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|t| filter.matches(t)).cloned().collect())
    }

    async fn find_one(&self, filter: &EntityTypeFilter) -> Result<EntityType> {
        let rows = self.rows.read().await;
        rows.iter()
            .find(|t| filter.matches(t))
            .cloned()
            .ok_or_else(|| EntityError::NotFound("entity type".into()))
    }

    async fn create(&self, entity_type: NewEntityType) -> Result<EntityType> {
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|t| t.tenant_id == entity_type.tenant_id && t.name == entity_type.name)
        {
            return Err(EntityError::Conflict(format!(
                "entity type '{}' already exists",
                entity_type.name
            )));
        }
        let created = entity_type.into_entity_type(Uuid::new_v4(), Utc::now());
        rows.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        tenant_id: &str,
        id: EntityTypeId,
        patch: &EntityTypePatch,
        updated_by: &str,
    ) -> Result<EntityType> {
        let mut rows = self.rows.write().await;
        let t = rows
            .iter_mut()
            .find(|t| t.id == id && t.tenant_id == tenant_id)
            .ok_or_else(|| EntityError::NotFound(format!("entity type {id}")))?;
        patch.apply(t);
        t.updated_by = updated_by.to_string();
        t.updated_at = Utc::now();
        Ok(t.clone())
    }
}

// ── Roles ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryUserRoleStore {
    rows: RwLock<Vec<UserRoleExtension>>,
}

#[async_trait]
impl UserRoleStore for InMemoryUserRoleStore {
    async fn find(&self, filter: &RoleFilter, opts: &FindOptions) -> Result<Vec<UserRoleExtension>> {
        let rows = self.rows.read().await;
        let iter = rows
            .iter()
            .filter(|r| filter.matches(r))
            .skip(opts.skip.unwrap_or(0))
            .cloned();
        Ok(match opts.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        })
    }

    async fn count(&self, filter: &RoleFilter) -> Result<u64> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn create(&self, role: NewUserRoleExtension) -> Result<UserRoleExtension> {
        let created = role.into_role(Uuid::new_v4(), Utc::now());
        self.rows.write().await.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        tenant_id: &str,
        id: Uuid,
        patch: &UserRoleExtensionPatch,
        updated_by: &str,
    ) -> Result<UserRoleExtension> {
        let mut rows = self.rows.write().await;
        let r = rows
            .iter_mut()
            .find(|r| r.id == id && r.tenant_id == tenant_id)
            .ok_or_else(|| EntityError::NotFound(format!("user role extension {id}")))?;
        patch.apply(r);
        r.updated_by = updated_by.to_string();
        r.updated_at = Utc::now();
        Ok(r.clone())
    }

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<()> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| !(r.id == id && r.tenant_id == tenant_id));
        if rows.len() == before {
            return Err(EntityError::NotFound(format!("user role extension {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Page;
    use crate::types::{MetaInformation, SYSTEM_ACTOR};
    use serde_json::Map;

    fn new_entity(ext: &str) -> NewEntity {
        NewEntity {
            entity_type: Some("school".into()),
            entity_type_id: None,
            meta_information: MetaInformation::new(ext, format!("School {ext}")),
            registry_details: Map::new(),
            tenant_id: "t".into(),
            org_id: "o".into(),
            created_by: SYSTEM_ACTOR.into(),
        }
    }

    #[tokio::test]
    async fn duplicate_external_id_conflicts() {
        let store = InMemoryEntityStore::default();
        store.create(vec![new_entity("S1")]).await.unwrap();
        let err = store.create(vec![new_entity("S1")]).await.unwrap_err();
        assert!(matches!(err, EntityError::Conflict(_)));

        let err = store
            .create(vec![new_entity("S2"), new_entity("S2")])
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::Conflict(_)));
        assert_eq!(
            store
                .find(&EntityFilter::tenant("t"), &FindOptions::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn update_one_missing_is_not_found() {
        let store = InMemoryEntityStore::default();
        let err = store
            .update_one(&EntityFilter::by_id("t", Uuid::new_v4()), &EntityUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_to_taken_external_id_conflicts() {
        let store = InMemoryEntityStore::default();
        let created = store
            .create(vec![new_entity("S1"), new_entity("S2")])
            .await
            .unwrap();
        let mut update = EntityUpdate::default();
        update.set_meta.insert("externalId".into(), "S1".into());

        let err = store
            .update_one(&EntityFilter::by_id("t", created[1].id), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::Conflict(_)));
        let s2 = store
            .find_one(&EntityFilter::by_id("t", created[1].id))
            .await
            .unwrap();
        assert_eq!(s2.external_id(), "S2");

        // Rewriting an entity's own externalId is fine.
        let s1 = store
            .update_one(&EntityFilter::by_id("t", created[0].id), &update)
            .await
            .unwrap();
        assert_eq!(s1.external_id(), "S1");

        // Two matches cannot both take the same new externalId.
        update.set_meta.insert("externalId".into(), "S9".into());
        let err = store
            .update_many(&EntityFilter::tenant("t"), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_many_unions_into_every_match() {
        let store = InMemoryEntityStore::default();
        let created = store
            .create(vec![new_entity("S1"), new_entity("S2"), new_entity("S3")])
            .await
            .unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let mut first = EntityUpdate::default();
        first.add_to_group("block", &[a]);
        store
            .update_one(&EntityFilter::by_id("t", created[0].id), &first)
            .await
            .unwrap();

        let mut update = EntityUpdate::default();
        update.add_to_group("block", &[a, b]);
        update.add_to_path(&["block".to_string()]);
        let filter = EntityFilter::tenant("t").with_external_ids(vec!["S1".into(), "S2".into()]);
        assert_eq!(store.update_many(&filter, &update).await.unwrap(), 2);
        assert_eq!(store.update_many(&filter, &update).await.unwrap(), 2);

        let rows = store
            .find(&EntityFilter::tenant("t"), &FindOptions::default())
            .await
            .unwrap();
        for row in &rows {
            if row.external_id() == "S3" {
                assert!(row.groups.is_empty());
                assert!(row.child_hierarchy_path.is_empty());
            } else {
                assert_eq!(row.group("block"), &[a, b]);
                assert_eq!(row.child_hierarchy_path, vec!["block".to_string()]);
            }
        }
    }

    #[tokio::test]
    async fn search_pages_and_counts() {
        let store = InMemoryEntityStore::default();
        let created = store
            .create((0..5).map(|i| new_entity(&format!("S{i}"))).collect())
            .await
            .unwrap();
        let ids: Vec<Uuid> = created.iter().map(|e| e.id).collect();
        let q = SearchQuery::new("t", Page::new(2, 2).unwrap()).within(ids[..4].to_vec());
        let page = store.search(&q).await.unwrap();
        assert_eq!(page.count, 4);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].id, ids[2]);

        let empty = SearchQuery::new("t", Page::new(2, 1).unwrap()).within(vec![]);
        assert_eq!(store.search(&empty).await.unwrap(), SearchPage::empty());
    }

    #[tokio::test]
    async fn role_delete_missing_is_not_found() {
        let store = InMemoryUserRoleStore::default();
        assert!(matches!(
            store.delete("t", Uuid::new_v4()).await,
            Err(EntityError::NotFound(_))
        ));
    }
}
