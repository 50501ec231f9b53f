//! Read-side traversal of the hierarchy.

use std::sync::Arc;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::EntityError;
use crate::filter::{EntityFilter, FindOptions, RoleFilter};
use crate::hierarchy::union::union_into;
use crate::ports::{EntityStore, Result, UserRoleStore};
use crate::search::{Page, SearchPage, SearchQuery};
use crate::types::{Entity, EntityId, EntityTypeId, RoleStatus, TargetedRole};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolePage {
    pub data: Vec<TargetedRole>,
    pub count: u64,
}

#[derive(Clone)]
pub struct HierarchyQuery {
    entities: Arc<dyn EntityStore>,
    roles: Arc<dyn UserRoleStore>,
    catalog: Catalog,
}

impl HierarchyQuery {
    pub fn new(entities: Arc<dyn EntityStore>, roles: Arc<dyn UserRoleStore>, catalog: Catalog) -> Self {
        Self {
            entities,
            roles,
            catalog,
        }
    }

    /// Children of `entity_id`, searched and paged.
    ///
    /// With `target_type` the scope is `groups[target_type]`; without, it is the
    /// union of the groups named by the entity type's immediate children.
    pub async fn sub_entities(
        &self,
        tenant_id: &str,
        entity_id: EntityId,
        target_type: Option<&str>,
        search_text: &str,
        page: Page,
    ) -> Result<SearchPage> {
        let entity = self.entity(tenant_id, entity_id).await?;
        let scope = match target_type {
            Some(t) => entity.group(t).to_vec(),
            None => {
                let children = match entity.entity_type.as_deref() {
                    Some(ty) => self.catalog.immediate_children_of(tenant_id, ty).await?,
                    None => Vec::new(),
                };
                let mut ids = Vec::new();
                for key in &children {
                    union_into(&mut ids, entity.group(key));
                }
                ids
            }
        };
        if scope.is_empty() {
            return Ok(SearchPage::empty());
        }
        self.entities
            .search(&SearchQuery::new(tenant_id, page).within(scope).text(search_text))
            .await
    }

    /// Tenant-scoped text search, optionally restricted to `entity_ids`.
    pub async fn search(
        &self,
        tenant_id: &str,
        search_text: &str,
        page: Page,
        entity_ids: Option<Vec<EntityId>>,
    ) -> Result<SearchPage> {
        let mut query = SearchQuery::new(tenant_id, page).text(search_text);
        query.entity_ids = entity_ids;
        self.entities.search(&query).await
    }

    /// Entities holding `entity_id` under `groups[entity_type]`, skipping those
    /// of type `entity_type_id`. This is a reverse scan over every group.
    pub async fn related_entities(
        &self,
        tenant_id: &str,
        entity_id: Option<EntityId>,
        entity_type_id: Option<EntityTypeId>,
        entity_type: Option<&str>,
    ) -> Result<Vec<Entity>> {
        let (Some(entity_id), Some(entity_type_id), Some(entity_type)) =
            (entity_id, entity_type_id, entity_type)
        else {
            return Err(EntityError::BadRequest(
                "entityId, entityTypeId and entityType are required".into(),
            ));
        };
        let filter = EntityFilter::tenant(tenant_id)
            .with_group_member(entity_id, Some(entity_type.to_string()))
            .excluding_entity_type_id(entity_type_id);
        self.entities.find(&filter, &FindOptions::default()).await
    }

    /// Related entities of an already loaded entity.
    pub async fn related_entities_of(&self, entity: &Entity) -> Result<Vec<Entity>> {
        self.related_entities(
            &entity.tenant_id,
            Some(entity.id),
            entity.entity_type_id,
            entity.entity_type.as_deref(),
        )
        .await
    }

    /// ACTIVE roles defined for the entity's own type or any descendant type.
    ///
    /// With `requested_type` the type list stops at that type; the request is
    /// rejected when no entity carries it.
    pub async fn targeted_roles(
        &self,
        tenant_id: &str,
        entity_ids: &[EntityId],
        requested_type: Option<&str>,
        page: Option<Page>,
    ) -> Result<RolePage> {
        if entity_ids.is_empty() {
            return Err(EntityError::BadRequest("entity id is required".into()));
        }
        let entities = self
            .entities
            .find(
                &EntityFilter::tenant(tenant_id).with_ids(entity_ids.to_vec()),
                &FindOptions::default(),
            )
            .await?;
        if entities.is_empty() {
            return Err(EntityError::NotFound(format!("entity {}", entity_ids[0])));
        }

        let mut types: Vec<String> = Vec::new();
        let mut requested_seen = false;
        for entity in &entities {
            let mut chain: Vec<String> = entity.entity_type.iter().cloned().collect();
            union_into(&mut chain, &entity.child_hierarchy_path);
            if let Some(wanted) = requested_type {
                match chain.iter().position(|t| t == wanted) {
                    Some(pos) => {
                        chain.truncate(pos + 1);
                        requested_seen = true;
                    }
                    None => continue,
                }
            }
            union_into(&mut types, &chain);
        }
        if let Some(wanted) = requested_type {
            if !requested_seen {
                return Err(EntityError::BadRequest(format!(
                    "entity type '{wanted}' is not part of this hierarchy"
                )));
            }
        }

        let type_ids = self.catalog.resolve_ids(tenant_id, &types).await?;
        if type_ids.is_empty() {
            return Ok(RolePage {
                data: Vec::new(),
                count: 0,
            });
        }
        let filter = RoleFilter {
            status: Some(RoleStatus::Active),
            entity_type_ids: Some(type_ids),
            ..RoleFilter::tenant(tenant_id)
        };
        let opts = page
            .map(|p| FindOptions::default().paged(p.skip(), p.limit()))
            .unwrap_or_default();
        let count = self.roles.count(&filter).await?;
        let roles = self.roles.find(&filter, &opts).await?;
        Ok(RolePage {
            data: roles.iter().map(TargetedRole::from).collect(),
            count,
        })
    }

    async fn entity(&self, tenant_id: &str, id: EntityId) -> Result<Entity> {
        self.entities
            .find_one(&EntityFilter::by_id(tenant_id, id))
            .await
            .map_err(|e| match e {
                EntityError::NotFound(_) => EntityError::NotFound(format!("entity {id}")),
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyMutator;
    use crate::ports::UserRoleStore;
    use crate::test_support::{user, Fixture, TENANT};
    use crate::types::{EntityType, NewUserRoleExtension, RoleEntityType};

    fn query(f: &Fixture) -> HierarchyQuery {
        HierarchyQuery::new(f.entities(), f.stores.roles.clone(), f.catalog.clone())
    }

    fn mutator(f: &Fixture) -> HierarchyMutator {
        HierarchyMutator::new(f.entities(), f.catalog.clone())
    }

    async fn role(f: &Fixture, id: i64, title: &str, types: &[&EntityType], status: RoleStatus) {
        f.stores
            .roles
            .create(NewUserRoleExtension {
                user_role_id: id,
                title: title.into(),
                code: Some(title.to_lowercase()),
                user_type: None,
                status,
                entity_types: types
                    .iter()
                    .map(|t| RoleEntityType {
                        entity_type: t.name.clone(),
                        entity_type_id: t.id,
                    })
                    .collect(),
                tenant_id: TENANT.into(),
                org_id: "o1".into(),
                created_by: "u1".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sub_entities_typed_and_immediate() {
        let f = Fixture::new();
        let state = f.entity_type("state", &["district"], false).await;
        let district = f.entity_type("district", &["school"], false).await;
        let school = f.entity_type("school", &[], false).await;
        let mh = f.entity(&state, "MH").await;
        let pune = f.entity(&district, "PUNE").await;
        let s1 = f.entity(&school, "S1").await;
        let m = mutator(&f);
        m.attach_child(&user(), pune.id, s1.id, None).await.unwrap();
        m.attach_child(&user(), mh.id, pune.id, None).await.unwrap();
        let q = query(&f);
        let page = Page::new(10, 1).unwrap();

        let immediate = q.sub_entities(TENANT, mh.id, None, "", page).await.unwrap();
        assert_eq!(immediate.count, 1);
        assert_eq!(immediate.data[0].id, pune.id);

        let schools = q
            .sub_entities(TENANT, mh.id, Some("school"), "", page)
            .await
            .unwrap();
        assert_eq!(schools.data[0].id, s1.id);

        let none = q.sub_entities(TENANT, mh.id, Some("block"), "", page).await.unwrap();
        assert_eq!(none, SearchPage::empty());
    }

    #[tokio::test]
    async fn related_entities_requires_all_params() {
        let f = Fixture::new();
        let q = query(&f);
        let err = q
            .related_entities(TENANT, Some(uuid::Uuid::new_v4()), None, Some("school"))
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::BadRequest(_)));
    }

    #[tokio::test]
    async fn related_entities_excludes_same_type() {
        let f = Fixture::new();
        let state = f.entity_type("state", &["district"], false).await;
        let district = f.entity_type("district", &["school"], false).await;
        let school = f.entity_type("school", &[], false).await;
        let mh = f.entity(&state, "MH").await;
        let pune = f.entity(&district, "PUNE").await;
        let s1 = f.entity(&school, "S1").await;
        let m = mutator(&f);
        m.attach_child(&user(), pune.id, s1.id, None).await.unwrap();
        m.attach_child(&user(), mh.id, pune.id, None).await.unwrap();

        let related = query(&f).related_entities_of(&s1).await.unwrap();
        let ids: Vec<_> = related.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![mh.id, pune.id]);
        assert!(related.iter().all(|e| e.entity_type_id != s1.entity_type_id));
    }

    #[tokio::test]
    async fn targeted_roles_truncate_at_requested_type() {
        let f = Fixture::new();
        let state = f.entity_type("state", &["district"], false).await;
        let district = f.entity_type("district", &["school"], false).await;
        let school = f.entity_type("school", &[], false).await;
        let mh = f.entity(&state, "MH").await;
        let pune = f.entity(&district, "PUNE").await;
        let s1 = f.entity(&school, "S1").await;
        let m = mutator(&f);
        m.attach_child(&user(), pune.id, s1.id, None).await.unwrap();
        m.attach_child(&user(), mh.id, pune.id, None).await.unwrap();

        role(&f, 1, "STATE_LEAD", &[&state], RoleStatus::Active).await;
        role(&f, 2, "DEO", &[&district], RoleStatus::Active).await;
        role(&f, 3, "HM", &[&school], RoleStatus::Active).await;
        role(&f, 4, "RETIRED", &[&district], RoleStatus::Inactive).await;
        let q = query(&f);

        let all = q.targeted_roles(TENANT, &[mh.id], None, None).await.unwrap();
        assert_eq!(all.count, 3);
        let values: Vec<i64> = all.data.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1, 2, 3]);

        let upto_district = q
            .targeted_roles(TENANT, &[mh.id], Some("district"), None)
            .await
            .unwrap();
        assert_eq!(upto_district.count, 2);
        assert_eq!(upto_district.data[1].label, "DEO");

        let paged = q
            .targeted_roles(TENANT, &[mh.id], None, Some(Page::new(1, 2).unwrap()))
            .await
            .unwrap();
        assert_eq!(paged.count, 3);
        assert_eq!(paged.data.len(), 1);
        assert_eq!(paged.data[0].value, 2);

        let err = q
            .targeted_roles(TENANT, &[mh.id], Some("cluster"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EntityError::BadRequest(_)));
    }
}
