//! Store filters and update documents.
//!
//! Filters are plain data evaluated by each adapter: the in-memory store calls
//! [`EntityFilter::matches`], the Postgres adapter renders the same fields
//! into SQL. Keep both in step when adding a field.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::hierarchy::union::union_into;
use crate::types::{
    Attributes, Entity, EntityId, EntityType, EntityTypeId, RoleStatus, UserRoleExtension,
};

// ── Entities ──────────────────────────────────────────────────

/// "Contains `entity_id`" inside one group key, or inside any group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub entity_id: EntityId,
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFilter {
    #[serde(skip)]
    pub tenant_id: Option<String>,
    #[serde(default, rename = "_id")]
    pub ids: Option<Vec<EntityId>>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_type_id: Option<EntityTypeId>,
    #[serde(default)]
    pub external_ids: Option<Vec<String>>,
    #[serde(default)]
    pub location_ids: Option<Vec<String>>,
    #[serde(skip)]
    pub group_member: Option<GroupMember>,
    #[serde(skip)]
    pub exclude_entity_type_id: Option<EntityTypeId>,
}

impl EntityFilter {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Default::default()
        }
    }

    pub fn by_id(tenant_id: impl Into<String>, id: EntityId) -> Self {
        Self::tenant(tenant_id).with_ids(vec![id])
    }

    pub fn with_ids(mut self, ids: Vec<EntityId>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_entity_type(mut self, name: impl Into<String>) -> Self {
        self.entity_type = Some(name.into());
        self
    }

    pub fn with_external_ids(mut self, external_ids: Vec<String>) -> Self {
        self.external_ids = Some(external_ids);
        self
    }

    /// Entities that list `entity_id` in `group`, or in any group when `None`.
    pub fn with_group_member(mut self, entity_id: EntityId, group: Option<String>) -> Self {
        self.group_member = Some(GroupMember { entity_id, group });
        self
    }

    pub fn excluding_entity_type_id(mut self, id: EntityTypeId) -> Self {
        self.exclude_entity_type_id = Some(id);
        self
    }

    pub fn matches(&self, e: &Entity) -> bool {
        if let Some(t) = &self.tenant_id {
            if &e.tenant_id != t {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&e.id) {
                return false;
            }
        }
        if let Some(name) = &self.entity_type {
            if e.entity_type.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(type_id) = &self.entity_type_id {
            if e.entity_type_id.as_ref() != Some(type_id) {
                return false;
            }
        }
        if let Some(ext) = &self.external_ids {
            if !ext.iter().any(|x| x == e.external_id()) {
                return false;
            }
        }
        if let Some(locs) = &self.location_ids {
            match e.location_id() {
                Some(loc) if locs.iter().any(|l| l == loc) => {}
                _ => return false,
            }
        }
        if let Some(gm) = &self.group_member {
            let hit = match &gm.group {
                Some(key) => e.group(key).contains(&gm.entity_id),
                None => e.has_descendant(&gm.entity_id),
            };
            if !hit {
                return false;
            }
        }
        if let Some(excluded) = &self.exclude_entity_type_id {
            // Untyped entities carry no type ID and are never excluded.
            if e.entity_type_id.as_ref() == Some(excluded) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    CreatedAt,
    Name,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<SortBy>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn sorted(sort: SortBy) -> Self {
        Self {
            sort: Some(sort),
            ..Default::default()
        }
    }

    pub fn paged(mut self, skip: usize, limit: usize) -> Self {
        self.skip = Some(skip);
        self.limit = Some(limit);
        self
    }
}

/// Apply sort, skip and limit to an already filtered list.
pub fn apply_find_options(mut entities: Vec<Entity>, opts: &FindOptions) -> Vec<Entity> {
    match opts.sort {
        Some(SortBy::CreatedAt) => entities.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        }),
        Some(SortBy::Name) => entities.sort_by(|a, b| {
            a.name()
                .cmp(b.name())
                .then_with(|| a.id.cmp(&b.id))
        }),
        None => {}
    }
    let skip = opts.skip.unwrap_or(0);
    let iter = entities.into_iter().skip(skip);
    match opts.limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}

/// Update document for a single entity. Scalar fields overwrite; groups and
/// path are unions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityUpdate {
    pub set_meta: Attributes,
    pub set_registry_details: Attributes,
    pub add_to_groups: BTreeMap<String, Vec<EntityId>>,
    pub add_to_child_hierarchy_path: Vec<String>,
    pub updated_by: Option<String>,
}

impl EntityUpdate {
    pub fn is_empty(&self) -> bool {
        self.set_meta.is_empty()
            && self.set_registry_details.is_empty()
            && self.add_to_groups.values().all(Vec::is_empty)
            && self.add_to_child_hierarchy_path.is_empty()
    }

    pub fn add_to_group(&mut self, key: impl Into<String>, ids: &[EntityId]) {
        let slot = self.add_to_groups.entry(key.into()).or_default();
        union_into(slot, ids);
    }

    pub fn add_to_path(&mut self, types: &[String]) {
        union_into(&mut self.add_to_child_hierarchy_path, types);
    }

    /// Fold another update into this one. Later scalar writes win.
    pub fn merge(&mut self, other: EntityUpdate) {
        for (k, v) in other.set_meta {
            self.set_meta.insert(k, v);
        }
        for (k, v) in other.set_registry_details {
            self.set_registry_details.insert(k, v);
        }
        for (key, ids) in other.add_to_groups {
            self.add_to_group(key, &ids);
        }
        self.add_to_path(&other.add_to_child_hierarchy_path);
        if other.updated_by.is_some() {
            self.updated_by = other.updated_by;
        }
    }

    /// Apply in place. Does not touch `updated_at`; the store stamps it.
    pub fn apply(&self, entity: &mut Entity) {
        entity.meta_information.set_fields(&self.set_meta);
        for (k, v) in &self.set_registry_details {
            entity.registry_details.insert(k.clone(), v.clone());
        }
        for (key, ids) in &self.add_to_groups {
            if ids.is_empty() {
                continue;
            }
            union_into(entity.groups.entry(key.clone()).or_default(), ids);
        }
        union_into(
            &mut entity.child_hierarchy_path,
            &self.add_to_child_hierarchy_path,
        );
        if let Some(by) = &self.updated_by {
            entity.updated_by = by.clone();
        }
    }
}

// ── Entity types ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeFilter {
    #[serde(skip)]
    pub tenant_id: Option<String>,
    #[serde(default, rename = "_id")]
    pub ids: Option<Vec<EntityTypeId>>,
    #[serde(default)]
    pub names: Option<Vec<String>>,
    #[serde(default)]
    pub is_observable: Option<bool>,
    #[serde(default)]
    pub to_be_mapped_to_parent_entities: Option<bool>,
    /// Soft-deleted types are excluded unless set.
    #[serde(default)]
    pub include_deleted: bool,
}

impl EntityTypeFilter {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Default::default()
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn with_ids(mut self, ids: Vec<EntityTypeId>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn matches(&self, t: &EntityType) -> bool {
        if !self.include_deleted && t.is_deleted {
            return false;
        }
        if let Some(tenant) = &self.tenant_id {
            if &t.tenant_id != tenant {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&t.id) {
                return false;
            }
        }
        if let Some(names) = &self.names {
            if !names.contains(&t.name) {
                return false;
            }
        }
        if let Some(flag) = self.is_observable {
            if t.is_observable != flag {
                return false;
            }
        }
        if let Some(flag) = self.to_be_mapped_to_parent_entities {
            if t.to_be_mapped_to_parent_entities != flag {
                return false;
            }
        }
        true
    }
}

// ── Roles ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleFilter {
    #[serde(skip)]
    pub tenant_id: Option<String>,
    #[serde(default, rename = "_id")]
    pub ids: Option<Vec<uuid::Uuid>>,
    #[serde(default)]
    pub user_role_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<RoleStatus>,
    /// Roles targeting at least one of these entity type IDs.
    #[serde(default)]
    pub entity_type_ids: Option<Vec<EntityTypeId>>,
}

impl RoleFilter {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, r: &UserRoleExtension) -> bool {
        if let Some(tenant) = &self.tenant_id {
            if &r.tenant_id != tenant {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&r.id) {
                return false;
            }
        }
        if let Some(role_ids) = &self.user_role_ids {
            if !role_ids.contains(&r.user_role_id) {
                return false;
            }
        }
        if let Some(title) = &self.title {
            if &r.title != title {
                return false;
            }
        }
        if let Some(status) = self.status {
            if r.status != status {
                return false;
            }
        }
        if let Some(type_ids) = &self.entity_type_ids {
            if !r.targets_any(type_ids) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetaInformation, NewEntity, SYSTEM_ACTOR};
    use chrono::Utc;
    use serde_json::{json, Map};
    use uuid::Uuid;

    fn entity(tenant: &str, ty: &str) -> Entity {
        NewEntity {
            entity_type: Some(ty.into()),
            entity_type_id: Some(Uuid::new_v4()),
            meta_information: MetaInformation::new("X", "x"),
            registry_details: Map::new(),
            tenant_id: tenant.into(),
            org_id: "o".into(),
            created_by: SYSTEM_ACTOR.into(),
        }
        .into_entity(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn group_member_any_vs_specific() {
        let child = Uuid::new_v4();
        let mut e = entity("t", "state");
        e.groups.insert("district".into(), vec![child]);

        let any = EntityFilter::tenant("t").with_group_member(child, None);
        let district = EntityFilter::tenant("t").with_group_member(child, Some("district".into()));
        let block = EntityFilter::tenant("t").with_group_member(child, Some("block".into()));
        assert!(any.matches(&e));
        assert!(district.matches(&e));
        assert!(!block.matches(&e));
    }

    #[test]
    fn tenant_scopes_every_filter() {
        let e = entity("t1", "state");
        assert!(!EntityFilter::by_id("t2", e.id).matches(&e));
        assert!(EntityFilter::by_id("t1", e.id).matches(&e));
    }

    #[test]
    fn excluded_type_id_drops_match() {
        let e = entity("t", "state");
        let type_id = e.entity_type_id.unwrap();
        assert!(!EntityFilter::tenant("t")
            .excluding_entity_type_id(type_id)
            .matches(&e));
    }

    #[test]
    fn location_filter_reads_registry_details() {
        let mut e = entity("t", "school");
        e.registry_details.insert("locationId".into(), json!("L-9"));
        let f = EntityFilter {
            location_ids: Some(vec!["L-9".into()]),
            ..Default::default()
        };
        assert!(f.matches(&e));
    }

    #[test]
    fn update_apply_unions_groups_and_path() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut e = entity("t", "state");
        e.groups.insert("district".into(), vec![a]);
        e.child_hierarchy_path = vec!["district".into()];

        let mut u = EntityUpdate::default();
        u.add_to_group("district", &[a, b]);
        u.add_to_path(&["district".into(), "block".into()]);
        u.apply(&mut e);
        u.apply(&mut e);

        assert_eq!(e.group("district"), &[a, b]);
        assert_eq!(e.child_hierarchy_path, vec!["district", "block"]);
    }

    #[test]
    fn merge_accumulates_ids() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut left = EntityUpdate::default();
        left.add_to_group("school", &[a]);
        let mut right = EntityUpdate::default();
        right.add_to_group("school", &[b, a]);
        right.add_to_path(&["school".into()]);
        left.merge(right);
        assert_eq!(left.add_to_groups["school"], vec![a, b]);
        assert_eq!(left.add_to_child_hierarchy_path, vec!["school"]);
    }

    #[test]
    fn entity_type_filter_hides_deleted() {
        let mut t = crate::types::NewEntityType::new("state", "t", "o")
            .into_entity_type(Uuid::new_v4(), Utc::now());
        t.is_deleted = true;
        assert!(!EntityTypeFilter::tenant("t").matches(&t));
        let f = EntityTypeFilter {
            include_deleted: true,
            ..EntityTypeFilter::tenant("t")
        };
        assert!(f.matches(&t));
    }

    #[test]
    fn find_options_skip_and_limit() {
        let list: Vec<Entity> = (0..5).map(|_| entity("t", "s")).collect();
        let page = apply_find_options(list, &FindOptions::sorted(SortBy::CreatedAt).paged(3, 10));
        assert_eq!(page.len(), 2);
    }
}
