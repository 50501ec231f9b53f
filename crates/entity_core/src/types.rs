//! Registry records: entities, entity types and user role extensions.
//!
//! Wire names are camelCase with `_id` identifiers, matching the documents the
//! registry has always served.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::hierarchy::union::union_into;

pub type EntityId = Uuid;
pub type EntityTypeId = Uuid;

/// Free-form key/value map used for `registryDetails` and untyped metadata.
pub type Attributes = Map<String, Value>;

/// Actor recorded in `createdBy` / `updatedBy` when no user is known.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

// ── Entity ────────────────────────────────────────────────────

/// Descriptive metadata of an entity. `externalId` is unique per tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaInformation {
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Attributes,
}

impl MetaInformation {
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }

    /// String value of a metadata field, including the typed ones.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match key {
            "externalId" => Some(self.external_id.as_str()),
            "name" => Some(self.name.as_str()),
            _ => self.extra.get(key).and_then(Value::as_str),
        }
    }

    /// Overwrite fields from `fields`; `externalId` and `name` only accept strings.
    pub fn set_fields(&mut self, fields: &Attributes) {
        for (key, value) in fields {
            match (key.as_str(), value) {
                ("externalId", Value::String(s)) => self.external_id = s.clone(),
                ("name", Value::String(s)) => self.name = s.clone(),
                ("externalId" | "name", _) => {}
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// A node of the location hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "_id")]
    pub id: EntityId,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_type_id: Option<EntityTypeId>,
    pub meta_information: MetaInformation,
    /// Descendant type name → descendant IDs, in first-attached order.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<EntityId>>,
    /// Every descendant type reachable below this entity, nearest first.
    #[serde(default)]
    pub child_hierarchy_path: Vec<String>,
    #[serde(default)]
    pub registry_details: Attributes,
    pub tenant_id: String,
    pub org_id: String,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn external_id(&self) -> &str {
        &self.meta_information.external_id
    }

    pub fn name(&self) -> &str {
        &self.meta_information.name
    }

    /// Members of one group, empty when the group is absent.
    pub fn group(&self, key: &str) -> &[EntityId] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when `id` sits in any of this entity's groups.
    pub fn has_descendant(&self, id: &EntityId) -> bool {
        self.groups.values().any(|members| members.contains(id))
    }

    /// Registry location code, if the entity carries one.
    pub fn location_id(&self) -> Option<&str> {
        self.registry_details.get("locationId").and_then(Value::as_str)
    }
}

/// Input for creating an entity; the store assigns ID and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntity {
    pub entity_type: Option<String>,
    pub entity_type_id: Option<EntityTypeId>,
    pub meta_information: MetaInformation,
    pub registry_details: Attributes,
    pub tenant_id: String,
    pub org_id: String,
    pub created_by: String,
}

impl NewEntity {
    pub fn into_entity(self, id: EntityId, now: DateTime<Utc>) -> Entity {
        Entity {
            id,
            entity_type: self.entity_type,
            entity_type_id: self.entity_type_id,
            meta_information: self.meta_information,
            groups: BTreeMap::new(),
            child_hierarchy_path: Vec::new(),
            registry_details: self.registry_details,
            tenant_id: self.tenant_id,
            org_id: self.org_id,
            updated_by: self.created_by.clone(),
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

// ── EntityType ────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityType {
    #[serde(rename = "_id")]
    pub id: EntityTypeId,
    pub name: String,
    #[serde(default)]
    pub immediate_children_entity_type: Vec<String>,
    #[serde(default)]
    pub to_be_mapped_to_parent_entities: bool,
    #[serde(default = "default_true")]
    pub is_observable: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub registry_details: Attributes,
    pub tenant_id: String,
    pub org_id: String,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEntityType {
    pub name: String,
    pub immediate_children_entity_type: Vec<String>,
    pub to_be_mapped_to_parent_entities: bool,
    pub is_observable: bool,
    pub registry_details: Attributes,
    pub tenant_id: String,
    pub org_id: String,
    pub created_by: String,
}

impl NewEntityType {
    pub fn new(
        name: impl Into<String>,
        tenant_id: impl Into<String>,
        org_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            immediate_children_entity_type: Vec::new(),
            to_be_mapped_to_parent_entities: false,
            is_observable: true,
            registry_details: Map::new(),
            tenant_id: tenant_id.into(),
            org_id: org_id.into(),
            created_by: SYSTEM_ACTOR.to_string(),
        }
    }

    pub fn into_entity_type(self, id: EntityTypeId, now: DateTime<Utc>) -> EntityType {
        EntityType {
            id,
            name: self.name,
            immediate_children_entity_type: self.immediate_children_entity_type,
            to_be_mapped_to_parent_entities: self.to_be_mapped_to_parent_entities,
            is_observable: self.is_observable,
            is_deleted: false,
            registry_details: self.registry_details,
            tenant_id: self.tenant_id,
            org_id: self.org_id,
            updated_by: self.created_by.clone(),
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of an entity type. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypePatch {
    #[serde(default)]
    pub immediate_children_entity_type: Option<Vec<String>>,
    #[serde(default)]
    pub to_be_mapped_to_parent_entities: Option<bool>,
    #[serde(default)]
    pub is_observable: Option<bool>,
    #[serde(default)]
    pub is_deleted: Option<bool>,
    #[serde(default)]
    pub registry_details: Option<Attributes>,
}

impl EntityTypePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, entity_type: &mut EntityType) {
        if let Some(children) = &self.immediate_children_entity_type {
            let mut deduped = Vec::with_capacity(children.len());
            union_into(&mut deduped, children);
            entity_type.immediate_children_entity_type = deduped;
        }
        if let Some(flag) = self.to_be_mapped_to_parent_entities {
            entity_type.to_be_mapped_to_parent_entities = flag;
        }
        if let Some(flag) = self.is_observable {
            entity_type.is_observable = flag;
        }
        if let Some(flag) = self.is_deleted {
            entity_type.is_deleted = flag;
        }
        if let Some(details) = &self.registry_details {
            for (k, v) in details {
                entity_type.registry_details.insert(k.clone(), v.clone());
            }
        }
    }
}

// ── UserRoleExtension ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleStatus {
    #[default]
    Active,
    Inactive,
}

impl RoleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "INACTIVE" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// An entity type at which a role is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleEntityType {
    pub entity_type: String,
    pub entity_type_id: EntityTypeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleExtension {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_role_id: i64,
    pub title: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub user_type: Option<i64>,
    #[serde(default)]
    pub status: RoleStatus,
    #[serde(default)]
    pub entity_types: Vec<RoleEntityType>,
    pub tenant_id: String,
    pub org_id: String,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRoleExtension {
    pub fn targets_any(&self, type_ids: &[EntityTypeId]) -> bool {
        self.entity_types
            .iter()
            .any(|t| type_ids.contains(&t.entity_type_id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUserRoleExtension {
    pub user_role_id: i64,
    pub title: String,
    pub code: Option<String>,
    pub user_type: Option<i64>,
    pub status: RoleStatus,
    pub entity_types: Vec<RoleEntityType>,
    pub tenant_id: String,
    pub org_id: String,
    pub created_by: String,
}

impl NewUserRoleExtension {
    pub fn into_role(self, id: Uuid, now: DateTime<Utc>) -> UserRoleExtension {
        UserRoleExtension {
            id,
            user_role_id: self.user_role_id,
            title: self.title,
            code: self.code,
            user_type: self.user_type,
            status: self.status,
            entity_types: self.entity_types,
            tenant_id: self.tenant_id,
            org_id: self.org_id,
            updated_by: self.created_by.clone(),
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleExtensionPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub user_type: Option<i64>,
    #[serde(default)]
    pub status: Option<RoleStatus>,
    #[serde(default)]
    pub entity_types: Option<Vec<RoleEntityType>>,
}

impl UserRoleExtensionPatch {
    pub fn apply(&self, role: &mut UserRoleExtension) {
        if let Some(title) = &self.title {
            role.title = title.clone();
        }
        if let Some(code) = &self.code {
            role.code = Some(code.clone());
        }
        if let Some(user_type) = self.user_type {
            role.user_type = Some(user_type);
        }
        if let Some(status) = self.status {
            role.status = status;
        }
        if let Some(types) = &self.entity_types {
            role.entity_types = types.clone();
        }
    }
}

/// Role reshaped for the targeted-roles lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetedRole {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub value: i64,
    pub label: String,
    pub code: Option<String>,
}

impl From<&UserRoleExtension> for TargetedRole {
    fn from(role: &UserRoleExtension) -> Self {
        Self {
            id: role.id,
            value: role.user_role_id,
            label: role.title.clone(),
            code: role.code.clone(),
        }
    }
}
