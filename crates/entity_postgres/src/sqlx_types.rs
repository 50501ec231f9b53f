//! Row structs decoded by sqlx and their conversions into core types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use entity_core::types::{
    Attributes, Entity, EntityType, MetaInformation, RoleEntityType, RoleStatus, UserRoleExtension,
};

pub(crate) const ENTITY_COLUMNS: &str = "id, entity_type, entity_type_id, meta_information, groups, \
     child_hierarchy_path, registry_details, tenant_id, org_id, created_by, updated_by, \
     created_at, updated_at";

pub(crate) const ENTITY_TYPE_COLUMNS: &str = "id, name, immediate_children_entity_type, \
     to_be_mapped_to_parent_entities, is_observable, is_deleted, registry_details, tenant_id, \
     org_id, created_by, updated_by, created_at, updated_at";

pub(crate) const ROLE_COLUMNS: &str = "id, user_role_id, title, code, user_type, status, \
     entity_types, tenant_id, org_id, created_by, updated_by, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub struct PgEntityRow {
    pub id: Uuid,
    pub entity_type: Option<String>,
    pub entity_type_id: Option<Uuid>,
    pub meta_information: Json<MetaInformation>,
    pub groups: Json<BTreeMap<String, Vec<Uuid>>>,
    pub child_hierarchy_path: Json<Vec<String>>,
    pub registry_details: Json<Attributes>,
    pub tenant_id: String,
    pub org_id: String,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PgEntityRow> for Entity {
    fn from(r: PgEntityRow) -> Self {
        Entity {
            id: r.id,
            entity_type: r.entity_type,
            entity_type_id: r.entity_type_id,
            meta_information: r.meta_information.0,
            groups: r.groups.0,
            child_hierarchy_path: r.child_hierarchy_path.0,
            registry_details: r.registry_details.0,
            tenant_id: r.tenant_id,
            org_id: r.org_id,
            created_by: r.created_by,
            updated_by: r.updated_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Search row: an entity plus the window count of the whole match set.
#[derive(Debug, sqlx::FromRow)]
pub struct PgSearchRow {
    #[sqlx(flatten)]
    pub entity: PgEntityRow,
    pub total_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgEntityTypeRow {
    pub id: Uuid,
    pub name: String,
    pub immediate_children_entity_type: Json<Vec<String>>,
    pub to_be_mapped_to_parent_entities: bool,
    pub is_observable: bool,
    pub is_deleted: bool,
    pub registry_details: Json<Attributes>,
    pub tenant_id: String,
    pub org_id: String,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PgEntityTypeRow> for EntityType {
    fn from(r: PgEntityTypeRow) -> Self {
        EntityType {
            id: r.id,
            name: r.name,
            immediate_children_entity_type: r.immediate_children_entity_type.0,
            to_be_mapped_to_parent_entities: r.to_be_mapped_to_parent_entities,
            is_observable: r.is_observable,
            is_deleted: r.is_deleted,
            registry_details: r.registry_details.0,
            tenant_id: r.tenant_id,
            org_id: r.org_id,
            created_by: r.created_by,
            updated_by: r.updated_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PgRoleRow {
    pub id: Uuid,
    pub user_role_id: i64,
    pub title: String,
    pub code: Option<String>,
    pub user_type: Option<i64>,
    pub status: String,
    pub entity_types: Json<Vec<RoleEntityType>>,
    pub tenant_id: String,
    pub org_id: String,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PgRoleRow> for UserRoleExtension {
    type Error = String;

    fn try_from(r: PgRoleRow) -> Result<Self, Self::Error> {
        let status = RoleStatus::parse(&r.status)
            .ok_or_else(|| format!("unknown role status '{}' on {}", r.status, r.id))?;
        Ok(UserRoleExtension {
            id: r.id,
            user_role_id: r.user_role_id,
            title: r.title,
            code: r.code,
            user_type: r.user_type,
            status,
            entity_types: r.entity_types.0,
            tenant_id: r.tenant_id,
            org_id: r.org_id,
            created_by: r.created_by,
            updated_by: r.updated_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
