//! Request and response bodies shared by the service and the HTTP layer.

use serde::{Deserialize, Serialize};

use crate::filter::EntityFilter;
use crate::types::{Attributes, Entity, EntityId, RoleEntityType, RoleStatus};

// ── Entities ──────────────────────────────────────────────────

/// Body of `entities/add`: metadata fields at the top level plus optional
/// `registryDetails`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEntityRequest {
    #[serde(default)]
    pub registry_details: Attributes,
    #[serde(flatten)]
    pub meta_information: Attributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntityRequest {
    #[serde(default)]
    pub meta_information: Option<Attributes>,
    #[serde(default)]
    pub registry_details: Option<Attributes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindEntitiesRequest {
    #[serde(default)]
    pub query: EntityFilter,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListByIdsRequest {
    pub entities: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub page_no: Option<i64>,
    #[serde(default)]
    pub entity_ids: Option<Vec<EntityId>>,
}

/// An entity together with its ancestors and descendants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEntities {
    #[serde(flatten)]
    pub entity: Entity,
    pub related_entities: Vec<Entity>,
}

// ── Entity types ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntityTypeRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub immediate_children_entity_type: Vec<String>,
    #[serde(default)]
    pub to_be_mapped_to_parent_entities: bool,
    #[serde(default)]
    pub is_observable: Option<bool>,
    #[serde(default)]
    pub registry_details: Attributes,
}

// ── Roles ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub user_role_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub user_type: Option<i64>,
    #[serde(default)]
    pub status: Option<RoleStatus>,
    #[serde(default)]
    pub entity_types: Vec<RoleEntityType>,
}

// ── Health ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub name: String,
    pub version: String,
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
}
