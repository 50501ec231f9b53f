//! Bulk entity type create/update from CSV rows.

use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::bulk::csv_io::CsvRow;
use crate::bulk::entities::annotate;
use crate::bulk::{parse_flag, REGISTRY_PREFIX, SYSTEM_ID_COLUMN};
use crate::error::EntityError;
use crate::hierarchy::union::union_into;
use crate::ports::{EntityTypeStore, Result};
use crate::principal::UserDetails;
use crate::types::{Attributes, EntityTypePatch, NewEntityType};

const NAME: &str = "name";
const CHILDREN: &str = "immediateChildrenEntityType";
const OBSERVABLE: &str = "isObservable";
const PROPAGATE: &str = "toBeMappedToParentEntities";
const DELETED: &str = "isDeleted";

#[derive(Clone)]
pub struct EntityTypeBulk {
    store: Arc<dyn EntityTypeStore>,
}

impl EntityTypeBulk {
    pub fn new(store: Arc<dyn EntityTypeStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>> {
        let mut out = Vec::with_capacity(rows.len());
        let mut failed = 0usize;
        for mut row in rows {
            let result = self.create_row(user, &row).await;
            annotate(&mut row, result, &mut failed)?;
            out.push(row);
        }
        tracing::info!(tenant = %user.tenant_id, rows = out.len(), failed, "bulk entity type create");
        Ok(out)
    }

    pub async fn update(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>> {
        let mut out = Vec::with_capacity(rows.len());
        let mut failed = 0usize;
        for mut row in rows {
            let result = self.update_row(user, &row).await;
            annotate(&mut row, result, &mut failed)?;
            out.push(row);
        }
        tracing::info!(tenant = %user.tenant_id, rows = out.len(), failed, "bulk entity type update");
        Ok(out)
    }

    async fn create_row(&self, user: &UserDetails, row: &CsvRow) -> Result<Uuid> {
        let name = row
            .value(NAME)
            .ok_or_else(|| EntityError::BadRequest("name is required".into()))?;
        let mut new = NewEntityType::new(name, user.tenant_id.as_str(), user.org_id.as_str());
        new.created_by = user.user_id.clone();
        if let Some(children) = row.value(CHILDREN) {
            new.immediate_children_entity_type = split_children(children);
        }
        if let Some(v) = row.value(OBSERVABLE) {
            new.is_observable = parse_flag(v);
        }
        if let Some(v) = row.value(PROPAGATE) {
            new.to_be_mapped_to_parent_entities = parse_flag(v);
        }
        new.registry_details = registry_columns(row);
        Ok(self.store.create(new).await?.id)
    }

    async fn update_row(&self, user: &UserDetails, row: &CsvRow) -> Result<Uuid> {
        let raw = row
            .value(SYSTEM_ID_COLUMN)
            .ok_or_else(|| EntityError::BadRequest(format!("{SYSTEM_ID_COLUMN} is required")))?;
        let id = Uuid::parse_str(raw)
            .map_err(|_| EntityError::BadRequest(format!("invalid {SYSTEM_ID_COLUMN} '{raw}'")))?;
        let registry = registry_columns(row);
        let patch = EntityTypePatch {
            immediate_children_entity_type: row.value(CHILDREN).map(split_children),
            is_observable: row.value(OBSERVABLE).map(parse_flag),
            to_be_mapped_to_parent_entities: row.value(PROPAGATE).map(parse_flag),
            is_deleted: row.value(DELETED).map(parse_flag),
            registry_details: (!registry.is_empty()).then_some(registry),
        };
        let updated = self
            .store
            .update(&user.tenant_id, id, &patch, &user.user_id)
            .await?;
        Ok(updated.id)
    }
}

/// Comma separated type names, trimmed, blanks dropped, first occurrence kept.
fn split_children(value: &str) -> Vec<String> {
    let parts: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let mut out = Vec::with_capacity(parts.len());
    union_into(&mut out, &parts);
    out
}

fn registry_columns(row: &CsvRow) -> Attributes {
    let mut details = Map::new();
    for (column, value) in row.iter() {
        if let Some(key) = column.strip_prefix(REGISTRY_PREFIX) {
            if !key.is_empty() && !value.is_empty() {
                details.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
    }
    details
}
