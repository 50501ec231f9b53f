//! Bulk entity create/update from CSV rows.

use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::bulk::csv_io::CsvRow;
use crate::bulk::{REGISTRY_PREFIX, STATUS_COLUMN, SYSTEM_ID_COLUMN};
use crate::catalog::Catalog;
use crate::error::EntityError;
use crate::filter::{EntityFilter, EntityUpdate};
use crate::messages;
use crate::ports::{EntityStore, Result};
use crate::principal::UserDetails;
use crate::types::{Attributes, MetaInformation, NewEntity};

#[derive(Clone)]
pub struct EntityBulk {
    entities: Arc<dyn EntityStore>,
    catalog: Catalog,
}

impl EntityBulk {
    pub fn new(entities: Arc<dyn EntityStore>, catalog: Catalog) -> Self {
        Self { entities, catalog }
    }

    /// Create one entity of `entity_type` per row. Returns the rows with
    /// `_SYSTEM_ID` and `status` filled in. An unknown type fails the request.
    pub async fn create(&self, user: &UserDetails, entity_type: &str, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>> {
        let ty = self.catalog.get(&user.tenant_id, entity_type).await?;
        let mut out = Vec::with_capacity(rows.len());
        let mut failed = 0usize;
        for mut row in rows {
            let (meta, registry) = split_columns(&row);
            let created = match meta.get("externalId").and_then(Value::as_str) {
                Some(ext) if !ext.is_empty() => {
                    let mut meta_information = MetaInformation::default();
                    meta_information.set_fields(&meta);
                    self.entities
                        .create(vec![NewEntity {
                            entity_type: Some(ty.name.clone()),
                            entity_type_id: Some(ty.id),
                            meta_information,
                            registry_details: registry,
                            tenant_id: user.tenant_id.clone(),
                            org_id: user.org_id.clone(),
                            created_by: user.user_id.clone(),
                        }])
                        .await
                        .map(|mut v| v.remove(0).id)
                }
                _ => Err(EntityError::BadRequest("externalId is required".into())),
            };
            annotate(&mut row, created, &mut failed)?;
            out.push(row);
        }
        tracing::info!(tenant = %user.tenant_id, entity_type, rows = out.len(), failed, "bulk entity create");
        Ok(out)
    }

    /// Update the entity named by each row's `_SYSTEM_ID`.
    pub async fn update(&self, user: &UserDetails, rows: Vec<CsvRow>) -> Result<Vec<CsvRow>> {
        let mut out = Vec::with_capacity(rows.len());
        let mut failed = 0usize;
        for mut row in rows {
            let result = self.update_row(user, &row).await;
            annotate(&mut row, result, &mut failed)?;
            out.push(row);
        }
        tracing::info!(tenant = %user.tenant_id, rows = out.len(), failed, "bulk entity update");
        Ok(out)
    }

    async fn update_row(&self, user: &UserDetails, row: &CsvRow) -> Result<Uuid> {
        let raw = row
            .value(SYSTEM_ID_COLUMN)
            .ok_or_else(|| EntityError::BadRequest(format!("{SYSTEM_ID_COLUMN} is required")))?;
        let id = Uuid::parse_str(raw)
            .map_err(|_| EntityError::BadRequest(format!("invalid {SYSTEM_ID_COLUMN} '{raw}'")))?;
        let (set_meta, set_registry_details) = split_columns(row);
        let update = EntityUpdate {
            set_meta,
            set_registry_details,
            updated_by: Some(user.user_id.clone()),
            ..Default::default()
        };
        if update.is_empty() {
            return Err(EntityError::BadRequest("no fields to update".into()));
        }
        let updated = self
            .entities
            .update_one(&EntityFilter::by_id(user.tenant_id.as_str(), id), &update)
            .await?;
        Ok(updated.id)
    }
}

/// Route columns into metadata and `registry-*` details. Output columns and
/// blank cells are dropped.
fn split_columns(row: &CsvRow) -> (Attributes, Attributes) {
    let mut meta = Map::new();
    let mut registry = Map::new();
    for (column, value) in row.iter() {
        if column == SYSTEM_ID_COLUMN || column == STATUS_COLUMN || value.is_empty() {
            continue;
        }
        match column.strip_prefix(REGISTRY_PREFIX) {
            Some(key) if !key.is_empty() => {
                registry.insert(key.to_string(), Value::String(value.to_string()));
            }
            Some(_) => {}
            None => {
                meta.insert(column.to_string(), Value::String(value.to_string()));
            }
        }
    }
    (meta, registry)
}

/// Record a row outcome. Domain failures become the row's status; anything
/// else aborts the whole batch.
pub(crate) fn annotate(row: &mut CsvRow, result: Result<Uuid>, failed: &mut usize) -> Result<()> {
    match result {
        Ok(id) => {
            row.set(SYSTEM_ID_COLUMN, id.to_string());
            row.set(STATUS_COLUMN, messages::SUCCESS);
        }
        Err(e) if e.is_domain() => {
            *failed += 1;
            row.set(SYSTEM_ID_COLUMN, "");
            row.set(STATUS_COLUMN, e.to_string());
        }
        Err(e) => {
            tracing::error!(error = %e, "bulk row failed, aborting");
            return Err(e);
        }
    }
    Ok(())
}
