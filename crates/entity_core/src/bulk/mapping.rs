//! Parent/child mapping from CSV: artifact generation and bulk attach.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::bulk::csv_io::{to_base64, write_csv, CsvRow};
use crate::bulk::STATUS_COLUMN;
use crate::error::EntityError;
use crate::filter::{EntityFilter, FindOptions};
use crate::hierarchy::{BatchContext, HierarchyMutator};
use crate::messages;
use crate::ports::{EntityStore, Result};
use crate::principal::UserDetails;
use crate::types::EntityId;

pub const PARENT_COLUMN: &str = "parentEntityId";
/// Misspelled header still produced by older templates.
pub const PARENT_COLUMN_ALIAS: &str = "parentEntiyId";
pub const CHILD_COLUMN: &str = "childEntityId";

pub const DEFAULT_CONCURRENCY: usize = 16;

/// Result of turning external-ID rows into a parent/child mapping file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingCsv {
    pub parent_entity_ids: Vec<EntityId>,
    pub child_entity_ids: Vec<EntityId>,
    /// Base64 CSV with `parentEntityId,childEntityId` pairs.
    #[serde(rename = "mappingCSV")]
    pub mapping_csv: String,
    /// Base64 CSV of the input rows annotated with `<column>Status`.
    #[serde(rename = "resultCSV")]
    pub annotated_csv: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingReport {
    pub success: bool,
    pub message: String,
    pub rows: Vec<CsvRow>,
    pub attached: usize,
    pub failed: usize,
    pub ancestors_updated: usize,
    pub ancestors_failed: usize,
}

#[derive(Clone)]
pub struct MappingBuilder {
    entities: Arc<dyn EntityStore>,
    mutator: HierarchyMutator,
    concurrency: usize,
}

impl MappingBuilder {
    pub fn new(entities: Arc<dyn EntityStore>, mutator: HierarchyMutator) -> Self {
        Self {
            entities,
            mutator,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Resolve every cell as an external ID and chain the resolved IDs of each
    /// row: `ids[0] → ids[1] → ... → ids[n-1]`.
    pub async fn create_mapping_csv(&self, tenant_id: &str, rows: Vec<CsvRow>) -> Result<MappingCsv> {
        let mut external_ids: Vec<String> = Vec::new();
        for row in &rows {
            for (_, v) in row.iter() {
                if !v.is_empty() && !external_ids.iter().any(|e| e == v) {
                    external_ids.push(v.to_string());
                }
            }
        }
        let resolved = self.lookup_external_ids(tenant_id, external_ids).await?;

        let mut parents = Vec::new();
        let mut children = Vec::new();
        let mut annotated = Vec::with_capacity(rows.len());
        for row in rows {
            let mut out = row.clone();
            let mut chain: Vec<EntityId> = Vec::new();
            for (column, value) in row.iter() {
                if value.is_empty() {
                    continue;
                }
                let status = match resolved.get(value) {
                    Some(id) => {
                        chain.push(*id);
                        messages::FETCHED
                    }
                    None => messages::NOT_FOUND,
                };
                out.set(format!("{column}Status"), status);
            }
            for pair in chain.windows(2) {
                parents.push(pair[0]);
                children.push(pair[1]);
            }
            annotated.push(out);
        }

        let pairs: Vec<CsvRow> = parents
            .iter()
            .zip(&children)
            .map(|(p, c)| CsvRow::from_pairs([(PARENT_COLUMN, p.to_string()), (CHILD_COLUMN, c.to_string())]))
            .collect();
        let mapping_csv = if pairs.is_empty() {
            format!("{PARENT_COLUMN},{CHILD_COLUMN}\n").into_bytes()
        } else {
            write_csv(&pairs)?
        };
        tracing::info!(tenant = %tenant_id, pairs = pairs.len(), "mapping csv generated");

        Ok(MappingCsv {
            parent_entity_ids: parents,
            child_entity_ids: children,
            mapping_csv: to_base64(&mapping_csv),
            annotated_csv: to_base64(&write_csv(&annotated)?),
        })
    }

    /// Attach every `(parent, child)` row under one batch context.
    ///
    /// Rows run concurrently up to the configured bound. Each row gets a
    /// `status` of `SUCCESS` or its failure message; ancestor merges are
    /// written once after all rows finish. A storage failure on any row
    /// fails the whole upload after the flush.
    pub async fn process_entity_mapping_upload_data(
        &self,
        user: &UserDetails,
        rows: Vec<CsvRow>,
    ) -> Result<MappingReport> {
        let tenant = user.tenant_id.as_str();
        let mut external_ids = Vec::new();
        for row in &rows {
            for v in [parent_value(row), row.value(CHILD_COLUMN)].into_iter().flatten() {
                if Uuid::parse_str(v).is_err() && !external_ids.iter().any(|e: &String| e == v) {
                    external_ids.push(v.to_string());
                }
            }
        }
        let by_external = self.lookup_external_ids(tenant, external_ids).await?;

        let batch = BatchContext::new(tenant);
        let batch_ref = &batch;
        let by_external_ref = &by_external;
        let mut results: Vec<(usize, CsvRow, std::result::Result<(), EntityError>)> =
            stream::iter(rows.into_iter().enumerate())
                .map(|(i, row)| async move {
                    let outcome = self.attach_row(user, &row, by_external_ref, batch_ref).await;
                    (i, row, outcome)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        results.sort_by_key(|(i, _, _)| *i);

        let flushed = batch.flush(self.entities.as_ref()).await;

        let mut attached = 0;
        let mut failed = 0;
        let mut annotated = Vec::with_capacity(results.len());
        for (_, mut row, outcome) in results {
            match outcome {
                Ok(()) => {
                    attached += 1;
                    row.set(STATUS_COLUMN, messages::SUCCESS);
                }
                Err(e) if e.is_domain() => {
                    failed += 1;
                    row.set(STATUS_COLUMN, e.to_string());
                }
                Err(e) => {
                    tracing::error!(tenant = %tenant, error = %e, "entity mapping upload aborted");
                    return Err(e);
                }
            }
            annotated.push(row);
        }
        tracing::info!(
            tenant = %tenant,
            attached,
            failed,
            ancestors_updated = flushed.updated,
            "entity mapping upload processed"
        );

        Ok(MappingReport {
            success: failed == 0,
            message: if failed == 0 {
                messages::ENTITY_MAPPING_COMPLETED.to_string()
            } else {
                messages::ENTITY_MAPPING_PARTIAL.to_string()
            },
            rows: annotated,
            attached,
            failed,
            ancestors_updated: flushed.updated,
            ancestors_failed: flushed.failed,
        })
    }

    async fn attach_row(
        &self,
        user: &UserDetails,
        row: &CsvRow,
        by_external: &HashMap<String, EntityId>,
        batch: &BatchContext,
    ) -> std::result::Result<(), EntityError> {
        let parent = resolve_cell(parent_value(row), PARENT_COLUMN, by_external)?;
        let child = resolve_cell(row.value(CHILD_COLUMN), CHILD_COLUMN, by_external)?;
        self.mutator
            .attach_child(user, parent, child, Some(batch))
            .await
            .map(|_| ())
    }

    async fn lookup_external_ids(
        &self,
        tenant_id: &str,
        external_ids: Vec<String>,
    ) -> Result<HashMap<String, EntityId>> {
        if external_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let found = self
            .entities
            .find(
                &EntityFilter::tenant(tenant_id).with_external_ids(external_ids),
                &FindOptions::default(),
            )
            .await?;
        Ok(found
            .into_iter()
            .map(|e| (e.meta_information.external_id.clone(), e.id))
            .collect())
    }
}

fn parent_value(row: &CsvRow) -> Option<&str> {
    row.value(PARENT_COLUMN).or_else(|| row.value(PARENT_COLUMN_ALIAS))
}

/// A cell holds either an entity ID or an external ID.
fn resolve_cell(
    value: Option<&str>,
    column: &str,
    by_external: &HashMap<String, EntityId>,
) -> std::result::Result<EntityId, EntityError> {
    let value = value.ok_or_else(|| EntityError::BadRequest(format!("{column} is required")))?;
    if let Ok(id) = Uuid::parse_str(value) {
        return Ok(id);
    }
    by_external
        .get(value)
        .copied()
        .ok_or_else(|| EntityError::NotFound(format!("entity with externalId '{value}'")))
}
