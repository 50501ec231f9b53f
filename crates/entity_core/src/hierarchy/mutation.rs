//! Attaching a child under a parent and propagating it to related ancestors.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::EntityError;
use crate::filter::{EntityFilter, EntityUpdate, FindOptions};
use crate::hierarchy::batch::BatchContext;
use crate::ports::{EntityStore, Result};
use crate::principal::UserDetails;
use crate::types::{Entity, EntityId};

#[derive(Debug, Clone, PartialEq)]
pub enum AttachOutcome {
    /// The child has no entity type; nothing was written.
    Untyped,
    Attached {
        parent: Entity,
        /// Ancestors updated directly, or queued when a batch is in use.
        propagated_to: Vec<EntityId>,
    },
}

impl AttachOutcome {
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached { .. })
    }
}

#[derive(Clone)]
pub struct HierarchyMutator {
    entities: Arc<dyn EntityStore>,
    catalog: Catalog,
}

impl HierarchyMutator {
    pub fn new(entities: Arc<dyn EntityStore>, catalog: Catalog) -> Self {
        Self { entities, catalog }
    }

    /// Attach `child_id` under `parent_id`.
    ///
    /// The parent gains the child, the child's own groups and the child's
    /// type path. When the parent's type is flagged `toBeMappedToParentEntities`
    /// every entity already holding the parent also gains the child.
    pub async fn attach_child(
        &self,
        user: &UserDetails,
        parent_id: EntityId,
        child_id: EntityId,
        batch: Option<&BatchContext>,
    ) -> Result<AttachOutcome> {
        let tenant = user.tenant_id.as_str();
        let child = self
            .entities
            .find_one(&EntityFilter::by_id(tenant, child_id))
            .await
            .map_err(|e| not_found_as(e, format!("child entity {child_id}")))?;

        let Some(child_type) = child.entity_type.clone() else {
            tracing::debug!(%child_id, "child has no entity type, skipping attach");
            return Ok(AttachOutcome::Untyped);
        };

        let parent = self
            .entities
            .find_one(&EntityFilter::by_id(tenant, parent_id))
            .await
            .map_err(|e| not_found_as(e, format!("parent entity {parent_id}")))?;

        reject_cycle(&parent, &child, &child_type)?;

        let new_path = descendant_path(&child_type, &child);
        let mut update = EntityUpdate {
            updated_by: Some(user.user_id.clone()),
            ..Default::default()
        };
        update.add_to_group(child_type.as_str(), &[child_id]);
        for (key, ids) in &child.groups {
            if !ids.is_empty() {
                update.add_to_group(key.as_str(), ids);
            }
        }
        update.add_to_path(&new_path);

        let updated_parent = self
            .entities
            .update_one(&EntityFilter::by_id(tenant, parent_id), &update)
            .await?;
        tracing::debug!(%parent_id, %child_id, child_type = %child_type, "child attached");

        let propagated_to = self
            .propagate_to_related_ancestors(user, &updated_parent, child_id, &child_type, &new_path, batch)
            .await?;

        Ok(AttachOutcome::Attached {
            parent: updated_parent,
            propagated_to,
        })
    }

    /// Check that a not-yet-created entity of `child_type` could be attached
    /// under `parent_id`. Returns the parent.
    pub async fn check_new_child(
        &self,
        user: &UserDetails,
        parent_id: EntityId,
        child_type: &str,
    ) -> Result<Entity> {
        let parent = self
            .entities
            .find_one(&EntityFilter::by_id(user.tenant_id.as_str(), parent_id))
            .await
            .map_err(|e| not_found_as(e, format!("parent entity {parent_id}")))?;
        reject_type_loop(&parent, child_type, None)?;
        Ok(parent)
    }

    /// One hop: ancestors that list `parent` in any group receive the child ID
    /// under its type key plus the child's path. Entities sharing the parent's
    /// type ID are left alone.
    async fn propagate_to_related_ancestors(
        &self,
        user: &UserDetails,
        parent: &Entity,
        child_id: EntityId,
        child_type: &str,
        new_path: &[String],
        batch: Option<&BatchContext>,
    ) -> Result<Vec<EntityId>> {
        let Some(parent_type) = parent.entity_type.as_deref() else {
            return Ok(Vec::new());
        };
        if !self.propagation_flag(&user.tenant_id, parent_type, batch).await? {
            return Ok(Vec::new());
        }

        let mut filter = EntityFilter::tenant(user.tenant_id.as_str()).with_group_member(parent.id, None);
        if let Some(type_id) = parent.entity_type_id {
            filter = filter.excluding_entity_type_id(type_id);
        }
        let related = self.entities.find(&filter, &FindOptions::default()).await?;
        if related.is_empty() {
            return Ok(Vec::new());
        }

        let mut update = EntityUpdate {
            updated_by: Some(user.user_id.clone()),
            ..Default::default()
        };
        update.add_to_group(child_type, &[child_id]);
        update.add_to_path(new_path);

        let mut touched = Vec::with_capacity(related.len());
        for ancestor in related {
            if ancestor.id == child_id {
                continue;
            }
            match batch {
                Some(b) => b.queue(ancestor.id, update.clone()).await,
                None => {
                    self.entities
                        .update_one(&EntityFilter::by_id(user.tenant_id.as_str(), ancestor.id), &update)
                        .await?;
                }
            }
            touched.push(ancestor.id);
        }
        tracing::debug!(
            parent = %parent.id,
            %child_id,
            ancestors = touched.len(),
            batched = batch.is_some(),
            "child propagated to related ancestors"
        );
        Ok(touched)
    }

    async fn propagation_flag(
        &self,
        tenant_id: &str,
        parent_type: &str,
        batch: Option<&BatchContext>,
    ) -> Result<bool> {
        if let Some(b) = batch {
            if let Some(flag) = b.cached_flag(parent_type).await {
                return Ok(flag);
            }
        }
        let flag = match self.catalog.requires_parent_propagation(tenant_id, parent_type).await {
            Ok(flag) => flag,
            Err(EntityError::NotFound(_)) => {
                tracing::warn!(entity_type = %parent_type, "parent type missing from catalog, not propagating");
                false
            }
            Err(e) => return Err(e),
        };
        if let Some(b) = batch {
            b.remember_flag(parent_type, flag).await;
        }
        Ok(flag)
    }
}

/// `[child type, ...child path]`, duplicate-free.
fn descendant_path(child_type: &str, child: &Entity) -> Vec<String> {
    let mut path = vec![child_type.to_string()];
    crate::hierarchy::union::union_into(&mut path, &child.child_hierarchy_path);
    path
}

fn reject_cycle(parent: &Entity, child: &Entity, child_type: &str) -> Result<()> {
    if parent.id == child.id {
        return Err(EntityError::BadRequest(format!(
            "entity {} cannot be attached to itself",
            child.id
        )));
    }
    if child.has_descendant(&parent.id) {
        return Err(EntityError::BadRequest(format!(
            "entity {} is already a descendant of {}",
            parent.id, child.id
        )));
    }
    reject_type_loop(parent, child_type, Some(child))
}

/// The parent's type must not equal the child's type or sit anywhere below it.
fn reject_type_loop(parent: &Entity, child_type: &str, child: Option<&Entity>) -> Result<()> {
    let Some(parent_type) = parent.entity_type.as_deref() else {
        return Ok(());
    };
    let below_child = parent_type == child_type
        || child.is_some_and(|c| {
            c.child_hierarchy_path.iter().any(|t| t == parent_type) || c.groups.contains_key(parent_type)
        });
    if below_child {
        return Err(EntityError::BadRequest(format!(
            "entity type '{parent_type}' cannot hold '{child_type}' as a child"
        )));
    }
    Ok(())
}

fn not_found_as(e: EntityError, what: String) -> EntityError {
    match e {
        EntityError::NotFound(_) => EntityError::NotFound(what),
        other => other,
    }
}
