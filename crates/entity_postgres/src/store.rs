//! Postgres implementations of the entity_core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) to avoid a compile-time DB requirement.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use entity_core::error::EntityError;
use entity_core::filter::{
    EntityFilter, EntityTypeFilter, EntityUpdate, FindOptions, RoleFilter, SortBy,
};
use entity_core::ports::{EntityStore, EntityTypeStore, Result, UserRoleStore};
use entity_core::search::{SearchPage, SearchQuery};
use entity_core::types::{
    Entity, EntityType, EntityTypeId, EntityTypePatch, NewEntity, NewEntityType,
    NewUserRoleExtension, UserRoleExtension, UserRoleExtensionPatch,
};

use crate::sql_filter::{
    push_entity_filter, push_entity_type_filter, push_role_filter, push_search_filter,
};
use crate::sqlx_types::{
    PgEntityRow, PgEntityTypeRow, PgRoleRow, PgSearchRow, ENTITY_COLUMNS, ENTITY_TYPE_COLUMNS,
    ROLE_COLUMNS,
};

/// Unique violations become `Conflict`; everything else is internal.
fn db_err(e: sqlx::Error, what: impl FnOnce() -> String) -> EntityError {
    let unique = e
        .as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|c| c == "23505");
    if unique {
        EntityError::Conflict(format!("{} already exists", what()))
    } else {
        EntityError::Internal(anyhow!(e))
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, opts: &FindOptions) {
    if let Some(limit) = opts.limit {
        qb.push(" LIMIT ").push_bind(limit as i64);
    }
    if let Some(skip) = opts.skip {
        qb.push(" OFFSET ").push_bind(skip as i64);
    }
}

// ── PgEntityStore ─────────────────────────────────────────────

pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        entity: &Entity,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entities (
                id, entity_type, entity_type_id, external_id, meta_information, groups,
                child_hierarchy_path, registry_details, tenant_id, org_id,
                created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(entity.id)
        .bind(&entity.entity_type)
        .bind(entity.entity_type_id)
        .bind(entity.external_id())
        .bind(Json(&entity.meta_information))
        .bind(Json(&entity.groups))
        .bind(Json(&entity.child_hierarchy_path))
        .bind(Json(&entity.registry_details))
        .bind(&entity.tenant_id)
        .bind(&entity.org_id)
        .bind(&entity.created_by)
        .bind(&entity.updated_by)
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_err(e, || format!("externalId '{}'", entity.external_id())))?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn find(&self, filter: &EntityFilter, opts: &FindOptions) -> Result<Vec<Entity>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE TRUE"
        ));
        push_entity_filter(&mut qb, filter);
        match opts.sort {
            Some(SortBy::Name) => qb.push(" ORDER BY meta_information->>'name', id"),
            Some(SortBy::CreatedAt) | None => qb.push(" ORDER BY created_at, id"),
        };
        push_page(&mut qb, opts);
        let rows = qb
            .build_query_as::<PgEntityRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Entity::from).collect())
    }

    async fn find_one(&self, filter: &EntityFilter) -> Result<Entity> {
        let opts = FindOptions {
            limit: Some(1),
            ..Default::default()
        };
        self.find(filter, &opts)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EntityError::NotFound("entity".into()))
    }

    async fn create(&self, entities: Vec<NewEntity>) -> Result<Vec<Entity>> {
        let now = Utc::now();
        let created: Vec<Entity> = entities
            .into_iter()
            .map(|e| e.into_entity(Uuid::new_v4(), now))
            .collect();
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        for entity in &created {
            Self::insert(&mut tx, entity).await?;
        }
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(created)
    }

    async fn update_one(&self, filter: &EntityFilter, update: &EntityUpdate) -> Result<Entity> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE TRUE"
        ));
        push_entity_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at, id LIMIT 1 FOR UPDATE");
        let row = qb
            .build_query_as::<PgEntityRow>()
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?
            .ok_or_else(|| EntityError::NotFound("entity".into()))?;

        let mut entity = Entity::from(row);
        update.apply(&mut entity);
        entity.updated_at = Utc::now();

        let row = sqlx::query_as::<_, PgEntityRow>(&format!(
            r#"
            UPDATE entities
            SET external_id = $2,
                meta_information = $3,
                groups = $4,
                child_hierarchy_path = $5,
                registry_details = $6,
                updated_by = $7,
                updated_at = $8
            WHERE id = $1
            RETURNING {ENTITY_COLUMNS}
            "#
        ))
        .bind(entity.id)
        .bind(entity.external_id())
        .bind(Json(&entity.meta_information))
        .bind(Json(&entity.groups))
        .bind(Json(&entity.child_hierarchy_path))
        .bind(Json(&entity.registry_details))
        .bind(&entity.updated_by)
        .bind(entity.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err(e, || format!("externalId '{}'", entity.external_id())))?;

        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(row.into())
    }

    async fn update_many(&self, filter: &EntityFilter, update: &EntityUpdate) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM entities WHERE TRUE");
        push_entity_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at, id");
        let ids: Vec<Uuid> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;

        let mut updated = 0;
        for id in ids {
            let one = EntityFilter {
                tenant_id: filter.tenant_id.clone(),
                ids: Some(vec![id]),
                ..Default::default()
            };
            match self.update_one(&one, update).await {
                Ok(_) => updated += 1,
                // Row vanished between the scan and the update.
                Err(EntityError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(updated)
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        if matches!(&query.entity_ids, Some(ids) if ids.is_empty()) {
            return Ok(SearchPage::empty());
        }
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ENTITY_COLUMNS}, COUNT(*) OVER() AS total_count FROM entities WHERE TRUE"
        ));
        push_search_filter(&mut qb, query);
        qb.push(" ORDER BY created_at, id LIMIT ")
            .push_bind(query.page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.page.skip() as i64);
        let rows = qb
            .build_query_as::<PgSearchRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;

        let count = match rows.first() {
            Some(r) => r.total_count as u64,
            None if query.page.skip() == 0 => 0,
            // Past the last page: the window count is unavailable.
            None => {
                let mut cq = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM entities WHERE TRUE");
                push_search_filter(&mut cq, query);
                let n: i64 = cq
                    .build_query_scalar()
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| anyhow!(e))?;
                n as u64
            }
        };
        Ok(SearchPage {
            data: rows.into_iter().map(|r| r.entity.into()).collect(),
            count,
        })
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

// ── PgEntityTypeStore ─────────────────────────────────────────

pub struct PgEntityTypeStore {
    pool: PgPool,
}

impl PgEntityTypeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityTypeStore for PgEntityTypeStore {
    async fn find(&self, filter: &EntityTypeFilter) -> Result<Vec<EntityType>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ENTITY_TYPE_COLUMNS} FROM entity_types WHERE TRUE"
        ));
        push_entity_type_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at, id");
        let rows = qb
            .build_query_as::<PgEntityTypeRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(EntityType::from).collect())
    }

    async fn find_one(&self, filter: &EntityTypeFilter) -> Result<EntityType> {
        self.find(filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EntityError::NotFound("entity type".into()))
    }

    async fn create(&self, entity_type: NewEntityType) -> Result<EntityType> {
        let t = entity_type.into_entity_type(Uuid::new_v4(), Utc::now());
        let row = sqlx::query_as::<_, PgEntityTypeRow>(&format!(
            r#"
            INSERT INTO entity_types (
                id, name, immediate_children_entity_type, to_be_mapped_to_parent_entities,
                is_observable, is_deleted, registry_details, tenant_id, org_id,
                created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ENTITY_TYPE_COLUMNS}
            "#
        ))
        .bind(t.id)
        .bind(&t.name)
        .bind(Json(&t.immediate_children_entity_type))
        .bind(t.to_be_mapped_to_parent_entities)
        .bind(t.is_observable)
        .bind(t.is_deleted)
        .bind(Json(&t.registry_details))
        .bind(&t.tenant_id)
        .bind(&t.org_id)
        .bind(&t.created_by)
        .bind(&t.updated_by)
        .bind(t.created_at)
        .bind(t.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err(e, || format!("entity type '{}'", t.name)))?;
        Ok(row.into())
    }

    async fn update(
        &self,
        tenant_id: &str,
        id: EntityTypeId,
        patch: &EntityTypePatch,
        updated_by: &str,
    ) -> Result<EntityType> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let row = sqlx::query_as::<_, PgEntityTypeRow>(&format!(
            "SELECT {ENTITY_TYPE_COLUMNS} FROM entity_types WHERE id = $1 AND tenant_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?
        .ok_or_else(|| EntityError::NotFound(format!("entity type {id}")))?;

        let mut t = EntityType::from(row);
        patch.apply(&mut t);

        let row = sqlx::query_as::<_, PgEntityTypeRow>(&format!(
            r#"
            UPDATE entity_types
            SET immediate_children_entity_type = $2,
                to_be_mapped_to_parent_entities = $3,
                is_observable = $4,
                is_deleted = $5,
                registry_details = $6,
                updated_by = $7,
                updated_at = now()
            WHERE id = $1
            RETURNING {ENTITY_TYPE_COLUMNS}
            "#
        ))
        .bind(t.id)
        .bind(Json(&t.immediate_children_entity_type))
        .bind(t.to_be_mapped_to_parent_entities)
        .bind(t.is_observable)
        .bind(t.is_deleted)
        .bind(Json(&t.registry_details))
        .bind(updated_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(row.into())
    }
}

// ── PgUserRoleStore ───────────────────────────────────────────

pub struct PgUserRoleStore {
    pool: PgPool,
}

impl PgUserRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn role_from_row(row: PgRoleRow) -> Result<UserRoleExtension> {
    row.try_into()
        .map_err(|e: String| EntityError::Internal(anyhow!(e)))
}

#[async_trait]
impl UserRoleStore for PgUserRoleStore {
    async fn find(&self, filter: &RoleFilter, opts: &FindOptions) -> Result<Vec<UserRoleExtension>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ROLE_COLUMNS} FROM user_role_extensions WHERE TRUE"
        ));
        push_role_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at, id");
        push_page(&mut qb, opts);
        let rows = qb
            .build_query_as::<PgRoleRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        rows.into_iter().map(role_from_row).collect()
    }

    async fn count(&self, filter: &RoleFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM user_role_extensions WHERE TRUE");
        push_role_filter(&mut qb, filter);
        let n: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(n as u64)
    }

    async fn create(&self, role: NewUserRoleExtension) -> Result<UserRoleExtension> {
        let r = role.into_role(Uuid::new_v4(), Utc::now());
        let row = sqlx::query_as::<_, PgRoleRow>(&format!(
            r#"
            INSERT INTO user_role_extensions (
                id, user_role_id, title, code, user_type, status, entity_types,
                tenant_id, org_id, created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(r.id)
        .bind(r.user_role_id)
        .bind(&r.title)
        .bind(&r.code)
        .bind(r.user_type)
        .bind(r.status.as_str())
        .bind(Json(&r.entity_types))
        .bind(&r.tenant_id)
        .bind(&r.org_id)
        .bind(&r.created_by)
        .bind(&r.updated_by)
        .bind(r.created_at)
        .bind(r.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        role_from_row(row)
    }

    async fn update(
        &self,
        tenant_id: &str,
        id: Uuid,
        patch: &UserRoleExtensionPatch,
        updated_by: &str,
    ) -> Result<UserRoleExtension> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let row = sqlx::query_as::<_, PgRoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM user_role_extensions WHERE id = $1 AND tenant_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?
        .ok_or_else(|| EntityError::NotFound(format!("user role extension {id}")))?;

        let mut r = role_from_row(row)?;
        patch.apply(&mut r);

        let row = sqlx::query_as::<_, PgRoleRow>(&format!(
            r#"
            UPDATE user_role_extensions
            SET title = $2, code = $3, user_type = $4, status = $5, entity_types = $6,
                updated_by = $7, updated_at = now()
            WHERE id = $1
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(r.id)
        .bind(&r.title)
        .bind(&r.code)
        .bind(r.user_type)
        .bind(r.status.as_str())
        .bind(Json(&r.entity_types))
        .bind(updated_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        role_from_row(row)
    }

    async fn delete(&self, tenant_id: &str, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM user_role_extensions WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(EntityError::NotFound(format!("user role extension {id}")));
        }
        Ok(())
    }
}
