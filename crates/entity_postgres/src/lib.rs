//! entity_postgres: PostgreSQL adapter for entity_core's storage ports.

pub mod sql_filter;
pub mod sqlx_types;
pub mod store;

use sqlx::PgPool;

pub use store::{PgEntityStore, PgEntityTypeStore, PgUserRoleStore};

const SCHEMA: &str = include_str!("../migrations/0001_entity_registry.sql");

/// All adapters over one pool.
pub struct PgStores {
    pub entities: PgEntityStore,
    pub entity_types: PgEntityTypeStore,
    pub roles: PgUserRoleStore,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            entities: PgEntityStore::new(pool.clone()),
            entity_types: PgEntityTypeStore::new(pool.clone()),
            roles: PgUserRoleStore::new(pool),
        }
    }
}

/// Apply the registry schema. Safe to run on every startup.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("entity registry schema applied");
    Ok(())
}
