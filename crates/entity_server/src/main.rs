//! entity_server: REST server for the entity registry.
//!
//! Reads config from env vars (or a `.env` file):
//!   ENTITY_DATABASE_URL        Postgres connection string (absent: in-memory stores)
//!   ENTITY_JWT_SECRET          JWT HMAC secret (required)
//!   ENTITY_BIND_ADDR           listen address (default: 0.0.0.0:5001)
//!   INTERNAL_ACCESS_TOKEN      shared token for internal routes
//!   ENTITY_BULK_CONCURRENCY    mapping upload fan-out (default: 16)
//!   ENTITY_DB_MAX_CONNECTIONS  pool size (default: 10)

use std::sync::Arc;

use anyhow::Context;
use entity_core::memory::InMemoryStores;
use entity_core::service::{RegistryService, RegistryServiceImpl};
use entity_postgres::{migrate, PgStores};
use entity_server::config::ServerConfig;
use entity_server::middleware::jwt::JwtConfig;
use entity_server::router::build_router;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,entity_server=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let service = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(url)
                .await
                .context("failed to connect to database")?;
            tracing::info!("Connected to database");
            migrate(&pool).await?;
            let stores = PgStores::new(pool);
            RegistryServiceImpl::new(
                Arc::new(stores.entities),
                Arc::new(stores.entity_types),
                Arc::new(stores.roles),
            )
        }
        None => {
            tracing::warn!("ENTITY_DATABASE_URL not set, using in-memory stores");
            let stores = InMemoryStores::new();
            RegistryServiceImpl::new(stores.entities, stores.entity_types, stores.roles)
        }
    };
    let service: Arc<dyn RegistryService> =
        Arc::new(service.with_bulk_concurrency(config.bulk_concurrency));

    if config.internal_access_token.is_none() {
        tracing::warn!("INTERNAL_ACCESS_TOKEN not set, internal routes will reject every call");
    }
    let jwt_config = JwtConfig::from_secret(config.jwt_secret.as_bytes())
        .with_internal_access_token(config.internal_access_token.clone());

    let app = build_router(service, jwt_config);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("entity_server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
