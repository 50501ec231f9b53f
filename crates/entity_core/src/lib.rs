//! entity_core: domain model and engines of the entity registry.
//!
//! Pure logic over port traits: the hierarchy mutation and query engines,
//! the entity type catalog, CSV bulk operations and the CRUD services.
//! Storage lives behind [`ports`]; `entity_postgres` and [`memory`] implement it.

pub mod bulk;
pub mod catalog;
pub mod entity_types;
pub mod error;
pub mod filter;
pub mod hierarchy;
pub mod memory;
pub mod messages;
pub mod ports;
pub mod principal;
pub mod proto;
pub mod roles;
pub mod search;
pub mod service;
pub mod types;

#[cfg(test)]
mod test_support;

pub use error::EntityError;
pub use principal::UserDetails;
pub use service::{RegistryService, RegistryServiceImpl};
