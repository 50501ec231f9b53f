//! Response messages returned in the `message` field of the envelope.

pub const SUCCESS: &str = "SUCCESS";

pub const FETCHED: &str = "FETCHED";
pub const NOT_FOUND: &str = "NOT_FOUND";

pub const ENTITY_ADDED: &str = "ENTITY_ADDED";
pub const ENTITY_UPDATED: &str = "ENTITY_UPDATED";
pub const ENTITY_INFORMATION_FETCHED: &str = "ENTITY_INFORMATION_FETCHED";
pub const ENTITY_FETCHED: &str = "ENTITY_FETCHED";
pub const ENTITIES_FETCHED: &str = "ENTITIES_FETCHED";
pub const MAPPING_CSV_GENERATED: &str = "MAPPING_CSV_GENERATED";
pub const ENTITY_MAPPING_COMPLETED: &str = "ENTITY_MAPPING_COMPLETED";
pub const ENTITY_MAPPING_PARTIAL: &str = "ENTITY_MAPPING_COMPLETED_WITH_FAILURES";
pub const RELATED_ENTITIES_FETCHED: &str = "RELATED_ENTITIES_FETCHED";
pub const ROLES_FETCHED: &str = "ROLES_FETCHED";

pub const ENTITY_TYPE_CREATED: &str = "ENTITY_TYPE_CREATED";
pub const ENTITY_TYPE_UPDATED: &str = "ENTITY_TYPE_UPDATED";
pub const ENTITY_TYPES_FETCHED: &str = "ENTITY_TYPES_FETCHED";

pub const USER_ROLE_INFORMATION_CREATED: &str = "USER_ROLE_INFORMATION_CREATED";
pub const USER_ROLE_UPDATED: &str = "USER_ROLE_UPDATED";
pub const USER_ROLE_DELETED: &str = "USER_ROLE_DELETED";

pub const TOKEN_MISSING: &str = "Required field token is missing";
pub const TOKEN_INVALID: &str = "Access denied: invalid token";
pub const INTERNAL_TOKEN_INVALID: &str = "Access denied: invalid internal access token";
