//! CSV-driven bulk operations.

pub mod csv_io;
pub mod entities;
pub mod entity_types;
pub mod mapping;

pub use csv_io::{parse_csv, to_base64, write_csv, CsvRow};
pub use entities::EntityBulk;
pub use entity_types::EntityTypeBulk;
pub use mapping::{MappingBuilder, MappingCsv, MappingReport};

/// Output column holding the stored record's ID.
pub const SYSTEM_ID_COLUMN: &str = "_SYSTEM_ID";
/// Output column holding `SUCCESS` or the row's failure message.
pub const STATUS_COLUMN: &str = "status";
/// Prefix of columns routed into `registryDetails`.
pub const REGISTRY_PREFIX: &str = "registry-";

/// `TRUE`/`true` are true; anything else is false.
pub(crate) fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}
