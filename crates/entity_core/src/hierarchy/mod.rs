//! Hierarchy graph engines.
//!
//! Parent/child edges live denormalised on each parent: `groups` maps a
//! descendant type to descendant IDs, `childHierarchyPath` lists every
//! descendant type. [`mutation`] writes those, [`query`] reads them.

pub mod batch;
pub mod mutation;
pub mod query;
pub mod union;

pub use batch::{BatchContext, FlushSummary};
pub use mutation::{AttachOutcome, HierarchyMutator};
pub use query::{HierarchyQuery, RolePage};
