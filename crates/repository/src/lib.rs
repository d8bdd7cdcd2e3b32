//! Storage backends behind a single [`Repository`] trait. A constructor picks the concrete
//! variant from configuration — relational when a DSN is configured, in-memory otherwise — and
//! every caller above this crate only ever sees the trait object.

mod memory;
mod relational;
mod repository;
mod snapshot;

pub use memory::InMemoryRepository;
pub use relational::RelationalRepository;
pub use repository::{validate_for_set, validate_hash, Repository};
pub use snapshot::Snapshot;
