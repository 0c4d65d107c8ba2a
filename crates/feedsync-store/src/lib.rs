//! The business-record store contract and its in-memory reference
//! implementation.
//!
//! The persistent store is an external collaborator: the reconciliation
//! engine only talks to it through the [`EntityStore`] trait. The
//! [`MemoryStore`] implementation backs tests and the debug CLI.

pub mod contract;
pub mod entity;
pub mod error;
pub mod memory;

pub use contract::EntityStore;
pub use entity::{fields, Entity, EntityKind, FieldMap, FieldValue};
pub use error::StoreError;
pub use memory::MemoryStore;
