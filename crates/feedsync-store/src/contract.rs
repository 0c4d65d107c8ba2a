//! The store contract the reconciliation engine programs against.

use crate::entity::{Entity, EntityKind, FieldMap, FieldValue};
use crate::error::StoreError;

/// Operations the engine needs from the business-record store.
///
/// Every lookup/create pair the engine performs is exists-check-then-create;
/// the store is not required to make that atomic. Concurrent importers may
/// race on creation of the same reference entity — last-writer-wins is
/// acceptable for this domain.
///
/// `begin`/`commit`/`rollback` scope one primary-entity reconciliation:
/// the engine opens a transaction per record and rolls back on any record
/// failure so partial mutations never persist.
pub trait EntityStore: Send {
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the store cannot be queried.
    fn exists(&self, kind: EntityKind, key: &str) -> Result<bool, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no entity has the given key.
    fn get(&self, kind: EntityKind, key: &str) -> Result<Entity, StoreError>;

    /// First entity whose field equals `value`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the store cannot be queried.
    fn find_by_field(
        &self,
        kind: EntityKind,
        field: &str,
        value: &FieldValue,
    ) -> Result<Option<Entity>, StoreError>;

    /// First entity whose text field contains `needle` case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the store cannot be queried.
    fn find_name_containing(
        &self,
        kind: EntityKind,
        field: &str,
        needle: &str,
    ) -> Result<Option<Entity>, StoreError>;

    /// All entities of a kind, in stable key order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the store cannot be queried.
    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::EmptyKey`] for an empty key and
    /// [`StoreError::AlreadyExists`] when the key is taken.
    fn create(&mut self, kind: EntityKind, key: &str, fields: FieldMap)
        -> Result<Entity, StoreError>;

    /// Merge `fields` into an existing entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no entity has the given key.
    fn update(&mut self, kind: EntityKind, key: &str, fields: FieldMap) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no entity has the given key.
    fn delete(&mut self, kind: EntityKind, key: &str) -> Result<(), StoreError>;

    /// Append one row to a named child collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no entity has the given key.
    fn append_child(
        &mut self,
        kind: EntityKind,
        key: &str,
        collection: &str,
        row: FieldMap,
    ) -> Result<(), StoreError>;

    /// Replace a named child collection wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no entity has the given key.
    fn replace_children(
        &mut self,
        kind: EntityKind,
        key: &str,
        collection: &str,
        rows: Vec<FieldMap>,
    ) -> Result<(), StoreError>;

    /// Whether the store accepts an optional field on this entity kind.
    ///
    /// The engine sets optional/custom fields (external ids, SEO metadata,
    /// weights) only when the store advertises them.
    fn supports_field(&self, kind: EntityKind, field: &str) -> bool;

    fn begin(&mut self);

    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the transaction cannot be committed.
    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self);
}
