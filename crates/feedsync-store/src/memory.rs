//! Deterministic in-memory [`EntityStore`] implementation.
//!
//! Backs the test suite and the debug CLI. Iteration order is stable
//! (BTree-backed) so lookups like "first account whose name contains VAT"
//! behave the same on every run. Transactions are whole-store snapshots:
//! cheap at test scale, correct by construction.

use std::collections::{BTreeMap, BTreeSet};

use crate::contract::EntityStore;
use crate::entity::{Entity, EntityKind, FieldMap, FieldValue};
use crate::error::StoreError;

type Shelf = BTreeMap<EntityKind, BTreeMap<String, Entity>>;

pub struct MemoryStore {
    entities: Shelf,
    snapshot: Option<Shelf>,
    optional_fields: BTreeMap<EntityKind, BTreeSet<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store advertising the full set of optional fields.
    #[must_use]
    pub fn new() -> Self {
        let mut optional_fields: BTreeMap<EntityKind, BTreeSet<String>> = BTreeMap::new();
        for (kind, field) in DEFAULT_OPTIONAL_FIELDS {
            optional_fields
                .entry(*kind)
                .or_default()
                .insert((*field).to_string());
        }
        Self {
            entities: BTreeMap::new(),
            snapshot: None,
            optional_fields,
        }
    }

    /// Stop advertising an optional field, for tests exercising the
    /// capability-query path.
    pub fn revoke_field(&mut self, kind: EntityKind, field: &str) {
        if let Some(set) = self.optional_fields.get_mut(&kind) {
            set.remove(field);
        }
    }

    fn shelf(&self, kind: EntityKind) -> Option<&BTreeMap<String, Entity>> {
        self.entities.get(&kind)
    }

    fn entity_mut(&mut self, kind: EntityKind, key: &str) -> Result<&mut Entity, StoreError> {
        self.entities
            .get_mut(&kind)
            .and_then(|shelf| shelf.get_mut(key))
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.to_string(),
            })
    }
}

/// Optional fields the reference store accepts, by entity kind.
const DEFAULT_OPTIONAL_FIELDS: &[(EntityKind, &str)] = &[
    (EntityKind::Item, "external_id"),
    (EntityKind::Item, "guid"),
    (EntityKind::Item, "weight_per_unit"),
    (EntityKind::Item, "published"),
    (EntityKind::Item, "seo_title"),
    (EntityKind::Item, "seo_description"),
    (EntityKind::Item, "last_sync_at"),
    (EntityKind::Customer, "tax_id"),
    (EntityKind::Customer, "company_registration"),
    (EntityKind::SalesOrder, "source_name"),
    (EntityKind::SalesOrder, "customer_remark"),
    (EntityKind::SalesOrder, "shop_remark"),
    (EntityKind::SalesOrder, "package_number"),
    (EntityKind::SalesOrder, "referer"),
    (EntityKind::SalesOrder, "ip_address"),
];

impl EntityStore for MemoryStore {
    fn exists(&self, kind: EntityKind, key: &str) -> Result<bool, StoreError> {
        Ok(self.shelf(kind).is_some_and(|shelf| shelf.contains_key(key)))
    }

    fn get(&self, kind: EntityKind, key: &str) -> Result<Entity, StoreError> {
        self.shelf(kind)
            .and_then(|shelf| shelf.get(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.to_string(),
            })
    }

    fn find_by_field(
        &self,
        kind: EntityKind,
        field: &str,
        value: &FieldValue,
    ) -> Result<Option<Entity>, StoreError> {
        Ok(self.shelf(kind).and_then(|shelf| {
            shelf
                .values()
                .find(|entity| entity.fields.get(field) == Some(value))
                .cloned()
        }))
    }

    fn find_name_containing(
        &self,
        kind: EntityKind,
        field: &str,
        needle: &str,
    ) -> Result<Option<Entity>, StoreError> {
        let needle = needle.to_lowercase();
        Ok(self.shelf(kind).and_then(|shelf| {
            shelf
                .values()
                .find(|entity| entity.text(field).to_lowercase().contains(&needle))
                .cloned()
        }))
    }

    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError> {
        Ok(self
            .shelf(kind)
            .map(|shelf| shelf.values().cloned().collect())
            .unwrap_or_default())
    }

    fn create(
        &mut self,
        kind: EntityKind,
        key: &str,
        fields: FieldMap,
    ) -> Result<Entity, StoreError> {
        if key.trim().is_empty() {
            return Err(StoreError::EmptyKey { kind });
        }
        let shelf = self.entities.entry(kind).or_default();
        if shelf.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                kind,
                key: key.to_string(),
            });
        }
        let entity = Entity::new(kind, key, fields);
        shelf.insert(key.to_string(), entity.clone());
        Ok(entity)
    }

    fn update(&mut self, kind: EntityKind, key: &str, fields: FieldMap) -> Result<(), StoreError> {
        let entity = self.entity_mut(kind, key)?;
        entity.fields.extend(fields);
        Ok(())
    }

    fn delete(&mut self, kind: EntityKind, key: &str) -> Result<(), StoreError> {
        let removed = self
            .entities
            .get_mut(&kind)
            .and_then(|shelf| shelf.remove(key));
        if removed.is_none() {
            return Err(StoreError::NotFound {
                kind,
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn append_child(
        &mut self,
        kind: EntityKind,
        key: &str,
        collection: &str,
        row: FieldMap,
    ) -> Result<(), StoreError> {
        let entity = self.entity_mut(kind, key)?;
        entity
            .children
            .entry(collection.to_string())
            .or_default()
            .push(row);
        Ok(())
    }

    fn replace_children(
        &mut self,
        kind: EntityKind,
        key: &str,
        collection: &str,
        rows: Vec<FieldMap>,
    ) -> Result<(), StoreError> {
        let entity = self.entity_mut(kind, key)?;
        entity.children.insert(collection.to_string(), rows);
        Ok(())
    }

    fn supports_field(&self, kind: EntityKind, field: &str) -> bool {
        self.optional_fields
            .get(&kind)
            .is_some_and(|set| set.contains(field))
    }

    fn begin(&mut self) {
        self.snapshot = Some(self.entities.clone());
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.entities = snapshot;
        }
    }
}
