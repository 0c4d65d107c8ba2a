//! The generic entity model the store contract speaks.
//!
//! Entities are field-keyed records with optional child collections
//! (order lines, secondary categories, supplier links). The engine maps
//! canonical feed records onto this shape; what the store does with it
//! is the store's business.

use std::collections::BTreeMap;

/// Every entity type the reconciliation engine touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Item,
    ItemGroup,
    Uom,
    Manufacturer,
    Supplier,
    Customer,
    Address,
    SalesOrder,
    TaxTemplate,
    Account,
    PriceList,
    ItemPrice,
    StockEntry,
    StockBalance,
    FileAttachment,
    ImportLog,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Item => "Item",
            EntityKind::ItemGroup => "Item Group",
            EntityKind::Uom => "UOM",
            EntityKind::Manufacturer => "Manufacturer",
            EntityKind::Supplier => "Supplier",
            EntityKind::Customer => "Customer",
            EntityKind::Address => "Address",
            EntityKind::SalesOrder => "Sales Order",
            EntityKind::TaxTemplate => "Tax Template",
            EntityKind::Account => "Account",
            EntityKind::PriceList => "Price List",
            EntityKind::ItemPrice => "Item Price",
            EntityKind::StockEntry => "Stock Entry",
            EntityKind::StockBalance => "Stock Balance",
            EntityKind::FileAttachment => "File",
            EntityKind::ImportLog => "Import Log",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field value. Feed data is loosely typed, so the store model
/// keeps the four shapes the engine actually produces.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Bool(bool),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            #[allow(clippy::cast_precision_loss)]
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Ordered field name → value mapping.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Build a [`FieldMap`] from `(name, value)` pairs.
pub fn fields<I>(pairs: I) -> FieldMap
where
    I: IntoIterator<Item = (&'static str, FieldValue)>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// One stored entity: a key, flat fields, and named child collections.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    pub key: String,
    pub fields: FieldMap,
    pub children: BTreeMap<String, Vec<FieldMap>>,
}

impl Entity {
    #[must_use]
    pub fn new(kind: EntityKind, key: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            kind,
            key: key.into(),
            fields,
            children: BTreeMap::new(),
        }
    }

    /// Text field value, or the empty string when absent or non-text.
    #[must_use]
    pub fn text(&self, field: &str) -> &str {
        self.fields.get(field).and_then(FieldValue::as_str).unwrap_or("")
    }

    /// Numeric field value, or 0.0 when absent or non-numeric.
    #[must_use]
    pub fn number(&self, field: &str) -> f64 {
        self.fields.get(field).and_then(FieldValue::as_f64).unwrap_or(0.0)
    }

    /// Boolean field value, or `false` when absent or non-boolean.
    #[must_use]
    pub fn flag(&self, field: &str) -> bool {
        self.fields
            .get(field)
            .and_then(FieldValue::as_bool)
            .unwrap_or(false)
    }

    /// Rows of a named child collection; empty when the collection is absent.
    #[must_use]
    pub fn child_rows(&self, collection: &str) -> &[FieldMap] {
        self.children.get(collection).map_or(&[], Vec::as_slice)
    }
}
