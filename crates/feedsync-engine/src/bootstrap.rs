//! One-time reference-data bootstrap.
//!
//! Invoked once per process lifetime before the first run — not per
//! record. Individual failures are logged and skipped so one missing
//! capability cannot block imports.

use feedsync_store::{fields, EntityKind, EntityStore, FieldValue};

use crate::refs::DEFAULT_ITEM_GROUP;

/// Baseline units every import relies on.
const BASELINE_UNITS: &[(&str, bool)] = &[
    ("Nos", true),
    ("ks", true),
    ("Kg", false),
    ("Gram", false),
    ("Litre", false),
    ("Millilitre", false),
];

/// Price lists the item reconciler writes into: (name, selling).
const BASELINE_PRICE_LISTS: &[(&str, bool)] = &[
    ("Standard Selling", true),
    ("Wholesale", true),
    ("Standard Buying", false),
];

/// Ensure baseline reference data exists: units, price lists, and the
/// catch-all item group.
pub fn ensure_reference_data(store: &mut dyn EntityStore) {
    for (name, whole_number) in BASELINE_UNITS {
        ensure(
            store,
            EntityKind::Uom,
            name,
            fields([
                ("uom_name", FieldValue::text(*name)),
                ("must_be_whole_number", FieldValue::Bool(*whole_number)),
            ]),
        );
    }

    for (name, selling) in BASELINE_PRICE_LISTS {
        ensure(
            store,
            EntityKind::PriceList,
            name,
            fields([
                ("price_list_name", FieldValue::text(*name)),
                ("selling", FieldValue::Bool(*selling)),
                ("buying", FieldValue::Bool(!*selling)),
                ("currency", FieldValue::text("EUR")),
            ]),
        );
    }

    ensure(
        store,
        EntityKind::ItemGroup,
        DEFAULT_ITEM_GROUP,
        fields([
            ("item_group_name", FieldValue::text(DEFAULT_ITEM_GROUP)),
            ("is_group", FieldValue::Bool(true)),
        ]),
    );
}

fn ensure(store: &mut dyn EntityStore, kind: EntityKind, key: &str, create: feedsync_store::FieldMap) {
    match store.exists(kind, key) {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = store.create(kind, key, create) {
                tracing::warn!(%kind, name = key, error = %e, "failed to bootstrap reference entity");
            }
        }
        Err(e) => {
            tracing::warn!(%kind, name = key, error = %e, "bootstrap lookup failed");
        }
    }
}
