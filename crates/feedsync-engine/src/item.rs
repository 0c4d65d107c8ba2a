//! Catalog item reconciliation: create-or-update keyed by item code, with
//! price, stock, and image side effects.

use chrono::Utc;
use feedsync_feed::{FeedClient, ItemRecord};
use feedsync_store::{fields, EntityKind, EntityStore, FieldValue, StoreError};

use crate::error::RecordError;
use crate::outcome::Outcome;
use crate::refs::{
    resolve_brand, resolve_item_group, resolve_supplier, resolve_tax_template, resolve_unit,
    DEFAULT_ITEM_GROUP,
};
use crate::runner::RunOptions;

/// Stock deltas at or below this magnitude are noise, not movements.
const STOCK_EPSILON: f64 = 0.001;

/// Barcode lengths accepted by the store (EAN-8, UPC-A, EAN-13, GTIN-14).
const BARCODE_LENGTHS: &[usize] = &[8, 12, 13, 14];

/// Reconcile one catalog item record.
///
/// The item code is the idempotency key: an existing item is updated in
/// place, never duplicated. The whole record runs inside one store
/// transaction; any failure rolls back and is reported as a
/// [`RecordError`]. Side effects (image, prices, stock) are best-effort
/// and cannot fail the upsert.
///
/// # Errors
///
/// Returns [`RecordError`] when the record has no usable item code or the
/// primary upsert fails.
pub async fn reconcile_item(
    store: &mut dyn EntityStore,
    client: &FeedClient,
    record: &ItemRecord,
    options: &RunOptions,
) -> Result<Outcome, RecordError> {
    let code = record.item_code.trim().to_string();
    if code.is_empty() {
        return Err(RecordError::new(format!(
            "missing item code for feed record '{}'",
            record.external_id
        )));
    }

    store.begin();
    match apply_item(store, record, &code, options) {
        Ok(outcome) => {
            apply_side_effects(store, client, record, &code, options).await;
            store.commit().map_err(|e| {
                store.rollback();
                RecordError::new(format!("failed to process item {code}: {e}"))
            })?;
            tracing::info!(item = %code, ?outcome, "reconciled item");
            Ok(outcome)
        }
        Err(e) => {
            store.rollback();
            Err(RecordError::new(format!(
                "failed to process item {code}: {e}"
            )))
        }
    }
}

fn apply_item(
    store: &mut dyn EntityStore,
    record: &ItemRecord,
    code: &str,
    options: &RunOptions,
) -> Result<Outcome, StoreError> {
    let is_update = store.exists(EntityKind::Item, code)?;

    let unit = resolve_unit(store, &record.unit);
    let (primary_group, secondary_groups) = resolve_categories(store, record);
    let brand = resolve_brand(store, &record.manufacturer);
    let supplier = resolve_supplier(store, &record.supplier);
    let tax_template = resolve_tax_template(store, record.tax_rate, &options.company);

    let name = if record.name.is_empty() {
        code.to_string()
    } else {
        record.name.clone()
    };
    let description = if record.long_description.is_empty() {
        record.short_description.clone()
    } else {
        record.long_description.clone()
    };
    // Standard price: the net purchase price when the feed has one, the
    // gross selling price otherwise.
    let standard_rate = if record.purchase_price > 0.0 {
        record.purchase_price
    } else {
        record.price_gross
    };
    let currency = if record.currency.is_empty() {
        "EUR".to_string()
    } else {
        record.currency.clone()
    };

    let mut item_fields = fields([
        ("item_name", FieldValue::text(name)),
        ("description", FieldValue::text(description)),
        ("stock_uom", FieldValue::text(unit)),
        (
            "item_group",
            FieldValue::text(primary_group.unwrap_or_else(|| DEFAULT_ITEM_GROUP.to_string())),
        ),
        ("standard_rate", FieldValue::Number(standard_rate)),
        ("currency", FieldValue::text(currency)),
        ("company", FieldValue::text(options.company.clone())),
        ("is_stock_item", FieldValue::Bool(true)),
        ("is_sales_item", FieldValue::Bool(true)),
        ("is_purchase_item", FieldValue::Bool(true)),
    ]);

    if let Some(brand) = brand {
        item_fields.insert("brand".to_string(), FieldValue::text(brand));
    }
    if let Some(template) = tax_template {
        item_fields.insert("tax_template".to_string(), FieldValue::text(template));
    }
    if let Some(barcode) = usable_barcode(store, record, code) {
        item_fields.insert("barcode".to_string(), FieldValue::text(barcode));
    }

    set_advertised_fields(store, &mut item_fields, record);

    if is_update {
        store.update(EntityKind::Item, code, item_fields)?;
    } else {
        store.create(EntityKind::Item, code, item_fields)?;
    }

    let group_rows = secondary_groups
        .into_iter()
        .map(|group| fields([("item_group", FieldValue::text(group))]))
        .collect();
    store.replace_children(EntityKind::Item, code, "item_groups", group_rows)?;

    if let Some(supplier) = supplier {
        link_supplier(store, code, &supplier)?;
    }

    if !record.attributes.is_empty() {
        let rows = record
            .attributes
            .iter()
            .map(|attr| {
                fields([
                    ("attribute", FieldValue::text(attr.name.clone())),
                    ("value", FieldValue::text(attr.value.clone())),
                    ("description", FieldValue::text(attr.description.clone())),
                ])
            })
            .collect();
        store.replace_children(EntityKind::Item, code, "attributes", rows)?;
    }

    if !record.related_codes.is_empty() {
        let rows = record
            .related_codes
            .iter()
            .map(|related| fields([("item_code", FieldValue::text(related.clone()))]))
            .collect();
        store.replace_children(EntityKind::Item, code, "related_items", rows)?;
    }

    Ok(if is_update {
        Outcome::Updated
    } else {
        Outcome::Created
    })
}

/// Resolve the primary group (explicit default category preferred over the
/// first listed one) and the deduplicated, order-preserving secondary
/// groups, excluding the primary.
fn resolve_categories(
    store: &mut dyn EntityStore,
    record: &ItemRecord,
) -> (Option<String>, Vec<String>) {
    let mut primary = if record.default_category.is_empty() {
        None
    } else {
        resolve_item_group(store, &record.default_category)
    };

    let mut listed: Vec<String> = Vec::new();
    for category in &record.categories {
        if let Some(key) = resolve_item_group(store, &category.name) {
            if primary.is_none() {
                primary = Some(key.clone());
            }
            if !listed.contains(&key) {
                listed.push(key);
            }
        }
    }

    let secondary = listed
        .into_iter()
        .filter(|key| Some(key) != primary.as_ref())
        .collect();
    (primary, secondary)
}

/// Append the supplier link only if the item does not already carry it.
fn link_supplier(store: &mut dyn EntityStore, code: &str, supplier: &str) -> Result<(), StoreError> {
    let entity = store.get(EntityKind::Item, code)?;
    let already_linked = entity
        .child_rows("supplier_items")
        .iter()
        .any(|row| row.get("supplier").and_then(FieldValue::as_str) == Some(supplier));
    if already_linked {
        return Ok(());
    }
    store.append_child(
        EntityKind::Item,
        code,
        "supplier_items",
        fields([("supplier", FieldValue::text(supplier))]),
    )
}

/// Optional fields set only when the store advertises them.
fn set_advertised_fields(
    store: &dyn EntityStore,
    item_fields: &mut feedsync_store::FieldMap,
    record: &ItemRecord,
) {
    let mut set = |field: &str, value: FieldValue| {
        if store.supports_field(EntityKind::Item, field) {
            item_fields.insert(field.to_string(), value);
        }
    };

    set("external_id", FieldValue::text(record.external_id.clone()));
    set("guid", FieldValue::text(record.guid.clone()));
    set("weight_per_unit", FieldValue::Number(record.weight_kg));
    set("published", FieldValue::Bool(record.visible));
    set("seo_title", FieldValue::text(record.seo_title.clone()));
    set(
        "seo_description",
        FieldValue::text(record.seo_description.clone()),
    );
    set("last_sync_at", FieldValue::text(Utc::now().to_rfc3339()));
}

/// Normalize and validate a feed barcode: spaces and hyphens removed,
/// digits only, length in the accepted set. Invalid barcodes are dropped
/// with a warning. A barcode already attached to a *different* item is
/// not reassigned.
fn usable_barcode(store: &dyn EntityStore, record: &ItemRecord, code: &str) -> Option<String> {
    let raw = record.barcode.trim();
    if raw.is_empty() {
        return None;
    }

    let Some(normalized) = validate_barcode(raw) else {
        tracing::warn!(item = code, barcode = raw, "dropping invalid barcode");
        return None;
    };

    match store.find_by_field(
        EntityKind::Item,
        "barcode",
        &FieldValue::text(normalized.clone()),
    ) {
        Ok(Some(owner)) if owner.key != code => {
            tracing::warn!(
                item = code,
                barcode = %normalized,
                owner = %owner.key,
                "barcode already attached to another item; not reassigned"
            );
            None
        }
        Ok(_) => Some(normalized),
        Err(e) => {
            tracing::warn!(item = code, error = %e, "barcode ownership lookup failed");
            None
        }
    }
}

/// Strip spaces and hyphens, then accept only all-digit barcodes of a
/// valid length.
#[must_use]
pub fn validate_barcode(raw: &str) -> Option<String> {
    let normalized: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if normalized.is_empty() || !normalized.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if BARCODE_LENGTHS.contains(&normalized.len()) {
        Some(normalized)
    } else {
        None
    }
}

/// Fire-and-forget side effects after a successful upsert. Each failure is
/// logged and swallowed — it must not fail the primary entity.
async fn apply_side_effects(
    store: &mut dyn EntityStore,
    client: &FeedClient,
    record: &ItemRecord,
    code: &str,
    options: &RunOptions,
) {
    if options.download_images {
        attach_main_image(store, client, record, code).await;
    }
    upsert_item_prices(store, record, code);
    if options.update_stock {
        reconcile_stock(store, record, code);
    }
}

/// Download the first listed image and attach it as the item's main image.
async fn attach_main_image(
    store: &mut dyn EntityStore,
    client: &FeedClient,
    record: &ItemRecord,
    code: &str,
) {
    let Some(image) = record.images.first() else {
        return;
    };
    if image.url.is_empty() {
        return;
    }

    let bytes = match client.fetch_image(&image.url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(item = code, url = %image.url, error = %e, "image download failed");
            return;
        }
    };

    let key = format!("{code}-main-image");
    let file_fields = fields([
        ("file_url", FieldValue::text(image.url.clone())),
        ("attached_to", FieldValue::text(code)),
        ("description", FieldValue::text(image.description.clone())),
        (
            "size_bytes",
            FieldValue::Integer(i64::try_from(bytes.len()).unwrap_or(i64::MAX)),
        ),
    ]);

    let result = match store.exists(EntityKind::FileAttachment, &key) {
        Ok(true) => store.update(EntityKind::FileAttachment, &key, file_fields),
        Ok(false) => store
            .create(EntityKind::FileAttachment, &key, file_fields)
            .map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(item = code, error = %e, "failed to store image attachment");
        return;
    }

    if let Err(e) = store.update(
        EntityKind::Item,
        code,
        fields([("image", FieldValue::text(image.url.clone()))]),
    ) {
        tracing::warn!(item = code, error = %e, "failed to set item image");
    }
}

/// Write retail, wholesale, and purchase price-list entries. Lists are
/// created on first use; zero rates are skipped.
fn upsert_item_prices(store: &mut dyn EntityStore, record: &ItemRecord, code: &str) {
    let currency = if record.currency.is_empty() {
        "EUR"
    } else {
        record.currency.as_str()
    };

    let entries = [
        ("Standard Selling", true, record.price_gross),
        ("Wholesale", true, record.price_net),
        ("Standard Buying", false, record.purchase_price),
    ];

    for (price_list, selling, rate) in entries {
        if rate <= 0.0 {
            continue;
        }
        upsert_price(store, price_list, selling, code, rate, currency);
    }
}

fn upsert_price(
    store: &mut dyn EntityStore,
    price_list: &str,
    selling: bool,
    code: &str,
    rate: f64,
    currency: &str,
) {
    match store.exists(EntityKind::PriceList, price_list) {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = store.create(
                EntityKind::PriceList,
                price_list,
                fields([
                    ("price_list_name", FieldValue::text(price_list)),
                    ("selling", FieldValue::Bool(selling)),
                    ("buying", FieldValue::Bool(!selling)),
                    ("currency", FieldValue::text(currency)),
                ]),
            ) {
                tracing::warn!(price_list, error = %e, "failed to create price list");
                return;
            }
        }
        Err(e) => {
            tracing::warn!(price_list, error = %e, "price list lookup failed");
            return;
        }
    }

    let key = format!("{price_list}:{code}");
    let result = match store.exists(EntityKind::ItemPrice, &key) {
        Ok(true) => store.update(
            EntityKind::ItemPrice,
            &key,
            fields([("price_list_rate", FieldValue::Number(rate))]),
        ),
        Ok(false) => store
            .create(
                EntityKind::ItemPrice,
                &key,
                fields([
                    ("item_code", FieldValue::text(code)),
                    ("price_list", FieldValue::text(price_list)),
                    ("price_list_rate", FieldValue::Number(rate)),
                    ("currency", FieldValue::text(currency)),
                ]),
            )
            .map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(item = code, price_list, error = %e, "failed to upsert item price");
    }
}

/// Post a compensating stock movement when the feed quantity and the
/// on-hand balance diverge by more than [`STOCK_EPSILON`].
fn reconcile_stock(store: &mut dyn EntityStore, record: &ItemRecord, code: &str) {
    let on_hand = match store.get(EntityKind::StockBalance, code) {
        Ok(balance) => balance.number("qty"),
        Err(StoreError::NotFound { .. }) => 0.0,
        Err(e) => {
            tracing::warn!(item = code, error = %e, "stock balance lookup failed");
            return;
        }
    };

    let delta = record.stock_qty - on_hand;
    if delta.abs() > STOCK_EPSILON {
        let entry_type = if delta > 0.0 { "receipt" } else { "issue" };
        let entry = fields([
            ("item_code", FieldValue::text(code)),
            ("entry_type", FieldValue::text(entry_type)),
            ("qty", FieldValue::Number(delta.abs())),
            ("rate", FieldValue::Number(record.purchase_price)),
        ]);
        if let Err(e) = store.create(
            EntityKind::StockEntry,
            &uuid::Uuid::new_v4().to_string(),
            entry,
        ) {
            tracing::warn!(item = code, error = %e, "failed to post stock movement");
            return;
        }
    }

    let balance_fields = fields([
        ("qty", FieldValue::Number(record.stock_qty)),
        ("min_qty", FieldValue::Number(record.stock_min)),
        ("max_qty", FieldValue::Number(record.stock_max)),
    ]);
    let result = match store.exists(EntityKind::StockBalance, code) {
        Ok(true) => store.update(EntityKind::StockBalance, code, balance_fields),
        Ok(false) => store
            .create(EntityKind::StockBalance, code, balance_fields)
            .map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!(item = code, error = %e, "failed to update stock balance");
    }
}
