//! Sales order reconciliation.
//!
//! Orders are immutable once imported: an already-known external order id
//! is a no-op skip, never an update. Cancelled orders and orders without
//! product lines are skipped before anything is created.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use feedsync_feed::extract::order::{OrderLineRecord, OrderRecord};
use feedsync_store::{fields, EntityKind, EntityStore, FieldMap, FieldValue, StoreError};

use crate::customer::resolve_customer;
use crate::error::RecordError;
use crate::outcome::Outcome;
use crate::refs::{DEFAULT_ITEM_GROUP, DEFAULT_UNIT};
use crate::runner::RunOptions;

/// Localized status fragments that mark a cancelled order.
/// "cancel" also covers "cancelled"/"canceled"; "zrusen"/"zrušen" cover
/// the Slovak and Czech inflections with and without diacritics.
const CANCELLATION_KEYWORDS: &[&str] = &["storno", "cancel", "zrušen", "zrusen"];

/// Whether an order status string indicates cancellation.
#[must_use]
pub fn is_cancelled(status: &str) -> bool {
    let status = status.to_lowercase();
    CANCELLATION_KEYWORDS
        .iter()
        .any(|keyword| status.contains(keyword))
}

/// Reconcile one sales order record.
///
/// # Errors
///
/// Returns [`RecordError`] when the record has no external order id or the
/// order cannot be persisted.
pub fn reconcile_order(
    store: &mut dyn EntityStore,
    record: &OrderRecord,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> Result<Outcome, RecordError> {
    let id = record.external_order_id.trim().to_string();
    if id.is_empty() {
        return Err(RecordError::new("missing external order id".to_string()));
    }

    // Idempotency: an order already imported under this id is never touched.
    let existing = store
        .find_by_field(
            EntityKind::SalesOrder,
            "external_order_id",
            &FieldValue::text(id.clone()),
        )
        .map_err(|e| RecordError::new(format!("failed to process order {id}: {e}")))?;
    if existing.is_some() {
        tracing::info!(order = %id, "order already imported; skipping");
        return Ok(Outcome::Skipped);
    }

    if is_cancelled(&record.status) {
        tracing::info!(order = %id, status = %record.status, "cancelled order; skipping");
        return Ok(Outcome::Skipped);
    }

    // Shipping/billing-only records never become orders.
    if record.product_lines().count() == 0 {
        tracing::info!(order = %id, "no product lines; skipping");
        return Ok(Outcome::Skipped);
    }

    store.begin();
    match apply_order(store, record, &id, options, now) {
        Ok(Some(outcome)) => {
            store.commit().map_err(|e| {
                store.rollback();
                RecordError::new(format!("failed to process order {id}: {e}"))
            })?;
            tracing::info!(order = %id, "created sales order");
            Ok(outcome)
        }
        Ok(None) => {
            // All product lines were unusable; undo the customer too.
            store.rollback();
            tracing::info!(order = %id, "no usable product lines; skipping");
            Ok(Outcome::Skipped)
        }
        Err(e) => {
            store.rollback();
            Err(RecordError::new(format!(
                "failed to process order {id}: {e}"
            )))
        }
    }
}

fn apply_order(
    store: &mut dyn EntityStore,
    record: &OrderRecord,
    id: &str,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> Result<Option<Outcome>, StoreError> {
    let customer = resolve_customer(store, record);
    let order_date = parse_order_date(&record.date, now);

    let mut line_rows: Vec<FieldMap> = Vec::new();
    for line in record.product_lines() {
        match build_line_row(store, line)? {
            Some(row) => line_rows.push(row),
            None => continue,
        }
    }
    if line_rows.is_empty() {
        return Ok(None);
    }

    let currency = if record.currency.is_empty() {
        "EUR".to_string()
    } else {
        record.currency.clone()
    };

    let key = format!("SO-{id}");
    let mut order_fields = fields([
        ("external_order_id", FieldValue::text(id)),
        ("customer", FieldValue::text(customer)),
        ("company", FieldValue::text(options.company.clone())),
        (
            "transaction_date",
            FieldValue::text(order_date.to_string()),
        ),
        ("delivery_date", FieldValue::text(order_date.to_string())),
        ("currency", FieldValue::text(currency)),
        ("exchange_rate", FieldValue::Number(record.exchange_rate)),
        ("status", FieldValue::text("Draft")),
        ("order_code", FieldValue::text(record.code.clone())),
        ("order_status", FieldValue::text(record.status.clone())),
        ("total_gross", FieldValue::Number(record.total_gross)),
        ("total_net", FieldValue::Number(record.total_net)),
        ("total_tax", FieldValue::Number(record.total_tax)),
        ("rounding", FieldValue::Number(record.rounding)),
        ("amount_due", FieldValue::Number(record.amount_due)),
        ("paid", FieldValue::Bool(record.paid)),
        ("amount_paid", FieldValue::Number(record.amount_paid)),
        ("total_weight", FieldValue::Number(record.total_weight)),
    ]);
    set_advertised_fields(store, &mut order_fields, record);

    store.create(EntityKind::SalesOrder, &key, order_fields)?;
    for row in line_rows {
        store.append_child(EntityKind::SalesOrder, &key, "items", row)?;
    }

    if options.auto_submit_orders {
        submit_order(store, &key);
    }

    Ok(Some(Outcome::Created))
}

/// Build one order line row, creating a placeholder item when the
/// referenced code is unknown to the store. Lines without a code are
/// dropped with a warning.
fn build_line_row(
    store: &mut dyn EntityStore,
    line: &OrderLineRecord,
) -> Result<Option<FieldMap>, StoreError> {
    let code = line.code.trim();
    if code.is_empty() {
        tracing::warn!(line = %line.name, "order line has no item code; dropping");
        return Ok(None);
    }

    if !store.exists(EntityKind::Item, code)? {
        create_placeholder_item(store, code, line)?;
    }

    // Rate prefers the net unit price; a zero net falls back to gross.
    let rate = if line.unit_price_net > 0.0 {
        line.unit_price_net
    } else {
        line.unit_price_gross
    };
    let amount = line.quantity * rate;

    let name = if line.name.is_empty() {
        code.to_string()
    } else {
        line.name.clone()
    };
    Ok(Some(fields([
        ("item_code", FieldValue::text(code)),
        ("item_name", FieldValue::text(name)),
        ("qty", FieldValue::Number(line.quantity)),
        ("rate", FieldValue::Number(rate)),
        ("amount", FieldValue::Number(amount)),
        ("unit", FieldValue::text(line.unit.clone())),
    ])))
}

fn create_placeholder_item(
    store: &mut dyn EntityStore,
    code: &str,
    line: &OrderLineRecord,
) -> Result<(), StoreError> {
    let name = if line.name.is_empty() {
        code.to_string()
    } else {
        line.name.clone()
    };
    store.create(
        EntityKind::Item,
        code,
        fields([
            ("item_name", FieldValue::text(name.clone())),
            ("item_group", FieldValue::text(DEFAULT_ITEM_GROUP)),
            ("stock_uom", FieldValue::text(DEFAULT_UNIT)),
            ("is_stock_item", FieldValue::Bool(true)),
            ("is_sales_item", FieldValue::Bool(true)),
            ("is_purchase_item", FieldValue::Bool(false)),
            (
                "description",
                FieldValue::text(format!("Auto-created from order import - {name}")),
            ),
        ]),
    )?;
    tracing::info!(item = code, "created placeholder item for order line");
    Ok(())
}

/// Submit the draft order. Failure keeps the draft — it is logged, never
/// propagated.
fn submit_order(store: &mut dyn EntityStore, key: &str) {
    let result = store.update(
        EntityKind::SalesOrder,
        key,
        fields([
            ("status", FieldValue::text("Submitted")),
            ("submitted", FieldValue::Bool(true)),
        ]),
    );
    if let Err(e) = result {
        tracing::warn!(order = %key, error = %e, "order submit failed; keeping draft");
    }
}

fn set_advertised_fields(store: &dyn EntityStore, order_fields: &mut FieldMap, record: &OrderRecord) {
    let optional = [
        ("source_name", record.source_name.as_str()),
        ("customer_remark", record.customer_remark.as_str()),
        ("shop_remark", record.shop_remark.as_str()),
        ("package_number", record.package_number.as_str()),
        ("referer", record.referer.as_str()),
        ("ip_address", record.ip_address.as_str()),
    ];
    for (field, value) in optional {
        if !value.is_empty() && store.supports_field(EntityKind::SalesOrder, field) {
            order_fields.insert(field.to_string(), FieldValue::text(value));
        }
    }
}

/// Parse a feed order date, trying the formats the source shops emit.
/// Unparseable dates fall back to the run date.
fn parse_order_date(raw: &str, now: DateTime<Utc>) -> NaiveDate {
    let raw = raw.trim();
    if raw.is_empty() {
        return now.date_naive();
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d.%m.%Y %H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return datetime.date();
        }
    }
    for format in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date;
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return datetime.date_naive();
    }

    tracing::warn!(date = raw, "unparseable order date; using run date");
    now.date_naive()
}
