//! Reference-entity resolution: units, item groups, brands, suppliers,
//! tax templates, countries.
//!
//! Every resolver is idempotent (exists-check before create) and degrades
//! to a default on failure — a broken reference never fails the record
//! that needed it.

use feedsync_feed::text::clean_name;
use feedsync_store::{fields, EntityKind, EntityStore, FieldValue};

/// Generic "each" unit used when the feed gives nothing usable.
pub const DEFAULT_UNIT: &str = "Nos";

/// Catch-all item group for uncategorized items.
pub const DEFAULT_ITEM_GROUP: &str = "All Item Groups";

/// Known vendor unit abbreviations mapped to canonical unit names.
const UNIT_MAP: &[(&str, &str)] = &[
    ("ks", "Nos"),
    ("pc", "Nos"),
    ("pcs", "Nos"),
    ("kg", "Kg"),
    ("g", "Gram"),
    ("l", "Litre"),
    ("ml", "Millilitre"),
    ("m", "Meter"),
    ("cm", "Centimeter"),
    ("mm", "Millimeter"),
    ("box", "Box"),
    ("pack", "Pack"),
    ("bottle", "Bottle"),
];

/// Units counted in whole pieces rather than fractional quantities.
const WHOLE_NUMBER_UNITS: &[&str] = &["ks", "pc", "pcs", "nos"];

/// Resolve a vendor unit code to a canonical unit key.
///
/// Known abbreviations map through the fixed table; unmapped codes that
/// already exist in the store pass through; anything else is created.
/// Empty input and creation failures fall back to [`DEFAULT_UNIT`].
pub fn resolve_unit(store: &mut dyn EntityStore, unit_code: &str) -> String {
    let code = unit_code.trim();
    if code.is_empty() {
        return DEFAULT_UNIT.to_string();
    }

    let lower = code.to_lowercase();
    if let Some((_, mapped)) = UNIT_MAP.iter().find(|(abbr, _)| *abbr == lower) {
        return (*mapped).to_string();
    }

    match store.exists(EntityKind::Uom, code) {
        Ok(true) => return code.to_string(),
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(unit = code, error = %e, "unit lookup failed; using default");
            return DEFAULT_UNIT.to_string();
        }
    }

    let whole_number = WHOLE_NUMBER_UNITS.contains(&lower.as_str());
    match store.create(
        EntityKind::Uom,
        code,
        fields([
            ("uom_name", FieldValue::text(code)),
            ("must_be_whole_number", FieldValue::Bool(whole_number)),
        ]),
    ) {
        Ok(_) => code.to_string(),
        Err(e) => {
            tracing::warn!(unit = code, error = %e, "failed to create unit; using default");
            DEFAULT_UNIT.to_string()
        }
    }
}

/// Resolve a category name to an item-group key, creating it if absent.
/// Returns `None` when the name cleans down to nothing or creation fails.
pub fn resolve_item_group(store: &mut dyn EntityStore, name: &str) -> Option<String> {
    let cleaned = clean_name(name);
    if cleaned.is_empty() {
        return None;
    }

    ensure_named(
        store,
        EntityKind::ItemGroup,
        &cleaned,
        fields([
            ("item_group_name", FieldValue::text(cleaned.clone())),
            ("parent_item_group", FieldValue::text(DEFAULT_ITEM_GROUP)),
            ("is_group", FieldValue::Bool(false)),
        ]),
    )
}

/// Resolve a manufacturer name to a brand key, creating it if absent.
pub fn resolve_brand(store: &mut dyn EntityStore, name: &str) -> Option<String> {
    let cleaned = clean_name(name);
    if cleaned.is_empty() {
        return None;
    }

    ensure_named(
        store,
        EntityKind::Manufacturer,
        &cleaned,
        fields([("short_name", FieldValue::text(cleaned.clone()))]),
    )
}

/// Resolve a supplier name to a supplier key, creating it if absent.
pub fn resolve_supplier(store: &mut dyn EntityStore, name: &str) -> Option<String> {
    let cleaned = clean_name(name);
    if cleaned.is_empty() {
        return None;
    }

    ensure_named(
        store,
        EntityKind::Supplier,
        &cleaned,
        fields([("supplier_name", FieldValue::text(cleaned.clone()))]),
    )
}

/// Resolve a tax template for the given rate, creating one if absent.
///
/// Template identity is the rate combined with the owning company. A new
/// template needs a tax-liability account, searched in order: account name
/// containing "VAT", then containing "Output", then any account of tax
/// type. With no account the tax assignment — not the record — is skipped.
pub fn resolve_tax_template(
    store: &mut dyn EntityStore,
    tax_rate: f64,
    company: &str,
) -> Option<String> {
    if tax_rate <= 0.0 {
        return None;
    }

    let key = format!("VAT {tax_rate}% - {company}");
    match store.exists(EntityKind::TaxTemplate, &key) {
        Ok(true) => return Some(key),
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(template = %key, error = %e, "tax template lookup failed");
            return None;
        }
    }

    let Some(account) = find_tax_account(store) else {
        tracing::warn!(
            rate = tax_rate,
            "no tax-liability account found; skipping tax assignment"
        );
        return None;
    };

    match store.create(
        EntityKind::TaxTemplate,
        &key,
        fields([
            ("rate", FieldValue::Number(tax_rate)),
            ("company", FieldValue::text(company)),
            ("account", FieldValue::text(account)),
        ]),
    ) {
        Ok(_) => Some(key),
        Err(e) => {
            tracing::warn!(template = %key, error = %e, "failed to create tax template");
            None
        }
    }
}

fn find_tax_account(store: &dyn EntityStore) -> Option<String> {
    for needle in ["VAT", "Output"] {
        if let Ok(Some(account)) =
            store.find_name_containing(EntityKind::Account, "account_name", needle)
        {
            return Some(account.key);
        }
    }
    store
        .find_by_field(EntityKind::Account, "account_type", &FieldValue::text("Tax"))
        .ok()
        .flatten()
        .map(|account| account.key)
}

/// Two-letter feed country codes mapped to full country names; anything
/// else passes through. Empty input defaults to Slovakia, the source
/// shops' home market.
#[must_use]
pub fn normalize_country(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Slovakia".to_string();
    }
    match trimmed.to_uppercase().as_str() {
        "SK" => "Slovakia".to_string(),
        "CZ" => "Czech Republic".to_string(),
        "DE" => "Germany".to_string(),
        "AT" => "Austria".to_string(),
        "HU" => "Hungary".to_string(),
        "PL" => "Poland".to_string(),
        "GB" | "UK" => "United Kingdom".to_string(),
        "US" => "United States".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Exists-check-then-create for name-keyed reference entities. Creation
/// failure degrades to `None` with a warning.
fn ensure_named(
    store: &mut dyn EntityStore,
    kind: EntityKind,
    key: &str,
    create_fields: feedsync_store::FieldMap,
) -> Option<String> {
    match store.exists(kind, key) {
        Ok(true) => Some(key.to_string()),
        Ok(false) => match store.create(kind, key, create_fields) {
            Ok(_) => Some(key.to_string()),
            Err(e) => {
                tracing::warn!(%kind, name = key, error = %e, "failed to create reference entity");
                None
            }
        },
        Err(e) => {
            tracing::warn!(%kind, name = key, error = %e, "reference entity lookup failed");
            None
        }
    }
}
