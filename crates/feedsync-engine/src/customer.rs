//! Customer and address resolution for order reconciliation.

use feedsync_feed::extract::order::{AddressRecord, OrderRecord};
use feedsync_feed::text::clean_name;
use feedsync_store::{fields, EntityKind, EntityStore, FieldValue};

use crate::refs::normalize_country;

/// Resolve or create the customer for an order and return its key.
///
/// Match order: by email first, then by cleaned name; a match is updated
/// in place. Failures degrade to a synthetic per-order customer name
/// rather than failing the record.
pub fn resolve_customer(store: &mut dyn EntityStore, order: &OrderRecord) -> String {
    let name = customer_name(order);
    let email = order.customer_email.trim();

    let matched = match existing_customer(store, email, &name) {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(order = %order.external_order_id, error = %e, "customer lookup failed");
            None
        }
    };

    let mut customer_fields = fields([
        ("customer_name", FieldValue::text(name.clone())),
        (
            "customer_type",
            FieldValue::text(if order.billing.company.is_empty() {
                "Individual"
            } else {
                "Company"
            }),
        ),
        ("customer_group", FieldValue::text("All Customer Groups")),
        (
            "territory",
            FieldValue::text(normalize_country(&order.billing.country)),
        ),
    ]);
    if !email.is_empty() {
        customer_fields.insert("email".to_string(), FieldValue::text(email));
    }
    if !order.customer_phone.is_empty() {
        customer_fields.insert(
            "phone".to_string(),
            FieldValue::text(order.customer_phone.clone()),
        );
    }
    if !order.billing.vat_id.is_empty() && store.supports_field(EntityKind::Customer, "tax_id") {
        customer_fields.insert(
            "tax_id".to_string(),
            FieldValue::text(order.billing.vat_id.clone()),
        );
    }
    if !order.billing.company_id.is_empty()
        && store.supports_field(EntityKind::Customer, "company_registration")
    {
        customer_fields.insert(
            "company_registration".to_string(),
            FieldValue::text(order.billing.company_id.clone()),
        );
    }

    let key = match matched {
        Some(existing_key) => {
            if let Err(e) = store.update(EntityKind::Customer, &existing_key, customer_fields) {
                tracing::warn!(customer = %existing_key, error = %e, "customer update failed");
            }
            existing_key
        }
        None => match store.create(EntityKind::Customer, &name, customer_fields) {
            Ok(entity) => entity.key,
            Err(e) => {
                let fallback = format!("Customer-{}", order.external_order_id);
                tracing::warn!(customer = %name, error = %e, "customer creation failed; using fallback");
                return fallback;
            }
        },
    };

    create_customer_addresses(store, &key, order);
    key
}

/// The customer display name: company name first, then personal name, then
/// the email local part, then a synthetic per-order name.
fn customer_name(order: &OrderRecord) -> String {
    if !order.billing.company.is_empty() {
        return order.billing.company.clone();
    }
    if !order.billing.name.is_empty() {
        return order.billing.name.clone();
    }
    let email = order.customer_email.trim();
    if let Some(local) = email.split('@').next() {
        let cleaned = clean_name(local);
        if !cleaned.is_empty() {
            return cleaned;
        }
    }
    format!("Customer-{}", order.external_order_id)
}

fn existing_customer(
    store: &dyn EntityStore,
    email: &str,
    name: &str,
) -> Result<Option<String>, feedsync_store::StoreError> {
    if !email.is_empty() {
        if let Some(entity) =
            store.find_by_field(EntityKind::Customer, "email", &FieldValue::text(email))?
        {
            return Ok(Some(entity.key));
        }
    }
    if !name.is_empty() && store.exists(EntityKind::Customer, name)? {
        return Ok(Some(name.to_string()));
    }
    Ok(None)
}

/// Create billing and shipping addresses. The shipping address is skipped
/// when it is structurally identical to billing; either is skipped when it
/// has no recipient name or street.
fn create_customer_addresses(store: &mut dyn EntityStore, customer: &str, order: &OrderRecord) {
    if order.billing.has_content() {
        create_address(store, customer, &order.billing, "Billing");
    }
    if order.shipping.has_content() && order.shipping != order.billing {
        create_address(store, customer, &order.shipping, "Shipping");
    }
}

fn create_address(
    store: &mut dyn EntityStore,
    customer: &str,
    address: &AddressRecord,
    address_type: &str,
) {
    let street_line = address.street_line();
    if street_line.is_empty() {
        return;
    }

    let key = format!("{customer}-{address_type}");
    match store.exists(EntityKind::Address, &key) {
        Ok(true) => return,
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(address = %key, error = %e, "address lookup failed");
            return;
        }
    }

    let result = store.create(
        EntityKind::Address,
        &key,
        fields([
            ("address_title", FieldValue::text(key.clone())),
            ("address_type", FieldValue::text(address_type)),
            ("address_line1", FieldValue::text(street_line)),
            ("city", FieldValue::text(address.city.clone())),
            ("pincode", FieldValue::text(address.postal_code.clone())),
            (
                "country",
                FieldValue::text(normalize_country(&address.country)),
            ),
            ("customer", FieldValue::text(customer)),
        ]),
    );
    if let Err(e) = result {
        tracing::warn!(address = %key, error = %e, "address creation failed");
    }
}
