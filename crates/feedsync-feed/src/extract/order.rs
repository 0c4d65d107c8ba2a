//! Sales order record extraction.
//!
//! Order feeds are the wild west of this vendor ecosystem: different shops
//! emit different spellings of the record tag. The matcher tries a
//! prioritized list of known tags, then falls back to scanning the root's
//! direct children for anything order-like.

use crate::text::{clean_name, clean_text, parse_decimal, parse_int};
use crate::xml::XmlElement;

/// Prioritized record-tag matcher for order feeds.
///
/// The tag list is configuration, not a constant: the source vendors never
/// agreed on a canonical spelling, so callers can extend the list without
/// touching the extractor.
#[derive(Debug, Clone)]
pub struct OrderTagMatcher {
    tags: Vec<String>,
}

impl Default for OrderTagMatcher {
    fn default() -> Self {
        Self {
            tags: ["ORDER", "order", "Order", "OBJEDNAVKA"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl OrderTagMatcher {
    #[must_use]
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags }
    }

    /// Locate order record elements: exact known tags in priority order
    /// (anywhere in the tree), then any direct child of the root whose tag
    /// contains "order" case-insensitively. May be empty.
    #[must_use]
    pub fn locate<'a>(&self, root: &'a XmlElement) -> Vec<&'a XmlElement> {
        for tag in &self.tags {
            let found = root.descendants(tag);
            if !found.is_empty() {
                return found;
            }
        }

        tracing::debug!(
            root = %root.name,
            "no known order tag matched; scanning direct children heuristically"
        );
        root.children
            .iter()
            .filter(|c| c.name.to_lowercase().contains("order"))
            .collect()
    }
}

/// What an order line represents. Only product lines become order items;
/// shipping and billing lines are informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderLineKind {
    Product,
    Shipping,
    Billing,
    Other,
}

impl OrderLineKind {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "product" => OrderLineKind::Product,
            "shipping" => OrderLineKind::Shipping,
            "billing" => OrderLineKind::Billing,
            _ => OrderLineKind::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressRecord {
    pub name: String,
    pub company: String,
    pub street: String,
    pub house_number: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub company_id: String,
    pub vat_id: String,
    pub customer_id_number: String,
}

impl AddressRecord {
    fn from_element(element: &XmlElement) -> Self {
        Self {
            name: clean_name(element.child_text("NAME")),
            company: clean_name(element.child_text("COMPANY")),
            street: element.child_text("STREET").to_string(),
            house_number: element.child_text("HOUSENUMBER").to_string(),
            city: element.child_text("CITY").to_string(),
            postal_code: element.child_text("ZIP").to_string(),
            country: element.child_text("COUNTRY").to_string(),
            company_id: element.child_text("COMPANY_ID").to_string(),
            vat_id: element.child_text("VAT_ID").to_string(),
            customer_id_number: element
                .child_text("CUSTOMER_IDENTIFICATION_NUMBER")
                .to_string(),
        }
    }

    /// An address without a recipient name or street is not worth creating.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.name.is_empty() || !self.street.is_empty()
    }

    /// Street plus house number, as a single line.
    #[must_use]
    pub fn street_line(&self) -> String {
        if self.house_number.is_empty() {
            self.street.clone()
        } else {
            format!("{} {}", self.street, self.house_number)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineRecord {
    pub kind: OrderLineKind,
    pub name: String,
    pub quantity: f64,
    pub code: String,
    pub variant: String,
    pub barcode: String,
    pub plu: String,
    pub manufacturer: String,
    pub supplier: String,
    pub unit: String,
    pub weight: f64,
    pub status: String,
    pub discount: f64,
    pub unit_price_gross: f64,
    pub unit_price_net: f64,
    pub unit_tax: f64,
    pub tax_rate: f64,
    pub total_gross: f64,
    pub total_net: f64,
    pub total_tax: f64,
}

/// Canonical representation of one sales order feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    /// Idempotency key: an order already known under this id is skipped.
    pub external_order_id: String,
    pub code: String,
    pub date: String,
    pub status: String,
    pub currency: String,
    pub exchange_rate: f64,
    pub customer_email: String,
    pub customer_phone: String,
    pub ip_address: String,
    pub billing: AddressRecord,
    pub shipping: AddressRecord,
    pub customer_remark: String,
    pub shop_remark: String,
    pub referer: String,
    pub package_number: String,
    pub total_weight: f64,
    pub total_gross: f64,
    pub total_net: f64,
    pub total_tax: f64,
    pub rounding: f64,
    pub amount_due: f64,
    pub paid: bool,
    pub amount_paid: f64,
    pub source_name: String,
    pub lines: Vec<OrderLineRecord>,
}

/// Extract every order record the matcher can locate. May be empty.
#[must_use]
pub fn extract_orders(root: &XmlElement, matcher: &OrderTagMatcher) -> Vec<OrderRecord> {
    matcher
        .locate(root)
        .into_iter()
        .map(OrderRecord::from_element)
        .collect()
}

impl OrderRecord {
    #[must_use]
    pub fn from_element(element: &XmlElement) -> Self {
        let currency = element.child("CURRENCY");
        let customer = element.child("CUSTOMER");
        let totals = element.child("TOTAL_PRICE");

        let billing = customer
            .and_then(|c| c.child("BILLING_ADDRESS"))
            .map(AddressRecord::from_element)
            .unwrap_or_default();
        let shipping = customer
            .and_then(|c| c.child("SHIPPING_ADDRESS"))
            .map(AddressRecord::from_element)
            .unwrap_or_default();

        let lines = element.child("ORDER_ITEMS").map_or_else(Vec::new, |items| {
            items
                .children
                .iter()
                .filter(|c| c.name == "ITEM")
                .map(OrderLineRecord::from_element)
                .collect()
        });

        Self {
            external_order_id: element.child_text("ORDER_ID").to_string(),
            code: element.child_text("CODE").to_string(),
            date: element.child_text("DATE").to_string(),
            status: element.child_text("STATUS").to_string(),
            currency: currency
                .map(|c| c.child_text("CODE").trim().to_uppercase())
                .unwrap_or_default(),
            exchange_rate: currency.map_or(0.0, |c| parse_decimal(c.child_text("EXCHANGE_RATE"))),
            customer_email: customer
                .map(|c| c.child_text("EMAIL").to_string())
                .unwrap_or_default(),
            customer_phone: customer
                .map(|c| c.child_text("PHONE").to_string())
                .unwrap_or_default(),
            ip_address: customer
                .map(|c| c.child_text("IP_ADDRESS").to_string())
                .unwrap_or_default(),
            billing,
            shipping,
            customer_remark: clean_text(element.child_text("REMARK")),
            shop_remark: clean_text(element.child_text("SHOP_REMARK")),
            referer: clean_text(element.child_text("REFERER")),
            package_number: element.child_text("PACKAGE_NUMBER").to_string(),
            total_weight: parse_decimal(element.child_text("WEIGHT")),
            total_gross: totals.map_or(0.0, |t| parse_decimal(t.child_text("WITH_VAT"))),
            total_net: totals.map_or(0.0, |t| parse_decimal(t.child_text("WITHOUT_VAT"))),
            total_tax: totals.map_or(0.0, |t| parse_decimal(t.child_text("VAT"))),
            rounding: totals.map_or(0.0, |t| parse_decimal(t.child_text("ROUNDING"))),
            amount_due: totals.map_or(0.0, |t| parse_decimal(t.child_text("PRICE_TO_PAY"))),
            paid: totals.is_some_and(|t| parse_int(t.child_text("PAID")) != 0),
            amount_paid: totals.map_or(0.0, |t| parse_decimal(t.child_text("AMOUNT_PAID"))),
            source_name: element.child_text("SOURCE_NAME").to_string(),
            lines,
        }
    }

    /// The product-typed lines — the only ones that become order items.
    pub fn product_lines(&self) -> impl Iterator<Item = &OrderLineRecord> {
        self.lines
            .iter()
            .filter(|line| line.kind == OrderLineKind::Product)
    }
}

impl OrderLineRecord {
    #[must_use]
    pub fn from_element(element: &XmlElement) -> Self {
        let unit_price = element.child("UNIT_PRICE");
        let total_price = element.child("TOTAL_PRICE");

        Self {
            kind: OrderLineKind::parse(element.child_text("TYPE")),
            name: clean_name(element.child_text("NAME")),
            quantity: parse_decimal(element.child_text("AMOUNT")),
            code: element.child_text("CODE").to_string(),
            variant: element.child_text("VARIANT_NAME").to_string(),
            barcode: element.child_text("EAN").to_string(),
            plu: element.child_text("PLU").to_string(),
            manufacturer: clean_name(element.child_text("MANUFACTURER")),
            supplier: clean_name(element.child_text("SUPPLIER")),
            unit: element.child_text("UNIT").to_string(),
            weight: parse_decimal(element.child_text("WEIGHT")),
            status: element.child_text("STATUS").to_string(),
            discount: parse_decimal(element.child_text("DISCOUNT")),
            unit_price_gross: unit_price.map_or(0.0, |p| parse_decimal(p.child_text("WITH_VAT"))),
            unit_price_net: unit_price.map_or(0.0, |p| parse_decimal(p.child_text("WITHOUT_VAT"))),
            unit_tax: unit_price.map_or(0.0, |p| parse_decimal(p.child_text("VAT"))),
            tax_rate: unit_price.map_or(0.0, |p| parse_decimal(p.child_text("VAT_RATE"))),
            total_gross: total_price.map_or(0.0, |p| parse_decimal(p.child_text("WITH_VAT"))),
            total_net: total_price.map_or(0.0, |p| parse_decimal(p.child_text("WITHOUT_VAT"))),
            total_tax: total_price.map_or(0.0, |p| parse_decimal(p.child_text("VAT"))),
        }
    }
}
