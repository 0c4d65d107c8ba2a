//! Catalog item record extraction.

use crate::text::{clean_name, clean_text, parse_decimal, parse_int};
use crate::xml::XmlElement;

/// The record element tag used by the vendor's catalog export.
pub const ITEM_TAG: &str = "SHOPITEM";

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    pub name: String,
    pub value: String,
    pub description: String,
}

/// Canonical representation of one catalog item feed entry.
///
/// Constructed fresh per run and consumed immediately by the reconciler —
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub external_id: String,
    /// Idempotency key. Falls back to `external_id` when the code element
    /// is blank; may still be empty, which the reconciler rejects.
    pub item_code: String,
    pub guid: String,
    pub name: String,
    pub short_description: String,
    pub long_description: String,
    pub barcode: String,
    pub manufacturer: String,
    pub supplier: String,
    pub currency: String,
    /// Gross selling price (tax inclusive).
    pub price_gross: f64,
    /// Net selling price derived from the gross price and tax rate;
    /// zero when either is absent.
    pub price_net: f64,
    /// Tax amount derived as gross minus net.
    pub tax_amount: f64,
    pub purchase_price: f64,
    pub tax_rate: f64,
    pub stock_qty: f64,
    pub stock_min: f64,
    pub stock_max: f64,
    pub weight_kg: f64,
    pub unit: String,
    pub visible: bool,
    /// Explicit default category, preferred over the first listed one.
    pub default_category: String,
    pub categories: Vec<CategoryRef>,
    pub images: Vec<ImageRef>,
    pub attributes: Vec<CustomAttribute>,
    pub related_codes: Vec<String>,
    pub seo_title: String,
    pub seo_description: String,
}

/// Extract every catalog item record from the document, anywhere in the
/// tree. May be empty.
#[must_use]
pub fn extract_items(root: &XmlElement) -> Vec<ItemRecord> {
    root.descendants(ITEM_TAG)
        .into_iter()
        .map(ItemRecord::from_element)
        .collect()
}

impl ItemRecord {
    #[must_use]
    pub fn from_element(element: &XmlElement) -> Self {
        let external_id = element.attr("id").trim().to_string();
        let code = element.child_text("CODE").to_string();
        let item_code = if code.is_empty() {
            external_id.clone()
        } else {
            code
        };

        let price_gross = parse_decimal(element.child_text("PRICE_VAT"));
        let tax_rate = parse_decimal(element.child_text("VAT"));
        let (price_net, tax_amount) = derive_net_and_tax(price_gross, tax_rate);

        let stock = element.child("STOCK");
        let logistic = element.child("LOGISTIC");

        Self {
            external_id,
            item_code,
            guid: element.child_text("GUID").to_string(),
            name: clean_name(element.child_text("NAME")),
            short_description: clean_text(element.child_text("SHORT_DESCRIPTION")),
            long_description: clean_text(element.child_text("DESCRIPTION")),
            barcode: element.child_text("EAN").to_string(),
            manufacturer: clean_name(element.child_text("MANUFACTURER")),
            supplier: clean_name(element.child_text("SUPPLIER")),
            currency: element.child_text("CURRENCY").trim().to_uppercase(),
            price_gross,
            price_net,
            tax_amount,
            purchase_price: parse_decimal(element.child_text("PURCHASE_PRICE")),
            tax_rate,
            stock_qty: stock.map_or(0.0, |s| parse_decimal(s.child_text("AMOUNT"))),
            stock_min: stock.map_or(0.0, |s| parse_decimal(s.child_text("MINIMAL_AMOUNT"))),
            stock_max: stock.map_or(0.0, |s| parse_decimal(s.child_text("MAXIMAL_AMOUNT"))),
            weight_kg: logistic.map_or(0.0, |l| parse_decimal(l.child_text("WEIGHT"))),
            unit: element.child_text("UNIT").to_string(),
            visible: parse_int(element.child_text("VISIBLE")) != 0,
            default_category: clean_category_name(element.child_text("DEFAULT_CATEGORY")),
            categories: extract_categories(element),
            images: extract_images(element),
            attributes: extract_attributes(element),
            related_codes: extract_related_codes(element),
            seo_title: element.child_text("SEO_TITLE").to_string(),
            seo_description: element.child_text("META_DESCRIPTION").to_string(),
        }
    }
}

/// Net price and tax amount from a gross price and percentage rate.
/// Both must be positive, otherwise no derivation happens.
fn derive_net_and_tax(price_gross: f64, tax_rate: f64) -> (f64, f64) {
    if price_gross > 0.0 && tax_rate > 0.0 {
        let net = price_gross / (1.0 + tax_rate / 100.0);
        (net, price_gross - net)
    } else {
        (0.0, 0.0)
    }
}

fn extract_categories(element: &XmlElement) -> Vec<CategoryRef> {
    element.child("CATEGORIES").map_or_else(Vec::new, |cats| {
        cats.children
            .iter()
            .filter(|c| c.name == "CATEGORY")
            .map(|c| CategoryRef {
                id: c.attr("id").to_string(),
                name: clean_category_name(c.text()),
            })
            .collect()
    })
}

/// Category names may carry a " > " hierarchy separator, which must survive
/// name cleaning as " - " rather than being stripped with the markup chars.
fn clean_category_name(raw: &str) -> String {
    clean_name(&raw.replace(" > ", " - "))
}

fn extract_images(element: &XmlElement) -> Vec<ImageRef> {
    element.child("IMAGES").map_or_else(Vec::new, |images| {
        images
            .children
            .iter()
            .filter(|c| c.name == "IMAGE")
            .map(|c| ImageRef {
                url: c.text().to_string(),
                description: c.attr("description").to_string(),
            })
            .collect()
    })
}

fn extract_attributes(element: &XmlElement) -> Vec<CustomAttribute> {
    element
        .child("TEXT_PROPERTIES")
        .map_or_else(Vec::new, |props| {
            props
                .children
                .iter()
                .filter(|c| c.name == "TEXT_PROPERTY")
                .filter_map(|prop| {
                    let name = prop.child_text("NAME");
                    let value = prop.child_text("VALUE");
                    // Only named, valued properties are worth carrying.
                    if name.is_empty() || value.is_empty() {
                        return None;
                    }
                    Some(CustomAttribute {
                        name: name.to_string(),
                        value: value.to_string(),
                        description: prop.child_text("DESCRIPTION").to_string(),
                    })
                })
                .collect()
        })
}

fn extract_related_codes(element: &XmlElement) -> Vec<String> {
    element
        .child("RELATED_PRODUCTS")
        .map_or_else(Vec::new, |related| {
            related
                .children
                .iter()
                .filter(|c| c.name == "CODE" && !c.text().is_empty())
                .map(|c| c.text().to_string())
                .collect()
        })
}
