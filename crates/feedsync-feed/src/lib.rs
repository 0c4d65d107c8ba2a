//! Feed acquisition and extraction: fetch raw feed bytes, normalize the
//! XML into an element tree, and extract canonical item/order records.

pub mod client;
pub mod error;
pub mod extract;
pub mod text;
pub mod xml;

pub use client::{FeedClient, FeedSignature};
pub use error::{FetchError, ParseError};
pub use extract::item::{extract_items, ItemRecord};
pub use extract::order::{extract_orders, OrderRecord, OrderTagMatcher};
pub use xml::{parse_document, XmlElement};
